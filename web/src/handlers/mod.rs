//! HTTP request handlers.

pub mod health;
pub mod metrics;
pub mod spike;

pub use health::health_check;
pub use metrics::render_metrics;
pub use spike::spike;
