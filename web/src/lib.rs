//! Axum HTTP surface for flash-sale admission.
//!
//! The shell around [`SpikeOrchestrator`](flash_sale_runtime::SpikeOrchestrator):
//! it parses the product id from the path, runs one purchase attempt and
//! writes the binary outcome back as plain text.
//!
//! # Routes
//!
//! ```text
//! POST /spike/:product_id   200 "success" | "fail", 400 on a bad id
//! GET  /health              200 "ok"
//! GET  /metrics             Prometheus text, 503 when metrics are disabled
//! ```
//!
//! # Example
//!
//! ```ignore
//! use flash_sale_web::{build_router, AppState};
//!
//! let app = build_router(AppState::new(orchestrator));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use middleware::{REQUEST_ID_HEADER, RequestId};
pub use routes::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
