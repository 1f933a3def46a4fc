//! # Flash Sale Runtime
//!
//! Runtime for flash-sale admission.
//!
//! This crate drives purchase attempts over the collaborator traits defined in
//! `flash-sale-core` and keeps each process's local cache in step with the
//! cluster.
//!
//! ## Core Components
//!
//! - **[`SpikeOrchestrator`]**: per-request state machine (fast reject, claim,
//!   exhaustion handling, commit, rollback)
//! - **[`FlagWatcher`]**: consumes sold-out flag notifications and re-arms watches
//! - **[`CacheRevalidator`]**: periodically clears local marks the cluster retracted
//! - **[`seed_stock`]**: one-time counter initialization from the product catalog
//! - **[`metrics`]**: Prometheus recorder and admission metrics
//!
//! ## Example
//!
//! ```ignore
//! use flash_sale_runtime::{FlagWatcher, SpikeOrchestrator, WatchPolicy};
//!
//! let cache = Arc::new(LocalAdmissionCache::new());
//! let orchestrator = SpikeOrchestrator::new(
//!     Arc::clone(&cache),
//!     counter,
//!     Arc::clone(&coordination),
//!     committer,
//! );
//! FlagWatcher::new(cache, coordination, WatchPolicy::ClearOnRetraction)
//!     .spawn(shutdown_signal());
//!
//! let outcome = orchestrator.attempt_spike(ProductId::new(1)).await;
//! ```

#![forbid(unsafe_code)]

/// Direct or queued commit selection
pub mod commit_mode;

/// Prometheus metrics for observability
pub mod metrics;

/// Admission state machine
pub mod orchestrator;

/// Periodic local cache revalidation
pub mod revalidation;

/// Startup seeding of the stock counter
pub mod seeding;

/// Flag notification handling
pub mod watcher;

pub use commit_mode::CommitMode;
pub use metrics::{MetricsError, MetricsServer};
pub use orchestrator::SpikeOrchestrator;
pub use revalidation::{CacheRevalidator, MIN_REVALIDATE_INTERVAL};
pub use seeding::{seed_stock, SeedError};
pub use watcher::{FlagWatcher, WatchPolicy};
