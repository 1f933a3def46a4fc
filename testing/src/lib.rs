//! # Flash Sale Testing
//!
//! In-memory implementations of every flash-sale collaborator, for unit and
//! scenario tests that run at memory speed.
//!
//! This crate provides:
//! - [`InMemoryStockCounter`]: shared counter with Redis `DECR`/`INCR` semantics
//! - [`InMemoryCoordinationCluster`]: one shared flag namespace handing out
//!   per-process [`InMemoryCoordination`] sessions with one-shot watches
//! - [`ScriptedSaleCommitter`]: commit outcomes scripted per call
//! - [`InMemoryProductCatalog`]: fixed product list for seeding
//! - [`init_test_tracing`]: opt-in log output for tests
//!
//! Every double can be switched into an "unavailable" mode to exercise the
//! error paths, and counts the operations it served so tests can prove that a
//! fast reject never reached the shared stores.
//!
//! ## Example
//!
//! ```ignore
//! use flash_sale_testing::{InMemoryCoordinationCluster, InMemoryStockCounter};
//!
//! let counter = InMemoryStockCounter::with_stock([(ProductId::new(1), 5)]);
//! let cluster = InMemoryCoordinationCluster::new();
//!
//! // Two "processes" share counter and cluster, but not their sessions.
//! let node_a = cluster.session();
//! let node_b = cluster.session();
//! ```

#![forbid(unsafe_code)]

pub mod catalog;
pub mod committer;
pub mod coordination;
pub mod counter;

pub use catalog::InMemoryProductCatalog;
pub use committer::ScriptedSaleCommitter;
pub use coordination::{InMemoryCoordination, InMemoryCoordinationCluster};
pub use counter::InMemoryStockCounter;

/// Install a `tracing` subscriber for tests.
///
/// Honors `RUST_LOG`; safe to call from every test (only the first call
/// installs anything).
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}
