//! # Flash Sale Core
//!
//! Core types and collaborator traits for flash-sale purchase admission.
//!
//! A flash sale is many concurrent requests racing for a small, finite stock.
//! Admission is decided by three stores with very different characteristics:
//!
//! ```text
//! ┌──────────────────────┐   per process, in memory, O(1)
//! │ LocalAdmissionCache  │◄── fast reject once a product is known sold out
//! └──────────┬───────────┘
//!            │ miss
//!            ▼
//! ┌──────────────────────┐   shared, atomic per key
//! │    StockCounter      │◄── decrement / increment, linearizable
//! └──────────┬───────────┘
//!            │ went negative
//!            ▼
//! ┌──────────────────────┐   shared, watchable
//! │ CoordinationService  │◄── cluster-wide sold-out flag + notifications
//! └──────────────────────┘
//! ```
//!
//! The sale itself is persisted by a [`SaleCommitter`]. The control flow that
//! ties all of this together (including rollback when the commit fails) lives
//! in `flash-sale-runtime`; this crate only defines the vocabulary.
//!
//! ## Modules
//!
//! - [`types`]: product ids, products, outcomes and per-request states
//! - [`keys`]: naming of counter keys and flag nodes
//! - [`error`]: error taxonomy, one enum per collaborator
//! - [`counter`]: the [`StockCounter`] trait
//! - [`coordination`]: the [`CoordinationService`] trait and watch events
//! - [`commit`]: the [`SaleCommitter`] and [`ProductCatalog`] traits
//! - [`admission`]: the process-local [`LocalAdmissionCache`]

#![forbid(unsafe_code)]

pub mod admission;
pub mod commit;
pub mod coordination;
pub mod counter;
pub mod error;
pub mod keys;
pub mod types;

pub use admission::LocalAdmissionCache;
pub use commit::{ProductCatalog, SaleCommitter};
pub use coordination::{CoordinationService, CreateOutcome, FlagEvent, FlagEventKind};
pub use counter::StockCounter;
pub use error::{CatalogError, CommitError, CoordinationError, CounterError, SpikeError};
pub use keys::{decode_flag, encode_flag, KeySpace};
pub use types::{Product, ProductId, SpikeOutcome, SpikeState};

/// Boxed future returned by the dyn-compatible collaborator traits.
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
