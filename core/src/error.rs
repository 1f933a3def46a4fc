//! Error types for the flash-sale collaborators.
//!
//! Every collaborator has its own enum so callers can tell a counter outage
//! from a coordination outage. The orchestrator folds the ones it propagates
//! into [`SpikeError`]; commit failures never escape it because they always
//! end in rollback.

use crate::types::ProductId;
use thiserror::Error;

/// Failures of the shared stock counter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CounterError {
    /// Could not reach the backing store.
    #[error("Counter store connection failed: {0}")]
    Connection(String),

    /// The stored value is not a decimal integer.
    #[error("Counter for product {product_id} holds a non-integer value")]
    NotAnInteger {
        /// Product whose counter is corrupt
        product_id: ProductId,
    },

    /// Any other backend error.
    #[error("Counter store error: {0}")]
    Other(String),
}

/// Failures of the coordination service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinationError {
    /// The node does not exist (returned by `set_value` on a missing node).
    #[error("Coordination node {path} does not exist")]
    NoNode {
        /// Path of the missing node
        path: String,
    },

    /// Could not reach the coordination service.
    #[error("Coordination service connection failed: {0}")]
    Connection(String),

    /// The service answered with something unexpected.
    #[error("Coordination protocol error: {0}")]
    Protocol(String),

    /// Any other backend error.
    #[error("Coordination error: {0}")]
    Other(String),
}

/// Failures of the authoritative sale commit.
///
/// The orchestrator does not distinguish between these: any of them triggers
/// the full rollback. They exist for logs and for the committers' own tests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitError {
    /// The persistent store has no stock left for the product.
    #[error("Product {product_id} is out of stock in the persistent store")]
    OutOfStock {
        /// Product that could not be debited
        product_id: ProductId,
    },

    /// The product is not known to the persistent store.
    #[error("Product {product_id} not found")]
    UnknownProduct {
        /// Product that was not found
        product_id: ProductId,
    },

    /// Database failure (connection, constraint, serialization...).
    #[error("Database error: {0}")]
    Database(String),

    /// The message queue did not acknowledge the queued sale.
    #[error("Queue error: {0}")]
    Queue(String),

    /// Rejected for a business reason.
    #[error("Commit rejected: {0}")]
    Rejected(String),
}

/// Failures reading the product catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Database failure.
    #[error("Catalog database error: {0}")]
    Database(String),
}

/// Errors that abort a purchase attempt outside of the rollback path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpikeError {
    /// The shared counter failed.
    #[error(transparent)]
    Counter(#[from] CounterError),

    /// The coordination service failed.
    #[error(transparent)]
    Coordination(#[from] CoordinationError),
}
