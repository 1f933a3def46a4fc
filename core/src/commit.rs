//! Persistent-store collaborators: the authoritative sale commit and the
//! product catalog used for seeding.

use crate::error::{CatalogError, CommitError};
use crate::types::{Product, ProductId};
use crate::BoxFuture;

/// Authoritative "commit one unit of sale" operation.
///
/// Implementations persist the order and debit the persistent stock as one
/// atomic unit. The orchestrator only observes success or failure; any
/// failure triggers the full rollback.
pub trait SaleCommitter: Send + Sync {
    /// Persist the sale of one unit of `product_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError`] if the sale could not be persisted.
    fn commit(&self, product_id: ProductId) -> BoxFuture<'_, Result<(), CommitError>>;
}

/// Read access to the persistent product catalog.
pub trait ProductCatalog: Send + Sync {
    /// Every known product with its current stock.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the catalog cannot be read.
    fn all_products(&self) -> BoxFuture<'_, Result<Vec<Product>, CatalogError>>;
}
