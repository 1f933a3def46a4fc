//! Fixed product catalog.

use flash_sale_core::{BoxFuture, CatalogError, Product, ProductCatalog};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// [`ProductCatalog`] over a fixed list of products.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    products: Arc<Vec<Product>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryProductCatalog {
    /// Create a catalog holding `products`.
    #[must_use]
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products: Arc::new(products),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make reads fail with [`CatalogError::Database`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl ProductCatalog for InMemoryProductCatalog {
    fn all_products(&self) -> BoxFuture<'_, Result<Vec<Product>, CatalogError>> {
        Box::pin(async move {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(CatalogError::Database("catalog unavailable".into()));
            }
            Ok(self.products.as_ref().clone())
        })
    }
}
