//! Startup seeding of the shared stock counter.

use crate::metrics::CoordinationMetrics;
use flash_sale_core::{CatalogError, CounterError, ProductCatalog, StockCounter};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from [`seed_stock`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeedError {
    /// The product catalog could not be read
    #[error("Failed to load products: {0}")]
    Catalog(#[from] CatalogError),

    /// A counter entry could not be written
    #[error("Failed to seed stock counter: {0}")]
    Counter(#[from] CounterError),
}

/// Write every catalog product's stock into the counter.
///
/// Overwrites whatever the counter held. Negative catalog stock is seeded as
/// zero so the counter never starts below zero.
///
/// Returns the number of seeded products.
///
/// # Errors
///
/// Returns [`SeedError`] on the first catalog or counter failure; products
/// seeded before the failure keep their new value.
pub async fn seed_stock(
    catalog: &dyn ProductCatalog,
    counter: &dyn StockCounter,
) -> Result<usize, SeedError> {
    let products = catalog.all_products().await?;
    info!(products = products.len(), "Seeding stock counter");

    for product in &products {
        let stock = if product.stock < 0 {
            warn!(
                product_id = %product.id,
                stock = product.stock,
                "Negative catalog stock, seeding zero"
            );
            0
        } else {
            product.stock
        };
        counter.seed(product.id, stock).await?;
        debug!(product_id = %product.id, name = %product.name, stock, "Seeded");
    }

    CoordinationMetrics::record_seeded(products.len());
    info!(products = products.len(), "Stock counter seeded");
    Ok(products.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use flash_sale_core::{Product, ProductId};
    use flash_sale_testing::{InMemoryProductCatalog, InMemoryStockCounter};

    #[tokio::test]
    async fn seeds_every_product() {
        let catalog = InMemoryProductCatalog::new(vec![
            Product::new(ProductId::new(1), "keyboard", 10),
            Product::new(ProductId::new(2), "mouse", 0),
            Product::new(ProductId::new(3), "broken", -4),
        ]);
        let counter = InMemoryStockCounter::with_stock([(ProductId::new(1), 99)]);

        let seeded = seed_stock(&catalog, &counter).await.unwrap();

        assert_eq!(seeded, 3);
        assert_eq!(counter.value(ProductId::new(1)), Some(10));
        assert_eq!(counter.value(ProductId::new(2)), Some(0));
        assert_eq!(counter.value(ProductId::new(3)), Some(0));
    }

    #[tokio::test]
    async fn catalog_failure_is_reported() {
        let catalog = InMemoryProductCatalog::new(vec![Product::new(ProductId::new(1), "keyboard", 10)]);
        catalog.set_unavailable(true);
        let counter = InMemoryStockCounter::new();

        let err = seed_stock(&catalog, &counter).await.unwrap_err();

        assert!(matches!(err, SeedError::Catalog(_)));
        assert_eq!(counter.value(ProductId::new(1)), None);
    }

    #[tokio::test]
    async fn counter_failure_is_reported() {
        let catalog = InMemoryProductCatalog::new(vec![Product::new(ProductId::new(1), "keyboard", 10)]);
        let counter = InMemoryStockCounter::new();
        counter.set_unavailable(true);

        let err = seed_stock(&catalog, &counter).await.unwrap_err();
        assert!(matches!(err, SeedError::Counter(CounterError::Connection(_))));
    }
}
