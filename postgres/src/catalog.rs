//! Product listing for counter seeding.

use flash_sale_core::{BoxFuture, CatalogError, Product, ProductCatalog, ProductId};
use sqlx::{PgPool, Row};

/// [`ProductCatalog`] over the `products` table.
#[derive(Debug, Clone)]
pub struct PostgresProductCatalog {
    pool: PgPool,
}

impl PostgresProductCatalog {
    /// Create a catalog reading from `pool`.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a product or overwrite its name and stock.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the statement fails.
    pub async fn upsert(&self, product: &Product) -> Result<(), CatalogError> {
        sqlx::query(
            r"
            INSERT INTO products (id, name, stock) VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, stock = EXCLUDED.stock
            ",
        )
        .bind(product.id.get())
        .bind(&product.name)
        .bind(product.stock)
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;
        Ok(())
    }
}

impl ProductCatalog for PostgresProductCatalog {
    fn all_products(&self) -> BoxFuture<'_, Result<Vec<Product>, CatalogError>> {
        Box::pin(async move {
            let rows = sqlx::query("SELECT id, name, stock FROM products ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| CatalogError::Database(e.to_string()))?;

            rows.iter()
                .map(|row| -> Result<Product, sqlx::Error> {
                    Ok(Product {
                        id: ProductId::new(row.try_get("id")?),
                        name: row.try_get("name")?,
                        stock: row.try_get("stock")?,
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| CatalogError::Database(e.to_string()))
        })
    }
}
