//! Transactional sale commit.

use flash_sale_core::{BoxFuture, CommitError, ProductId, SaleCommitter};
use sqlx::PgPool;
use std::time::Instant;

/// [`SaleCommitter`] that debits `products.stock` and inserts an order row in
/// one transaction.
///
/// The debit is conditional (`stock > 0`), so a product the database considers
/// sold out is reported as [`CommitError::OutOfStock`] and nothing is written.
#[derive(Debug, Clone)]
pub struct PostgresSaleCommitter {
    pool: PgPool,
}

impl PostgresSaleCommitter {
    /// Create a committer writing to `pool`.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Number of orders recorded for a product.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError::Database`] if the query fails.
    pub async fn order_count(&self, product_id: ProductId) -> Result<i64, CommitError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE product_id = $1")
            .bind(product_id.get())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CommitError::Database(e.to_string()))?;
        Ok(count)
    }

    async fn commit_sale(&self, product_id: ProductId) -> Result<(), CommitError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CommitError::Database(format!("Failed to begin transaction: {e}")))?;

        let debited = sqlx::query("UPDATE products SET stock = stock - 1 WHERE id = $1 AND stock > 0")
            .bind(product_id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| CommitError::Database(e.to_string()))?
            .rows_affected();

        if debited == 0 {
            // Dropping the transaction rolls it back.
            let known: Option<(i64,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
                .bind(product_id.get())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| CommitError::Database(e.to_string()))?;
            return Err(if known.is_some() {
                CommitError::OutOfStock { product_id }
            } else {
                CommitError::UnknownProduct { product_id }
            });
        }

        sqlx::query("INSERT INTO orders (product_id) VALUES ($1)")
            .bind(product_id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| CommitError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| CommitError::Database(format!("Failed to commit transaction: {e}")))?;

        Ok(())
    }
}

impl SaleCommitter for PostgresSaleCommitter {
    fn commit(&self, product_id: ProductId) -> BoxFuture<'_, Result<(), CommitError>> {
        Box::pin(async move {
            let started = Instant::now();
            let result = self.commit_sale(product_id).await;

            metrics::histogram!("postgres_commit_duration_seconds")
                .record(started.elapsed().as_secs_f64());
            match &result {
                Ok(()) => {
                    tracing::debug!(product_id = %product_id, "Order recorded");
                }
                Err(e) => {
                    tracing::warn!(product_id = %product_id, error = %e, "Order not recorded");
                    metrics::counter!("postgres_commit_failures_total").increment(1);
                }
            }
            result
        })
    }
}
