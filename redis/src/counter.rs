//! `Redis` stock counter.
//!
//! `DECR` and `INCR` are atomic per key on the server, which is what makes the
//! first `N` decrements the only non-negative ones cluster-wide. A missing key
//! counts as zero, so an unseeded product reads as sold out.

use crate::error::counter_error;
use flash_sale_core::{BoxFuture, CounterError, KeySpace, ProductId, StockCounter};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// [`StockCounter`] over `Redis` integer keys named `{prefix}:{id}`.
#[derive(Clone)]
pub struct RedisStockCounter {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
    keys: KeySpace,
}

impl RedisStockCounter {
    /// Connect to `Redis`.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - `Redis` connection URL (e.g., "<redis://127.0.0.1:6379>")
    /// * `keys` - Key naming shared by every process of the cluster
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::Connection`] if the connection cannot be established.
    pub async fn new(redis_url: &str, keys: KeySpace) -> Result<Self, CounterError> {
        let client = Client::open(redis_url).map_err(|e| {
            CounterError::Connection(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            CounterError::Connection(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self::from_manager(conn_manager, keys))
    }

    /// Wrap an existing connection manager.
    #[must_use]
    pub const fn from_manager(conn_manager: ConnectionManager, keys: KeySpace) -> Self {
        Self { conn_manager, keys }
    }
}

impl StockCounter for RedisStockCounter {
    fn decrement(&self, product_id: ProductId) -> BoxFuture<'_, Result<i64, CounterError>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let remaining: i64 = conn
                .decr(self.keys.counter_key(product_id), 1)
                .await
                .map_err(|e| counter_error(&e, product_id))?;
            tracing::trace!(product_id = %product_id, remaining, "DECR");
            Ok(remaining)
        })
    }

    fn increment(&self, product_id: ProductId) -> BoxFuture<'_, Result<i64, CounterError>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let remaining: i64 = conn
                .incr(self.keys.counter_key(product_id), 1)
                .await
                .map_err(|e| counter_error(&e, product_id))?;
            tracing::trace!(product_id = %product_id, remaining, "INCR");
            Ok(remaining)
        })
    }

    fn seed(&self, product_id: ProductId, stock: i64) -> BoxFuture<'_, Result<(), CounterError>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let _: () = conn
                .set(self.keys.counter_key(product_id), stock)
                .await
                .map_err(|e| counter_error(&e, product_id))?;
            Ok(())
        })
    }

    fn current(&self, product_id: ProductId) -> BoxFuture<'_, Result<Option<i64>, CounterError>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            conn.get(self.keys.counter_key(product_id))
                .await
                .map_err(|e| counter_error(&e, product_id))
        })
    }
}
