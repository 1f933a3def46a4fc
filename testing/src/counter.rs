//! In-memory stock counter.

use flash_sale_core::{BoxFuture, CounterError, ProductId, StockCounter};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory [`StockCounter`] with Redis `DECR`/`INCR` semantics.
///
/// A missing key counts as `0`, so decrementing an unseeded product yields
/// `-1`. Clones share state, which is how tests model several processes
/// talking to one shared store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStockCounter {
    values: Arc<Mutex<HashMap<ProductId, i64>>>,
    operations: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStockCounter {
    /// Create an empty counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a counter pre-seeded with the given stock levels.
    #[must_use]
    pub fn with_stock(stock: impl IntoIterator<Item = (ProductId, i64)>) -> Self {
        let counter = Self::new();
        if let Ok(mut values) = counter.values.lock() {
            values.extend(stock);
        }
        counter
    }

    /// Current value without counting it as an operation.
    #[must_use]
    pub fn value(&self, product_id: ProductId) -> Option<i64> {
        self.values
            .lock()
            .ok()
            .and_then(|values| values.get(&product_id).copied())
    }

    /// Number of decrement/increment/seed/current calls served so far.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail with [`CounterError::Connection`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn apply(&self, product_id: ProductId, delta: i64) -> Result<i64, CounterError> {
        self.check_available()?;
        let mut values = self
            .values
            .lock()
            .map_err(|_| CounterError::Other("Mutex lock failed".into()))?;
        let value = values.entry(product_id).or_insert(0);
        *value += delta;
        Ok(*value)
    }

    fn check_available(&self) -> Result<(), CounterError> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CounterError::Connection("counter store unavailable".into()));
        }
        Ok(())
    }
}

impl StockCounter for InMemoryStockCounter {
    fn decrement(&self, product_id: ProductId) -> BoxFuture<'_, Result<i64, CounterError>> {
        Box::pin(async move { self.apply(product_id, -1) })
    }

    fn increment(&self, product_id: ProductId) -> BoxFuture<'_, Result<i64, CounterError>> {
        Box::pin(async move { self.apply(product_id, 1) })
    }

    fn seed(&self, product_id: ProductId, stock: i64) -> BoxFuture<'_, Result<(), CounterError>> {
        Box::pin(async move {
            self.check_available()?;
            self.values
                .lock()
                .map_err(|_| CounterError::Other("Mutex lock failed".into()))?
                .insert(product_id, stock);
            Ok(())
        })
    }

    fn current(&self, product_id: ProductId) -> BoxFuture<'_, Result<Option<i64>, CounterError>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self
                .values
                .lock()
                .map_err(|_| CounterError::Other("Mutex lock failed".into()))?
                .get(&product_id)
                .copied())
        })
    }
}
