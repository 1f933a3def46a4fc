//! Shared, atomically decrementable stock counter.
//!
//! The counter is a bare atomic primitive: it performs no bounds checking.
//! Detecting a negative result and correcting it is the caller's job, so all
//! admission policy stays in the orchestrator.

use crate::error::CounterError;
use crate::types::ProductId;
use crate::BoxFuture;

/// Atomic per-product stock counter shared by every process.
///
/// # Guarantees required from implementations
///
/// - `decrement` and `increment` are linearizable per key across all
///   processes (the backing store provides this; it is not reimplemented).
/// - Both return the value *after* the operation.
/// - Values are signed: a decrement may transiently produce a negative value.
///
/// # Dyn Compatibility
///
/// Methods return boxed futures so the orchestrator can hold an
/// `Arc<dyn StockCounter>`.
pub trait StockCounter: Send + Sync {
    /// Atomically subtract one unit and return the new value.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError`] if the backing store fails.
    fn decrement(&self, product_id: ProductId) -> BoxFuture<'_, Result<i64, CounterError>>;

    /// Atomically add one unit and return the new value.
    ///
    /// Used both to correct an over-decrement and to roll back a claim.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError`] if the backing store fails.
    fn increment(&self, product_id: ProductId) -> BoxFuture<'_, Result<i64, CounterError>>;

    /// Overwrite the counter with an absolute value.
    ///
    /// Only startup seeding calls this; the admission path never does.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError`] if the backing store fails.
    fn seed(&self, product_id: ProductId, stock: i64) -> BoxFuture<'_, Result<(), CounterError>>;

    /// Read the current value, `None` if the counter was never seeded.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError`] if the backing store fails.
    fn current(&self, product_id: ProductId) -> BoxFuture<'_, Result<Option<i64>, CounterError>>;
}
