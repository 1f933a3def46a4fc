//! Sale committer whose outcomes are scripted by the test.

use flash_sale_core::{BoxFuture, CommitError, ProductId, SaleCommitter};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Script {
    queued: VecDeque<Result<(), CommitError>>,
    fallback: Option<CommitError>,
    committed: HashMap<ProductId, u64>,
}

/// [`SaleCommitter`] that succeeds unless told otherwise.
///
/// Outcomes are taken from a queue first ([`Self::push_failure`],
/// [`Self::push_success`]); once the queue is empty the fallback applies
/// (success by default, see [`Self::always_fail`]).
///
/// # Example
///
/// ```ignore
/// let committer = ScriptedSaleCommitter::new();
/// committer.push_failure(CommitError::Database("deadlock".into()));
///
/// assert!(committer.commit(id).await.is_err()); // scripted
/// assert!(committer.commit(id).await.is_ok());  // fallback
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedSaleCommitter {
    script: Arc<Mutex<Script>>,
    attempts: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl ScriptedSaleCommitter {
    /// Committer that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Committer that always fails with `error` once the queue is empty.
    #[must_use]
    pub fn always_fail(error: CommitError) -> Self {
        let committer = Self::new();
        if let Ok(mut script) = committer.script.lock() {
            script.fallback = Some(error);
        }
        committer
    }

    /// Sleep this long inside every commit, to widen race windows.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a failure for the next unscripted commit.
    pub fn push_failure(&self, error: CommitError) {
        if let Ok(mut script) = self.script.lock() {
            script.queued.push_back(Err(error));
        }
    }

    /// Queue a success for the next unscripted commit.
    pub fn push_success(&self) {
        if let Ok(mut script) = self.script.lock() {
            script.queued.push_back(Ok(()));
        }
    }

    /// Number of successful commits for a product.
    #[must_use]
    pub fn committed(&self, product_id: ProductId) -> u64 {
        self.script
            .lock()
            .ok()
            .and_then(|script| script.committed.get(&product_id).copied())
            .unwrap_or(0)
    }

    /// Number of commit calls, successful or not.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn next_outcome(&self, product_id: ProductId) -> Result<(), CommitError> {
        let mut script = self
            .script
            .lock()
            .map_err(|_| CommitError::Rejected("Mutex lock failed".into()))?;
        let outcome = match script.queued.pop_front() {
            Some(outcome) => outcome,
            None => script.fallback.clone().map_or(Ok(()), Err),
        };
        if outcome.is_ok() {
            *script.committed.entry(product_id).or_insert(0) += 1;
        }
        outcome
    }
}

impl SaleCommitter for ScriptedSaleCommitter {
    fn commit(&self, product_id: ProductId) -> BoxFuture<'_, Result<(), CommitError>> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.next_outcome(product_id)
        })
    }
}
