//! Per-request admission state machine.
//!
//! # Flow
//!
//! ```text
//! attempt_spike(id)
//!   │
//!   ├─ local cache says sold out ─────────────────────────► FastRejected
//!   │
//!   ├─ counter.decrement(id) < 0
//!   │     increment (restore ≥ 0), mark local cache,
//!   │     create flag "true" if missing, re-arm watch ──────► Exhausted
//!   │
//!   └─ counter.decrement(id) ≥ 0
//!         committer.commit(id)
//!           ├─ Ok ────────────────────────────────────────► Committed
//!           └─ Err: clear local cache, flag := "false",
//!                   counter.increment(id) ────────────────► RolledBack
//! ```
//!
//! Only `Committed` is a success. The three stores are updated in a fixed
//! order with no transaction spanning them: a crash between steps can leave
//! them disagreeing, and nothing here repairs that.

use crate::metrics::SpikeMetrics;
use flash_sale_core::{
    CommitError, CoordinationService, CreateOutcome, LocalAdmissionCache, ProductId,
    SaleCommitter, SpikeError, SpikeOutcome, SpikeState, StockCounter,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Drives purchase attempts across the local cache, the shared counter, the
/// coordination service and the sale committer.
///
/// The orchestrator holds no per-request state; one instance per process is
/// shared by every request task.
///
/// # Example
///
/// ```ignore
/// let orchestrator = SpikeOrchestrator::new(
///     Arc::new(LocalAdmissionCache::new()),
///     Arc::new(RedisStockCounter::new(&redis_url, keys.clone()).await?),
///     Arc::new(RedisCoordination::connect(&redis_url, keys).await?),
///     Arc::new(PostgresSaleCommitter::new(pool)),
/// );
///
/// match orchestrator.attempt_spike(ProductId::new(1)).await {
///     SpikeOutcome::Success => println!("bought one"),
///     SpikeOutcome::Fail => println!("no luck"),
/// }
/// ```
#[derive(Clone)]
pub struct SpikeOrchestrator {
    cache: Arc<LocalAdmissionCache>,
    counter: Arc<dyn StockCounter>,
    coordination: Arc<dyn CoordinationService>,
    committer: Arc<dyn SaleCommitter>,
}

impl SpikeOrchestrator {
    /// Create an orchestrator over its collaborators.
    ///
    /// `cache` is this process's fast-reject cache. Pass the same `Arc` to the
    /// [`FlagWatcher`](crate::FlagWatcher) and
    /// [`CacheRevalidator`](crate::CacheRevalidator) so they maintain the
    /// entries this orchestrator reads.
    #[must_use]
    pub fn new(
        cache: Arc<LocalAdmissionCache>,
        counter: Arc<dyn StockCounter>,
        coordination: Arc<dyn CoordinationService>,
        committer: Arc<dyn SaleCommitter>,
    ) -> Self {
        Self {
            cache,
            counter,
            coordination,
            committer,
        }
    }

    /// This process's fast-reject cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<LocalAdmissionCache> {
        &self.cache
    }

    /// The shared stock counter.
    #[must_use]
    pub fn counter(&self) -> &Arc<dyn StockCounter> {
        &self.counter
    }

    /// The coordination service session of this process.
    #[must_use]
    pub fn coordination(&self) -> &Arc<dyn CoordinationService> {
        &self.coordination
    }

    /// Attempt to buy one unit of `product_id`.
    ///
    /// Never errors: store failures are logged and reported as
    /// [`SpikeOutcome::Fail`], like every other unsuccessful attempt.
    pub async fn attempt_spike(&self, product_id: ProductId) -> SpikeOutcome {
        let started = Instant::now();
        match self.try_attempt_spike(product_id).await {
            Ok(state) => {
                SpikeMetrics::record_attempt(state, started.elapsed());
                state.outcome()
            }
            Err(e) => {
                error!(
                    product_id = %product_id,
                    error = %e,
                    "Spike attempt aborted by store failure"
                );
                SpikeMetrics::record_error();
                SpikeOutcome::Fail
            }
        }
    }

    /// Attempt to buy one unit of `product_id`, reporting the terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`SpikeError`] if the counter or the coordination service
    /// fails outside the rollback path. In particular a coordination failure
    /// on the exhaustion path surfaces here after the counter has already
    /// been corrected and the local cache marked; the cluster-wide flag is
    /// then not written.
    #[tracing::instrument(skip_all, name = "attempt_spike", fields(product_id = %product_id))]
    pub async fn try_attempt_spike(&self, product_id: ProductId) -> Result<SpikeState, SpikeError> {
        debug!(state = %SpikeState::Start, "Attempt started");
        if self.cache.is_known_sold_out(product_id) {
            debug!(state = %SpikeState::FastRejected, "Rejected by local cache");
            return Ok(SpikeState::FastRejected);
        }

        debug!(state = %SpikeState::Counting, "Claiming a unit");
        let remaining = self.counter.decrement(product_id).await?;
        if remaining < 0 {
            return self.on_exhausted(product_id).await;
        }

        debug!(remaining, state = %SpikeState::Committing, "Unit claimed");
        Ok(self.commit(product_id).await)
    }

    /// Counter went negative: restore it, remember locally, tell the cluster.
    async fn on_exhausted(&self, product_id: ProductId) -> Result<SpikeState, SpikeError> {
        let corrected = self.counter.increment(product_id).await?;
        let newly_marked = self.cache.mark_sold_out(product_id);
        if newly_marked {
            SpikeMetrics::record_cache_size(self.cache.len());
        }

        if self.coordination.exists(product_id, true).await? {
            // A retracted flag must not outlive a later sell-out, or
            // revalidation would clear this mark.
            if self.coordination.get_value(product_id).await? == Some(false) {
                self.coordination.set_value(product_id, true).await?;
                info!(product_id = %product_id, "Retracted sold-out flag raised again");
            }
        } else {
            match self.coordination.create(product_id, true).await? {
                CreateOutcome::Created => {
                    info!(product_id = %product_id, "Sold-out flag created");
                }
                CreateOutcome::AlreadyExists => {
                    debug!(product_id = %product_id, "Sold-out flag created concurrently by a peer");
                }
            }
        }
        // Re-arm: the create above may have consumed the watch.
        self.coordination.exists(product_id, true).await?;

        debug!(
            corrected,
            newly_marked,
            state = %SpikeState::Exhausted,
            "Stock exhausted"
        );
        Ok(SpikeState::Exhausted)
    }

    async fn commit(&self, product_id: ProductId) -> SpikeState {
        let started = Instant::now();
        let result = self.committer.commit(product_id).await;
        SpikeMetrics::record_commit(result.is_ok(), started.elapsed());

        match result {
            Ok(()) => {
                debug!(state = %SpikeState::Committed, "Sale committed");
                SpikeState::Committed
            }
            Err(e) => {
                self.roll_back(product_id, &e).await;
                SpikeState::RolledBack
            }
        }
    }

    /// Undo a claim whose commit failed.
    ///
    /// Steps run in a fixed order (local cache, flag, counter). A failing step
    /// is logged and counted and the remaining steps still run.
    async fn roll_back(&self, product_id: ProductId, cause: &CommitError) {
        warn!(
            product_id = %product_id,
            error = %cause,
            "Commit failed, rolling back claim"
        );
        SpikeMetrics::record_rollback();

        // A concurrent request on this process may have flagged exhaustion
        // while this commit was in flight.
        if self.cache.is_known_sold_out(product_id) && self.cache.clear_sold_out(product_id) {
            debug!(product_id = %product_id, "Local sold-out mark cleared");
            SpikeMetrics::record_cache_size(self.cache.len());
        }

        match self.coordination.exists(product_id, true).await {
            Ok(true) => {
                if let Err(e) = self.coordination.set_value(product_id, false).await {
                    error!(
                        product_id = %product_id,
                        error = %e,
                        "Failed to retract sold-out flag during rollback"
                    );
                    SpikeMetrics::record_rollback_step_failure("flag");
                }
            }
            Ok(false) => {}
            Err(e) => {
                error!(
                    product_id = %product_id,
                    error = %e,
                    "Failed to check sold-out flag during rollback"
                );
                SpikeMetrics::record_rollback_step_failure("flag");
            }
        }

        match self.counter.increment(product_id).await {
            Ok(restored) => {
                debug!(product_id = %product_id, restored, "Claimed unit returned to counter");
            }
            Err(e) => {
                error!(
                    product_id = %product_id,
                    error = %e,
                    "Failed to return claimed unit to counter"
                );
                SpikeMetrics::record_rollback_step_failure("counter");
            }
        }
    }
}
