//! Periodic reconciliation of the local cache with the cluster flags.
//!
//! Watch notifications are best effort. A process that missed a retraction
//! keeps fast-rejecting a product that has stock again; the revalidator
//! bounds that window by re-reading the flag of every locally marked product.

use crate::metrics::{CoordinationMetrics, SpikeMetrics};
use flash_sale_core::{CoordinationService, LocalAdmissionCache};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Shortest accepted period; `tokio::time::interval` rejects zero.
pub const MIN_REVALIDATE_INTERVAL: Duration = Duration::from_millis(100);

/// Clears local sold-out marks whose cluster flag reads `false`.
///
/// Marks whose flag is missing or `true` are kept: a process trusts its own
/// observation of exhaustion until the cluster retracts it.
pub struct CacheRevalidator {
    cache: Arc<LocalAdmissionCache>,
    coordination: Arc<dyn CoordinationService>,
    interval: Duration,
}

impl CacheRevalidator {
    /// Create a revalidator running every `interval`, clamped to at least
    /// [`MIN_REVALIDATE_INTERVAL`].
    #[must_use]
    pub fn new(
        cache: Arc<LocalAdmissionCache>,
        coordination: Arc<dyn CoordinationService>,
        interval: Duration,
    ) -> Self {
        Self {
            cache,
            coordination,
            interval: interval.max(MIN_REVALIDATE_INTERVAL),
        }
    }

    /// Effective period between passes.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Check every marked product once. Returns how many marks were cleared.
    pub async fn revalidate_once(&self) -> usize {
        let mut cleared = 0;
        for product_id in self.cache.sold_out_products() {
            match self.coordination.get_value(product_id).await {
                Ok(Some(false)) => {
                    let marked_for = self.cache.marked_for(product_id);
                    if self.cache.clear_sold_out(product_id) {
                        info!(
                            product_id = %product_id,
                            marked_secs = marked_for.map_or(0, |age| age.as_secs()),
                            "Stale local sold-out mark cleared"
                        );
                        CoordinationMetrics::record_cache_cleared("revalidation");
                        cleared += 1;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(product_id = %product_id, error = %e, "Failed to revalidate sold-out mark");
                }
            }
        }
        if cleared > 0 {
            SpikeMetrics::record_cache_size(self.cache.len());
        }
        cleared
    }

    /// Revalidate on every tick until `shutdown` resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing is cached at startup.
        ticker.tick().await;
        tokio::pin!(shutdown);
        info!(interval_ms = self.interval.as_millis(), "Cache revalidator started");

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Cache revalidator stopping");
                    return;
                }
                _ = ticker.tick() => {
                    let cleared = self.revalidate_once().await;
                    debug!(cleared, remaining = self.cache.len(), "Revalidation pass finished");
                }
            }
        }
    }

    /// Run on a background task.
    #[must_use]
    pub fn spawn(self, shutdown: impl Future<Output = ()> + Send + 'static) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use flash_sale_core::ProductId;
    use flash_sale_testing::InMemoryCoordinationCluster;

    #[tokio::test]
    async fn clears_only_retracted_marks() {
        let cluster = InMemoryCoordinationCluster::new();
        let session = cluster.session();
        let cache = Arc::new(LocalAdmissionCache::new());
        let retracted = ProductId::new(1);
        let sold_out = ProductId::new(2);
        let unflagged = ProductId::new(3);

        for id in [retracted, sold_out, unflagged] {
            cache.mark_sold_out(id);
        }
        session.create(retracted, false).await.unwrap();
        session.create(sold_out, true).await.unwrap();

        let revalidator = CacheRevalidator::new(
            Arc::clone(&cache),
            Arc::new(session),
            Duration::from_secs(30),
        );

        assert_eq!(revalidator.revalidate_once().await, 1);
        assert!(!cache.is_known_sold_out(retracted));
        assert!(cache.is_known_sold_out(sold_out));
        assert!(cache.is_known_sold_out(unflagged));
    }

    #[tokio::test]
    async fn unavailable_service_keeps_marks() {
        let cluster = InMemoryCoordinationCluster::new();
        let session = cluster.session();
        let cache = Arc::new(LocalAdmissionCache::new());
        cache.mark_sold_out(ProductId::new(1));
        session.create(ProductId::new(1), false).await.unwrap();
        cluster.set_unavailable(true);

        let revalidator =
            CacheRevalidator::new(Arc::clone(&cache), Arc::new(session), Duration::from_secs(1));

        assert_eq!(revalidator.revalidate_once().await, 0);
        assert!(cache.is_known_sold_out(ProductId::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn run_revalidates_on_each_tick() {
        let cluster = InMemoryCoordinationCluster::new();
        let session = cluster.session();
        let cache = Arc::new(LocalAdmissionCache::new());
        let id = ProductId::new(1);
        cache.mark_sold_out(id);

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = CacheRevalidator::new(
            Arc::clone(&cache),
            Arc::new(session.clone()),
            Duration::from_secs(10),
        )
        .spawn(async move {
            let _ = rx.await;
        });

        session.create(id, false).await.unwrap();
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(!cache.is_known_sold_out(id));

        tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_clamped() {
        let cluster = InMemoryCoordinationCluster::new();
        let session = cluster.session();
        let cache = Arc::new(LocalAdmissionCache::new());
        let id = ProductId::new(1);
        cache.mark_sold_out(id);
        session.create(id, false).await.unwrap();

        let revalidator =
            CacheRevalidator::new(Arc::clone(&cache), Arc::new(session), Duration::ZERO);
        assert_eq!(revalidator.interval(), MIN_REVALIDATE_INTERVAL);

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = revalidator.spawn(async move {
            let _ = rx.await;
        });
        tokio::time::sleep(MIN_REVALIDATE_INTERVAL * 2).await;
        assert!(!cache.is_known_sold_out(id));

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
