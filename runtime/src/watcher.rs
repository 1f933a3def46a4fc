//! Background handler for sold-out flag notifications.
//!
//! Watches are one-shot, so the watcher re-arms every node it hears about.
//! What it does with a notification depends on the [`WatchPolicy`].

use crate::metrics::CoordinationMetrics;
use flash_sale_core::{CoordinationService, FlagEvent, LocalAdmissionCache, ProductId};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How a process reacts to flag notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchPolicy {
    /// Log and re-arm only. Local marks are cleared by rollback alone.
    Observe,
    /// Additionally clear the local mark when the flag is set to `false`.
    ///
    /// A `true` flag never marks the local cache: a process only marks
    /// products it has seen exhausted itself.
    #[default]
    ClearOnRetraction,
}

impl WatchPolicy {
    /// Configuration spelling of the policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Observe => "observe",
            Self::ClearOnRetraction => "clear-on-retraction",
        }
    }
}

impl fmt::Display for WatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "observe" => Ok(Self::Observe),
            "clear-on-retraction" | "clear_on_retraction" => Ok(Self::ClearOnRetraction),
            other => Err(format!(
                "unknown watch policy '{other}' (expected 'observe' or 'clear-on-retraction')"
            )),
        }
    }
}

/// Consumes this process's flag notifications.
///
/// Subscribes on construction, so notifications delivered between
/// [`FlagWatcher::new`] and the first poll of [`FlagWatcher::run`] are kept.
pub struct FlagWatcher {
    cache: Arc<LocalAdmissionCache>,
    coordination: Arc<dyn CoordinationService>,
    events: broadcast::Receiver<FlagEvent>,
    policy: WatchPolicy,
}

impl FlagWatcher {
    /// Create a watcher over the same cache and session the orchestrator uses.
    #[must_use]
    pub fn new(
        cache: Arc<LocalAdmissionCache>,
        coordination: Arc<dyn CoordinationService>,
        policy: WatchPolicy,
    ) -> Self {
        let events = coordination.subscribe();
        Self {
            cache,
            coordination,
            events,
            policy,
        }
    }

    /// The policy in effect.
    #[must_use]
    pub const fn policy(&self) -> WatchPolicy {
        self.policy
    }

    /// Arm watches on `products` ahead of any exhaustion.
    ///
    /// Returns how many watches were armed; failures are logged and skipped.
    pub async fn arm(&self, products: impl IntoIterator<Item = ProductId>) -> usize {
        let mut armed = 0;
        for product_id in products {
            match self.coordination.exists(product_id, true).await {
                Ok(_) => armed += 1,
                Err(e) => {
                    warn!(product_id = %product_id, error = %e, "Failed to arm flag watch");
                }
            }
        }
        armed
    }

    /// Apply one notification and re-arm the watch on its node.
    pub async fn handle_event(&self, event: FlagEvent) {
        let product_id = event.product_id;
        CoordinationMetrics::record_event(event.value);
        debug!(
            product_id = %product_id,
            kind = ?event.kind,
            value = event.value,
            "Sold-out flag notification"
        );

        if event.is_retraction()
            && self.policy == WatchPolicy::ClearOnRetraction
            && self.cache.clear_sold_out(product_id)
        {
            info!(product_id = %product_id, "Sold-out flag retracted, local mark cleared");
            CoordinationMetrics::record_cache_cleared("retraction");
        }

        if let Err(e) = self.coordination.exists(product_id, true).await {
            warn!(product_id = %product_id, error = %e, "Failed to re-arm flag watch");
        }
    }

    /// Process notifications until `shutdown` resolves or the session closes.
    pub async fn run(mut self, shutdown: impl Future<Output = ()> + Send) {
        tokio::pin!(shutdown);
        info!(policy = %self.policy, "Flag watcher started");

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Flag watcher stopping");
                    return;
                }
                received = self.events.recv() => match received {
                    Ok(event) => self.handle_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Flag watcher lagged, re-arming known sold-out products");
                        CoordinationMetrics::record_lagged(skipped);
                        // Dropped events disarmed their watches without a re-arm.
                        self.arm(self.cache.sold_out_products()).await;
                    }
                    Err(RecvError::Closed) => {
                        warn!("Flag notification channel closed, watcher exiting");
                        return;
                    }
                },
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
    use flash_sale_testing::InMemoryCoordinationCluster;

    const ID: ProductId = ProductId::new(7);

    fn watcher(
        cluster: &InMemoryCoordinationCluster,
        policy: WatchPolicy,
    ) -> (FlagWatcher, Arc<LocalAdmissionCache>, flash_sale_testing::InMemoryCoordination) {
        let cache = Arc::new(LocalAdmissionCache::new());
        let session = cluster.session();
        let watcher = FlagWatcher::new(Arc::clone(&cache), Arc::new(session.clone()), policy);
        (watcher, cache, session)
    }

    #[test]
    fn policy_parses_config_spellings() {
        assert_eq!("observe".parse::<WatchPolicy>().unwrap(), WatchPolicy::Observe);
        assert_eq!(
            " Clear-On-Retraction ".parse::<WatchPolicy>().unwrap(),
            WatchPolicy::ClearOnRetraction
        );
        assert!("evict".parse::<WatchPolicy>().is_err());
        assert_eq!(WatchPolicy::default(), WatchPolicy::ClearOnRetraction);
    }

    #[tokio::test]
    async fn retraction_clears_local_mark() {
        let cluster = InMemoryCoordinationCluster::new();
        let (watcher, cache, session) = watcher(&cluster, WatchPolicy::ClearOnRetraction);
        cache.mark_sold_out(ID);

        watcher
            .handle_event(FlagEvent {
                product_id: ID,
                kind: flash_sale_core::FlagEventKind::ValueChanged,
                value: false,
            })
            .await;

        assert!(!cache.is_known_sold_out(ID));
        assert!(session.is_watching(ID));
    }

    #[tokio::test]
    async fn observe_policy_keeps_local_mark() {
        let cluster = InMemoryCoordinationCluster::new();
        let (watcher, cache, session) = watcher(&cluster, WatchPolicy::Observe);
        cache.mark_sold_out(ID);

        watcher
            .handle_event(FlagEvent {
                product_id: ID,
                kind: flash_sale_core::FlagEventKind::ValueChanged,
                value: false,
            })
            .await;

        assert!(cache.is_known_sold_out(ID));
        assert!(session.is_watching(ID));
    }

    #[tokio::test]
    async fn sold_out_notification_never_marks_cache() {
        let cluster = InMemoryCoordinationCluster::new();
        let (watcher, cache, _session) = watcher(&cluster, WatchPolicy::ClearOnRetraction);

        watcher
            .handle_event(FlagEvent {
                product_id: ID,
                kind: flash_sale_core::FlagEventKind::Created,
                value: true,
            })
            .await;

        assert!(!cache.is_known_sold_out(ID));
    }

    #[tokio::test]
    async fn arm_skips_failures() {
        let cluster = InMemoryCoordinationCluster::new();
        let (watcher, _cache, session) = watcher(&cluster, WatchPolicy::Observe);

        assert_eq!(watcher.arm([ProductId::new(1), ProductId::new(2)]).await, 2);
        assert!(session.is_watching(ProductId::new(2)));

        cluster.set_unavailable(true);
        assert_eq!(watcher.arm([ProductId::new(3)]).await, 0);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let cluster = InMemoryCoordinationCluster::new();
        let (watcher, _cache, _session) = watcher(&cluster, WatchPolicy::Observe);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let handle = watcher.spawn(async move {
            let _ = rx.await;
        });
        tx.send(()).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
