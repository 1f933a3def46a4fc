//! In-memory coordination service with per-session one-shot watches.

use flash_sale_core::{
    BoxFuture, CoordinationError, CoordinationService, CreateOutcome, FlagEvent, FlagEventKind,
    KeySpace, ProductId,
};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::broadcast;

/// Capacity of each session's notification channel.
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Default)]
struct ClusterInner {
    nodes: Mutex<HashMap<ProductId, bool>>,
    sessions: Mutex<Vec<Weak<SessionInner>>>,
    operations: AtomicUsize,
    unavailable: AtomicBool,
}

#[derive(Debug)]
struct SessionInner {
    armed: DashMap<ProductId, ()>,
    events: broadcast::Sender<FlagEvent>,
}

/// Shared flag namespace, the in-memory stand-in for the coordination service.
///
/// Each simulated process gets its own [`InMemoryCoordination`] session via
/// [`Self::session`]. Nodes are shared by all sessions; watches are not.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCoordinationCluster {
    inner: Arc<ClusterInner>,
}

impl InMemoryCoordinationCluster {
    /// Create an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session (one per simulated process).
    #[must_use]
    pub fn session(&self) -> InMemoryCoordination {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let session = Arc::new(SessionInner {
            armed: DashMap::new(),
            events,
        });
        if let Ok(mut sessions) = self.inner.sessions.lock() {
            sessions.retain(|s| s.strong_count() > 0);
            sessions.push(Arc::downgrade(&session));
        }
        InMemoryCoordination {
            cluster: Arc::clone(&self.inner),
            session,
        }
    }

    /// Flag value as stored, without counting it as an operation.
    #[must_use]
    pub fn flag(&self, product_id: ProductId) -> Option<bool> {
        self.inner
            .nodes
            .lock()
            .ok()
            .and_then(|nodes| nodes.get(&product_id).copied())
    }

    /// Flag node path under the default key space, as a real service would store it.
    #[must_use]
    pub fn path_of(product_id: ProductId) -> String {
        KeySpace::default().flag_path(product_id)
    }

    /// Number of calls served across all sessions.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.inner.operations.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail with [`CoordinationError::Connection`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl ClusterInner {
    fn check_available(&self) -> Result<(), CoordinationError> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CoordinationError::Connection(
                "coordination service unavailable".into(),
            ));
        }
        Ok(())
    }

    fn nodes(&self) -> Result<std::sync::MutexGuard<'_, HashMap<ProductId, bool>>, CoordinationError> {
        self.nodes
            .lock()
            .map_err(|_| CoordinationError::Other("Mutex lock failed".into()))
    }

    /// Fire one-shot watches armed on the node.
    fn notify(&self, event: FlagEvent) {
        let sessions: Vec<Arc<SessionInner>> = match self.sessions.lock() {
            Ok(sessions) => sessions.iter().filter_map(Weak::upgrade).collect(),
            Err(_) => return,
        };
        for session in sessions {
            if session.armed.remove(&event.product_id).is_some() {
                // No receiver is fine: nobody is listening on that session.
                let _ = session.events.send(event);
            }
        }
    }
}

/// One process's session on an [`InMemoryCoordinationCluster`].
#[derive(Debug, Clone)]
pub struct InMemoryCoordination {
    cluster: Arc<ClusterInner>,
    session: Arc<SessionInner>,
}

impl InMemoryCoordination {
    /// Whether this session currently has a watch armed on the node.
    #[must_use]
    pub fn is_watching(&self, product_id: ProductId) -> bool {
        self.session.armed.contains_key(&product_id)
    }
}

impl CoordinationService for InMemoryCoordination {
    fn exists(
        &self,
        product_id: ProductId,
        watch: bool,
    ) -> BoxFuture<'_, Result<bool, CoordinationError>> {
        Box::pin(async move {
            self.cluster.check_available()?;
            let exists = self.cluster.nodes()?.contains_key(&product_id);
            if watch {
                self.session.armed.insert(product_id, ());
            }
            Ok(exists)
        })
    }

    fn create(
        &self,
        product_id: ProductId,
        value: bool,
    ) -> BoxFuture<'_, Result<CreateOutcome, CoordinationError>> {
        Box::pin(async move {
            self.cluster.check_available()?;
            let outcome = {
                let mut nodes = self.cluster.nodes()?;
                if nodes.contains_key(&product_id) {
                    CreateOutcome::AlreadyExists
                } else {
                    nodes.insert(product_id, value);
                    CreateOutcome::Created
                }
            };
            if outcome == CreateOutcome::Created {
                self.cluster.notify(FlagEvent {
                    product_id,
                    kind: FlagEventKind::Created,
                    value,
                });
            }
            Ok(outcome)
        })
    }

    fn set_value(
        &self,
        product_id: ProductId,
        value: bool,
    ) -> BoxFuture<'_, Result<(), CoordinationError>> {
        Box::pin(async move {
            self.cluster.check_available()?;
            {
                let mut nodes = self.cluster.nodes()?;
                let Some(current) = nodes.get_mut(&product_id) else {
                    return Err(CoordinationError::NoNode {
                        path: InMemoryCoordinationCluster::path_of(product_id),
                    });
                };
                *current = value;
            }
            self.cluster.notify(FlagEvent {
                product_id,
                kind: FlagEventKind::ValueChanged,
                value,
            });
            Ok(())
        })
    }

    fn get_value(
        &self,
        product_id: ProductId,
    ) -> BoxFuture<'_, Result<Option<bool>, CoordinationError>> {
        Box::pin(async move {
            self.cluster.check_available()?;
            Ok(self.cluster.nodes()?.get(&product_id).copied())
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<FlagEvent> {
        self.session.events.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_is_idempotent() {
        let cluster = InMemoryCoordinationCluster::new();
        let a = cluster.session();
        let b = cluster.session();
        let id = ProductId::new(1);

        assert_eq!(a.create(id, true).await.unwrap(), CreateOutcome::Created);
        assert_eq!(
            b.create(id, false).await.unwrap(),
            CreateOutcome::AlreadyExists
        );
        assert_eq!(cluster.flag(id), Some(true));
    }

    #[tokio::test]
    async fn set_value_on_missing_node_fails() {
        let cluster = InMemoryCoordinationCluster::new();
        let session = cluster.session();

        let err = session.set_value(ProductId::new(4), false).await.unwrap_err();
        assert_eq!(
            err,
            CoordinationError::NoNode {
                path: "/product_stock/4".into()
            }
        );
    }

    #[tokio::test]
    async fn watches_fire_once_per_arming() {
        let cluster = InMemoryCoordinationCluster::new();
        let watcher = cluster.session();
        let writer = cluster.session();
        let id = ProductId::new(1);
        let mut events = watcher.subscribe();

        assert!(!watcher.exists(id, true).await.unwrap());
        writer.create(id, true).await.unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(event.kind, FlagEventKind::Created);
        assert!(event.value);
        assert!(!watcher.is_watching(id));

        // Not re-armed: the next change is not delivered.
        writer.set_value(id, false).await.unwrap();
        assert!(events.try_recv().is_err());

        // Re-armed: delivered again.
        assert!(watcher.exists(id, true).await.unwrap());
        writer.set_value(id, true).await.unwrap();
        let event = events.try_recv().unwrap();
        assert_eq!(event.kind, FlagEventKind::ValueChanged);
        assert!(event.value);
    }

    #[tokio::test]
    async fn unwatched_sessions_hear_nothing() {
        let cluster = InMemoryCoordinationCluster::new();
        let quiet = cluster.session();
        let writer = cluster.session();
        let mut events = quiet.subscribe();

        quiet.exists(ProductId::new(1), false).await.unwrap();
        writer.create(ProductId::new(1), true).await.unwrap();

        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn unavailable_cluster_fails_calls() {
        let cluster = InMemoryCoordinationCluster::new();
        let session = cluster.session();
        cluster.set_unavailable(true);

        assert!(matches!(
            session.exists(ProductId::new(1), true).await,
            Err(CoordinationError::Connection(_))
        ));
        assert!(!session.is_watching(ProductId::new(1)));
    }
}
