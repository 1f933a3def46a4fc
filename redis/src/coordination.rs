//! `Redis`-backed coordination service.
//!
//! # Storage
//!
//! ```text
//! flag node   : string key named by the flag path   /product_stock/17 = "true"
//! notifications: pub/sub channel {prefix}:flag-events, JSON FlagEvent payloads
//! ```
//!
//! Creating a node and overwriting its value each run as one Lua script that
//! writes the key and publishes the event, so a notification is never sent
//! for a write that did not happen.
//!
//! # Watches
//!
//! Every session sees every published event. One-shot, per-session watch
//! semantics are applied locally: `exists(id, true)` arms `id` in this
//! session's table, and the subscriber task forwards an event only if it can
//! disarm the product it names. A watch newly armed by an `exists` call that
//! fails is disarmed again, so a failed call leaves no watch behind.

use crate::error::coordination_error;
use dashmap::DashMap;
use flash_sale_core::{
    decode_flag, encode_flag, BoxFuture, CoordinationError, CoordinationService, CreateOutcome,
    FlagEvent, FlagEventKind, KeySpace, ProductId,
};
use futures::StreamExt;
use std::future::Future;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Capacity of the session's notification channel.
const EVENT_BUFFER: usize = 1024;

/// Delay before re-subscribing after the pub/sub connection drops.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// `SET` if absent, then publish. Returns 1 if the node was created.
const CREATE_SCRIPT: &str = r"
    if redis.call('SET', KEYS[1], ARGV[1], 'NX') then
        redis.call('PUBLISH', ARGV[2], ARGV[3])
        return 1
    end
    return 0
";

/// `SET` if present, then publish. Returns 0 if the node is missing.
const SET_VALUE_SCRIPT: &str = r"
    if redis.call('SET', KEYS[1], ARGV[1], 'XX') then
        redis.call('PUBLISH', ARGV[2], ARGV[3])
        return 1
    end
    return 0
";

/// Aborts the subscriber task once the last session clone is dropped.
struct SubscriberTask(JoinHandle<()>);

impl Drop for SubscriberTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// One process's session on the `Redis` flag namespace.
///
/// Clones share the session: the same armed watches and the same
/// notification channel.
#[derive(Clone)]
pub struct RedisCoordination {
    conn_manager: ConnectionManager,
    keys: KeySpace,
    channel: String,
    armed: Arc<DashMap<ProductId, ()>>,
    events: broadcast::Sender<FlagEvent>,
    _subscriber: Arc<SubscriberTask>,
}

impl RedisCoordination {
    /// Connect, subscribe to the notification channel and start the
    /// subscriber task.
    ///
    /// The subscription is established before this returns, so watches armed
    /// afterwards cannot miss a notification published afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::Connection`] if `Redis` cannot be reached.
    pub async fn connect(redis_url: &str, keys: KeySpace) -> Result<Self, CoordinationError> {
        let client = Client::open(redis_url).map_err(|e| {
            CoordinationError::Connection(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client.clone()).await.map_err(|e| {
            CoordinationError::Connection(format!(
                "Failed to create Redis connection manager: {e}"
            ))
        })?;

        let channel = Self::channel_name(&keys);
        let mut pubsub = client.get_async_pubsub().await.map_err(|e| {
            CoordinationError::Connection(format!("Failed to open Redis pub/sub connection: {e}"))
        })?;
        pubsub.subscribe(&channel).await.map_err(|e| {
            CoordinationError::Connection(format!("Failed to subscribe to {channel}: {e}"))
        })?;

        let armed = Arc::new(DashMap::new());
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let handle = tokio::spawn(run_subscriber(
            client,
            pubsub,
            channel.clone(),
            Arc::clone(&armed),
            events.clone(),
        ));

        tracing::info!(channel = %channel, flag_root = %keys.flag_root(), "Coordination session started");

        Ok(Self {
            conn_manager,
            keys,
            channel,
            armed,
            events,
            _subscriber: Arc::new(SubscriberTask(handle)),
        })
    }

    /// Pub/sub channel carrying flag notifications for a key space.
    #[must_use]
    pub fn channel_name(keys: &KeySpace) -> String {
        format!("{}:flag-events", keys.prefix())
    }

    /// Whether this session currently has a watch armed on the node.
    #[must_use]
    pub fn is_watching(&self, product_id: ProductId) -> bool {
        self.armed.contains_key(&product_id)
    }

    fn payload(event: &FlagEvent) -> Result<String, CoordinationError> {
        serde_json::to_string(event)
            .map_err(|e| CoordinationError::Protocol(format!("Failed to encode flag event: {e}")))
    }

    /// Run one of the write-and-publish scripts; `true` if it wrote.
    async fn write_and_publish(
        &self,
        script: &str,
        product_id: ProductId,
        kind: FlagEventKind,
        value: bool,
    ) -> Result<bool, CoordinationError> {
        let mut conn = self.conn_manager.clone();
        let payload = Self::payload(&FlagEvent {
            product_id,
            kind,
            value,
        })?;

        let written: i64 = Script::new(script)
            .key(self.keys.flag_path(product_id))
            .arg(encode_flag(value))
            .arg(&self.channel)
            .arg(payload)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| coordination_error(&e))?;

        Ok(written == 1)
    }
}

impl CoordinationService for RedisCoordination {
    fn exists(
        &self,
        product_id: ProductId,
        watch: bool,
    ) -> BoxFuture<'_, Result<bool, CoordinationError>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let path = self.keys.flag_path(product_id);
            armed_during(&self.armed, product_id, watch, async move {
                let exists: redis::RedisResult<bool> = conn.exists(path).await;
                exists.map_err(|e| coordination_error(&e))
            })
            .await
        })
    }

    fn create(
        &self,
        product_id: ProductId,
        value: bool,
    ) -> BoxFuture<'_, Result<CreateOutcome, CoordinationError>> {
        Box::pin(async move {
            let created = self
                .write_and_publish(CREATE_SCRIPT, product_id, FlagEventKind::Created, value)
                .await?;
            Ok(if created {
                CreateOutcome::Created
            } else {
                CreateOutcome::AlreadyExists
            })
        })
    }

    fn set_value(
        &self,
        product_id: ProductId,
        value: bool,
    ) -> BoxFuture<'_, Result<(), CoordinationError>> {
        Box::pin(async move {
            let written = self
                .write_and_publish(
                    SET_VALUE_SCRIPT,
                    product_id,
                    FlagEventKind::ValueChanged,
                    value,
                )
                .await?;
            if written {
                Ok(())
            } else {
                Err(CoordinationError::NoNode {
                    path: self.keys.flag_path(product_id),
                })
            }
        })
    }

    fn get_value(
        &self,
        product_id: ProductId,
    ) -> BoxFuture<'_, Result<Option<bool>, CoordinationError>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let path = self.keys.flag_path(product_id);
            let raw: Option<Vec<u8>> = conn.get(&path).await.map_err(|e| coordination_error(&e))?;
            match raw {
                None => Ok(None),
                Some(raw) => decode_flag(&raw).map(Some).ok_or_else(|| {
                    CoordinationError::Protocol(format!(
                        "Flag node {path} holds '{}'",
                        String::from_utf8_lossy(&raw)
                    ))
                }),
            }
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<FlagEvent> {
        self.events.subscribe()
    }
}

/// Decode a published payload.
fn decode_event(payload: &str) -> Option<FlagEvent> {
    match serde_json::from_str(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(error = %e, payload, "Ignoring malformed flag event");
            None
        }
    }
}

/// Run `read` with a watch armed on `product_id` when `watch` is set.
///
/// The watch is armed before the read: an event published between the read
/// and the arming would otherwise be lost. If the read fails, a watch this
/// call armed is removed again; one that was already armed stays.
async fn armed_during<T>(
    armed: &DashMap<ProductId, ()>,
    product_id: ProductId,
    watch: bool,
    read: impl Future<Output = Result<T, CoordinationError>>,
) -> Result<T, CoordinationError> {
    let newly_armed = watch && armed.insert(product_id, ()).is_none();
    let result = read.await;
    if result.is_err() && newly_armed {
        armed.remove(&product_id);
    }
    result
}

/// Forward an event if this session had a watch armed on its node.
fn deliver(armed: &DashMap<ProductId, ()>, events: &broadcast::Sender<FlagEvent>, event: FlagEvent) {
    if armed.remove(&event.product_id).is_some() {
        // No receiver is fine: nobody is listening on this session.
        let _ = events.send(event);
    }
}

async fn run_subscriber(
    client: Client,
    mut pubsub: redis::aio::PubSub,
    channel: String,
    armed: Arc<DashMap<ProductId, ()>>,
    events: broadcast::Sender<FlagEvent>,
) {
    loop {
        {
            let mut messages = pubsub.on_message();
            while let Some(msg) = messages.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring non-text flag event");
                        continue;
                    }
                };
                if let Some(event) = decode_event(&payload) {
                    deliver(&armed, &events, event);
                }
            }
        }

        tracing::error!(channel = %channel, "Flag event subscription lost, resubscribing");
        pubsub = loop {
            tokio::time::sleep(RESUBSCRIBE_DELAY).await;
            match resubscribe(&client, &channel).await {
                Ok(pubsub) => break pubsub,
                Err(e) => {
                    tracing::warn!(error = %e, channel = %channel, "Resubscribe failed");
                }
            }
        };
        tracing::info!(channel = %channel, "Flag event subscription restored");
    }
}

async fn resubscribe(client: &Client, channel: &str) -> redis::RedisResult<redis::aio::PubSub> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;
    Ok(pubsub)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn channel_follows_prefix() {
        assert_eq!(
            RedisCoordination::channel_name(&KeySpace::default()),
            "product_stock:flag-events"
        );
    }

    #[test]
    fn event_payload_is_json() {
        let event = FlagEvent {
            product_id: ProductId::new(9),
            kind: FlagEventKind::ValueChanged,
            value: false,
        };
        let payload = RedisCoordination::payload(&event).unwrap();
        assert_eq!(
            payload,
            r#"{"product_id":9,"kind":"value_changed","value":false}"#
        );
        assert_eq!(decode_event(&payload), Some(event));
        assert_eq!(decode_event("not json"), None);
    }

    #[test]
    fn delivery_is_one_shot_per_arming() {
        let armed = DashMap::new();
        let (events, mut rx) = broadcast::channel(4);
        let event = FlagEvent {
            product_id: ProductId::new(1),
            kind: FlagEventKind::Created,
            value: true,
        };

        deliver(&armed, &events, event);
        assert!(rx.try_recv().is_err(), "unarmed sessions hear nothing");

        armed.insert(ProductId::new(1), ());
        deliver(&armed, &events, event);
        deliver(&armed, &events, event);
        assert_eq!(rx.try_recv().unwrap(), event);
        assert!(rx.try_recv().is_err(), "second event needs a re-arm");
    }

    #[tokio::test]
    async fn failed_read_leaves_no_new_watch() {
        let armed = DashMap::new();
        let id = ProductId::new(1);

        let result = armed_during(&armed, id, true, async {
            Err::<bool, _>(CoordinationError::Connection("reset".into()))
        })
        .await;
        assert!(result.is_err());
        assert!(!armed.contains_key(&id));

        assert!(armed_during(&armed, id, true, async { Ok(true) }).await.unwrap());
        assert!(armed.contains_key(&id));
    }

    #[tokio::test]
    async fn failed_read_keeps_an_earlier_watch() {
        let armed = DashMap::new();
        let id = ProductId::new(1);
        armed.insert(id, ());

        let result = armed_during(&armed, id, true, async {
            Err::<bool, _>(CoordinationError::Connection("reset".into()))
        })
        .await;
        assert!(result.is_err());
        assert!(armed.contains_key(&id));

        assert!(!armed_during(&armed, ProductId::new(2), false, async { Ok(false) })
            .await
            .unwrap());
        assert!(!armed.contains_key(&ProductId::new(2)));
    }
}
