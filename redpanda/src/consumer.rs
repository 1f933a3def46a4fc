//! Queued commit: draining admitted sales into the persistent store.

use crate::error::QueueError;
use crate::message::SpikeMessage;
use flash_sale_core::SaleCommitter;
use futures::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What happened to one consumed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The sale was written to the persistent store.
    Committed,
    /// The store refused the sale. Logged and counted only: the unit was
    /// already admitted when the broker acknowledged it.
    Failed,
    /// The payload was missing or not a [`SpikeMessage`].
    Malformed,
}

impl Applied {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::Failed => "failed",
            Self::Malformed => "malformed",
        }
    }
}

/// Apply one message payload through `store`.
///
/// Consumer-side failures never touch the stock counter or the flags.
pub async fn apply_payload(payload: Option<&[u8]>, store: &dyn SaleCommitter) -> Applied {
    let Some(payload) = payload else {
        tracing::warn!("Spike message has no payload");
        return Applied::Malformed;
    };
    let message = match SpikeMessage::decode(payload) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to deserialize spike message");
            return Applied::Malformed;
        }
    };

    match store.commit(message.product_id).await {
        Ok(()) => {
            tracing::debug!(
                product_id = %message.product_id,
                claimed_at = %message.claimed_at,
                "Queued sale recorded"
            );
            Applied::Committed
        }
        Err(e) => {
            tracing::error!(
                product_id = %message.product_id,
                claimed_at = %message.claimed_at,
                error = %e,
                "Queued sale could not be recorded"
            );
            Applied::Failed
        }
    }
}

/// Drains the spike topic into a [`SaleCommitter`] (normally the
/// `PostgreSQL` one).
///
/// # Delivery Semantics
///
/// **At-least-once** with manual offset commits: the offset is committed after
/// the message was applied, whatever the outcome. A crash in between
/// redelivers the message.
pub struct SpikeConsumer {
    consumer: StreamConsumer,
    topic: String,
    store: Arc<dyn SaleCommitter>,
}

impl SpikeConsumer {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> SpikeConsumerBuilder {
        SpikeConsumerBuilder::default()
    }

    /// Consume until `shutdown` resolves or the stream ends.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send) {
        let mut stream = self.consumer.stream();
        tokio::pin!(shutdown);
        tracing::info!(topic = %self.topic, "Spike consumer started");

        loop {
            let next = tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Spike consumer stopping");
                    break;
                }
                next = stream.next() => next,
            };
            let Some(received) = next else {
                tracing::warn!("Spike consumer stream ended");
                break;
            };

            match received {
                Ok(message) => {
                    let applied = apply_payload(message.payload(), self.store.as_ref()).await;
                    metrics::counter!("spike_queue_consumed_total", "result" => applied.as_str())
                        .increment(1);

                    if let Err(e) = self.consumer.commit_message(&message, CommitMode::Async) {
                        tracing::warn!(
                            topic = message.topic(),
                            partition = message.partition(),
                            offset = message.offset(),
                            error = %e,
                            "Failed to commit offset (message may be redelivered)"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to receive spike message");
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

/// Builder for a [`SpikeConsumer`].
#[derive(Default)]
pub struct SpikeConsumerBuilder {
    brokers: Option<String>,
    topic: Option<String>,
    consumer_group: Option<String>,
    auto_offset_reset: Option<String>,
}

impl SpikeConsumerBuilder {
    /// Set the broker addresses.
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the topic to drain.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the consumer group shared by every draining process.
    ///
    /// Default: "flash-sale-spike-consumer"
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Where a new consumer group starts reading.
    ///
    /// Default: "earliest", so sales queued before the first consumer are kept.
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Create the consumer, subscribe, and bind it to `store`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if brokers or topic are missing, or the consumer
    /// cannot be created or subscribed.
    pub fn build(self, store: Arc<dyn SaleCommitter>) -> Result<SpikeConsumer, QueueError> {
        let brokers = self
            .brokers
            .ok_or_else(|| QueueError::ConnectionFailed("Brokers not configured".to_string()))?;
        let topic = self
            .topic
            .ok_or_else(|| QueueError::ConnectionFailed("Topic not configured".to_string()))?;
        let group = self
            .consumer_group
            .unwrap_or_else(|| "flash-sale-spike-consumer".to_string());
        let auto_offset_reset = self
            .auto_offset_reset
            .unwrap_or_else(|| "earliest".to_string());

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("group.id", &group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &auto_offset_reset)
            .set("session.timeout.ms", "6000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| QueueError::ConnectionFailed(format!("Failed to create consumer: {e}")))?;

        consumer
            .subscribe(&[topic.as_str()])
            .map_err(|e| QueueError::SubscriptionFailed {
                topic: topic.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            topic = %topic,
            consumer_group = %group,
            auto_offset_reset = %auto_offset_reset,
            manual_commit = true,
            "Subscribed to spike topic"
        );

        Ok(SpikeConsumer {
            consumer,
            topic,
            store,
        })
    }
}
