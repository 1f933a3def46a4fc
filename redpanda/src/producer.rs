//! Queued commit: publishing admitted sales.

use crate::error::QueueError;
use crate::message::SpikeMessage;
use flash_sale_core::{BoxFuture, CommitError, ProductId, SaleCommitter};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::{Duration, Instant};

/// [`SaleCommitter`] that publishes the sale to the spike topic.
///
/// The broker acknowledgement is the authoritative admission: `Ok` means the
/// sale is durably queued, and any publish failure is a commit failure that
/// the orchestrator rolls back. Writing the sale to the persistent store is
/// the [`SpikeConsumer`](crate::SpikeConsumer)'s job.
///
/// # Example
///
/// ```no_run
/// use flash_sale_redpanda::RedpandaSaleCommitter;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let committer = RedpandaSaleCommitter::builder()
///     .brokers("localhost:9092")
///     .topic("spike-orders")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaSaleCommitter {
    /// Kafka producer for publishing sales
    producer: FutureProducer,
    topic: String,
    /// Producer timeout
    timeout: Duration,
}

impl RedpandaSaleCommitter {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> RedpandaSaleCommitterBuilder {
        RedpandaSaleCommitterBuilder::default()
    }

    /// Topic sales are published to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    async fn publish(&self, message: &SpikeMessage) -> Result<(), CommitError> {
        let payload = message
            .encode()
            .map_err(|e| CommitError::Queue(format!("Failed to serialize sale: {e}")))?;
        let key = message.key();

        let record = FutureRecord::to(&self.topic).payload(&payload).key(&key);

        match self.producer.send(record, Timeout::After(self.timeout)).await {
            Ok((partition, offset)) => {
                tracing::debug!(
                    topic = %self.topic,
                    partition,
                    offset,
                    product_id = %message.product_id,
                    "Sale queued"
                );
                Ok(())
            }
            Err((kafka_error, _)) => {
                tracing::error!(
                    topic = %self.topic,
                    product_id = %message.product_id,
                    error = %kafka_error,
                    "Failed to queue sale"
                );
                Err(CommitError::Queue(kafka_error.to_string()))
            }
        }
    }
}

impl SaleCommitter for RedpandaSaleCommitter {
    fn commit(&self, product_id: ProductId) -> BoxFuture<'_, Result<(), CommitError>> {
        Box::pin(async move {
            let started = Instant::now();
            let result = self.publish(&SpikeMessage::now(product_id)).await;
            let outcome = if result.is_ok() { "ok" } else { "failed" };
            metrics::counter!("spike_queue_published_total", "result" => outcome).increment(1);
            metrics::histogram!("spike_queue_publish_duration_seconds")
                .record(started.elapsed().as_secs_f64());
            result
        })
    }
}

/// Builder for a [`RedpandaSaleCommitter`].
#[derive(Default)]
pub struct RedpandaSaleCommitterBuilder {
    brokers: Option<String>,
    topic: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
}

impl RedpandaSaleCommitterBuilder {
    /// Set the broker addresses.
    ///
    /// # Parameters
    ///
    /// - `brokers`: Comma-separated list of broker addresses (e.g., "localhost:9092")
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the topic sales are published to.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the producer acknowledgment mode.
    ///
    /// Default: "all". The acknowledgement admits the sale, so it should
    /// survive a broker failure.
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Set the compression codec.
    ///
    /// Default: "none"
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Set the producer send timeout.
    ///
    /// Default: 5 seconds
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the committer.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ConnectionFailed`] if brokers or topic are not
    /// set, or the producer cannot be created.
    pub fn build(self) -> Result<RedpandaSaleCommitter, QueueError> {
        let brokers = self
            .brokers
            .ok_or_else(|| QueueError::ConnectionFailed("Brokers not configured".to_string()))?;
        let topic = self
            .topic
            .ok_or_else(|| QueueError::ConnectionFailed("Topic not configured".to_string()))?;
        let timeout = self.timeout.unwrap_or(Duration::from_secs(5));
        let acks = self.producer_acks.as_deref().unwrap_or("all");
        let compression = self.compression.as_deref().unwrap_or("none");

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", acks)
            .set("compression.type", compression)
            .create()
            .map_err(|e| QueueError::ConnectionFailed(format!("Failed to create producer: {e}")))?;

        tracing::info!(
            brokers = %brokers,
            topic = %topic,
            acks,
            compression,
            "Spike producer created"
        );

        Ok(RedpandaSaleCommitter {
            producer,
            topic,
            timeout,
        })
    }
}
