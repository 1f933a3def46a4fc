//! Errors of the queued commit path.

use thiserror::Error;

/// Errors building or running the queue clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Client could not be created (bad configuration, no brokers).
    #[error("Queue connection failed: {0}")]
    ConnectionFailed(String),

    /// Subscribing to the spike topic failed.
    #[error("Failed to subscribe to {topic}: {reason}")]
    SubscriptionFailed {
        /// Topic that could not be subscribed
        topic: String,
        /// Client error
        reason: String,
    },
}
