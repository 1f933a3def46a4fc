//! Queued commit path for flash-sale admission over Redpanda.
//!
//! In queued mode the orchestrator's commit is a publish: the broker
//! acknowledgement admits the sale, and a consumer writes it to the persistent
//! store afterwards. It uses rdkafka, so any Kafka-compatible broker works.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ SpikeOrchestrator│
//! └────────┬─────────┘
//!          │ commit = publish (ack or rollback)
//!          ▼
//! ┌──────────────────┐
//! │   spike topic    │◄─── key = product id
//! └────────┬─────────┘
//!          │ at-least-once, manual offset commits
//!          ▼
//! ┌──────────────────┐
//! │  SpikeConsumer   │──► PostgresSaleCommitter
//! └──────────────────┘
//! ```
//!
//! Consumer-side failures are logged and counted. They never roll back the
//! counter or the flags: the unit was sold when the broker acknowledged it.
//!
//! # Example
//!
//! ```no_run
//! use flash_sale_redpanda::{RedpandaSaleCommitter, SpikeConsumer};
//! # use std::sync::Arc;
//!
//! # fn example(store: Arc<dyn flash_sale_core::SaleCommitter>) -> Result<(), Box<dyn std::error::Error>> {
//! let committer = RedpandaSaleCommitter::builder()
//!     .brokers("localhost:9092")
//!     .topic("spike-orders")
//!     .build()?;
//!
//! let consumer = SpikeConsumer::builder()
//!     .brokers("localhost:9092")
//!     .topic("spike-orders")
//!     .consumer_group("flash-sale-orders")
//!     .build(store)?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod consumer;
mod error;
mod message;
mod producer;

pub use consumer::{apply_payload, Applied, SpikeConsumer, SpikeConsumerBuilder};
pub use error::QueueError;
pub use message::SpikeMessage;
pub use producer::{RedpandaSaleCommitter, RedpandaSaleCommitterBuilder};
