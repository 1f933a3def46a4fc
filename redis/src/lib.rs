//! # Flash Sale Redis
//!
//! `Redis` adapters for the flash-sale shared stores.
//!
//! - [`RedisStockCounter`]: the shared stock counter, one integer key per
//!   product, mutated only with `DECR`/`INCR`
//! - [`RedisCoordination`]: sold-out flag nodes stored as string keys named by
//!   their flag path, with watch notifications carried over pub/sub
//!
//! Both use a [`ConnectionManager`](redis::aio::ConnectionManager), which
//! reconnects transparently and is cheap to clone per call.
//!
//! # Example
//!
//! ```no_run
//! use flash_sale_core::KeySpace;
//! use flash_sale_redis::{RedisCoordination, RedisStockCounter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let keys = KeySpace::default();
//! let counter = RedisStockCounter::new("redis://127.0.0.1:6379", keys.clone()).await?;
//! let coordination = RedisCoordination::connect("redis://127.0.0.1:6379", keys).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod error;

/// Sold-out flags with pub/sub watch notifications
pub mod coordination;

/// Shared stock counter
pub mod counter;

pub use coordination::RedisCoordination;
pub use counter::RedisStockCounter;
