//! `PostgreSQL` persistence for flash-sale admission.
//!
//! This crate provides the authoritative side of a sale and the startup
//! product listing:
//!
//! - [`PostgresSaleCommitter`]: debits the product's stock and records the
//!   order in one transaction
//! - [`PostgresProductCatalog`]: lists every product for counter seeding
//! - [`run_migrations`]: creates the `products` and `orders` tables
//!
//! # Example
//!
//! ```ignore
//! use flash_sale_postgres::{connect, run_migrations, PostgresSaleCommitter};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = connect("postgres://localhost/flash_sale", 10, Duration::from_secs(5)).await?;
//!     run_migrations(&pool).await?;
//!     let committer = PostgresSaleCommitter::from_pool(pool);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod committer;
mod schema;

pub use catalog::PostgresProductCatalog;
pub use committer::PostgresSaleCommitter;
pub use schema::run_migrations;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// Open a connection pool.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the database cannot be reached within
/// `connect_timeout`.
pub async fn connect(
    database_url: &str,
    max_connections: u32,
    connect_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(connect_timeout)
        .connect(database_url)
        .await?;

    tracing::info!(max_connections, "PostgreSQL pool connected");
    Ok(pool)
}
