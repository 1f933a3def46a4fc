//! Table definitions.

use sqlx::PgPool;

/// Create the tables this crate reads and writes, if missing.
///
/// `products.stock` carries a `CHECK (stock >= 0)` so the persistent store can
/// never be oversold even if the shared counter and the database disagree.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if a statement fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS products (
            id BIGINT PRIMARY KEY,
            name TEXT NOT NULL,
            stock BIGINT NOT NULL CHECK (stock >= 0)
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS orders (
            id BIGSERIAL PRIMARY KEY,
            product_id BIGINT NOT NULL REFERENCES products(id),
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_product ON orders(product_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database schema ready");
    Ok(())
}
