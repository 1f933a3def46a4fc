//! Purchase attempt endpoint.

use crate::{AppError, AppState, WebResult};
use axum::extract::{Path, State};
use flash_sale_core::ProductId;

/// `POST /spike/:product_id`: try to buy one unit.
///
/// The body is the outcome, `success` or `fail`, with status 200 either
/// way. Sold out, lost races, commit failures and store outages all read
/// as `fail`.
///
/// # Errors
///
/// Returns 400 if `product_id` is not an integer.
pub async fn spike(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> WebResult<&'static str> {
    let product_id: ProductId = raw_id
        .parse()
        .map_err(|e| AppError::bad_request(format!("invalid product id {raw_id:?}: {e}")))?;

    let outcome = state.orchestrator.attempt_spike(product_id).await;
    tracing::debug!(product_id = %product_id, outcome = %outcome, "Spike request served");

    Ok(outcome.as_str())
}
