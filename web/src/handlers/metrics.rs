//! Prometheus scrape endpoint.

use crate::{AppError, AppState, WebResult};
use axum::{extract::State, http::header, response::IntoResponse};

/// `GET /metrics` in the Prometheus text format.
///
/// # Errors
///
/// Returns 503 when the server runs without a metrics recorder.
#[allow(clippy::unused_async)]
pub async fn render_metrics(State(state): State<AppState>) -> WebResult<impl IntoResponse> {
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| AppError::unavailable("metrics are disabled"))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}
