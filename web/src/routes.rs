//! Router configuration.

use crate::handlers::{health_check, render_metrics, spike};
use crate::middleware::track_request;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// Build the complete router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/spike/:product_id", post(spike))
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        .layer(axum::middleware::from_fn(track_request))
        .with_state(state)
}
