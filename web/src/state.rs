//! Application state shared by the handlers.

use flash_sale_runtime::SpikeOrchestrator;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// State behind every route.
///
/// The orchestrator holds this process's local admission cache, so one
/// `AppState` (and its clones) must serve the whole process.
#[derive(Clone)]
pub struct AppState {
    /// Purchase attempt driver
    pub orchestrator: Arc<SpikeOrchestrator>,
    /// Prometheus renderer, `None` when metrics are disabled
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// State without a metrics endpoint.
    #[must_use]
    pub fn new(orchestrator: SpikeOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            metrics: None,
        }
    }

    /// Serve `handle` at `GET /metrics`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
