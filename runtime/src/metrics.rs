//! Prometheus metrics for flash-sale admission.
//!
//! This module provides metric collection for:
//! - Purchase attempts by terminal state
//! - Commit latency and failures
//! - Rollbacks and rollback steps that failed
//! - Coordination watch events and local cache maintenance
//!
//! # Example
//!
//! ```rust,no_run
//! use flash_sale_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Render for a `/metrics` endpoint
//! let body = server.render().unwrap_or_default();
//! # Ok(())
//! # }
//! ```

use flash_sale_core::SpikeState;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics recorder and renderer.
///
/// Installs the global recorder; the HTTP layer serves [`Self::render`].
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address the metrics are advertised on (for logs)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., in tests), this logs a
    /// warning and succeeds without a handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder was not installed by this server.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "spike_attempts_total",
        "Purchase attempts by terminal state"
    );
    describe_histogram!(
        "spike_attempt_duration_seconds",
        "Time taken by a purchase attempt"
    );
    describe_counter!(
        "spike_errors_total",
        "Purchase attempts aborted by a counter or coordination failure"
    );
    describe_counter!("spike_commits_total", "Sale commits by result");
    describe_histogram!(
        "spike_commit_duration_seconds",
        "Time taken to commit a sale"
    );
    describe_counter!("spike_rollbacks_total", "Claims rolled back after a failed commit");
    describe_counter!(
        "spike_rollback_step_failures_total",
        "Rollback steps that failed, by step"
    );
    describe_gauge!(
        "admission_cache_entries",
        "Products this process knows to be sold out"
    );
    describe_counter!(
        "admission_cache_cleared_total",
        "Local sold-out marks cleared outside of rollback, by reason"
    );
    describe_counter!(
        "coordination_flag_events_total",
        "Sold-out flag notifications received, by value"
    );
    describe_counter!(
        "coordination_watch_lagged_total",
        "Flag notifications dropped because the watcher fell behind"
    );
    describe_counter!("stock_seeded_products_total", "Products seeded into the counter");
}

/// Admission metrics recorder.
pub struct SpikeMetrics;

impl SpikeMetrics {
    /// Record a finished attempt.
    pub fn record_attempt(state: SpikeState, duration: Duration) {
        counter!("spike_attempts_total", "state" => state.as_str()).increment(1);
        histogram!("spike_attempt_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record an attempt aborted by a store failure.
    pub fn record_error() {
        counter!("spike_errors_total").increment(1);
    }

    /// Record a commit.
    pub fn record_commit(success: bool, duration: Duration) {
        let result = if success { "ok" } else { "failed" };
        counter!("spike_commits_total", "result" => result).increment(1);
        histogram!("spike_commit_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a rollback.
    pub fn record_rollback() {
        counter!("spike_rollbacks_total").increment(1);
    }

    /// Record a rollback step that failed (`"flag"` or `"counter"`).
    pub fn record_rollback_step_failure(step: &'static str) {
        counter!("spike_rollback_step_failures_total", "step" => step).increment(1);
    }

    /// Record the current size of the local cache.
    #[allow(clippy::cast_precision_loss)] // Cache sizes are far below 2^52
    pub fn record_cache_size(entries: usize) {
        gauge!("admission_cache_entries").set(entries as f64);
    }
}

/// Watch and cache-maintenance metrics recorder.
pub struct CoordinationMetrics;

impl CoordinationMetrics {
    /// Record a flag notification.
    pub fn record_event(value: bool) {
        let value = if value { "true" } else { "false" };
        counter!("coordination_flag_events_total", "value" => value).increment(1);
    }

    /// Record notifications lost to a lagging receiver.
    pub fn record_lagged(skipped: u64) {
        counter!("coordination_watch_lagged_total").increment(skipped);
    }

    /// Record a local mark cleared by the watcher or the revalidator.
    pub fn record_cache_cleared(reason: &'static str) {
        counter!("admission_cache_cleared_total", "reason" => reason).increment(1);
    }

    /// Record seeded products.
    pub fn record_seeded(count: usize) {
        counter!("stock_seeded_products_total").increment(count as u64);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_server_creation() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let server = MetricsServer::new(addr);
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[test]
    fn test_metrics_server_render() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut server = MetricsServer::new(addr);
        server.start().unwrap();

        SpikeMetrics::record_attempt(SpikeState::Committed, Duration::from_millis(3));
        SpikeMetrics::record_rollback();
        CoordinationMetrics::record_event(false);

        // Another test may have installed the recorder first.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("spike_attempts_total"));
            assert!(rendered.contains("spike_rollbacks_total"));
            assert!(rendered.contains("coordination_flag_events_total"));
        }
    }
}
