//! Prometheus metrics for the storage and retry layers.
//!
//! Business metrics (`ticketing_*`) are described by the application; this
//! module owns the recorder installation and the infrastructure metrics:
//! - Storage operations (count, latency, failures)
//! - Retries (attempts, recoveries, exhaustion)
//!
//! # Example
//!
//! ```rust,no_run
//! use turnstile_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let _text = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
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
/// The HTTP surface that serves [`MetricsServer::render`] belongs to the
/// application router.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsServer")
            .field("addr", &self.addr)
            .field("installed", &self.handle.is_some())
            .finish()
    }
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address the metrics are advertised on (logged at start)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the global Prometheus recorder and describe the
    /// infrastructure metrics.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// A recorder that is already installed (several servers in one test
    /// binary) is tolerated with a warning; `render` then returns `None`.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
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
                    tracing::warn!(
                        "Metrics recorder already initialized, skipping re-initialization"
                    );
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

/// Register all infrastructure metric descriptions.
fn register_metrics() {
    // Storage metrics
    describe_counter!(
        "store_operations_total",
        "Total number of storage operations by operation and outcome"
    );
    describe_histogram!(
        "store_operation_duration_seconds",
        "Time taken by storage operations"
    );

    // Retry metrics
    describe_counter!("retry_attempts_total", "Total number of retry attempts");
    describe_counter!(
        "retry_successes_total",
        "Total number of operations that succeeded after a retry"
    );
    describe_counter!(
        "retry_exhausted_total",
        "Total number of operations that exhausted max retries"
    );
}

/// Storage metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record one storage operation.
    ///
    /// # Arguments
    ///
    /// * `operation` - Operation name (`commit_purchase`, `claim_transfer`, ...)
    /// * `duration` - Wall time of the operation
    /// * `ok` - Whether it returned without a storage error
    pub fn record_operation(operation: &'static str, duration: Duration, ok: bool) {
        let outcome = if ok { "ok" } else { "error" };
        counter!("store_operations_total", "operation" => operation, "outcome" => outcome)
            .increment(1);
        histogram!("store_operation_duration_seconds", "operation" => operation)
            .record(duration.as_secs_f64());
    }
}

/// Retry metrics recorder.
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a retry attempt.
    pub fn record_attempt() {
        counter!("retry_attempts_total").increment(1);
    }

    /// Record a successful retry.
    pub fn record_success() {
        counter!("retry_successes_total").increment(1);
    }

    /// Record exhausted retries.
    pub fn record_exhausted() {
        counter!("retry_exhausted_total").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_server_starts_without_handle() {
        let server = MetricsServer::new(SocketAddr::from(([127, 0, 0, 1], 0)));
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[test]
    fn test_metrics_server_start_is_idempotent() {
        let mut first = MetricsServer::new(SocketAddr::from(([127, 0, 0, 1], 0)));
        let mut second = MetricsServer::new(SocketAddr::from(([127, 0, 0, 1], 0)));
        assert!(first.start().is_ok());
        assert!(second.start().is_ok());
    }

    #[test]
    fn test_recorders_do_not_panic_without_recorder() {
        StoreMetrics::record_operation("get_ticket", Duration::from_millis(3), true);
        RetryMetrics::record_attempt();
        RetryMetrics::record_success();
        RetryMetrics::record_exhausted();
    }
}
