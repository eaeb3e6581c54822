//! Application state for the ticketing HTTP server.

use crate::app::TicketingApp;
use axum::extract::FromRef;
use std::sync::Arc;
use turnstile_runtime::metrics::MetricsServer;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; the services inside are behind `Arc`s.
#[derive(Clone, Debug)]
pub struct AppState {
    /// The ticketing services
    pub app: TicketingApp,
    /// Prometheus recorder, when installed
    pub metrics: Option<Arc<MetricsServer>>,
}

impl AppState {
    /// Create a new application state without a metrics endpoint.
    #[must_use]
    pub const fn new(app: TicketingApp) -> Self {
        Self { app, metrics: None }
    }

    /// Serve `/metrics` from this recorder.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsServer>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl FromRef<AppState> for TicketingApp {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.app.clone()
    }
}
