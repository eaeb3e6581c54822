//! # Turnstile Runtime
//!
//! Operational support shared by the storage backends and the ticketing
//! services.
//!
//! ## Components
//!
//! - **Retry**: exponential backoff for transient storage failures
//! - **Metrics**: Prometheus recorder installation, storage and retry metrics

/// Retry logic with exponential backoff
pub mod retry;

/// Prometheus metrics for observability
pub mod metrics;

pub use retry::{RetryPolicy, Transient, retry_transient, retry_with_backoff};
