//! Injected dependencies of the ticketing services.

use std::future::Future;
use std::sync::Arc;
use turnstile_core::StoreError;
use turnstile_core::environment::{Clock, SystemClock};
use turnstile_core::notify::{LogNotifier, Notifier};
use turnstile_core::store::CatalogStore;
use turnstile_runtime::{RetryPolicy, retry_transient};

/// Environment dependencies shared by every ticketing service
#[derive(Clone)]
pub struct TicketingEnvironment {
    /// Clock for timestamps and time windows
    pub clock: Arc<dyn Clock>,
    /// Catalog storage
    pub store: Arc<dyn CatalogStore>,
    /// Outbound SMS/email
    pub notifier: Arc<dyn Notifier>,
    /// Backoff for transient storage failures
    pub retry: RetryPolicy,
}

impl TicketingEnvironment {
    /// Creates a new `TicketingEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        store: Arc<dyn CatalogStore>,
        notifier: Arc<dyn Notifier>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            clock,
            store,
            notifier,
            retry,
        }
    }

    /// Production environment: system clock and log notifier over `store`.
    #[must_use]
    pub fn production(store: Arc<dyn CatalogStore>, retry: RetryPolicy) -> Self {
        Self::new(Arc::new(SystemClock), store, LogNotifier::shared(), retry)
    }

    /// Run a store call, retrying transient failures with the configured backoff.
    ///
    /// Only use this for reads and compare-and-set attempts.
    ///
    /// # Errors
    ///
    /// Returns the first permanent [`StoreError`], or the last transient one
    /// once retries are exhausted.
    pub async fn retrying<T, F, Fut>(&self, operation: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        retry_transient(&self.retry, operation).await
    }
}

impl std::fmt::Debug for TicketingEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketingEnvironment")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
