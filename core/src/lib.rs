//! # Turnstile Core
//!
//! Domain types and seams for ticket inventory control, entry validation and
//! ticket transfer.
//!
//! This crate holds everything that does not perform I/O:
//!
//! - **Types**: identifiers, [`Money`](types::Money), status enums and entities
//! - **Errors**: [`TicketingError`](error::TicketingError) with its
//!   [`ErrorKind`](error::ErrorKind) taxonomy, and [`StoreError`](error::StoreError)
//! - **Pricing**: the pure tier resolver
//! - **Codes**: entry codes, transfer codes and order numbers
//! - **Cooldown**: the bounded duplicate-scan cache
//! - **Store**: the [`CatalogStore`](store::CatalogStore) trait that every
//!   cross-request invariant is enforced behind
//! - **Notify**: the [`Notifier`](notify::Notifier) trait for SMS/email dispatch
//! - **Environment**: the injected [`Clock`](environment::Clock)
//!
//! ## Architecture Principles
//!
//! - No in-process global lock: correctness lives at the storage boundary
//! - Status-guarded writes are explicit compare-and-set operations
//! - Time is injected, never read from the system inside domain logic

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod codes;
pub mod cooldown;
pub mod error;
pub mod notify;
pub mod pricing;
pub mod store;
pub mod types;

pub use error::{ErrorKind, StoreError, TicketingError};

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// into the services that need them.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use turnstile_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
