//! # Turnstile Testing
//!
//! Testing utilities for the Turnstile ticketing core.
//!
//! This crate provides:
//! - Clocks: [`FixedClock`] and the advanceable [`ManualClock`]
//! - [`InMemoryCatalogStore`]: a linearizable in-memory `CatalogStore`
//! - [`RecordingNotifier`]: captures notifications, can fail chosen recipients
//! - [`fixtures`]: builders for events, ticket types, tiers and users
//!
//! ## Example
//!
//! ```
//! use turnstile_testing::{InMemoryCatalogStore, ManualClock, fixtures};
//! use turnstile_core::store::CatalogStore;
//! use turnstile_core::environment::Clock;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let clock = ManualClock::new(turnstile_testing::test_clock().now());
//! let store = InMemoryCatalogStore::new();
//! let event = fixtures::published_event(clock.now());
//! store.upsert_event(event.clone()).await?;
//! assert!(store.get_event(event.id).await?.is_some());
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Duration, Utc};
use turnstile_core::environment::Clock;

mod catalog;
mod notifier;

pub mod fixtures;

pub use catalog::InMemoryCatalogStore;
pub use notifier::{RecordedNotification, RecordingNotifier};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Duration, Utc};
    use std::sync::{PoisonError, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use turnstile_testing::mocks::FixedClock;
    /// use turnstile_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when a test moves it.
    ///
    /// # Example
    ///
    /// ```
    /// use turnstile_testing::mocks::ManualClock;
    /// use turnstile_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let start = Utc::now();
    /// let clock = ManualClock::new(start);
    /// clock.advance(Duration::seconds(6));
    /// assert_eq!(clock.now(), start + Duration::seconds(6));
    /// ```
    #[derive(Debug)]
    pub struct ManualClock {
        time: RwLock<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Create a clock starting at `time`
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: RwLock::new(time),
            }
        }

        /// Move the clock forward (or backward, with a negative duration)
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.write().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute time
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.write().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_manual_clock_moves_only_when_told() {
        let start = test_clock().now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(Duration::hours(48));
        assert_eq!(clock.now(), start + Duration::hours(48));
        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
