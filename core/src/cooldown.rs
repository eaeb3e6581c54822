//! Duplicate-scan suppression.
//!
//! Gate scanners often read the same QR code several times in a row. A
//! [`ScanCooldown`] remembers when each entry code was last let through and
//! reports a repeat inside the cooldown window without touching storage.
//!
//! The cache is owned by whoever constructs it (one per validator), bounded
//! by `max_entries`, and evicts entries older than twice the cooldown on every
//! check. It is a fast path only: the single-use guarantee comes from the
//! store's compare-and-set.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

/// Outcome of [`ScanCooldown::check_and_record`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CooldownCheck {
    /// Not seen within the cooldown; the scan was recorded
    First,
    /// Seen within the cooldown; nothing was recorded
    Repeat {
        /// When the code was last let through
        last_seen: DateTime<Utc>,
    },
}

impl CooldownCheck {
    /// Whether this scan is a repeat.
    #[must_use]
    pub const fn is_repeat(&self) -> bool {
        matches!(self, Self::Repeat { .. })
    }
}

#[derive(Debug, Default)]
struct Entries {
    last_seen: HashMap<String, DateTime<Utc>>,
    // insertion order; may hold superseded timestamps for re-recorded codes
    by_time: VecDeque<(DateTime<Utc>, String)>,
}

impl Entries {
    fn pop_oldest(&mut self) {
        if let Some((seen, code)) = self.by_time.pop_front() {
            if self.last_seen.get(&code) == Some(&seen) {
                self.last_seen.remove(&code);
            }
        }
    }

    fn evict_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.last_seen.len();
        while self.by_time.front().is_some_and(|(seen, _)| *seen < cutoff) {
            self.pop_oldest();
        }
        before - self.last_seen.len()
    }
}

/// Bounded, time-indexed map of entry code to last admission attempt.
#[derive(Debug)]
pub struct ScanCooldown {
    cooldown: Duration,
    max_entries: usize,
    entries: Mutex<Entries>,
}

impl ScanCooldown {
    /// Create a cache with the given cooldown and capacity.
    #[must_use]
    pub fn new(cooldown: Duration, max_entries: usize) -> Self {
        Self {
            cooldown,
            max_entries: max_entries.max(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    /// The cooldown window.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Check `code` and, unless it is a repeat, record it as seen at `now`.
    ///
    /// Check and record happen under one lock, so of two simultaneous scans
    /// of the same code exactly one sees [`CooldownCheck::First`].
    pub fn check_and_record(&self, code: &str, now: DateTime<Utc>) -> CooldownCheck {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.evict_older_than(now - self.cooldown * 2);

        if let Some(&last_seen) = entries.last_seen.get(code) {
            if now - last_seen < self.cooldown {
                return CooldownCheck::Repeat { last_seen };
            }
        }

        entries.last_seen.insert(code.to_string(), now);
        entries.by_time.push_back((now, code.to_string()));
        while entries.last_seen.len() > self.max_entries {
            entries.pop_oldest();
        }
        CooldownCheck::First
    }

    /// Drop entries older than twice the cooldown. Returns how many were removed.
    pub fn evict_stale(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = entries.evict_older_than(now - self.cooldown * 2);
        if entries.last_seen.is_empty() {
            entries.by_time.clear();
        }
        removed
    }

    /// Number of codes currently remembered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_seen
            .len()
    }

    /// Whether no codes are remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cache() -> ScanCooldown {
        ScanCooldown::new(Duration::seconds(5), 1_000)
    }

    #[test]
    fn second_scan_inside_window_is_repeat() {
        let cooldown = cache();
        let t0 = Utc::now();
        assert_eq!(cooldown.check_and_record("PA-1", t0), CooldownCheck::First);
        assert_eq!(
            cooldown.check_and_record("PA-1", t0 + Duration::seconds(1)),
            CooldownCheck::Repeat { last_seen: t0 }
        );
        assert_eq!(
            cooldown.check_and_record("PA-1", t0 + Duration::seconds(6)),
            CooldownCheck::First
        );
    }

    #[test]
    fn repeats_do_not_extend_the_window() {
        let cooldown = cache();
        let t0 = Utc::now();
        cooldown.check_and_record("PA-1", t0);
        cooldown.check_and_record("PA-1", t0 + Duration::seconds(4));
        assert_eq!(
            cooldown.check_and_record("PA-1", t0 + Duration::seconds(5)),
            CooldownCheck::First
        );
    }

    #[test]
    fn codes_are_independent() {
        let cooldown = cache();
        let t0 = Utc::now();
        assert!(!cooldown.check_and_record("PA-1", t0).is_repeat());
        assert!(!cooldown.check_and_record("PA-2", t0).is_repeat());
    }

    #[test]
    fn stale_entries_are_evicted() {
        let cooldown = cache();
        let t0 = Utc::now();
        cooldown.check_and_record("PA-1", t0);
        cooldown.check_and_record("PA-2", t0 + Duration::seconds(8));
        assert_eq!(cooldown.len(), 2);

        assert_eq!(cooldown.evict_stale(t0 + Duration::seconds(11)), 1);
        assert_eq!(cooldown.len(), 1);
        assert_eq!(cooldown.evict_stale(t0 + Duration::seconds(30)), 1);
        assert!(cooldown.is_empty());
    }

    #[test]
    fn capacity_drops_oldest() {
        let cooldown = ScanCooldown::new(Duration::seconds(5), 2);
        let t0 = Utc::now();
        cooldown.check_and_record("PA-1", t0);
        cooldown.check_and_record("PA-2", t0);
        cooldown.check_and_record("PA-3", t0);
        assert_eq!(cooldown.len(), 2);
        // PA-1 was dropped, so it is let through again
        assert!(!cooldown.check_and_record("PA-1", t0).is_repeat());
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity(
            scans in proptest::collection::vec((0u8..20, 0i64..30_000), 1..200),
            cap in 1usize..10,
        ) {
            let cooldown = ScanCooldown::new(Duration::seconds(5), cap);
            let t0 = Utc::now();
            let mut offset = 0;
            for (code, step) in scans {
                offset += step;
                let at = t0 + Duration::milliseconds(offset);
                cooldown.check_and_record(&format!("PA-{code}"), at);
                prop_assert!(cooldown.len() <= cap);
            }
        }
    }
}
