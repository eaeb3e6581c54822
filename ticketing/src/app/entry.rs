//! Gate entry validation.
//!
//! A scan runs through the duplicate-scan cooldown, the entry code lookup,
//! the admission window, the ticket and order status, and finally the
//! `Valid → Used` compare-and-set in the store. Only the compare-and-set
//! decides admission; everything before it only decides rejection.

use crate::config::EntryConfig;
use crate::environment::TicketingEnvironment;
use crate::metrics;
use crate::types::{ScanReason, ScanVerdict};
use chrono::{DateTime, Duration, Utc};
use turnstile_core::codes::EntryCode;
use turnstile_core::cooldown::{CooldownCheck, ScanCooldown};
use turnstile_core::error::Result;
use turnstile_core::store::{EntryLookup, StatusSwap};
use turnstile_core::types::TicketStatus;

/// Validates scanned entry codes.
#[derive(Debug)]
pub struct EntryValidator {
    env: TicketingEnvironment,
    cooldown: ScanCooldown,
    early_entry: Duration,
    late_entry: Duration,
    require_paid_order: bool,
}

impl EntryValidator {
    /// Create a validator with its own cooldown cache
    #[must_use]
    pub fn new(env: TicketingEnvironment, config: &EntryConfig) -> Self {
        Self::with_cooldown(
            env,
            config,
            ScanCooldown::new(config.cooldown(), config.cooldown_max_entries),
        )
    }

    /// Create a validator around an existing cooldown cache
    #[must_use]
    pub fn with_cooldown(
        env: TicketingEnvironment,
        config: &EntryConfig,
        cooldown: ScanCooldown,
    ) -> Self {
        Self {
            env,
            cooldown,
            early_entry: Duration::hours(config.early_entry_hours),
            late_entry: Duration::hours(config.late_entry_hours),
            require_paid_order: config.require_paid_order,
        }
    }

    /// Validate a scanned entry code and admit the ticket if it may enter.
    ///
    /// Rejections are returned as verdicts with `valid == false`.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::Storage`](turnstile_core::TicketingError::Storage)
    /// only when the store cannot be reached.
    #[tracing::instrument(skip(self, code))]
    pub async fn validate(&self, code: &str) -> Result<ScanVerdict> {
        let code = code.trim();
        let now = self.env.clock.now();

        let verdict = self.evaluate(code, now).await?;

        metrics::record_scan(verdict.reason.as_str());
        if verdict.valid {
            tracing::info!(ticket_id = ?verdict.ticket.as_ref().map(|t| t.id), "Ticket admitted");
        } else {
            tracing::info!(reason = verdict.reason.as_str(), "Scan rejected");
        }
        Ok(verdict)
    }

    async fn evaluate(&self, code: &str, now: DateTime<Utc>) -> Result<ScanVerdict> {
        if let CooldownCheck::Repeat { last_seen } = self.cooldown.check_and_record(code, now) {
            tracing::debug!(%last_seen, "Code scanned again within cooldown");
            return Ok(ScanVerdict::rejected(ScanReason::DoubleScan));
        }

        let store = &self.env.store;
        let lookup = self
            .env
            .retrying(|| store.lookup_entry_code(EntryCode::new(code)))
            .await?;

        let details = match lookup {
            EntryLookup::Active(details) => *details,
            EntryLookup::Retired { ticket_id, .. } => {
                tracing::debug!(%ticket_id, "Retired entry code scanned");
                return Ok(ScanVerdict::rejected(ScanReason::Transferred));
            }
            EntryLookup::Unknown => return Ok(ScanVerdict::rejected(ScanReason::NotFound)),
        };

        if now < details.event_date - self.early_entry {
            return Ok(
                ScanVerdict::rejected(ScanReason::TooEarly).with_event_date(details.event_date)
            );
        }
        if now > details.event_date + self.late_entry {
            return Ok(
                ScanVerdict::rejected(ScanReason::EventEnded).with_event_date(details.event_date)
            );
        }

        let rejection = match details.ticket.status {
            TicketStatus::Valid => None,
            TicketStatus::Used => {
                return Ok(ScanVerdict::rejected(ScanReason::AlreadyUsed)
                    .with_used_at(details.ticket.used_at)
                    .with_ticket(&details));
            }
            TicketStatus::Cancelled => Some(ScanReason::Cancelled),
            TicketStatus::Transferred => Some(ScanReason::Transferred),
            TicketStatus::Expired => Some(ScanReason::Expired),
        };
        if let Some(reason) = rejection {
            return Ok(ScanVerdict::rejected(reason));
        }

        if self.require_paid_order
            && details
                .order_status
                .is_some_and(|status| !status.admits_entry())
        {
            return Ok(ScanVerdict::rejected(ScanReason::Unpaid).with_ticket(&details));
        }

        let ticket_id = details.ticket.id;
        let swap = self
            .env
            .retrying(|| {
                store.compare_and_set_ticket_status(
                    ticket_id,
                    TicketStatus::Valid,
                    TicketStatus::Used,
                    Some(now),
                )
            })
            .await?;

        Ok(match swap {
            StatusSwap::Swapped(_) => ScanVerdict::admitted(&details),
            StatusSwap::Mismatch { actual } => {
                tracing::warn!(%ticket_id, %actual, "Lost admission race to another scanner");
                ScanVerdict::rejected(ScanReason::RaceLost).with_ticket(&details)
            }
            StatusSwap::Missing => ScanVerdict::rejected(ScanReason::NotFound),
        })
    }

    /// Drop cooldown entries older than twice the cooldown. Returns how many
    /// were removed.
    pub fn purge_cooldown(&self) -> usize {
        let evicted = self.cooldown.evict_stale(self.env.clock.now());
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.cooldown.len(), "Purged scan cooldown");
        }
        evicted
    }

    /// Codes currently held by the cooldown cache.
    #[must_use]
    pub fn cooldown_len(&self) -> usize {
        self.cooldown.len()
    }
}
