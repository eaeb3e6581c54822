//! Request and response types of the ticketing services.
//!
//! Domain entities live in `turnstile_core::types`; this module holds what
//! the services accept and return on top of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use turnstile_core::types::{
    EventId, EventStatus, Money, Order, Ticket, TicketDetails, TicketId, TicketTransfer,
    TicketTypeId, TransferStatus, UserId,
};

// ============================================================================
// Purchases
// ============================================================================

/// One line of a purchase request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    /// Ticket type to buy
    pub ticket_type_id: TicketTypeId,
    /// Units, at least 1
    pub quantity: u32,
}

/// A purchase request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// Event to buy for
    pub event_id: EventId,
    /// Buyer
    pub user_id: UserId,
    /// Selected ticket types
    pub lines: Vec<PurchaseLine>,
}

/// A committed purchase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    /// The new order
    pub order: Order,
    /// One ticket per unit, in line order
    pub tickets: Vec<Ticket>,
}

/// Read-only price preview of a ticket type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketTypePrice {
    /// Ticket type
    pub ticket_type_id: TicketTypeId,
    /// Ticket type name
    pub name: String,
    /// Event
    pub event_id: EventId,
    /// Event status
    pub event_status: EventStatus,
    /// Price without tiers
    pub base_price: Money,
    /// Price of the next unit sold now
    pub current_price: Money,
    /// Tier that sets the current price
    pub tier_name: String,
    /// When that tier ends
    pub tier_ends_at: Option<DateTime<Utc>>,
    /// Units left
    pub available: u32,
}

// ============================================================================
// Gate scanning
// ============================================================================

/// Why a scan was accepted or rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanReason {
    /// Ticket admitted and marked used
    Admitted,
    /// Same code scanned again within the cooldown
    DoubleScan,
    /// No ticket has this code
    NotFound,
    /// Admission has not opened yet
    TooEarly,
    /// Admission has closed
    EventEnded,
    /// Ticket was used before
    AlreadyUsed,
    /// Ticket was cancelled
    Cancelled,
    /// Code belongs to a ticket that changed hands
    Transferred,
    /// Ticket expired
    Expired,
    /// Order is not paid
    Unpaid,
    /// Another scanner admitted the ticket first
    RaceLost,
}

impl ScanReason {
    /// Stable reason code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admitted => "ADMITTED",
            Self::DoubleScan => "DOUBLE_SCAN",
            Self::NotFound => "NOT_FOUND",
            Self::TooEarly => "TOO_EARLY",
            Self::EventEnded => "EVENT_ENDED",
            Self::AlreadyUsed => "ALREADY_USED",
            Self::Cancelled => "CANCELLED",
            Self::Transferred => "TRANSFERRED",
            Self::Expired => "EXPIRED",
            Self::Unpaid => "UNPAID",
            Self::RaceLost => "RACE_LOST",
        }
    }

    /// Message shown on the scanner.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Admitted => "Ticket validated successfully",
            Self::DoubleScan => "Ticket was just scanned. Please wait a moment.",
            Self::NotFound => "Ticket not found",
            Self::TooEarly => "Event has not started yet. Check-in has not opened.",
            Self::EventEnded => "Event has ended. This ticket is no longer valid.",
            Self::AlreadyUsed => "Ticket already used",
            Self::Cancelled => "Ticket has been cancelled",
            Self::Transferred => "Ticket has been transferred to another user",
            Self::Expired => "Ticket has expired",
            Self::Unpaid => "Ticket order has not been paid",
            Self::RaceLost => "Ticket was just validated by another scanner",
        }
    }
}

/// What the gate shows about a ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTicketSummary {
    /// Ticket
    pub id: TicketId,
    /// Event title
    pub event: String,
    /// Ticket type name
    pub ticket_type: String,
    /// Holder name, or phone when the holder has no name
    pub attendee: Option<String>,
}

impl From<&TicketDetails> for ScanTicketSummary {
    fn from(details: &TicketDetails) -> Self {
        Self {
            id: details.ticket.id,
            event: details.event_title.clone(),
            ticket_type: details.ticket_type_name.clone(),
            attendee: details.holder_name.clone(),
        }
    }
}

/// Result of scanning an entry code. Rejections are verdicts, not errors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanVerdict {
    /// Whether the holder may enter
    pub valid: bool,
    /// Reason code
    pub reason: ScanReason,
    /// Message for the scanner operator
    pub message: String,
    /// Ticket summary, when known
    pub ticket: Option<ScanTicketSummary>,
    /// Previous admission time for used tickets
    pub used_at: Option<DateTime<Utc>>,
    /// Event start, for window rejections
    pub event_date: Option<DateTime<Utc>>,
}

impl ScanVerdict {
    /// A verdict with only a reason.
    #[must_use]
    pub fn rejected(reason: ScanReason) -> Self {
        Self {
            valid: false,
            reason,
            message: reason.message().to_string(),
            ticket: None,
            used_at: None,
            event_date: None,
        }
    }

    /// The admitted verdict for a ticket.
    #[must_use]
    pub fn admitted(details: &TicketDetails) -> Self {
        Self {
            valid: true,
            reason: ScanReason::Admitted,
            message: ScanReason::Admitted.message().to_string(),
            ticket: Some(ScanTicketSummary::from(details)),
            used_at: None,
            event_date: None,
        }
    }

    /// Attach a ticket summary.
    #[must_use]
    pub fn with_ticket(mut self, details: &TicketDetails) -> Self {
        self.ticket = Some(ScanTicketSummary::from(details));
        self
    }

    /// Attach the previous admission time.
    #[must_use]
    pub const fn with_used_at(mut self, used_at: Option<DateTime<Utc>>) -> Self {
        self.used_at = used_at;
        self
    }

    /// Attach the event start.
    #[must_use]
    pub const fn with_event_date(mut self, event_date: DateTime<Utc>) -> Self {
        self.event_date = Some(event_date);
        self
    }
}

// ============================================================================
// Transfers
// ============================================================================

/// Input of a transfer initiation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecipient {
    /// Recipient phone for SMS
    pub phone: Option<String>,
    /// Recipient email
    pub email: Option<String>,
    /// Note to the recipient
    pub message: Option<String>,
}

/// Whether the user sent or received a transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// The user sent the ticket
    Sent,
    /// The user received the ticket
    Received,
}

/// A transfer as seen by one of its parties.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferView {
    /// The transfer
    #[serde(flatten)]
    pub transfer: TicketTransfer,
    /// Status with lazy expiry applied
    pub effective_status: TransferStatus,
    /// Direction relative to the viewer
    pub direction: TransferDirection,
}

// ============================================================================
// Waitlist
// ============================================================================

/// A user's standing on an event waitlist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistStatus {
    /// Event
    pub event_id: EventId,
    /// Whether the user has an entry
    pub on_waitlist: bool,
    /// 1-based FIFO position
    pub position: Option<u32>,
    /// Whether the user was already notified
    pub notified: bool,
    /// When the user joined
    pub joined_at: Option<DateTime<Utc>>,
}

/// Outcome of one waitlist notification round.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistNotification {
    /// Entries claimed and marked notified
    pub claimed: u32,
    /// Deliveries that succeeded
    pub delivered: u32,
    /// Deliveries that failed or had no contact
    pub failed: u32,
    /// Users claimed, in FIFO order
    pub entries: Vec<UserId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_reason_codes_are_distinct() {
        let reasons = [
            ScanReason::Admitted,
            ScanReason::DoubleScan,
            ScanReason::NotFound,
            ScanReason::TooEarly,
            ScanReason::EventEnded,
            ScanReason::AlreadyUsed,
            ScanReason::Cancelled,
            ScanReason::Transferred,
            ScanReason::Expired,
            ScanReason::Unpaid,
            ScanReason::RaceLost,
        ];
        let mut codes: Vec<&str> = reasons.iter().map(ScanReason::as_str).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), reasons.len());
    }

    #[test]
    fn test_scan_reason_serializes_as_code() {
        let json = serde_json::to_string(&ScanReason::DoubleScan).unwrap_or_default();
        assert_eq!(json, "\"DOUBLE_SCAN\"");
    }

    #[test]
    fn test_rejected_verdict_is_invalid() {
        let verdict = ScanVerdict::rejected(ScanReason::RaceLost);
        assert!(!verdict.valid);
        assert_eq!(verdict.message, "Ticket was just validated by another scanner");
        assert!(verdict.ticket.is_none());
    }
}
