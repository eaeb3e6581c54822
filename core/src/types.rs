//! Domain types for the ticketing core.
//!
//! Value objects (identifiers, [`Money`], entry and transfer codes live in
//! [`crate::codes`]), status enums and the entities persisted by a
//! [`CatalogStore`](crate::store::CatalogStore).

use crate::codes::{EntryCode, TransferCode};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

entity_id!(
    /// Unique identifier for an event
    EventId
);
entity_id!(
    /// Unique identifier for a ticket type within an event
    TicketTypeId
);
entity_id!(
    /// Unique identifier for a pricing tier
    PricingTierId
);
entity_id!(
    /// Unique identifier for an issued ticket
    TicketId
);
entity_id!(
    /// Unique identifier for an order
    OrderId
);
entity_id!(
    /// Unique identifier for a ticket transfer
    TransferId
);
entity_id!(
    /// Unique identifier for a waitlist entry
    WaitlistEntryId
);
entity_id!(
    /// Unique identifier for a user (owned by the external auth system)
    UserId
);

// ============================================================================
// Money Value Object (minor currency units)
// ============================================================================

/// An amount in minor currency units (cents, santim).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from minor units
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.0
    }

    /// Adds two amounts, returning `None` on overflow
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }

    /// Multiplies by a quantity, returning `None` on overflow
    #[must_use]
    pub const fn checked_mul(self, quantity: u64) -> Option<Self> {
        match self.0.checked_mul(quantity) {
            Some(product) => Some(Self(product)),
            None => None,
        }
    }

    /// Takes a share expressed in basis points, rounded half-up to the
    /// nearest minor unit (500 bps of 1010 is 50.5, which rounds to 51).
    #[must_use]
    pub const fn basis_points(self, bps: u32) -> Self {
        // u128 keeps the intermediate product exact for any u64 amount
        let scaled = self.0 as u128 * bps as u128;
        #[allow(clippy::cast_possible_truncation)]
        let rounded = ((scaled + 5_000) / 10_000) as u64;
        Self(rounded)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Status enums
// ============================================================================

macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Convert status to its storage representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            /// Parse status from its storage representation.
            ///
            /// # Errors
            ///
            /// Returns [`StoreError::Corrupt`] if the string is not a known status.
            pub fn parse(s: &str) -> Result<Self, StoreError> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(StoreError::Corrupt(format!(
                        "invalid {}: {s}",
                        stringify!($name)
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

status_enum!(
    /// Publication status of an event. Only `Published` events are purchasable.
    EventStatus {
        /// Being edited by the organizer
        Draft => "draft",
        /// Submitted for approval
        Pending => "pending",
        /// Approved but not yet on sale
        Approved => "approved",
        /// On sale
        Published => "published",
        /// Refused by an administrator
        Rejected => "rejected",
        /// Called off
        Cancelled => "cancelled",
    }
);

status_enum!(
    /// Lifecycle status of an issued ticket.
    TicketStatus {
        /// Can be used for entry or transferred
        Valid => "valid",
        /// Admitted at the gate
        Used => "used",
        /// Cancelled with its order or event
        Cancelled => "cancelled",
        /// Past its usable lifetime
        Expired => "expired",
        /// Moved to another holder
        Transferred => "transferred",
    }
);

status_enum!(
    /// Payment status of an order.
    OrderStatus {
        /// Awaiting payment
        Pending => "pending",
        /// Payment confirmed
        Paid => "paid",
        /// Payment failed, expired or order withdrawn
        Cancelled => "cancelled",
        /// Fulfilled
        Completed => "completed",
        /// Money returned
        Refunded => "refunded",
    }
);

status_enum!(
    /// Status of a ticket transfer.
    TransferStatus {
        /// Waiting for the recipient
        Pending => "pending",
        /// Recipient took ownership
        Claimed => "claimed",
        /// Withdrawn by the sender
        Cancelled => "cancelled",
        /// Claim window elapsed
        Expired => "expired",
    }
);

impl OrderStatus {
    /// Whether tickets of an order in this status may be admitted at the gate.
    #[must_use]
    pub const fn admits_entry(&self) -> bool {
        matches!(self, Self::Paid | Self::Completed)
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A read-only user record from the external identity system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID
    pub id: UserId,
    /// Display name
    pub name: Option<String>,
    /// Phone number (E.164)
    pub phone: Option<String>,
    /// Email address
    pub email: Option<String>,
}

impl User {
    /// Name to show gate staff: the display name, falling back to the phone number.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.phone.as_deref())
    }
}

/// An event that tickets are sold for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event ID
    pub id: EventId,
    /// Title shown on tickets
    pub title: String,
    /// Venue name
    pub venue: Option<String>,
    /// Publication status
    pub status: EventStatus,
    /// Start date and time
    pub date: DateTime<Utc>,
}

impl Event {
    /// Whether tickets can be bought at `now`.
    #[must_use]
    pub fn is_purchasable(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Published && self.date > now
    }
}

/// A price override applying to a ticket type while its conditions hold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTier {
    /// Tier ID
    pub id: PricingTierId,
    /// Tier name ("Early Bird")
    pub name: String,
    /// Unit price while this tier applies
    pub price: Money,
    /// Higher priority wins when several tiers are eligible
    pub priority: i32,
    /// Tier is not eligible before this instant
    pub starts_at: Option<DateTime<Utc>>,
    /// Tier is not eligible after this instant
    pub ends_at: Option<DateTime<Utc>>,
    /// Tier stops applying once this many units of the type are sold
    pub max_quantity: Option<u32>,
    /// Inactive tiers are never eligible
    pub active: bool,
}

/// A priced category of admission within one event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketType {
    /// Ticket type ID
    pub id: TicketTypeId,
    /// Owning event
    pub event_id: EventId,
    /// Name ("VIP", "General")
    pub name: String,
    /// Unit price when no tier applies
    pub base_price: Money,
    /// Total units for sale
    pub quantity: u32,
    /// Units issued so far
    pub sold: u32,
    /// Maximum units in a single order
    pub max_per_order: u32,
    /// Optional pricing tiers
    pub tiers: Vec<PricingTier>,
}

impl TicketType {
    /// Units still available for sale.
    #[must_use]
    pub const fn available(&self) -> u32 {
        self.quantity.saturating_sub(self.sold)
    }
}

/// An issued ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket ID
    pub id: TicketId,
    /// Code encoded in the QR image
    pub entry_code: EntryCode,
    /// Current holder
    pub owner_id: UserId,
    /// Event the ticket admits to
    pub event_id: EventId,
    /// Ticket type
    pub ticket_type_id: TicketTypeId,
    /// Order that created the ticket
    pub order_id: Option<OrderId>,
    /// Unit price paid
    pub price: Money,
    /// Pricing tier the unit was sold under
    pub tier_name: String,
    /// Lifecycle status
    pub status: TicketStatus,
    /// When the ticket was admitted
    pub used_at: Option<DateTime<Utc>>,
    /// When the ticket was issued
    pub created_at: DateTime<Utc>,
}

/// A ticket joined with the event, type, holder and order data shown to
/// holders and gate staff.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDetails {
    /// The ticket row
    pub ticket: Ticket,
    /// Event title
    pub event_title: String,
    /// Event start
    pub event_date: DateTime<Utc>,
    /// Event venue
    pub venue: Option<String>,
    /// Ticket type name
    pub ticket_type_name: String,
    /// Holder's display name or phone
    pub holder_name: Option<String>,
    /// Status of the creating order, if any
    pub order_status: Option<OrderStatus>,
}

/// One ticket type line of an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Ticket type bought
    pub ticket_type_id: TicketTypeId,
    /// Units bought
    pub quantity: u32,
    /// Sum of the unit prices of this line
    pub amount: Money,
}

/// A purchase: the unit of payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order ID
    pub id: OrderId,
    /// Human-readable reference
    pub order_number: String,
    /// Buyer
    pub user_id: UserId,
    /// Event bought for
    pub event_id: EventId,
    /// Lines per ticket type
    pub lines: Vec<OrderLine>,
    /// Sum of all lines
    pub subtotal: Money,
    /// Service fee
    pub service_fee: Money,
    /// Subtotal plus fee
    pub total: Money,
    /// Payment status
    pub status: OrderStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Total units across all lines.
    #[must_use]
    pub fn ticket_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }
}

/// An offer to hand a ticket to another user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketTransfer {
    /// Transfer ID
    pub id: TransferId,
    /// Ticket being moved
    pub ticket_id: TicketId,
    /// Sender (owner at initiation)
    pub from_user_id: UserId,
    /// Claimant, once claimed
    pub to_user_id: Option<UserId>,
    /// Code the recipient redeems
    pub code: TransferCode,
    /// Recipient phone
    pub recipient_phone: Option<String>,
    /// Recipient email
    pub recipient_email: Option<String>,
    /// Note from the sender
    pub message: Option<String>,
    /// Claim deadline
    pub expires_at: DateTime<Utc>,
    /// Stored status
    pub status: TransferStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Claim time
    pub claimed_at: Option<DateTime<Utc>>,
}

impl TicketTransfer {
    /// Status as of `now`: a stored `Pending` past its deadline reads `Expired`.
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>) -> TransferStatus {
        if self.status == TransferStatus::Pending && now >= self.expires_at {
            TransferStatus::Expired
        } else {
            self.status
        }
    }
}

/// A user waiting for tickets of a sold-out event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    /// Entry ID
    pub id: WaitlistEntryId,
    /// Event waited for
    pub event_id: EventId,
    /// Waiting user
    pub user_id: UserId,
    /// Preferred ticket type
    pub ticket_type_id: Option<TicketTypeId>,
    /// Contact phone
    pub phone: Option<String>,
    /// Contact email
    pub email: Option<String>,
    /// FIFO key
    pub joined_at: DateTime<Utc>,
    /// Whether this entry has been claimed for a notification
    pub notified: bool,
    /// When it was claimed
    pub notified_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn basis_points_round_half_up() {
        assert_eq!(Money::from_minor(1000).basis_points(500), Money::from_minor(50));
        assert_eq!(Money::from_minor(1010).basis_points(500), Money::from_minor(51));
        assert_eq!(Money::from_minor(1009).basis_points(500), Money::from_minor(50));
        assert_eq!(Money::from_minor(0).basis_points(500), Money::ZERO);
        assert_eq!(Money::from_minor(u64::MAX).basis_points(10_000), Money::from_minor(u64::MAX));
    }

    #[test]
    fn money_display() {
        assert_eq!(Money::from_minor(12_345).to_string(), "123.45");
        assert_eq!(Money::from_minor(7).to_string(), "0.07");
    }

    #[test]
    fn status_round_trips_through_storage_text() {
        for status in [
            TicketStatus::Valid,
            TicketStatus::Used,
            TicketStatus::Cancelled,
            TicketStatus::Expired,
            TicketStatus::Transferred,
        ] {
            assert_eq!(TicketStatus::parse(status.as_str()).ok(), Some(status));
        }
        assert!(matches!(
            TransferStatus::parse("lost"),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn statuses_serialize_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&TicketStatus::Transferred).ok().as_deref(),
            Some("\"transferred\"")
        );
        assert_eq!(
            serde_json::to_string(&Money::from_minor(1_500)).ok().as_deref(),
            Some("1500")
        );
    }

    #[test]
    fn only_paid_or_completed_orders_admit_entry() {
        assert!(OrderStatus::Paid.admits_entry());
        assert!(OrderStatus::Completed.admits_entry());
        assert!(!OrderStatus::Pending.admits_entry());
        assert!(!OrderStatus::Refunded.admits_entry());
    }

    #[test]
    fn pending_transfer_past_deadline_reads_expired() {
        let now = Utc::now();
        let transfer = TicketTransfer {
            id: TransferId::new(),
            ticket_id: TicketId::new(),
            from_user_id: UserId::new(),
            to_user_id: None,
            code: TransferCode::generate(),
            recipient_phone: Some("+251911000000".to_string()),
            recipient_email: None,
            message: None,
            expires_at: now,
            status: TransferStatus::Pending,
            created_at: now - Duration::hours(48),
            claimed_at: None,
        };
        assert_eq!(transfer.effective_status(now - Duration::seconds(1)), TransferStatus::Pending);
        assert_eq!(transfer.effective_status(now), TransferStatus::Expired);
    }

    #[test]
    fn display_name_falls_back_to_phone() {
        let user = User {
            id: UserId::new(),
            name: None,
            phone: Some("+251911111111".to_string()),
            email: None,
        };
        assert_eq!(user.display_name(), Some("+251911111111"));
    }

    #[test]
    fn purchasable_requires_published_and_future() {
        let now = Utc::now();
        let mut event = Event {
            id: EventId::new(),
            title: "Concert".to_string(),
            venue: None,
            status: EventStatus::Published,
            date: now + Duration::days(1),
        };
        assert!(event.is_purchasable(now));
        event.status = EventStatus::Approved;
        assert!(!event.is_purchasable(now));
        event.status = EventStatus::Published;
        event.date = now - Duration::minutes(1);
        assert!(!event.is_purchasable(now));
    }
}
