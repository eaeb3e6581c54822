//! Builders for catalog records used across test suites.

use chrono::{DateTime, Duration, Utc};
use turnstile_core::types::{
    Event, EventId, EventStatus, Money, PricingTier, PricingTierId, TicketType, TicketTypeId, User,
    UserId,
};

/// A published event starting seven days after `now`.
#[must_use]
pub fn published_event(now: DateTime<Utc>) -> Event {
    event_at(now + Duration::days(7))
}

/// A published event starting at `date`.
#[must_use]
pub fn event_at(date: DateTime<Utc>) -> Event {
    Event {
        id: EventId::new(),
        title: "Addis Jazz Night".to_string(),
        venue: Some("Millennium Hall".to_string()),
        status: EventStatus::Published,
        date,
    }
}

/// A ticket type without tiers.
#[must_use]
pub fn ticket_type(event_id: EventId, quantity: u32, base_price: u64) -> TicketType {
    TicketType {
        id: TicketTypeId::new(),
        event_id,
        name: "General".to_string(),
        base_price: Money::from_minor(base_price),
        quantity,
        sold: 0,
        max_per_order: 10,
        tiers: Vec::new(),
    }
}

/// An always-eligible active tier.
#[must_use]
pub fn tier(name: &str, price: u64, priority: i32) -> PricingTier {
    PricingTier {
        id: PricingTierId::new(),
        name: name.to_string(),
        price: Money::from_minor(price),
        priority,
        starts_at: None,
        ends_at: None,
        max_quantity: None,
        active: true,
    }
}

/// A user with a name and phone number.
#[must_use]
pub fn user(name: &str, phone: &str) -> User {
    User {
        id: UserId::new(),
        name: Some(name.to_string()),
        phone: Some(phone.to_string()),
        email: None,
    }
}
