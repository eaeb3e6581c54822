//! Pricing tier resolution.
//!
//! A ticket type has a base price and zero or more [`PricingTier`]s. At the
//! moment of sale the eligible tier with the highest priority sets the unit
//! price. Resolution is a pure function of the tiers, the sold count and the
//! current time; nothing is cached.

use crate::types::{Money, PricingTier, TicketType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Tier name reported when no tier applies.
pub const STANDARD_TIER: &str = "Standard";

/// Result of pricing one unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Price of the unit
    pub unit_price: Money,
    /// Name of the winning tier, or [`STANDARD_TIER`]
    pub tier_name: String,
    /// End of the winning tier, if it has one
    pub tier_ends_at: Option<DateTime<Utc>>,
}

/// Whether a tier can set the price for the next unit.
#[must_use]
pub fn tier_applies(tier: &PricingTier, sold: u32, now: DateTime<Utc>) -> bool {
    tier_open(tier, now) && !tier.max_quantity.is_some_and(|cap| sold >= cap)
}

/// Active and inside its time window; the quantity cap is not considered.
fn tier_open(tier: &PricingTier, now: DateTime<Utc>) -> bool {
    tier.active
        && !tier.starts_at.is_some_and(|starts_at| now < starts_at)
        && !tier.ends_at.is_some_and(|ends_at| now > ends_at)
}

/// Resolve the unit price given a base price, tiers, the current sold count
/// and the current time.
///
/// Active tiers are tried in descending priority; ties keep declaration order.
/// The first eligible tier wins. With no eligible tier the base price applies
/// under the name [`STANDARD_TIER`].
#[must_use]
pub fn resolve_unit_price(
    base_price: Money,
    tiers: &[PricingTier],
    sold: u32,
    now: DateTime<Utc>,
) -> PriceQuote {
    let mut ordered: Vec<&PricingTier> = tiers.iter().collect();
    // stable sort keeps declaration order among equal priorities
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

    ordered
        .into_iter()
        .find(|tier| tier_applies(tier, sold, now))
        .map_or_else(
            || PriceQuote {
                unit_price: base_price,
                tier_name: STANDARD_TIER.to_string(),
                tier_ends_at: None,
            },
            |tier| PriceQuote {
                unit_price: tier.price,
                tier_name: tier.name.clone(),
                tier_ends_at: tier.ends_at,
            },
        )
}

/// Resolve the price of the next unit of a ticket type.
#[must_use]
pub fn resolve_price(ticket_type: &TicketType, now: DateTime<Utc>) -> PriceQuote {
    resolve_unit_price(ticket_type.base_price, &ticket_type.tiers, ticket_type.sold, now)
}

/// Price `quantity` consecutive units starting at sold count `sold`.
///
/// Unit `i` is priced as if `sold + i` units were already sold, so a tier's
/// quantity cap can be crossed within one order.
#[must_use]
pub fn price_units(
    ticket_type: &TicketType,
    sold: u32,
    quantity: u32,
    now: DateTime<Utc>,
) -> Vec<PriceQuote> {
    (0..quantity)
        .map(|i| {
            resolve_unit_price(
                ticket_type.base_price,
                &ticket_type.tiers,
                sold.saturating_add(i),
                now,
            )
        })
        .collect()
}

/// The `sold` values at which [`price_units`] quotes exactly what it quotes at
/// `sold`.
///
/// Unit prices only change where `sold + i` crosses the quantity cap of a tier
/// that is open at `now`. A commit priced at `sold` stays correct as long as
/// the stored counter is still inside this range when the write happens.
#[must_use]
pub fn stable_sold_range(
    ticket_type: &TicketType,
    sold: u32,
    quantity: u32,
    now: DateTime<Utc>,
) -> RangeInclusive<u32> {
    let caps = ticket_type
        .tiers
        .iter()
        .filter(|tier| tier_open(tier, now))
        .filter_map(|tier| tier.max_quantity);

    let mut low = 0;
    let mut high = u32::MAX;
    for cap in caps {
        if sold >= cap {
            low = low.max(cap);
        } else if sold.saturating_add(quantity) <= cap {
            high = high.min(cap - quantity);
        } else {
            // the order straddles this cap
            return sold..=sold;
        }
    }
    low..=high
}
