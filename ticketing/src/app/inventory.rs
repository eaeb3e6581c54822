//! Inventory ledger and ticket issuer.
//!
//! A purchase is validated, priced and turned into one [`PurchaseCommit`]:
//! the order, one ticket per unit and, per ticket type, the range of `sold`
//! values the quoted prices hold for. The store applies the commit only if
//! every counter, read under its write lock, is still in range and has room;
//! on a conflict the purchase is re-read, re-validated and re-priced.

use crate::config::InventoryConfig;
use crate::environment::TicketingEnvironment;
use crate::metrics;
use crate::types::{PurchaseLine, PurchaseReceipt, PurchaseRequest, TicketTypePrice};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Instant;
use turnstile_core::TicketingError;
use turnstile_core::codes::{EntryCode, generate_order_number};
use turnstile_core::error::Result;
use turnstile_core::pricing::{price_units, resolve_price, stable_sold_range};
use turnstile_core::store::{CommitOutcome, PurchaseCommit, SoldExpectation};
use turnstile_core::types::{
    Event, EventId, Money, Order, OrderId, OrderLine, OrderStatus, Ticket, TicketDetails, TicketId,
    TicketStatus, TicketType, TicketTypeId, UserId,
};

/// Sells tickets without overselling and serves ticket reads.
#[derive(Clone, Debug)]
pub struct InventoryService {
    env: TicketingEnvironment,
    service_fee_bps: u32,
    max_commit_attempts: u32,
}

/// A validated line: the ticket type snapshot and the units requested.
struct Selection {
    ticket_type: TicketType,
    quantity: u32,
}

impl InventoryService {
    /// Create a new inventory service
    #[must_use]
    pub fn new(env: TicketingEnvironment, config: &InventoryConfig) -> Self {
        Self {
            env,
            service_fee_bps: config.service_fee_bps,
            max_commit_attempts: config.max_commit_attempts.max(1),
        }
    }

    /// Buy tickets for an event.
    ///
    /// # Errors
    ///
    /// - [`TicketingError::EmptySelection`], [`TicketingError::InvalidQuantity`],
    ///   [`TicketingError::DuplicateTicketType`] for malformed selections
    /// - [`TicketingError::EventNotFound`] / [`TicketingError::NotPurchasable`]
    /// - [`TicketingError::UnknownTicketType`] if a type belongs to another event
    /// - [`TicketingError::OrderLimitExceeded`] above the per-order cap
    /// - [`TicketingError::InsufficientInventory`] when stock runs out
    /// - [`TicketingError::Contention`] after `max_commit_attempts` lost commits
    /// - [`TicketingError::Storage`] on storage failure
    #[tracing::instrument(
        skip(self, request),
        fields(event_id = %request.event_id, user_id = %request.user_id)
    )]
    pub async fn purchase(&self, request: PurchaseRequest) -> Result<PurchaseReceipt> {
        let started = Instant::now();

        match self.purchase_with_retry(&request).await {
            Ok((receipt, attempts)) => {
                metrics::record_purchase_committed(
                    receipt.order.ticket_count(),
                    receipt.order.total.minor(),
                    attempts,
                    started.elapsed(),
                );
                tracing::info!(
                    order_id = %receipt.order.id,
                    order_number = %receipt.order.order_number,
                    tickets = receipt.tickets.len(),
                    total = %receipt.order.total,
                    attempts,
                    "Purchase committed"
                );
                Ok(receipt)
            }
            Err(error) => {
                metrics::record_purchase_rejected(error.kind().as_str());
                tracing::debug!(error = %error, "Purchase rejected");
                Err(error)
            }
        }
    }

    async fn purchase_with_retry(
        &self,
        request: &PurchaseRequest,
    ) -> Result<(PurchaseReceipt, u32)> {
        validate_selection(&request.lines)?;

        for attempt in 1..=self.max_commit_attempts {
            let now = self.env.clock.now();
            let selections = self.load_and_validate(request, now).await?;
            let commit = self.build_commit(request, &selections, now);
            let order_id = commit.order.id;

            let store = &self.env.store;
            let outcome = self
                .env
                .retrying(|| store.commit_purchase(commit.clone()))
                .await?;

            match outcome {
                CommitOutcome::Committed => {
                    return Ok((
                        PurchaseReceipt {
                            order: commit.order,
                            tickets: commit.tickets,
                        },
                        attempt,
                    ));
                }
                CommitOutcome::Conflict { ticket_type_id } => {
                    // a retried commit may have landed before its transport failed
                    if self.env.retrying(|| store.get_order(order_id)).await?.is_some() {
                        return Ok((
                            PurchaseReceipt {
                                order: commit.order,
                                tickets: commit.tickets,
                            },
                            attempt,
                        ));
                    }
                    metrics::record_purchase_conflict();
                    tracing::debug!(
                        attempt,
                        %ticket_type_id,
                        "Quoted price or stock no longer holds, retrying purchase"
                    );
                    tokio::task::yield_now().await;
                }
            }
        }

        Err(TicketingError::Contention {
            attempts: self.max_commit_attempts,
        })
    }

    /// Business validation in order: event, ownership of each type, per-order
    /// cap, remaining stock.
    async fn load_and_validate(
        &self,
        request: &PurchaseRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<Selection>> {
        let event = self.load_event(request.event_id).await?;
        if !event.is_purchasable(now) {
            return Err(TicketingError::NotPurchasable(event.id));
        }

        let mut ticket_types = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let ticket_type = self
                .load_ticket_type(line.ticket_type_id)
                .await?
                .filter(|tt| tt.event_id == event.id)
                .ok_or(TicketingError::UnknownTicketType {
                    ticket_type_id: line.ticket_type_id,
                    event_id: event.id,
                })?;
            ticket_types.push((ticket_type, line.quantity));
        }

        for (ticket_type, quantity) in &ticket_types {
            if *quantity > ticket_type.max_per_order {
                return Err(TicketingError::OrderLimitExceeded {
                    ticket_type: ticket_type.name.clone(),
                    max_per_order: ticket_type.max_per_order,
                });
            }
        }

        for (ticket_type, quantity) in &ticket_types {
            if *quantity > ticket_type.available() {
                return Err(TicketingError::InsufficientInventory {
                    ticket_type: ticket_type.name.clone(),
                    available: ticket_type.available(),
                });
            }
        }

        Ok(ticket_types
            .into_iter()
            .map(|(ticket_type, quantity)| Selection {
                ticket_type,
                quantity,
            })
            .collect())
    }

    fn build_commit(
        &self,
        request: &PurchaseRequest,
        selections: &[Selection],
        now: DateTime<Utc>,
    ) -> PurchaseCommit {
        let order_id = OrderId::new();
        let mut lines = Vec::with_capacity(selections.len());
        let mut expectations = Vec::with_capacity(selections.len());
        let mut tickets = Vec::new();
        let mut subtotal = Money::ZERO;

        for selection in selections {
            let ticket_type = &selection.ticket_type;
            let mut amount = Money::ZERO;

            for quote in price_units(ticket_type, ticket_type.sold, selection.quantity, now) {
                amount = saturating_add(amount, quote.unit_price);
                tickets.push(Ticket {
                    id: TicketId::new(),
                    entry_code: EntryCode::generate(),
                    owner_id: request.user_id,
                    event_id: request.event_id,
                    ticket_type_id: ticket_type.id,
                    order_id: Some(order_id),
                    price: quote.unit_price,
                    tier_name: quote.tier_name,
                    status: TicketStatus::Valid,
                    used_at: None,
                    created_at: now,
                });
            }

            subtotal = saturating_add(subtotal, amount);
            lines.push(OrderLine {
                ticket_type_id: ticket_type.id,
                quantity: selection.quantity,
                amount,
            });
            let priced_for =
                stable_sold_range(ticket_type, ticket_type.sold, selection.quantity, now);
            expectations.push(SoldExpectation {
                ticket_type_id: ticket_type.id,
                min_sold: *priced_for.start(),
                max_sold: *priced_for.end(),
                quantity: selection.quantity,
            });
        }

        let service_fee = subtotal.basis_points(self.service_fee_bps);
        let order = Order {
            id: order_id,
            order_number: generate_order_number(now),
            user_id: request.user_id,
            event_id: request.event_id,
            lines,
            subtotal,
            service_fee,
            total: saturating_add(subtotal, service_fee),
            status: OrderStatus::Pending,
            created_at: now,
        };

        PurchaseCommit {
            order,
            tickets,
            expectations,
        }
    }

    /// Current price of a ticket type without buying.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::TicketTypeNotFound`] or
    /// [`TicketingError::EventNotFound`] if either is missing.
    #[tracing::instrument(skip(self))]
    pub async fn ticket_type_price(&self, ticket_type_id: TicketTypeId) -> Result<TicketTypePrice> {
        let ticket_type = self
            .load_ticket_type(ticket_type_id)
            .await?
            .ok_or(TicketingError::TicketTypeNotFound(ticket_type_id))?;
        let event = self.load_event(ticket_type.event_id).await?;
        let quote = resolve_price(&ticket_type, self.env.clock.now());

        Ok(TicketTypePrice {
            ticket_type_id: ticket_type.id,
            name: ticket_type.name.clone(),
            event_id: event.id,
            event_status: event.status,
            base_price: ticket_type.base_price,
            current_price: quote.unit_price,
            tier_name: quote.tier_name,
            tier_ends_at: quote.tier_ends_at,
            available: ticket_type.available(),
        })
    }

    /// A ticket with its event and type summary, visible only to its holder.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::TicketNotFound`] if the ticket does not exist
    /// or belongs to someone else.
    #[tracing::instrument(skip(self))]
    pub async fn get_ticket(&self, ticket_id: TicketId, caller: UserId) -> Result<TicketDetails> {
        let store = &self.env.store;
        self.env
            .retrying(|| store.get_ticket(ticket_id))
            .await?
            .filter(|details| details.ticket.owner_id == caller)
            .ok_or(TicketingError::TicketNotFound(ticket_id))
    }

    /// Tickets held by a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::Storage`] on storage failure.
    #[tracing::instrument(skip(self))]
    pub async fn list_user_tickets(&self, user_id: UserId) -> Result<Vec<TicketDetails>> {
        let store = &self.env.store;
        Ok(self
            .env
            .retrying(|| store.list_tickets_for_user(user_id))
            .await?)
    }

    async fn load_event(&self, event_id: EventId) -> Result<Event> {
        let store = &self.env.store;
        self.env
            .retrying(|| store.get_event(event_id))
            .await?
            .ok_or(TicketingError::EventNotFound(event_id))
    }

    async fn load_ticket_type(&self, ticket_type_id: TicketTypeId) -> Result<Option<TicketType>> {
        let store = &self.env.store;
        Ok(self
            .env
            .retrying(|| store.get_ticket_type(ticket_type_id))
            .await?)
    }
}

/// Input validation: non-empty, every quantity at least 1, no type twice.
fn validate_selection(lines: &[PurchaseLine]) -> Result<()> {
    if lines.is_empty() {
        return Err(TicketingError::EmptySelection);
    }

    let mut seen = HashSet::with_capacity(lines.len());
    for line in lines {
        if line.quantity == 0 {
            return Err(TicketingError::InvalidQuantity(line.ticket_type_id));
        }
        if !seen.insert(line.ticket_type_id) {
            return Err(TicketingError::DuplicateTicketType(line.ticket_type_id));
        }
    }
    Ok(())
}

fn saturating_add(a: Money, b: Money) -> Money {
    Money::from_minor(a.minor().saturating_add(b.minor()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: u32) -> PurchaseLine {
        PurchaseLine {
            ticket_type_id: TicketTypeId::new(),
            quantity,
        }
    }

    #[test]
    fn test_empty_selection_is_rejected() {
        assert_eq!(validate_selection(&[]), Err(TicketingError::EmptySelection));
    }

    #[test]
    fn test_zero_quantity_is_rejected() {
        let zero = line(0);
        assert_eq!(
            validate_selection(&[line(1), zero]),
            Err(TicketingError::InvalidQuantity(zero.ticket_type_id))
        );
    }

    #[test]
    fn test_duplicate_ticket_type_is_rejected() {
        let first = line(1);
        let again = PurchaseLine {
            quantity: 2,
            ..first
        };
        assert_eq!(
            validate_selection(&[first, again]),
            Err(TicketingError::DuplicateTicketType(first.ticket_type_id))
        );
    }
}
