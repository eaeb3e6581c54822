//! In-memory `CatalogStore`.
//!
//! All state sits behind one mutex, so every trait method is a single atomic
//! step: the same linearizability the PostgreSQL store gets from transactions
//! and row locks.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use turnstile_core::StoreError;
use turnstile_core::codes::{EntryCode, TransferCode};
use turnstile_core::store::{
    CatalogStore, ClaimOutcome, ClaimRequest, CommitOutcome, EntryLookup, OrderCancellation,
    OrderSwap, PurchaseCommit, StatusSwap, StoreFuture, TicketSwap, TransferCreation, TransferSwap,
    WaitlistInsert,
};
use turnstile_core::types::{
    Event, EventId, Order, OrderId, OrderStatus, Ticket, TicketDetails, TicketId, TicketStatus,
    TicketTransfer, TicketType, TicketTypeId, TransferId, TransferStatus, User, UserId,
    WaitlistEntry,
};

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, User>,
    events: HashMap<EventId, Event>,
    ticket_types: HashMap<TicketTypeId, TicketType>,
    ticket_type_order: Vec<TicketTypeId>,
    orders: HashMap<OrderId, Order>,
    tickets: HashMap<TicketId, Ticket>,
    entry_codes: HashMap<EntryCode, TicketId>,
    retired_codes: HashMap<EntryCode, (TicketId, DateTime<Utc>)>,
    transfers: HashMap<TransferId, TicketTransfer>,
    transfer_codes: HashMap<TransferCode, TransferId>,
    // insertion order breaks joined_at ties
    waitlist: Vec<WaitlistEntry>,
    failures_to_inject: u32,
}

impl State {
    fn details(&self, ticket: &Ticket) -> Result<TicketDetails, StoreError> {
        let event = self.events.get(&ticket.event_id).ok_or_else(|| {
            StoreError::Corrupt(format!("ticket {} references missing event", ticket.id))
        })?;
        let ticket_type = self.ticket_types.get(&ticket.ticket_type_id).ok_or_else(|| {
            StoreError::Corrupt(format!("ticket {} references missing ticket type", ticket.id))
        })?;
        let holder_name = self
            .users
            .get(&ticket.owner_id)
            .and_then(User::display_name)
            .map(str::to_string);
        let order_status = ticket
            .order_id
            .and_then(|order_id| self.orders.get(&order_id))
            .map(|order| order.status);

        Ok(TicketDetails {
            ticket: ticket.clone(),
            event_title: event.title.clone(),
            event_date: event.date,
            venue: event.venue.clone(),
            ticket_type_name: ticket_type.name.clone(),
            holder_name,
            order_status,
        })
    }

    fn expire_pending(&mut self, ticket_id: Option<TicketId>, now: DateTime<Utc>) -> u64 {
        let mut expired = 0;
        for transfer in self.transfers.values_mut() {
            let in_scope = ticket_id.is_none_or(|id| transfer.ticket_id == id);
            if in_scope
                && transfer.status == TransferStatus::Pending
                && now >= transfer.expires_at
            {
                transfer.status = TransferStatus::Expired;
                expired += 1;
            }
        }
        expired
    }

    fn sorted_waitlist(&self, event_id: EventId) -> Vec<&WaitlistEntry> {
        let mut entries: Vec<&WaitlistEntry> = self
            .waitlist
            .iter()
            .filter(|entry| entry.event_id == event_id)
            .collect();
        entries.sort_by_key(|entry| entry.joined_at);
        entries
    }
}

/// Linearizable in-memory catalog for tests and local runs.
///
/// Cloning shares the underlying state.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalogStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryCatalogStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` store calls fail with [`StoreError::Unavailable`].
    pub fn inject_failures(&self, count: u32) {
        self.lock().failures_to_inject = count;
    }

    /// Number of tickets issued so far
    #[must_use]
    pub fn ticket_count(&self) -> usize {
        self.lock().tickets.len()
    }

    /// Number of orders written so far
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.lock().orders.len()
    }

    /// Stored transfer, bypassing the trait (no expiry filtering)
    #[must_use]
    pub fn transfer(&self, transfer_id: TransferId) -> Option<TicketTransfer> {
        self.lock().transfers.get(&transfer_id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` as one atomic step.
    fn with_state<T, F>(&self, f: F) -> StoreFuture<'_, T>
    where
        T: Send + 'static,
        F: FnOnce(&mut State) -> Result<T, StoreError> + Send + 'static,
    {
        let result = {
            let mut state = self.lock();
            if state.failures_to_inject > 0 {
                state.failures_to_inject -= 1;
                Err(StoreError::Unavailable("injected failure".to_string()))
            } else {
                f(&mut state)
            }
        };
        Box::pin(async move { result })
    }
}

impl CatalogStore for InMemoryCatalogStore {
    fn upsert_user(&self, user: User) -> StoreFuture<'_, ()> {
        self.with_state(move |state| {
            state.users.insert(user.id, user);
            Ok(())
        })
    }

    fn upsert_event(&self, event: Event) -> StoreFuture<'_, ()> {
        self.with_state(move |state| {
            state.events.insert(event.id, event);
            Ok(())
        })
    }

    fn upsert_ticket_type(&self, mut ticket_type: TicketType) -> StoreFuture<'_, ()> {
        self.with_state(move |state| {
            if let Some(existing) = state.ticket_types.get(&ticket_type.id) {
                ticket_type.sold = ticket_type.sold.max(existing.sold);
            } else {
                state.ticket_type_order.push(ticket_type.id);
            }
            state.ticket_types.insert(ticket_type.id, ticket_type);
            Ok(())
        })
    }

    fn get_user(&self, user_id: UserId) -> StoreFuture<'_, Option<User>> {
        self.with_state(move |state| Ok(state.users.get(&user_id).cloned()))
    }

    fn get_event(&self, event_id: EventId) -> StoreFuture<'_, Option<Event>> {
        self.with_state(move |state| Ok(state.events.get(&event_id).cloned()))
    }

    fn get_ticket_type(&self, ticket_type_id: TicketTypeId) -> StoreFuture<'_, Option<TicketType>> {
        self.with_state(move |state| Ok(state.ticket_types.get(&ticket_type_id).cloned()))
    }

    fn list_ticket_types(&self, event_id: EventId) -> StoreFuture<'_, Vec<TicketType>> {
        self.with_state(move |state| {
            Ok(state
                .ticket_type_order
                .iter()
                .filter_map(|id| state.ticket_types.get(id))
                .filter(|tt| tt.event_id == event_id)
                .cloned()
                .collect())
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        self.with_state(|_| Ok(()))
    }

    fn commit_purchase(&self, commit: PurchaseCommit) -> StoreFuture<'_, CommitOutcome> {
        self.with_state(move |state| {
            for expectation in &commit.expectations {
                let Some(tt) = state.ticket_types.get(&expectation.ticket_type_id) else {
                    return Ok(CommitOutcome::Conflict {
                        ticket_type_id: expectation.ticket_type_id,
                    });
                };
                if !expectation.admits(tt.sold, tt.quantity) {
                    return Ok(CommitOutcome::Conflict {
                        ticket_type_id: expectation.ticket_type_id,
                    });
                }
            }
            if commit.tickets.iter().any(|t| {
                state.entry_codes.contains_key(&t.entry_code)
                    || state.retired_codes.contains_key(&t.entry_code)
            }) {
                return Err(StoreError::Database("duplicate entry code".to_string()));
            }

            for expectation in &commit.expectations {
                if let Some(tt) = state.ticket_types.get_mut(&expectation.ticket_type_id) {
                    tt.sold += expectation.quantity;
                }
            }
            for ticket in commit.tickets {
                state.entry_codes.insert(ticket.entry_code.clone(), ticket.id);
                state.tickets.insert(ticket.id, ticket);
            }
            state.orders.insert(commit.order.id, commit.order);
            Ok(CommitOutcome::Committed)
        })
    }

    fn get_order(&self, order_id: OrderId) -> StoreFuture<'_, Option<Order>> {
        self.with_state(move |state| Ok(state.orders.get(&order_id).cloned()))
    }

    fn get_ticket(&self, ticket_id: TicketId) -> StoreFuture<'_, Option<TicketDetails>> {
        self.with_state(move |state| {
            state
                .tickets
                .get(&ticket_id)
                .map(|ticket| state.details(ticket))
                .transpose()
        })
    }

    fn lookup_entry_code(&self, code: EntryCode) -> StoreFuture<'_, EntryLookup> {
        self.with_state(move |state| {
            if let Some(ticket) = state
                .entry_codes
                .get(&code)
                .and_then(|id| state.tickets.get(id))
            {
                return Ok(EntryLookup::Active(Box::new(state.details(ticket)?)));
            }
            Ok(state
                .retired_codes
                .get(&code)
                .map_or(EntryLookup::Unknown, |(ticket_id, retired_at)| {
                    EntryLookup::Retired {
                        ticket_id: *ticket_id,
                        retired_at: *retired_at,
                    }
                }))
        })
    }

    fn list_tickets_for_user(&self, user_id: UserId) -> StoreFuture<'_, Vec<TicketDetails>> {
        self.with_state(move |state| {
            let mut tickets: Vec<&Ticket> = state
                .tickets
                .values()
                .filter(|ticket| ticket.owner_id == user_id)
                .collect();
            tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
            tickets.into_iter().map(|ticket| state.details(ticket)).collect()
        })
    }

    fn compare_and_set_ticket_status(
        &self,
        ticket_id: TicketId,
        expected: TicketStatus,
        new: TicketStatus,
        used_at: Option<DateTime<Utc>>,
    ) -> StoreFuture<'_, TicketSwap> {
        self.with_state(move |state| {
            let Some(ticket) = state.tickets.get_mut(&ticket_id) else {
                return Ok(StatusSwap::Missing);
            };
            if ticket.status != expected {
                return Ok(StatusSwap::Mismatch {
                    actual: ticket.status,
                });
            }
            ticket.status = new;
            if used_at.is_some() {
                ticket.used_at = used_at;
            }
            Ok(StatusSwap::Swapped(ticket.clone()))
        })
    }

    fn compare_and_set_order_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> StoreFuture<'_, OrderSwap> {
        self.with_state(move |state| {
            let Some(order) = state.orders.get_mut(&order_id) else {
                return Ok(StatusSwap::Missing);
            };
            if order.status != expected {
                return Ok(StatusSwap::Mismatch {
                    actual: order.status,
                });
            }
            order.status = new;
            Ok(StatusSwap::Swapped(order.clone()))
        })
    }

    fn cancel_order(
        &self,
        order_id: OrderId,
    ) -> StoreFuture<'_, StatusSwap<OrderCancellation, OrderStatus>> {
        self.with_state(move |state| {
            let Some(order) = state.orders.get_mut(&order_id) else {
                return Ok(StatusSwap::Missing);
            };
            if !matches!(order.status, OrderStatus::Pending | OrderStatus::Paid) {
                return Ok(StatusSwap::Mismatch {
                    actual: order.status,
                });
            }
            order.status = OrderStatus::Cancelled;
            let order = order.clone();

            let mut tickets_cancelled = 0;
            for ticket in state.tickets.values_mut() {
                if ticket.order_id == Some(order_id) && ticket.status == TicketStatus::Valid {
                    ticket.status = TicketStatus::Cancelled;
                    tickets_cancelled += 1;
                }
            }
            Ok(StatusSwap::Swapped(OrderCancellation {
                order,
                tickets_cancelled,
            }))
        })
    }

    fn cancel_event_tickets(&self, event_id: EventId) -> StoreFuture<'_, u32> {
        self.with_state(move |state| {
            let mut cancelled = 0;
            for ticket in state.tickets.values_mut() {
                if ticket.event_id == event_id && ticket.status == TicketStatus::Valid {
                    ticket.status = TicketStatus::Cancelled;
                    cancelled += 1;
                }
            }
            Ok(cancelled)
        })
    }

    fn create_transfer(
        &self,
        transfer: TicketTransfer,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, TransferCreation> {
        self.with_state(move |state| {
            let Some(ticket) = state.tickets.get(&transfer.ticket_id) else {
                return Ok(TransferCreation::TicketMissing);
            };
            if ticket.owner_id != transfer.from_user_id {
                return Ok(TransferCreation::NotOwner);
            }
            if ticket.status != TicketStatus::Valid {
                return Ok(TransferCreation::TicketNotValid(ticket.status));
            }

            state.expire_pending(Some(transfer.ticket_id), now);
            if let Some(pending) = state.transfers.values().find(|t| {
                t.ticket_id == transfer.ticket_id && t.status == TransferStatus::Pending
            }) {
                return Ok(TransferCreation::PendingExists(pending.id));
            }
            if state.transfer_codes.contains_key(&transfer.code) {
                return Err(StoreError::Database("duplicate transfer code".to_string()));
            }

            state.transfer_codes.insert(transfer.code.clone(), transfer.id);
            state.transfers.insert(transfer.id, transfer);
            Ok(TransferCreation::Created)
        })
    }

    fn get_transfer(&self, transfer_id: TransferId) -> StoreFuture<'_, Option<TicketTransfer>> {
        self.with_state(move |state| Ok(state.transfers.get(&transfer_id).cloned()))
    }

    fn find_transfer_by_code(&self, code: TransferCode) -> StoreFuture<'_, Option<TicketTransfer>> {
        self.with_state(move |state| {
            Ok(state
                .transfer_codes
                .get(&code)
                .and_then(|id| state.transfers.get(id))
                .cloned())
        })
    }

    fn claim_transfer(&self, request: ClaimRequest) -> StoreFuture<'_, ClaimOutcome> {
        self.with_state(move |state| {
            let Some(transfer) = state.transfers.get(&request.transfer_id) else {
                return Ok(ClaimOutcome::Missing);
            };
            if transfer.status != TransferStatus::Pending {
                return Ok(ClaimOutcome::TransferMismatch {
                    actual: transfer.status,
                });
            }
            if request.now >= transfer.expires_at {
                return Ok(ClaimOutcome::Expired);
            }
            let sender = transfer.from_user_id;
            let ticket_id = transfer.ticket_id;

            let Some(ticket) = state.tickets.get_mut(&ticket_id) else {
                return Ok(ClaimOutcome::Missing);
            };
            if ticket.status != TicketStatus::Valid || ticket.owner_id != sender {
                return Ok(ClaimOutcome::TicketMismatch {
                    status: ticket.status,
                });
            }
            if state.entry_codes.contains_key(&request.new_code)
                || state.retired_codes.contains_key(&request.new_code)
            {
                return Err(StoreError::Database("duplicate entry code".to_string()));
            }

            let old_code = std::mem::replace(&mut ticket.entry_code, request.new_code.clone());
            ticket.owner_id = request.claimant;
            let ticket = ticket.clone();

            state.entry_codes.remove(&old_code);
            state.entry_codes.insert(request.new_code, ticket_id);
            state.retired_codes.insert(old_code, (ticket_id, request.now));

            let Some(transfer) = state.transfers.get_mut(&request.transfer_id) else {
                return Ok(ClaimOutcome::Missing);
            };
            transfer.status = TransferStatus::Claimed;
            transfer.to_user_id = Some(request.claimant);
            transfer.claimed_at = Some(request.now);

            Ok(ClaimOutcome::Claimed {
                ticket,
                transfer: transfer.clone(),
            })
        })
    }

    fn compare_and_set_transfer_status(
        &self,
        transfer_id: TransferId,
        expected: TransferStatus,
        new: TransferStatus,
    ) -> StoreFuture<'_, TransferSwap> {
        self.with_state(move |state| {
            let Some(transfer) = state.transfers.get_mut(&transfer_id) else {
                return Ok(StatusSwap::Missing);
            };
            if transfer.status != expected {
                return Ok(StatusSwap::Mismatch {
                    actual: transfer.status,
                });
            }
            transfer.status = new;
            Ok(StatusSwap::Swapped(transfer.clone()))
        })
    }

    fn list_pending_transfers(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, Vec<TicketTransfer>> {
        self.with_state(move |state| {
            let mut pending: Vec<TicketTransfer> = state
                .transfers
                .values()
                .filter(|t| {
                    t.from_user_id == user_id
                        && t.status == TransferStatus::Pending
                        && t.expires_at > now
                })
                .cloned()
                .collect();
            pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(pending)
        })
    }

    fn list_transfer_history(&self, user_id: UserId) -> StoreFuture<'_, Vec<TicketTransfer>> {
        self.with_state(move |state| {
            let mut history: Vec<TicketTransfer> = state
                .transfers
                .values()
                .filter(|t| t.from_user_id == user_id || t.to_user_id == Some(user_id))
                .cloned()
                .collect();
            history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(history)
        })
    }

    fn expire_stale_transfers(&self, now: DateTime<Utc>) -> StoreFuture<'_, u64> {
        self.with_state(move |state| Ok(state.expire_pending(None, now)))
    }

    fn insert_waitlist_entry(&self, entry: WaitlistEntry) -> StoreFuture<'_, WaitlistInsert> {
        self.with_state(move |state| {
            let exists = state
                .waitlist
                .iter()
                .any(|e| e.event_id == entry.event_id && e.user_id == entry.user_id);
            if exists {
                return Ok(WaitlistInsert::AlreadyPresent);
            }
            state.waitlist.push(entry);
            Ok(WaitlistInsert::Inserted)
        })
    }

    fn remove_waitlist_entry(&self, event_id: EventId, user_id: UserId) -> StoreFuture<'_, bool> {
        self.with_state(move |state| {
            let before = state.waitlist.len();
            state
                .waitlist
                .retain(|e| !(e.event_id == event_id && e.user_id == user_id));
            Ok(state.waitlist.len() < before)
        })
    }

    fn get_waitlist_entry(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> StoreFuture<'_, Option<WaitlistEntry>> {
        self.with_state(move |state| {
            Ok(state
                .waitlist
                .iter()
                .find(|e| e.event_id == event_id && e.user_id == user_id)
                .cloned())
        })
    }

    fn waitlist_position(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> StoreFuture<'_, Option<u32>> {
        self.with_state(move |state| {
            Ok(state
                .sorted_waitlist(event_id)
                .iter()
                .position(|e| e.user_id == user_id)
                .and_then(|index| u32::try_from(index + 1).ok()))
        })
    }

    fn claim_waitlist_batch(
        &self,
        event_id: EventId,
        limit: u32,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, Vec<WaitlistEntry>> {
        self.with_state(move |state| {
            let chosen: Vec<_> = state
                .sorted_waitlist(event_id)
                .into_iter()
                .filter(|e| !e.notified)
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .map(|e| e.id)
                .collect();

            let mut claimed = Vec::with_capacity(chosen.len());
            for id in chosen {
                if let Some(entry) = state.waitlist.iter_mut().find(|e| e.id == id) {
                    entry.notified = true;
                    entry.notified_at = Some(now);
                    claimed.push(entry.clone());
                }
            }
            Ok(claimed)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures;
    use chrono::Duration;
    use turnstile_core::store::SoldExpectation;
    use turnstile_core::types::{Money, OrderLine};

    fn order_for(event_id: EventId, user_id: UserId, now: DateTime<Utc>) -> Order {
        Order {
            id: OrderId::new(),
            order_number: "ORD-20250101-00000000".to_string(),
            user_id,
            event_id,
            lines: Vec::<OrderLine>::new(),
            subtotal: Money::ZERO,
            service_fee: Money::ZERO,
            total: Money::ZERO,
            status: OrderStatus::Pending,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn commit_rejects_stale_sold_and_overflow() {
        let store = InMemoryCatalogStore::new();
        let now = Utc::now();
        let event = fixtures::published_event(now);
        let tt = fixtures::ticket_type(event.id, 2, 100);
        store.upsert_event(event.clone()).await.unwrap();
        store.upsert_ticket_type(tt.clone()).await.unwrap();
        let buyer = UserId::new();

        let stale = PurchaseCommit {
            order: order_for(event.id, buyer, now),
            tickets: Vec::new(),
            expectations: vec![SoldExpectation::exact(tt.id, 1, 1)],
        };
        assert_eq!(
            store.commit_purchase(stale).await.unwrap(),
            CommitOutcome::Conflict { ticket_type_id: tt.id }
        );

        let too_many = PurchaseCommit {
            order: order_for(event.id, buyer, now),
            tickets: Vec::new(),
            expectations: vec![SoldExpectation::exact(tt.id, 0, 3)],
        };
        assert!(matches!(
            store.commit_purchase(too_many).await.unwrap(),
            CommitOutcome::Conflict { .. }
        ));
        assert_eq!(store.order_count(), 0);
        assert_eq!(store.get_ticket_type(tt.id).await.unwrap().unwrap().sold, 0);
    }

    #[tokio::test]
    async fn commit_accepts_any_sold_inside_the_priced_range() {
        let store = InMemoryCatalogStore::new();
        let now = Utc::now();
        let event = fixtures::published_event(now);
        let mut tt = fixtures::ticket_type(event.id, 10, 100);
        tt.sold = 3;
        store.upsert_event(event.clone()).await.unwrap();
        store.upsert_ticket_type(tt.clone()).await.unwrap();

        let commit = PurchaseCommit {
            order: order_for(event.id, UserId::new(), now),
            tickets: Vec::new(),
            expectations: vec![SoldExpectation {
                ticket_type_id: tt.id,
                min_sold: 0,
                max_sold: 8,
                quantity: 2,
            }],
        };
        assert_eq!(
            store.commit_purchase(commit).await.unwrap(),
            CommitOutcome::Committed
        );
        assert_eq!(store.get_ticket_type(tt.id).await.unwrap().unwrap().sold, 5);
    }

    #[tokio::test]
    async fn upsert_never_lowers_sold() {
        let store = InMemoryCatalogStore::new();
        let mut tt = fixtures::ticket_type(EventId::new(), 10, 100);
        tt.sold = 4;
        store.upsert_ticket_type(tt.clone()).await.unwrap();
        tt.sold = 0;
        tt.name = "Renamed".to_string();
        store.upsert_ticket_type(tt.clone()).await.unwrap();

        let stored = store.get_ticket_type(tt.id).await.unwrap().unwrap();
        assert_eq!(stored.sold, 4);
        assert_eq!(stored.name, "Renamed");
    }

    #[tokio::test]
    async fn injected_failures_are_transient_and_counted() {
        let store = InMemoryCatalogStore::new();
        store.inject_failures(2);
        assert!(store.ping().await.unwrap_err().is_transient());
        assert!(store.ping().await.is_err());
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn waitlist_batches_never_overlap() {
        let store = InMemoryCatalogStore::new();
        let event_id = EventId::new();
        let start = Utc::now();
        for i in 0..5 {
            store
                .insert_waitlist_entry(WaitlistEntry {
                    id: turnstile_core::types::WaitlistEntryId::new(),
                    event_id,
                    user_id: UserId::new(),
                    ticket_type_id: None,
                    phone: None,
                    email: None,
                    joined_at: start + Duration::seconds(i),
                    notified: false,
                    notified_at: None,
                })
                .await
                .unwrap();
        }

        let first = store.claim_waitlist_batch(event_id, 3, start).await.unwrap();
        let second = store.claim_waitlist_batch(event_id, 3, start).await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 2);
        assert!(first.iter().all(|a| second.iter().all(|b| a.id != b.id)));
        assert!(first.windows(2).all(|w| w[0].joined_at <= w[1].joined_at));
    }
}
