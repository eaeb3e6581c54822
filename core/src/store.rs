//! Storage abstraction for the ticketing catalog.
//!
//! Every cross-request invariant (no oversell, single admission per ticket,
//! one pending transfer per ticket, exactly-once claims, exactly-once waitlist
//! notification) is enforced behind [`CatalogStore`]. Implementations must be
//! linearizable: each method is one atomic step against shared state.
//!
//! # Implementations
//!
//! - `PostgresCatalogStore` (in `turnstile-postgres`): transactions with row
//!   locks and status-guarded conditional updates
//! - `InMemoryCatalogStore` (in `turnstile-testing`): a single mutex
//!
//! # Compare-and-set
//!
//! State transitions that can race are expressed as compare-and-set calls
//! that report what they found instead of failing:
//!
//! - [`CatalogStore::commit_purchase`] returns [`CommitOutcome::Conflict`] when
//!   a `sold` counter left the range the purchase was priced for, or the
//!   increment no longer fits
//! - status changes return [`StatusSwap::Mismatch`] with the actual status

use crate::codes::{EntryCode, TransferCode};
use crate::error::StoreError;
use crate::types::{
    Event, EventId, Order, OrderId, OrderStatus, Ticket, TicketDetails, TicketId, TicketStatus,
    TicketTransfer, TicketType, TicketTypeId, TransferId, TransferStatus, User, UserId,
    WaitlistEntry,
};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`CatalogStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Result of resolving a scanned entry code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryLookup {
    /// The code belongs to a ticket
    Active(Box<TicketDetails>),
    /// The code was replaced by a transfer
    Retired {
        /// Ticket the code used to belong to
        ticket_id: TicketId,
        /// When the code was replaced
        retired_at: DateTime<Utc>,
    },
    /// The code was never issued
    Unknown,
}

/// Inventory guard for one ticket type in a purchase.
///
/// The purchase was priced at some `sold` value; its quotes remain correct for
/// every stored `sold` in `min_sold..=max_sold`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SoldExpectation {
    /// Ticket type
    pub ticket_type_id: TicketTypeId,
    /// Lowest `sold` the quoted prices hold for
    pub min_sold: u32,
    /// Highest `sold` the quoted prices hold for
    pub max_sold: u32,
    /// Units to add
    pub quantity: u32,
}

impl SoldExpectation {
    /// Guard that only accepts `sold` exactly.
    #[must_use]
    pub const fn exact(ticket_type_id: TicketTypeId, sold: u32, quantity: u32) -> Self {
        Self {
            ticket_type_id,
            min_sold: sold,
            max_sold: sold,
            quantity,
        }
    }

    /// Whether the increment may be applied to a ticket type currently at
    /// `sold` out of `capacity`.
    #[must_use]
    pub const fn admits(&self, sold: u32, capacity: u32) -> bool {
        if sold < self.min_sold || sold > self.max_sold {
            return false;
        }
        match sold.checked_add(self.quantity) {
            Some(after) => after <= capacity,
            None => false,
        }
    }
}

/// Everything a purchase writes, applied all-or-nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PurchaseCommit {
    /// The new order
    pub order: Order,
    /// One ticket per unit
    pub tickets: Vec<Ticket>,
    /// Guard and increment per ticket type
    pub expectations: Vec<SoldExpectation>,
}

/// Result of [`CatalogStore::commit_purchase`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// All writes applied
    Committed,
    /// Nothing written: `sold` left the priced range, or the increment would
    /// exceed `quantity`
    Conflict {
        /// First ticket type whose guard failed
        ticket_type_id: TicketTypeId,
    },
}

/// Result of a status compare-and-set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusSwap<T, S> {
    /// Status changed; the updated record
    Swapped(T),
    /// Status was not the expected one; nothing written
    Mismatch {
        /// Status found
        actual: S,
    },
    /// No such record
    Missing,
}

/// Ticket status compare-and-set result.
pub type TicketSwap = StatusSwap<Ticket, TicketStatus>;
/// Order status compare-and-set result.
pub type OrderSwap = StatusSwap<Order, OrderStatus>;
/// Transfer status compare-and-set result.
pub type TransferSwap = StatusSwap<TicketTransfer, TransferStatus>;

/// A cancelled order and how many of its tickets were cancelled with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderCancellation {
    /// The order, now `Cancelled`
    pub order: Order,
    /// Tickets moved from `Valid` to `Cancelled`
    pub tickets_cancelled: u32,
}

/// Result of [`CatalogStore::create_transfer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferCreation {
    /// The transfer row exists
    Created,
    /// A non-expired pending transfer already exists for the ticket
    PendingExists(TransferId),
    /// The ticket is no longer valid
    TicketNotValid(TicketStatus),
    /// The ticket changed owner
    NotOwner,
    /// The ticket does not exist
    TicketMissing,
}

/// Input of [`CatalogStore::claim_transfer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimRequest {
    /// Transfer being claimed
    pub transfer_id: TransferId,
    /// New owner
    pub claimant: UserId,
    /// Replacement entry code
    pub new_code: EntryCode,
    /// Claim time
    pub now: DateTime<Utc>,
}

/// Result of [`CatalogStore::claim_transfer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Ownership moved
    Claimed {
        /// The ticket with its new owner and code
        ticket: Ticket,
        /// The transfer, now `Claimed`
        transfer: TicketTransfer,
    },
    /// Transfer is not pending
    TransferMismatch {
        /// Status found
        actual: TransferStatus,
    },
    /// Transfer is pending but past its deadline
    Expired,
    /// Ticket is not valid or no longer owned by the sender
    TicketMismatch {
        /// Ticket status found
        status: TicketStatus,
    },
    /// Transfer or ticket does not exist
    Missing,
}

/// Result of [`CatalogStore::insert_waitlist_entry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitlistInsert {
    /// Entry added
    Inserted,
    /// The user is already on the waitlist of this event
    AlreadyPresent,
}

/// Durable storage for events, ticket types, tickets, orders, transfers,
/// waitlist entries and the read-only user directory.
///
/// # Dyn Compatibility
///
/// Methods return [`StoreFuture`] instead of `async fn` so the store can be
/// shared as `Arc<dyn CatalogStore>`.
pub trait CatalogStore: Send + Sync {
    // ------------------------------------------------------------------
    // Catalog seeding and reads
    // ------------------------------------------------------------------

    /// Insert or replace a user record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn upsert_user(&self, user: User) -> StoreFuture<'_, ()>;

    /// Insert or replace an event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn upsert_event(&self, event: Event) -> StoreFuture<'_, ()>;

    /// Insert or replace a ticket type with its tiers. An existing `sold`
    /// counter is never lowered.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn upsert_ticket_type(&self, ticket_type: TicketType) -> StoreFuture<'_, ()>;

    /// Load a user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn get_user(&self, user_id: UserId) -> StoreFuture<'_, Option<User>>;

    /// Load an event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn get_event(&self, event_id: EventId) -> StoreFuture<'_, Option<Event>>;

    /// Load a ticket type with its tiers and current `sold`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn get_ticket_type(&self, ticket_type_id: TicketTypeId) -> StoreFuture<'_, Option<TicketType>>;

    /// Load the ticket types of an event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn list_ticket_types(&self, event_id: EventId) -> StoreFuture<'_, Vec<TicketType>>;

    /// Check that the backing storage is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the storage cannot be reached.
    fn ping(&self) -> StoreFuture<'_, ()>;

    // ------------------------------------------------------------------
    // Purchases and tickets
    // ------------------------------------------------------------------

    /// Apply a purchase atomically: increment every `sold` counter, write the
    /// order and every ticket, but only if every guard in
    /// [`PurchaseCommit::expectations`] admits the counter as read under the
    /// write lock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails. A rejected guard is not an
    /// error; it is reported as [`CommitOutcome::Conflict`].
    fn commit_purchase(&self, commit: PurchaseCommit) -> StoreFuture<'_, CommitOutcome>;

    /// Load an order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn get_order(&self, order_id: OrderId) -> StoreFuture<'_, Option<Order>>;

    /// Load a ticket with its event, type, holder and order summary.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn get_ticket(&self, ticket_id: TicketId) -> StoreFuture<'_, Option<TicketDetails>>;

    /// Resolve a scanned entry code, including retired codes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn lookup_entry_code(&self, code: EntryCode) -> StoreFuture<'_, EntryLookup>;

    /// Tickets held by a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn list_tickets_for_user(&self, user_id: UserId) -> StoreFuture<'_, Vec<TicketDetails>>;

    /// Move a ticket from `expected` to `new`, stamping `used_at` when given.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn compare_and_set_ticket_status(
        &self,
        ticket_id: TicketId,
        expected: TicketStatus,
        new: TicketStatus,
        used_at: Option<DateTime<Utc>>,
    ) -> StoreFuture<'_, TicketSwap>;

    /// Move an order from `expected` to `new`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn compare_and_set_order_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> StoreFuture<'_, OrderSwap>;

    /// Cancel a `Pending` or `Paid` order and every `Valid` ticket it created.
    /// Inventory is not restored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn cancel_order(
        &self,
        order_id: OrderId,
    ) -> StoreFuture<'_, StatusSwap<OrderCancellation, OrderStatus>>;

    /// Cancel every `Valid` ticket of an event. Returns how many changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn cancel_event_tickets(&self, event_id: EventId) -> StoreFuture<'_, u32>;

    // ------------------------------------------------------------------
    // Transfers
    // ------------------------------------------------------------------

    /// Insert a pending transfer. In the same atomic step, pending rows of the
    /// ticket whose deadline passed are marked `Expired`, the ticket is checked
    /// to be `Valid` and owned by the sender, and no other pending transfer may
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn create_transfer(
        &self,
        transfer: TicketTransfer,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, TransferCreation>;

    /// Load a transfer by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn get_transfer(&self, transfer_id: TransferId) -> StoreFuture<'_, Option<TicketTransfer>>;

    /// Load a transfer by its (normalised) code.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn find_transfer_by_code(&self, code: TransferCode) -> StoreFuture<'_, Option<TicketTransfer>>;

    /// Claim a transfer: `Pending → Claimed` (guarded by the deadline), the
    /// ticket re-assigned to the claimant under `new_code` (guarded by ticket
    /// status `Valid` and owner = sender) and the old code retired.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn claim_transfer(&self, request: ClaimRequest) -> StoreFuture<'_, ClaimOutcome>;

    /// Move a transfer from `expected` to `new`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn compare_and_set_transfer_status(
        &self,
        transfer_id: TransferId,
        expected: TransferStatus,
        new: TransferStatus,
    ) -> StoreFuture<'_, TransferSwap>;

    /// Outgoing transfers of a user that are pending and not past deadline,
    /// newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn list_pending_transfers(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, Vec<TicketTransfer>>;

    /// Transfers sent or received by a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn list_transfer_history(&self, user_id: UserId) -> StoreFuture<'_, Vec<TicketTransfer>>;

    /// Mark every pending transfer past its deadline `Expired`. Returns the count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn expire_stale_transfers(&self, now: DateTime<Utc>) -> StoreFuture<'_, u64>;

    // ------------------------------------------------------------------
    // Waitlist
    // ------------------------------------------------------------------

    /// Add a waitlist entry unless the user already has one for the event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn insert_waitlist_entry(&self, entry: WaitlistEntry) -> StoreFuture<'_, WaitlistInsert>;

    /// Remove a user's entry. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn remove_waitlist_entry(&self, event_id: EventId, user_id: UserId) -> StoreFuture<'_, bool>;

    /// Load a user's entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn get_waitlist_entry(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> StoreFuture<'_, Option<WaitlistEntry>>;

    /// 1-based FIFO position of a user's entry among all entries of the event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn waitlist_position(&self, event_id: EventId, user_id: UserId) -> StoreFuture<'_, Option<u32>>;

    /// Claim up to `limit` not-yet-notified entries in `joined_at` order,
    /// marking them notified at `now`. Concurrent callers never claim the same
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn claim_waitlist_batch(
        &self,
        event_id: EventId,
        limit: u32,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, Vec<WaitlistEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_admits_only_inside_range_and_capacity() {
        let guard = SoldExpectation {
            ticket_type_id: TicketTypeId::new(),
            min_sold: 4,
            max_sold: 8,
            quantity: 2,
        };
        assert!(!guard.admits(3, 100));
        assert!(guard.admits(4, 100));
        assert!(guard.admits(8, 10));
        assert!(!guard.admits(8, 9), "increment past capacity");
        assert!(!guard.admits(9, 100));

        let exact = SoldExpectation::exact(guard.ticket_type_id, u32::MAX, 1);
        assert!(!exact.admits(u32::MAX, u32::MAX));
    }
}
