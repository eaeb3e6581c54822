//! Error taxonomy for ticketing operations.
//!
//! Every [`TicketingError`] variant maps to exactly one [`ErrorKind`]. Callers
//! branch on the kind (the HTTP layer maps kinds to status codes) and use the
//! variant for the message.

use crate::types::{EventId, OrderId, OrderStatus, TicketId, TicketStatus, TicketTypeId, TransferId};
use thiserror::Error;

/// Coarse classification of a [`TicketingError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The referenced entity does not exist (or is not visible to the caller)
    NotFound,
    /// The caller is not allowed to act on the entity
    Forbidden,
    /// The request lost against concurrent state (stock, pending transfer)
    Conflict,
    /// The entity is in a state that does not allow the operation
    InvalidState,
    /// A time window has closed
    OutOfWindow,
    /// The request itself is malformed
    Validation,
    /// Storage failed; the request may be retried
    Storage,
}

impl ErrorKind {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Forbidden => "FORBIDDEN",
            Self::Conflict => "CONFLICT",
            Self::InvalidState => "INVALID_STATE",
            Self::OutOfWindow => "OUT_OF_WINDOW",
            Self::Validation => "VALIDATION_ERROR",
            Self::Storage => "STORAGE_UNAVAILABLE",
        }
    }
}

/// Failures of the storage layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Connection lost, pool exhausted, serialization failure or deadlock.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Any other database error.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be mapped back to a domain value.
    #[error("Corrupt data: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether retrying the same operation can succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Errors returned by ticketing operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketingError {
    /// Event does not exist
    #[error("Event {0} not found")]
    EventNotFound(EventId),

    /// Ticket type does not exist
    #[error("Ticket type {0} not found")]
    TicketTypeNotFound(TicketTypeId),

    /// Ticket type does not belong to the event being purchased
    #[error("Ticket type {ticket_type_id} does not belong to event {event_id}")]
    UnknownTicketType {
        /// Requested ticket type
        ticket_type_id: TicketTypeId,
        /// Event of the purchase
        event_id: EventId,
    },

    /// Ticket does not exist or is not visible to the caller
    #[error("Ticket {0} not found")]
    TicketNotFound(TicketId),

    /// Order does not exist
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    /// No transfer with that id or code
    #[error("Transfer not found")]
    TransferNotFound,

    /// The user is not on the waitlist
    #[error("Not on the waitlist for event {0}")]
    WaitlistEntryNotFound(EventId),

    /// Caller does not own the ticket
    #[error("You do not own ticket {0}")]
    NotTicketOwner(TicketId),

    /// Caller did not send the transfer
    #[error("Only the sender can cancel transfer {0}")]
    NotTransferSender(TransferId),

    /// Not enough units left
    #[error("Only {available} tickets available for {ticket_type}")]
    InsufficientInventory {
        /// Ticket type name
        ticket_type: String,
        /// Units remaining when the request was evaluated
        available: u32,
    },

    /// The ticket already has a pending transfer
    #[error("Ticket {0} already has a pending transfer")]
    TransferPending(TicketId),

    /// The user already joined the waitlist
    #[error("Already on the waitlist for event {0}")]
    AlreadyOnWaitlist(EventId),

    /// Commit kept losing against concurrent purchases
    #[error("Purchase could not be committed after {attempts} attempts")]
    Contention {
        /// Attempts made
        attempts: u32,
    },

    /// Event is not published or has already started
    #[error("Event {0} is not available for purchase")]
    NotPurchasable(EventId),

    /// Ticket is not valid for transfer
    #[error("Ticket {ticket_id} is {status} and cannot be transferred")]
    TicketNotTransferable {
        /// Ticket
        ticket_id: TicketId,
        /// Its current status
        status: TicketStatus,
    },

    /// Transfer was already claimed
    #[error("Transfer has already been claimed")]
    TransferAlreadyClaimed,

    /// Transfer was cancelled by the sender
    #[error("Transfer has been cancelled")]
    TransferCancelled,

    /// Sender tried to claim their own transfer
    #[error("You cannot claim your own transfer")]
    SelfClaim,

    /// Order cannot be cancelled in its current status
    #[error("Order {order_id} is {status} and cannot be cancelled")]
    OrderNotCancellable {
        /// Order
        order_id: OrderId,
        /// Its current status
        status: OrderStatus,
    },

    /// Order cannot be marked paid in its current status
    #[error("Order {order_id} is {status} and cannot be marked paid")]
    OrderNotPayable {
        /// Order
        order_id: OrderId,
        /// Its current status
        status: OrderStatus,
    },

    /// Event date has passed
    #[error("Event {0} has already taken place")]
    EventPassed(EventId),

    /// Transfer claim window elapsed
    #[error("Transfer has expired")]
    TransferExpired,

    /// Purchase selection is empty
    #[error("At least one ticket type must be selected")]
    EmptySelection,

    /// Quantity is zero
    #[error("Quantity for ticket type {0} must be at least 1")]
    InvalidQuantity(TicketTypeId),

    /// Same ticket type listed twice
    #[error("Ticket type {0} is listed more than once")]
    DuplicateTicketType(TicketTypeId),

    /// Transfer without phone or email
    #[error("Recipient phone or email is required")]
    MissingRecipient,

    /// Quantity above the per-order cap
    #[error("Maximum {max_per_order} tickets per order for {ticket_type}")]
    OrderLimitExceeded {
        /// Ticket type name
        ticket_type: String,
        /// Cap
        max_per_order: u32,
    },

    /// Storage failure
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl TicketingError {
    /// Taxonomy kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EventNotFound(_)
            | Self::TicketTypeNotFound(_)
            | Self::UnknownTicketType { .. }
            | Self::TicketNotFound(_)
            | Self::OrderNotFound(_)
            | Self::TransferNotFound
            | Self::WaitlistEntryNotFound(_) => ErrorKind::NotFound,
            Self::NotTicketOwner(_) | Self::NotTransferSender(_) => ErrorKind::Forbidden,
            Self::InsufficientInventory { .. }
            | Self::TransferPending(_)
            | Self::AlreadyOnWaitlist(_)
            | Self::Contention { .. } => ErrorKind::Conflict,
            Self::NotPurchasable(_)
            | Self::TicketNotTransferable { .. }
            | Self::TransferAlreadyClaimed
            | Self::TransferCancelled
            | Self::SelfClaim
            | Self::OrderNotCancellable { .. }
            | Self::OrderNotPayable { .. } => ErrorKind::InvalidState,
            Self::EventPassed(_) | Self::TransferExpired => ErrorKind::OutOfWindow,
            Self::EmptySelection
            | Self::InvalidQuantity(_)
            | Self::DuplicateTicketType(_)
            | Self::MissingRecipient
            | Self::OrderLimitExceeded { .. } => ErrorKind::Validation,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Whether the caller may retry the same request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_transient(),
            Self::Contention { .. } => true,
            _ => false,
        }
    }
}

/// Result alias for ticketing operations.
pub type Result<T> = std::result::Result<T, TicketingError>;
