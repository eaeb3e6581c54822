//! Application services and the coordinator that wires them together.
//!
//! - [`InventoryService`]: purchases, price previews, ticket reads
//! - [`EntryValidator`]: gate scanning
//! - [`TransferService`]: ticket transfers
//! - [`WaitlistService`]: event waitlists
//! - [`OrderService`]: payment hooks

mod coordinator;
mod entry;
mod inventory;
mod orders;
mod transfers;
mod waitlist;

pub use coordinator::{AppError, TicketingApp};
pub use entry::EntryValidator;
pub use inventory::InventoryService;
pub use orders::OrderService;
pub use transfers::TransferService;
pub use waitlist::{JoinWaitlist, WaitlistService};
