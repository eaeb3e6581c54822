//! API endpoints for the ticketing system.
//!
//! This module contains all HTTP API handlers organized by domain:
//! - Purchases: buying tickets and price previews
//! - Tickets: the caller's tickets and gate scanning
//! - Transfers: offering and claiming tickets
//! - Waitlist: joining, leaving and notifying
//! - Orders: payment hooks

pub mod error;
pub mod extract;
pub mod orders;
pub mod purchases;
pub mod tickets;
pub mod transfers;
pub mod waitlist;

pub use error::ApiError;
pub use extract::{Caller, USER_ID_HEADER};
