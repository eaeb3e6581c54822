//! Ticketing services - inventory, gate validation and transfers
//!
//! This crate puts the Turnstile core to work:
//!
//! - **Inventory**: concurrent purchases that never oversell, priced per unit
//!   by the tier rules at the moment of sale
//! - **Entry**: gate scans with duplicate-scan suppression and a single
//!   admission per ticket, however many scanners race
//! - **Transfers**: time-boxed claim codes that move a ticket and replace its
//!   entry code in one step
//! - **Waitlist**: first-come notification of waiting users, each exactly once
//! - **Orders**: payment hooks that confirm or cancel orders and their tickets
//!
//! # Architecture
//!
//! ```text
//!   HTTP (axum)          ┌──────────────────────────────────────────┐
//!  ─────────────────────▶│ TicketingApp                             │
//!                        │  Inventory │ Entry │ Transfer │ Waitlist │
//!                        └──────────────────────┬───────────────────┘
//!                                               │ TicketingEnvironment
//!                      ┌───────────┬────────────┼───────────┐
//!                      ▼           ▼            ▼           ▼
//!                    Clock   CatalogStore   Notifier   RetryPolicy
//!                           (Postgres or
//!                            in-memory)
//! ```
//!
//! Every cross-request invariant is enforced by the [`CatalogStore`]
//! implementation as a compare-and-set; the services hold no global lock.
//!
//! [`CatalogStore`]: turnstile_core::store::CatalogStore

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod app;
pub mod config;
pub mod environment;
pub mod metrics;
pub mod server;
pub mod types;

pub use app::TicketingApp;
pub use config::Config;
pub use environment::TicketingEnvironment;
pub use types::*;
