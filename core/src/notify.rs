//! Outbound notifications (SMS, email).
//!
//! Delivery is an external collaborator. Services call a [`Notifier`] after the
//! state change is durable and only log failures; a failed notification never
//! fails the operation that triggered it.

use crate::codes::TransferCode;
use crate::types::{EventId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Who to notify.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Registered user, if known
    pub user_id: Option<UserId>,
    /// Phone number for SMS
    pub phone: Option<String>,
    /// Email address
    pub email: Option<String>,
}

impl Recipient {
    /// Whether there is any address to deliver to.
    #[must_use]
    pub const fn has_contact(&self) -> bool {
        self.phone.is_some() || self.email.is_some()
    }
}

/// Kind of notification, for logging and metrics labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A ticket was sent to the recipient
    TransferReceived,
    /// Tickets became available for a waitlisted event
    WaitlistAvailable,
}

impl NotificationKind {
    /// Label value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TransferReceived => "transfer_received",
            Self::WaitlistAvailable => "waitlist_available",
        }
    }
}

/// A notification and its template data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A ticket was sent to the recipient
    TransferReceived {
        /// Sender's display name
        sender_name: String,
        /// Event title
        event_title: String,
        /// Code to claim the ticket with
        transfer_code: TransferCode,
        /// Note from the sender
        message: Option<String>,
        /// Claim deadline
        expires_at: DateTime<Utc>,
    },
    /// Tickets became available for a waitlisted event
    WaitlistAvailable {
        /// Event
        event_id: EventId,
        /// Event title
        event_title: String,
        /// Units that became available
        available: u32,
    },
}

impl Notification {
    /// Kind of this notification.
    #[must_use]
    pub const fn kind(&self) -> NotificationKind {
        match self {
            Self::TransferReceived { .. } => NotificationKind::TransferReceived,
            Self::WaitlistAvailable { .. } => NotificationKind::WaitlistAvailable,
        }
    }
}

/// Notification delivery failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The recipient has neither phone nor email
    #[error("Recipient has no contact details")]
    NoContact,

    /// The provider rejected or failed the delivery
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Notification dispatcher.
pub trait Notifier: Send + Sync {
    /// Deliver a notification to a recipient.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if delivery fails.
    fn notify(
        &self,
        recipient: Recipient,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>>;
}

/// Notifier that writes one structured log line per notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    /// Creates a new log notifier
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared() -> Arc<dyn Notifier> {
        Arc::new(Self::new())
    }
}

impl Notifier for LogNotifier {
    fn notify(
        &self,
        recipient: Recipient,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
        Box::pin(async move {
            if !recipient.has_contact() {
                return Err(NotifyError::NoContact);
            }
            tracing::info!(
                kind = notification.kind().as_str(),
                user_id = ?recipient.user_id,
                sms = recipient.phone.is_some(),
                email = recipient.email.is_some(),
                ?notification,
                "Notification dispatched"
            );
            Ok(())
        })
    }
}
