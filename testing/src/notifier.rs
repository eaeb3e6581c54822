//! Notifier that records what it was asked to send.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use turnstile_core::notify::{Notification, NotificationKind, Notifier, NotifyError, Recipient};

/// One captured delivery attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedNotification {
    /// Addressee
    pub recipient: Recipient,
    /// Payload
    pub notification: Notification,
    /// Whether the attempt was reported as delivered
    pub delivered: bool,
}

/// Captures every notification. Deliveries to phone numbers or emails marked
/// with [`RecordingNotifier::fail_for`] are recorded and then reported as failed.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    sent: Arc<RwLock<Vec<RecordedNotification>>>,
    failing: Arc<RwLock<HashSet<String>>>,
}

impl RecordingNotifier {
    /// Create a notifier that delivers everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make deliveries to this phone number or email fail
    pub fn fail_for(&self, contact: impl Into<String>) {
        self.failing
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(contact.into());
    }

    /// All attempts so far, in call order
    #[must_use]
    pub fn sent(&self) -> Vec<RecordedNotification> {
        self.sent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Attempts of one kind
    #[must_use]
    pub fn sent_of_kind(&self, kind: NotificationKind) -> Vec<RecordedNotification> {
        self.sent()
            .into_iter()
            .filter(|record| record.notification.kind() == kind)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(
        &self,
        recipient: Recipient,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
        Box::pin(async move {
            let fails = {
                let failing = self.failing.read().unwrap_or_else(PoisonError::into_inner);
                [recipient.phone.as_ref(), recipient.email.as_ref()]
                    .into_iter()
                    .flatten()
                    .any(|contact| failing.contains(contact))
            };
            let outcome = if !recipient.has_contact() {
                Err(NotifyError::NoContact)
            } else if fails {
                Err(NotifyError::Delivery("provider rejected message".to_string()))
            } else {
                Ok(())
            };

            self.sent
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .push(RecordedNotification {
                    recipient,
                    notification,
                    delivered: outcome.is_ok(),
                });
            outcome
        })
    }
}
