//! Event waitlists.
//!
//! When tickets free up, [`WaitlistService::notify`] claims the next waiting
//! users in join order and only then dispatches messages. Claiming marks the
//! entries notified, so a failed or repeated dispatch never notifies anyone
//! twice.

use crate::environment::TicketingEnvironment;
use crate::metrics;
use crate::types::{WaitlistNotification, WaitlistStatus};
use futures::future::join_all;
use turnstile_core::TicketingError;
use turnstile_core::error::Result;
use turnstile_core::notify::{Notification, NotifyError, Recipient};
use turnstile_core::store::WaitlistInsert;
use turnstile_core::types::{
    Event, EventId, EventStatus, TicketTypeId, UserId, WaitlistEntry, WaitlistEntryId,
};

/// Input of [`WaitlistService::join`].
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct JoinWaitlist {
    /// Preferred ticket type
    pub ticket_type_id: Option<TicketTypeId>,
    /// Contact phone, defaults to the user's
    pub phone: Option<String>,
    /// Contact email, defaults to the user's
    pub email: Option<String>,
}

/// Manages event waitlists.
#[derive(Clone, Debug)]
pub struct WaitlistService {
    env: TicketingEnvironment,
}

impl WaitlistService {
    /// Create a new waitlist service
    #[must_use]
    pub const fn new(env: TicketingEnvironment) -> Self {
        Self { env }
    }

    /// Put a user on an event's waitlist.
    ///
    /// # Errors
    ///
    /// - [`TicketingError::EventNotFound`] / [`TicketingError::NotPurchasable`]
    ///   unless the event exists and is published
    /// - [`TicketingError::TicketTypeNotFound`] / [`TicketingError::UnknownTicketType`]
    ///   for a preferred type of another event
    /// - [`TicketingError::AlreadyOnWaitlist`] if the user already joined
    #[tracing::instrument(skip(self, request))]
    pub async fn join(
        &self,
        event_id: EventId,
        user_id: UserId,
        request: JoinWaitlist,
    ) -> Result<WaitlistEntry> {
        let store = &self.env.store;
        let event = self.load_event(event_id).await?;
        if event.status != EventStatus::Published {
            return Err(TicketingError::NotPurchasable(event_id));
        }

        if let Some(ticket_type_id) = request.ticket_type_id {
            let ticket_type = self
                .env
                .retrying(|| store.get_ticket_type(ticket_type_id))
                .await?
                .ok_or(TicketingError::TicketTypeNotFound(ticket_type_id))?;
            if ticket_type.event_id != event_id {
                return Err(TicketingError::UnknownTicketType {
                    ticket_type_id,
                    event_id,
                });
            }
        }

        let user = self.env.retrying(|| store.get_user(user_id)).await?;
        let (user_phone, user_email) = user.map_or((None, None), |u| (u.phone, u.email));

        let entry = WaitlistEntry {
            id: WaitlistEntryId::new(),
            event_id,
            user_id,
            ticket_type_id: request.ticket_type_id,
            phone: non_blank(request.phone).or(user_phone),
            email: non_blank(request.email).or(user_email),
            joined_at: self.env.clock.now(),
            notified: false,
            notified_at: None,
        };

        match store.insert_waitlist_entry(entry.clone()).await? {
            WaitlistInsert::Inserted => {
                tracing::info!(entry_id = %entry.id, "Joined waitlist");
                Ok(entry)
            }
            WaitlistInsert::AlreadyPresent => Err(TicketingError::AlreadyOnWaitlist(event_id)),
        }
    }

    /// Take a user off an event's waitlist.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::WaitlistEntryNotFound`] if the user was not on it.
    #[tracing::instrument(skip(self))]
    pub async fn leave(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        let store = &self.env.store;
        if self
            .env
            .retrying(|| store.remove_waitlist_entry(event_id, user_id))
            .await?
        {
            tracing::info!("Left waitlist");
            Ok(())
        } else {
            Err(TicketingError::WaitlistEntryNotFound(event_id))
        }
    }

    /// 1-based position of a user in the waitlist.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::WaitlistEntryNotFound`] if the user is not on it.
    #[tracing::instrument(skip(self))]
    pub async fn position(&self, event_id: EventId, user_id: UserId) -> Result<u32> {
        let store = &self.env.store;
        self.env
            .retrying(|| store.waitlist_position(event_id, user_id))
            .await?
            .ok_or(TicketingError::WaitlistEntryNotFound(event_id))
    }

    /// Whether and where a user is waiting.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::Storage`] on storage failure.
    #[tracing::instrument(skip(self))]
    pub async fn status(&self, event_id: EventId, user_id: UserId) -> Result<WaitlistStatus> {
        let store = &self.env.store;
        let Some(entry) = self
            .env
            .retrying(|| store.get_waitlist_entry(event_id, user_id))
            .await?
        else {
            return Ok(WaitlistStatus {
                event_id,
                on_waitlist: false,
                position: None,
                notified: false,
                joined_at: None,
            });
        };

        let position = self
            .env
            .retrying(|| store.waitlist_position(event_id, user_id))
            .await?;

        Ok(WaitlistStatus {
            event_id,
            on_waitlist: true,
            position,
            notified: entry.notified,
            joined_at: Some(entry.joined_at),
        })
    }

    /// Claim up to `available` waiting users in join order and tell them
    /// tickets are available.
    ///
    /// Deliveries run independently; a failed one is counted and logged and
    /// the entry stays notified.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::EventNotFound`] if the event does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn notify(&self, event_id: EventId, available: u32) -> Result<WaitlistNotification> {
        let event = self.load_event(event_id).await?;
        if available == 0 {
            return Ok(WaitlistNotification::default());
        }

        let now = self.env.clock.now();
        // not retried: a repeated claim would take the next users too
        let entries = self
            .env
            .store
            .claim_waitlist_batch(event_id, available, now)
            .await?;

        let deliveries = entries.iter().map(|entry| self.dispatch(&event, entry, available));
        let outcomes = join_all(deliveries).await;

        let mut summary = WaitlistNotification {
            claimed: u32::try_from(entries.len()).unwrap_or(u32::MAX),
            entries: entries.iter().map(|entry| entry.user_id).collect(),
            ..WaitlistNotification::default()
        };
        for outcome in outcomes {
            match outcome {
                Ok(()) => summary.delivered += 1,
                Err(_) => summary.failed += 1,
            }
        }

        tracing::info!(
            claimed = summary.claimed,
            delivered = summary.delivered,
            failed = summary.failed,
            "Waitlist notified"
        );
        Ok(summary)
    }

    async fn dispatch(
        &self,
        event: &Event,
        entry: &WaitlistEntry,
        available: u32,
    ) -> std::result::Result<(), NotifyError> {
        let recipient = Recipient {
            user_id: Some(entry.user_id),
            phone: entry.phone.clone(),
            email: entry.email.clone(),
        };
        if !recipient.has_contact() {
            metrics::record_waitlist_notification("skipped");
            tracing::warn!(user_id = %entry.user_id, "Waitlist entry has no contact details");
            return Err(NotifyError::NoContact);
        }

        let notification = Notification::WaitlistAvailable {
            event_id: event.id,
            event_title: event.title.clone(),
            available,
        };
        match self.env.notifier.notify(recipient, notification).await {
            Ok(()) => {
                metrics::record_waitlist_notification("delivered");
                Ok(())
            }
            Err(error) => {
                metrics::record_waitlist_notification("failed");
                tracing::warn!(
                    user_id = %entry.user_id,
                    error = %error,
                    "Failed to notify waitlisted user"
                );
                Err(error)
            }
        }
    }

    async fn load_event(&self, event_id: EventId) -> Result<Event> {
        let store = &self.env.store;
        self.env
            .retrying(|| store.get_event(event_id))
            .await?
            .ok_or(TicketingError::EventNotFound(event_id))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
