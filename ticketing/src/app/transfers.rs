//! Ticket transfers between users.
//!
//! The sender opens a time-boxed transfer and the recipient redeems its code.
//! A claim moves ownership and replaces the entry code in one store call, so
//! the sender's copy of the QR code stops working the moment the claim lands.

use crate::config::TransferConfig;
use crate::environment::TicketingEnvironment;
use crate::metrics;
use crate::types::{TransferDirection, TransferRecipient, TransferView};
use chrono::{DateTime, Duration, Utc};
use turnstile_core::TicketingError;
use turnstile_core::codes::{EntryCode, TransferCode};
use turnstile_core::error::Result;
use turnstile_core::notify::{Notification, Recipient};
use turnstile_core::store::{ClaimOutcome, ClaimRequest, StatusSwap, TransferCreation};
use turnstile_core::types::{
    Ticket, TicketId, TicketStatus, TicketTransfer, TransferId, TransferStatus, UserId,
};

/// Sender name used when the sender has neither name nor phone on file.
const UNKNOWN_SENDER: &str = "Someone";

/// Opens, claims and cancels ticket transfers.
#[derive(Clone, Debug)]
pub struct TransferService {
    env: TicketingEnvironment,
    expiry: Duration,
}

impl TransferService {
    /// Create a new transfer service
    #[must_use]
    pub fn new(env: TicketingEnvironment, config: &TransferConfig) -> Self {
        Self {
            env,
            expiry: Duration::hours(config.expiry_hours),
        }
    }

    /// Offer a ticket to someone else and notify them.
    ///
    /// # Errors
    ///
    /// - [`TicketingError::TicketNotFound`] if the ticket does not exist
    /// - [`TicketingError::NotTicketOwner`] if the caller does not hold it
    /// - [`TicketingError::TicketNotTransferable`] unless the ticket is valid
    /// - [`TicketingError::EventPassed`] once the event has started
    /// - [`TicketingError::MissingRecipient`] without phone or email
    /// - [`TicketingError::TransferPending`] if a live transfer already exists
    #[tracing::instrument(skip(self, recipient))]
    pub async fn initiate(
        &self,
        ticket_id: TicketId,
        from_user_id: UserId,
        recipient: TransferRecipient,
    ) -> Result<TicketTransfer> {
        let now = self.env.clock.now();
        let store = &self.env.store;

        let details = self
            .env
            .retrying(|| store.get_ticket(ticket_id))
            .await?
            .ok_or(TicketingError::TicketNotFound(ticket_id))?;

        if details.ticket.owner_id != from_user_id {
            return Err(TicketingError::NotTicketOwner(ticket_id));
        }
        if details.ticket.status != TicketStatus::Valid {
            return Err(TicketingError::TicketNotTransferable {
                ticket_id,
                status: details.ticket.status,
            });
        }
        if details.event_date <= now {
            return Err(TicketingError::EventPassed(details.ticket.event_id));
        }

        let phone = non_blank(recipient.phone);
        let email = non_blank(recipient.email);
        if phone.is_none() && email.is_none() {
            return Err(TicketingError::MissingRecipient);
        }

        let transfer = TicketTransfer {
            id: TransferId::new(),
            ticket_id,
            from_user_id,
            to_user_id: None,
            code: TransferCode::generate(),
            recipient_phone: phone,
            recipient_email: email,
            message: non_blank(recipient.message),
            expires_at: now + self.expiry,
            status: TransferStatus::Pending,
            created_at: now,
            claimed_at: None,
        };

        // not retried: a repeated insert would report its own row as pending
        match store.create_transfer(transfer.clone(), now).await? {
            TransferCreation::Created => {}
            TransferCreation::PendingExists(existing) => {
                tracing::debug!(%existing, "Ticket already has a pending transfer");
                return Err(TicketingError::TransferPending(ticket_id));
            }
            TransferCreation::TicketNotValid(status) => {
                return Err(TicketingError::TicketNotTransferable { ticket_id, status });
            }
            TransferCreation::NotOwner => return Err(TicketingError::NotTicketOwner(ticket_id)),
            TransferCreation::TicketMissing => {
                return Err(TicketingError::TicketNotFound(ticket_id));
            }
        }

        metrics::record_transfer("initiated");
        tracing::info!(
            transfer_id = %transfer.id,
            expires_at = %transfer.expires_at,
            "Transfer initiated"
        );

        self.notify_recipient(&transfer, details.event_title).await;
        Ok(transfer)
    }

    async fn notify_recipient(&self, transfer: &TicketTransfer, event_title: String) {
        let store = &self.env.store;
        let sender_name = match self.env.retrying(|| store.get_user(transfer.from_user_id)).await {
            Ok(Some(user)) => user.display_name().unwrap_or(UNKNOWN_SENDER).to_string(),
            Ok(None) => UNKNOWN_SENDER.to_string(),
            Err(error) => {
                tracing::warn!(error = %error, "Could not load sender for transfer notification");
                UNKNOWN_SENDER.to_string()
            }
        };

        let recipient = Recipient {
            user_id: None,
            phone: transfer.recipient_phone.clone(),
            email: transfer.recipient_email.clone(),
        };
        let notification = Notification::TransferReceived {
            sender_name,
            event_title,
            transfer_code: transfer.code.clone(),
            message: transfer.message.clone(),
            expires_at: transfer.expires_at,
        };

        if let Err(error) = self.env.notifier.notify(recipient, notification).await {
            tracing::warn!(
                transfer_id = %transfer.id,
                error = %error,
                "Failed to notify transfer recipient"
            );
        }
    }

    /// Redeem a transfer code. The claimant becomes the holder and the ticket
    /// gets a new entry code.
    ///
    /// # Errors
    ///
    /// - [`TicketingError::TransferNotFound`] for an unknown code
    /// - [`TicketingError::TransferAlreadyClaimed`], [`TicketingError::TransferCancelled`]
    ///   for closed transfers, including claims lost to a concurrent claimant
    /// - [`TicketingError::TransferExpired`] once the deadline has passed
    /// - [`TicketingError::SelfClaim`] if the sender claims their own transfer
    /// - [`TicketingError::TicketNotTransferable`] if the ticket stopped being valid
    #[tracing::instrument(skip(self, code))]
    pub async fn claim(&self, code: &str, claimant: UserId) -> Result<Ticket> {
        let code = TransferCode::normalize(code);
        let now = self.env.clock.now();
        let store = &self.env.store;

        let transfer = self
            .env
            .retrying(|| store.find_transfer_by_code(code.clone()))
            .await?
            .ok_or(TicketingError::TransferNotFound)?;

        match transfer.effective_status(now) {
            TransferStatus::Pending => {}
            closed => return Err(closed_transfer_error(closed)),
        }
        if transfer.from_user_id == claimant {
            return Err(TicketingError::SelfClaim);
        }

        let request = ClaimRequest {
            transfer_id: transfer.id,
            claimant,
            new_code: EntryCode::generate(),
            now,
        };

        // not retried: the loser of a repeated claim would be its own winner
        match store.claim_transfer(request).await? {
            ClaimOutcome::Claimed { ticket, transfer } => {
                metrics::record_transfer("claimed");
                tracing::info!(
                    transfer_id = %transfer.id,
                    ticket_id = %ticket.id,
                    "Transfer claimed"
                );
                Ok(ticket)
            }
            ClaimOutcome::TransferMismatch { actual } => Err(closed_transfer_error(actual)),
            ClaimOutcome::Expired => Err(TicketingError::TransferExpired),
            ClaimOutcome::TicketMismatch { status } => Err(TicketingError::TicketNotTransferable {
                ticket_id: transfer.ticket_id,
                status,
            }),
            ClaimOutcome::Missing => Err(TicketingError::TransferNotFound),
        }
    }

    /// Withdraw a pending transfer.
    ///
    /// # Errors
    ///
    /// - [`TicketingError::TransferNotFound`] if it does not exist
    /// - [`TicketingError::NotTransferSender`] unless the caller sent it
    /// - the closed-transfer error of its status unless it is still pending
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, transfer_id: TransferId, caller: UserId) -> Result<TicketTransfer> {
        let store = &self.env.store;

        let transfer = self
            .env
            .retrying(|| store.get_transfer(transfer_id))
            .await?
            .ok_or(TicketingError::TransferNotFound)?;

        if transfer.from_user_id != caller {
            return Err(TicketingError::NotTransferSender(transfer_id));
        }
        match transfer.effective_status(self.env.clock.now()) {
            TransferStatus::Pending => {}
            closed => return Err(closed_transfer_error(closed)),
        }

        let swap = self
            .env
            .retrying(|| {
                store.compare_and_set_transfer_status(
                    transfer_id,
                    TransferStatus::Pending,
                    TransferStatus::Cancelled,
                )
            })
            .await?;

        match swap {
            StatusSwap::Swapped(transfer) => {
                metrics::record_transfer("cancelled");
                tracing::info!(%transfer_id, "Transfer cancelled");
                Ok(transfer)
            }
            StatusSwap::Mismatch { actual } => Err(closed_transfer_error(actual)),
            StatusSwap::Missing => Err(TicketingError::TransferNotFound),
        }
    }

    /// Outgoing transfers still waiting to be claimed, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::Storage`] on storage failure.
    #[tracing::instrument(skip(self))]
    pub async fn pending(&self, user_id: UserId) -> Result<Vec<TicketTransfer>> {
        let now = self.env.clock.now();
        let store = &self.env.store;
        Ok(self
            .env
            .retrying(|| store.list_pending_transfers(user_id, now))
            .await?)
    }

    /// Transfers sent or received by a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::Storage`] on storage failure.
    #[tracing::instrument(skip(self))]
    pub async fn history(&self, user_id: UserId) -> Result<Vec<TransferView>> {
        let now = self.env.clock.now();
        let store = &self.env.store;
        let transfers = self
            .env
            .retrying(|| store.list_transfer_history(user_id))
            .await?;

        Ok(transfers
            .into_iter()
            .map(|transfer| view(transfer, user_id, now))
            .collect())
    }

    /// Mark every overdue pending transfer `Expired`. Returns the count.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::Storage`] on storage failure.
    pub async fn expire_stale(&self) -> Result<u64> {
        let now = self.env.clock.now();
        let store = &self.env.store;
        let expired = self
            .env
            .retrying(|| store.expire_stale_transfers(now))
            .await?;
        if expired > 0 {
            metrics::record_transfers_expired(expired);
            tracing::info!(expired, "Expired stale transfers");
        }
        Ok(expired)
    }
}

fn view(transfer: TicketTransfer, viewer: UserId, now: DateTime<Utc>) -> TransferView {
    let direction = if transfer.from_user_id == viewer {
        TransferDirection::Sent
    } else {
        TransferDirection::Received
    };
    TransferView {
        effective_status: transfer.effective_status(now),
        direction,
        transfer,
    }
}

/// Error for acting on a transfer that is no longer pending.
const fn closed_transfer_error(status: TransferStatus) -> TicketingError {
    match status {
        TransferStatus::Claimed | TransferStatus::Pending => TicketingError::TransferAlreadyClaimed,
        TransferStatus::Cancelled => TicketingError::TransferCancelled,
        TransferStatus::Expired => TicketingError::TransferExpired,
    }
}

/// Treat blank strings as absent.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
