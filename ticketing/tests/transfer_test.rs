//! Ticket transfer tests: initiation rules, exactly-once claims, expiry and
//! cancellation.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use chrono::Duration;
use common::Harness;
use std::sync::Arc;
use ticketing::{ScanReason, TransferDirection, TransferRecipient};
use turnstile_core::notify::{Notification, NotificationKind};
use turnstile_core::store::CatalogStore;
use turnstile_core::types::{TicketId, TicketStatus, TransferStatus, User};
use turnstile_core::{ErrorKind, TicketingError};

fn to_phone(user: &User) -> TransferRecipient {
    TransferRecipient {
        phone: user.phone.clone(),
        email: None,
        message: Some("Enjoy the show".to_string()),
    }
}

/// Seed an event, two users and one paid ticket held by the sender.
async fn setup(harness: &Harness) -> (User, User, TicketId) {
    let (_event, ticket_type) = harness.seed_event(10, 2_500).await;
    let sender = harness.seed_user("Marta", "+251911100001").await;
    let recipient = harness.seed_user("Elias", "+251911100002").await;
    let receipt = harness.buy_paid(&sender, &ticket_type, 1).await;
    (sender, recipient, receipt.tickets[0].id)
}

#[tokio::test]
async fn test_initiate_notifies_recipient() {
    let harness = Harness::new();
    let (sender, recipient, ticket_id) = setup(&harness).await;

    let transfer = harness
        .app
        .transfers
        .initiate(ticket_id, sender.id, to_phone(&recipient))
        .await
        .unwrap();

    assert_eq!(transfer.status, TransferStatus::Pending);
    assert_eq!(transfer.expires_at - transfer.created_at, Duration::hours(48));

    let sent = harness.notifier.sent_of_kind(NotificationKind::TransferReceived);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient.phone, recipient.phone);
    match &sent[0].notification {
        Notification::TransferReceived {
            sender_name,
            event_title,
            transfer_code,
            message,
            ..
        } => {
            assert_eq!(sender_name, "Marta");
            assert_eq!(event_title, "Addis Jazz Night");
            assert_eq!(transfer_code, &transfer.code);
            assert_eq!(message.as_deref(), Some("Enjoy the show"));
        }
        other => panic!("unexpected notification: {other:?}"),
    }
}

#[tokio::test]
async fn test_initiate_rules() {
    let harness = Harness::new();
    let (sender, recipient, ticket_id) = setup(&harness).await;
    let transfers = &harness.app.transfers;

    let not_owner = transfers
        .initiate(ticket_id, recipient.id, to_phone(&sender))
        .await
        .unwrap_err();
    assert_eq!(not_owner, TicketingError::NotTicketOwner(ticket_id));
    assert_eq!(not_owner.kind(), ErrorKind::Forbidden);

    let blank = TransferRecipient {
        phone: Some("   ".to_string()),
        email: Some(String::new()),
        message: None,
    };
    let missing = transfers.initiate(ticket_id, sender.id, blank).await.unwrap_err();
    assert_eq!(missing, TicketingError::MissingRecipient);
    assert_eq!(missing.kind(), ErrorKind::Validation);

    let unknown = TicketId::new();
    assert_eq!(
        transfers
            .initiate(unknown, sender.id, to_phone(&recipient))
            .await
            .unwrap_err(),
        TicketingError::TicketNotFound(unknown)
    );

    transfers
        .initiate(ticket_id, sender.id, to_phone(&recipient))
        .await
        .unwrap();
    let duplicate = transfers
        .initiate(ticket_id, sender.id, to_phone(&recipient))
        .await
        .unwrap_err();
    assert_eq!(duplicate, TicketingError::TransferPending(ticket_id));
    assert_eq!(duplicate.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_used_ticket_cannot_be_transferred() {
    let harness = Harness::new();
    let (sender, recipient, ticket_id) = setup(&harness).await;
    harness
        .store
        .compare_and_set_ticket_status(ticket_id, TicketStatus::Valid, TicketStatus::Used, None)
        .await
        .unwrap();

    let error = harness
        .app
        .transfers
        .initiate(ticket_id, sender.id, to_phone(&recipient))
        .await
        .unwrap_err();
    assert_eq!(
        error,
        TicketingError::TicketNotTransferable {
            ticket_id,
            status: TicketStatus::Used,
        }
    );
    assert_eq!(error.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_transfer_after_event_start_is_out_of_window() {
    let harness = Harness::new();
    let (sender, recipient, ticket_id) = setup(&harness).await;
    let event_date = harness.store.get_ticket(ticket_id).await.unwrap().unwrap().event_date;
    harness.clock.set(event_date);

    let error = harness
        .app
        .transfers
        .initiate(ticket_id, sender.id, to_phone(&recipient))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::OutOfWindow);
}

#[tokio::test]
async fn test_claim_moves_ownership_and_rotates_code() {
    let harness = Harness::new();
    let (sender, recipient, ticket_id) = setup(&harness).await;
    let old_code = harness.store.get_ticket(ticket_id).await.unwrap().unwrap().ticket.entry_code;

    let transfer = harness
        .app
        .transfers
        .initiate(ticket_id, sender.id, to_phone(&recipient))
        .await
        .unwrap();

    // codes are typed by hand: case and whitespace do not matter
    let typed = format!("  {} ", transfer.code.as_str().to_lowercase());
    let ticket = harness.app.transfers.claim(&typed, recipient.id).await.unwrap();

    assert_eq!(ticket.owner_id, recipient.id);
    assert_eq!(ticket.status, TicketStatus::Valid);
    assert_ne!(ticket.entry_code, old_code);

    let stored = harness.store.transfer(transfer.id).unwrap();
    assert_eq!(stored.status, TransferStatus::Claimed);
    assert_eq!(stored.to_user_id, Some(recipient.id));
    assert!(stored.claimed_at.is_some());

    let senders_tickets = harness.app.inventory.list_user_tickets(sender.id).await.unwrap();
    assert!(senders_tickets.is_empty());
    let recipients_tickets = harness.app.inventory.list_user_tickets(recipient.id).await.unwrap();
    assert_eq!(recipients_tickets.len(), 1);

    let again = harness
        .app
        .transfers
        .claim(transfer.code.as_str(), recipient.id)
        .await
        .unwrap_err();
    assert_eq!(again, TicketingError::TransferAlreadyClaimed);
}

#[tokio::test]
async fn test_self_claim_is_rejected() {
    let harness = Harness::new();
    let (sender, recipient, ticket_id) = setup(&harness).await;
    let transfer = harness
        .app
        .transfers
        .initiate(ticket_id, sender.id, to_phone(&recipient))
        .await
        .unwrap();

    let error = harness.app.transfers.claim(transfer.code.as_str(), sender.id).await.unwrap_err();
    assert_eq!(error, TicketingError::SelfClaim);
}

#[tokio::test]
async fn test_unknown_code_is_not_found() {
    let harness = Harness::new();
    let (_sender, recipient, _ticket_id) = setup(&harness).await;
    let error = harness.app.transfers.claim("0000000000", recipient.id).await.unwrap_err();
    assert_eq!(error, TicketingError::TransferNotFound);
}

/// Test: N users racing to claim the same transfer code.
///
/// Exactly one claim succeeds and the old entry code stays dead.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_claims_succeed_exactly_once() {
    println!("🧪 Concurrency Test: 12 claimants, 1 transfer");

    let harness = Arc::new(Harness::new());
    let (sender, recipient, ticket_id) = setup(&harness).await;
    let details = harness.store.get_ticket(ticket_id).await.unwrap().unwrap();
    let old_code = details.ticket.entry_code.as_str().to_string();

    let transfer = harness
        .app
        .transfers
        .initiate(ticket_id, sender.id, to_phone(&recipient))
        .await
        .unwrap();

    let mut claimants = Vec::new();
    for i in 0..12 {
        let claimant = harness
            .seed_user(&format!("Claimant {i}"), &format!("+2519122{i:05}"))
            .await;
        claimants.push(claimant);
    }

    let mut handles = Vec::new();
    for claimant in claimants {
        let harness = Arc::clone(&harness);
        let code = transfer.code.as_str().to_string();
        handles.push(tokio::spawn(async move {
            harness.app.transfers.claim(&code, claimant.id).await
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(ticket) => winners.push(ticket),
            Err(error) => assert_eq!(error, TicketingError::TransferAlreadyClaimed),
        }
    }

    println!("  📊 winners = {}", winners.len());
    assert_eq!(winners.len(), 1, "a transfer is claimed exactly once");

    let stored = harness.store.get_ticket(ticket_id).await.unwrap().unwrap();
    assert_eq!(stored.ticket.owner_id, winners[0].owner_id);

    harness.open_gates_at(stored.event_date);
    let stale = harness.app.entry.validate(&old_code).await.unwrap();
    assert_eq!(stale.reason, ScanReason::Transferred);
    println!("✅ Exactly-once claim holds");
}

#[tokio::test]
async fn test_expired_transfer_cannot_be_claimed_while_stored_pending() {
    let harness = Harness::new();
    let (sender, recipient, ticket_id) = setup(&harness).await;
    let transfer = harness
        .app
        .transfers
        .initiate(ticket_id, sender.id, to_phone(&recipient))
        .await
        .unwrap();

    harness.clock.advance(Duration::hours(48));

    assert_eq!(
        harness.store.transfer(transfer.id).unwrap().status,
        TransferStatus::Pending,
        "no sweep has run"
    );
    let error = harness
        .app
        .transfers
        .claim(transfer.code.as_str(), recipient.id)
        .await
        .unwrap_err();
    assert_eq!(error, TicketingError::TransferExpired);
    assert_eq!(error.kind(), ErrorKind::OutOfWindow);

    let ticket = harness.store.get_ticket(ticket_id).await.unwrap().unwrap();
    assert_eq!(ticket.ticket.owner_id, sender.id);
}

#[tokio::test]
async fn test_expired_transfer_frees_the_ticket_for_a_new_one() {
    let harness = Harness::new();
    let (sender, recipient, ticket_id) = setup(&harness).await;
    harness
        .app
        .transfers
        .initiate(ticket_id, sender.id, to_phone(&recipient))
        .await
        .unwrap();

    harness.clock.advance(Duration::hours(49));
    assert!(harness.app.transfers.pending(sender.id).await.unwrap().is_empty());

    let second = harness
        .app
        .transfers
        .initiate(ticket_id, sender.id, to_phone(&recipient))
        .await
        .unwrap();
    assert_eq!(second.status, TransferStatus::Pending);
}

#[tokio::test]
async fn test_sweep_marks_overdue_transfers_expired() {
    let harness = Harness::new();
    let (sender, recipient, ticket_id) = setup(&harness).await;
    let transfer = harness
        .app
        .transfers
        .initiate(ticket_id, sender.id, to_phone(&recipient))
        .await
        .unwrap();

    assert_eq!(harness.app.transfers.expire_stale().await.unwrap(), 0);

    harness.clock.advance(Duration::hours(48));
    assert_eq!(harness.app.transfers.expire_stale().await.unwrap(), 1);
    assert_eq!(
        harness.store.transfer(transfer.id).unwrap().status,
        TransferStatus::Expired
    );
    assert_eq!(harness.app.transfers.expire_stale().await.unwrap(), 0);
}

#[tokio::test]
async fn test_cancel_by_sender_only() {
    let harness = Harness::new();
    let (sender, recipient, ticket_id) = setup(&harness).await;
    let transfer = harness
        .app
        .transfers
        .initiate(ticket_id, sender.id, to_phone(&recipient))
        .await
        .unwrap();

    let forbidden = harness.app.transfers.cancel(transfer.id, recipient.id).await.unwrap_err();
    assert_eq!(forbidden, TicketingError::NotTransferSender(transfer.id));

    let cancelled = harness.app.transfers.cancel(transfer.id, sender.id).await.unwrap();
    assert_eq!(cancelled.status, TransferStatus::Cancelled);

    let claim = harness
        .app
        .transfers
        .claim(transfer.code.as_str(), recipient.id)
        .await
        .unwrap_err();
    assert_eq!(claim, TicketingError::TransferCancelled);

    let twice = harness.app.transfers.cancel(transfer.id, sender.id).await.unwrap_err();
    assert_eq!(twice, TicketingError::TransferCancelled);
}

#[tokio::test]
async fn test_cancel_after_expiry_reports_expired() {
    let harness = Harness::new();
    let (sender, recipient, ticket_id) = setup(&harness).await;
    let transfer = harness
        .app
        .transfers
        .initiate(ticket_id, sender.id, to_phone(&recipient))
        .await
        .unwrap();

    harness.clock.advance(Duration::hours(50));
    let error = harness.app.transfers.cancel(transfer.id, sender.id).await.unwrap_err();
    assert_eq!(error, TicketingError::TransferExpired);
}

#[tokio::test]
async fn test_history_reports_direction_and_effective_status() {
    let harness = Harness::new();
    let (sender, recipient, ticket_id) = setup(&harness).await;
    let transfer = harness
        .app
        .transfers
        .initiate(ticket_id, sender.id, to_phone(&recipient))
        .await
        .unwrap();
    harness.app.transfers.claim(transfer.code.as_str(), recipient.id).await.unwrap();

    let sent = harness.app.transfers.history(sender.id).await.unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].direction, TransferDirection::Sent);
    assert_eq!(sent[0].effective_status, TransferStatus::Claimed);

    let received = harness.app.transfers.history(recipient.id).await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].direction, TransferDirection::Received);
}

#[tokio::test]
async fn test_history_shows_unswept_expiry() {
    let harness = Harness::new();
    let (sender, recipient, ticket_id) = setup(&harness).await;
    harness
        .app
        .transfers
        .initiate(ticket_id, sender.id, to_phone(&recipient))
        .await
        .unwrap();

    harness.clock.advance(Duration::hours(72));
    let history = harness.app.transfers.history(sender.id).await.unwrap();
    assert_eq!(history[0].transfer.status, TransferStatus::Pending);
    assert_eq!(history[0].effective_status, TransferStatus::Expired);
}
