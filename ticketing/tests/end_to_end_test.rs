//! End-to-end flows through the application services: buy, pay, scan,
//! transfer and cancel.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use common::Harness;
use ticketing::{ScanReason, TransferRecipient};
use turnstile_core::types::{EventId, OrderId, OrderStatus, TicketStatus};
use turnstile_core::{ErrorKind, TicketingError};

/// Test: two units for sale, both bought, a third refused, one ticket
/// admitted once and rejected on replay.
#[tokio::test]
async fn test_sell_out_and_admit_once() {
    println!("🧪 End-to-end: sell out, pay, scan, replay");
    let harness = Harness::new();
    let (event, ticket_type) = harness.seed_event(2, 1_500).await;
    let buyer = harness.seed_user("Lidya", "+251911400001").await;
    let latecomer = harness.seed_user("Mikias", "+251911400002").await;

    // Step 1: buy both units
    println!("  🛒 Buying 2 tickets...");
    let receipt = harness.buy(&buyer, &ticket_type, 2).await.unwrap();
    assert_eq!(receipt.tickets.len(), 2);
    assert_eq!(harness.sold(&ticket_type).await, 2);

    // Step 2: the next buyer is refused
    println!("  🚫 Third ticket should be refused...");
    let error = harness.buy(&latecomer, &ticket_type, 1).await.unwrap_err();
    assert_eq!(
        error,
        TicketingError::InsufficientInventory {
            ticket_type: "General".to_string(),
            available: 0,
        }
    );

    // Step 3: payment arrives
    println!("  💳 Confirming payment...");
    let paid = harness.app.orders.confirm_payment(receipt.order.id).await.unwrap();
    assert_eq!(paid.status, OrderStatus::Paid);

    // Step 4: scan at the gate
    println!("  🎫 Scanning at the gate...");
    harness.open_gates(&event);
    let code = receipt.tickets[0].entry_code.as_str();
    let admitted = harness.app.entry.validate(code).await.unwrap();
    assert!(admitted.valid);
    assert_eq!(admitted.message, "Ticket validated successfully");

    // Step 5: replay from another gate
    let other_gate =
        ticketing::app::EntryValidator::new(harness.env(), &harness.app.config().entry);
    let replay = other_gate.validate(code).await.unwrap();
    assert_eq!(replay.reason, ScanReason::AlreadyUsed);
    assert!(replay.used_at.is_some());

    // The second ticket is untouched
    let tickets = harness.app.inventory.list_user_tickets(buyer.id).await.unwrap();
    let statuses: Vec<TicketStatus> = tickets.iter().map(|t| t.ticket.status).collect();
    assert_eq!(statuses.iter().filter(|s| **s == TicketStatus::Used).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == TicketStatus::Valid).count(), 1);
    println!("✅ End-to-end flow complete");
}

#[tokio::test]
async fn test_payment_confirmation_is_idempotent() {
    let harness = Harness::new();
    let (_event, ticket_type) = harness.seed_event(5, 1_000).await;
    let buyer = harness.seed_user("Tigist", "+251911400003").await;
    let receipt = harness.buy(&buyer, &ticket_type, 1).await.unwrap();

    let first = harness.app.orders.confirm_payment(receipt.order.id).await.unwrap();
    let second = harness.app.orders.confirm_payment(receipt.order.id).await.unwrap();
    assert_eq!(first, second);

    let missing = OrderId::new();
    assert_eq!(
        harness.app.orders.confirm_payment(missing).await.unwrap_err(),
        TicketingError::OrderNotFound(missing)
    );
}

#[tokio::test]
async fn test_cancelled_order_cannot_be_paid_or_cancelled_again() {
    let harness = Harness::new();
    let (_event, ticket_type) = harness.seed_event(5, 1_000).await;
    let buyer = harness.seed_user("Henok", "+251911400004").await;
    let receipt = harness.buy(&buyer, &ticket_type, 2).await.unwrap();
    let order_id = receipt.order.id;

    let cancellation = harness.app.orders.cancel_order(order_id).await.unwrap();
    assert_eq!(cancellation.order.status, OrderStatus::Cancelled);
    assert_eq!(cancellation.tickets_cancelled, 2);

    let pay = harness.app.orders.confirm_payment(order_id).await.unwrap_err();
    assert_eq!(
        pay,
        TicketingError::OrderNotPayable {
            order_id,
            status: OrderStatus::Cancelled,
        }
    );
    assert_eq!(pay.kind(), ErrorKind::InvalidState);

    let again = harness.app.orders.cancel_order(order_id).await.unwrap_err();
    assert_eq!(
        again,
        TicketingError::OrderNotCancellable {
            order_id,
            status: OrderStatus::Cancelled,
        }
    );
}

#[tokio::test]
async fn test_event_cancellation_voids_valid_tickets_only() {
    let harness = Harness::new();
    let (event, ticket_type) = harness.seed_event(10, 1_000).await;
    let buyer = harness.seed_user("Feven", "+251911400005").await;
    let receipt = harness.buy_paid(&buyer, &ticket_type, 3).await;

    harness.open_gates(&event);
    assert!(
        harness
            .app
            .entry
            .validate(receipt.tickets[0].entry_code.as_str())
            .await
            .unwrap()
            .valid
    );

    let cancelled = harness.app.orders.cancel_event_tickets(event.id).await.unwrap();
    assert_eq!(cancelled, 2, "the used ticket keeps its status");

    let verdict = harness
        .app
        .entry
        .validate(receipt.tickets[1].entry_code.as_str())
        .await
        .unwrap();
    assert_eq!(verdict.reason, ScanReason::Cancelled);

    let unknown = EventId::new();
    assert_eq!(
        harness.app.orders.cancel_event_tickets(unknown).await.unwrap_err(),
        TicketingError::EventNotFound(unknown)
    );
}

#[tokio::test]
async fn test_transferred_ticket_admits_new_holder() {
    let harness = Harness::new();
    let (event, ticket_type) = harness.seed_event(3, 1_000).await;
    let sender = harness.seed_user("Kidist", "+251911400006").await;
    let friend = harness.seed_user("Natnael", "+251911400007").await;
    let receipt = harness.buy_paid(&sender, &ticket_type, 1).await;

    let transfer = harness
        .app
        .transfers
        .initiate(
            receipt.tickets[0].id,
            sender.id,
            TransferRecipient {
                phone: friend.phone.clone(),
                ..TransferRecipient::default()
            },
        )
        .await
        .unwrap();
    let ticket = harness.app.transfers.claim(transfer.code.as_str(), friend.id).await.unwrap();

    let details = harness.app.inventory.get_ticket(ticket.id, friend.id).await.unwrap();
    assert_eq!(details.holder_name.as_deref(), Some("Natnael"));
    assert_eq!(details.order_status, Some(OrderStatus::Paid));

    harness.open_gates(&event);
    let verdict = harness.app.entry.validate(ticket.entry_code.as_str()).await.unwrap();
    assert!(verdict.valid);
}
