//! Shared setup for the ticketing integration tests.
//!
//! Every test gets its own in-memory catalog, a manual clock starting at
//! 2025-01-01 and a recording notifier.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use ticketing::{
    Config, PurchaseLine, PurchaseReceipt, PurchaseRequest, TicketingApp, TicketingEnvironment,
};
use turnstile_core::environment::Clock;
use turnstile_core::store::CatalogStore;
use turnstile_core::types::{Event, TicketType, User};
use turnstile_runtime::RetryPolicy;
use turnstile_testing::{InMemoryCatalogStore, ManualClock, RecordingNotifier, fixtures, test_clock};

/// One isolated ticketing deployment.
pub struct Harness {
    pub app: TicketingApp,
    pub store: InMemoryCatalogStore,
    pub clock: Arc<ManualClock>,
    pub notifier: RecordingNotifier,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let store = InMemoryCatalogStore::new();
        let clock = Arc::new(ManualClock::new(test_clock().now()));
        let notifier = RecordingNotifier::new();
        let env = TicketingEnvironment::new(
            clock.clone(),
            Arc::new(store.clone()),
            Arc::new(notifier.clone()),
            fast_retry(),
        );
        Self {
            app: TicketingApp::new(config, env),
            store,
            clock,
            notifier,
        }
    }

    /// Same store, clock and notifier, fresh services (own cooldown cache).
    pub fn env(&self) -> TicketingEnvironment {
        TicketingEnvironment::new(
            self.clock.clone(),
            Arc::new(self.store.clone()),
            Arc::new(self.notifier.clone()),
            fast_retry(),
        )
    }

    /// A published event a week out with one ticket type.
    pub async fn seed_event(&self, quantity: u32, base_price: u64) -> (Event, TicketType) {
        let event = fixtures::published_event(self.clock.now());
        self.store.upsert_event(event.clone()).await.unwrap();
        let ticket_type = fixtures::ticket_type(event.id, quantity, base_price);
        self.store.upsert_ticket_type(ticket_type.clone()).await.unwrap();
        (event, ticket_type)
    }

    pub async fn seed_user(&self, name: &str, phone: &str) -> User {
        let user = fixtures::user(name, phone);
        self.store.upsert_user(user.clone()).await.unwrap();
        user
    }

    pub async fn buy(
        &self,
        user: &User,
        ticket_type: &TicketType,
        quantity: u32,
    ) -> turnstile_core::error::Result<PurchaseReceipt> {
        self.app
            .inventory
            .purchase(purchase_request(user, ticket_type, quantity))
            .await
    }

    /// Buy and mark the order paid.
    pub async fn buy_paid(
        &self,
        user: &User,
        ticket_type: &TicketType,
        quantity: u32,
    ) -> PurchaseReceipt {
        let receipt = self.buy(user, ticket_type, quantity).await.expect("purchase should commit");
        self.app
            .orders
            .confirm_payment(receipt.order.id)
            .await
            .expect("payment should be accepted");
        receipt
    }

    /// Move the clock to one hour before `event` starts.
    pub fn open_gates(&self, event: &Event) {
        self.open_gates_at(event.date);
    }

    pub fn open_gates_at(&self, event_date: DateTime<Utc>) {
        self.clock.set(event_date - Duration::hours(1));
    }

    pub async fn sold(&self, ticket_type: &TicketType) -> u32 {
        self.store
            .get_ticket_type(ticket_type.id)
            .await
            .unwrap()
            .expect("ticket type exists")
            .sold
    }
}

pub fn purchase_request(user: &User, ticket_type: &TicketType, quantity: u32) -> PurchaseRequest {
    PurchaseRequest {
        event_id: ticket_type.event_id,
        user_id: user.id,
        lines: vec![PurchaseLine {
            ticket_type_id: ticket_type.id,
            quantity,
        }],
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(3)
        .initial_delay(std::time::Duration::from_millis(1))
        .max_delay(std::time::Duration::from_millis(5))
        .jitter(false)
        .build()
}
