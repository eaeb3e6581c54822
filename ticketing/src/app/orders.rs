//! Order lifecycle hooks called by the payment collaborator.

use crate::environment::TicketingEnvironment;
use crate::metrics;
use turnstile_core::TicketingError;
use turnstile_core::error::Result;
use turnstile_core::store::{OrderCancellation, StatusSwap};
use turnstile_core::types::{EventId, Order, OrderId, OrderStatus};

/// Applies payment outcomes to orders and their tickets.
#[derive(Clone, Debug)]
pub struct OrderService {
    env: TicketingEnvironment,
}

impl OrderService {
    /// Create a new order service
    #[must_use]
    pub const fn new(env: TicketingEnvironment) -> Self {
        Self { env }
    }

    /// Mark a pending order paid. Confirming an already paid order returns it
    /// unchanged.
    ///
    /// # Errors
    ///
    /// - [`TicketingError::OrderNotFound`] if the order does not exist
    /// - [`TicketingError::OrderNotPayable`] if it is neither pending nor paid
    #[tracing::instrument(skip(self))]
    pub async fn confirm_payment(&self, order_id: OrderId) -> Result<Order> {
        let store = &self.env.store;
        let swap = self
            .env
            .retrying(|| {
                store.compare_and_set_order_status(
                    order_id,
                    OrderStatus::Pending,
                    OrderStatus::Paid,
                )
            })
            .await?;

        match swap {
            StatusSwap::Swapped(order) => {
                metrics::record_order_transition("paid");
                tracing::info!(order_number = %order.order_number, "Order paid");
                Ok(order)
            }
            StatusSwap::Mismatch {
                actual: OrderStatus::Paid,
            } => self
                .env
                .retrying(|| store.get_order(order_id))
                .await?
                .ok_or(TicketingError::OrderNotFound(order_id)),
            StatusSwap::Mismatch { actual } => Err(TicketingError::OrderNotPayable {
                order_id,
                status: actual,
            }),
            StatusSwap::Missing => Err(TicketingError::OrderNotFound(order_id)),
        }
    }

    /// Cancel a pending or paid order and its valid tickets. Sold counters are
    /// not restored.
    ///
    /// # Errors
    ///
    /// - [`TicketingError::OrderNotFound`] if the order does not exist
    /// - [`TicketingError::OrderNotCancellable`] in any other status
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<OrderCancellation> {
        let store = &self.env.store;
        match store.cancel_order(order_id).await? {
            StatusSwap::Swapped(cancellation) => {
                metrics::record_order_transition("cancelled");
                tracing::info!(
                    order_number = %cancellation.order.order_number,
                    tickets_cancelled = cancellation.tickets_cancelled,
                    "Order cancelled"
                );
                Ok(cancellation)
            }
            StatusSwap::Mismatch { actual } => Err(TicketingError::OrderNotCancellable {
                order_id,
                status: actual,
            }),
            StatusSwap::Missing => Err(TicketingError::OrderNotFound(order_id)),
        }
    }

    /// Cancel every valid ticket of an event. Returns how many changed.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::EventNotFound`] if the event does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_event_tickets(&self, event_id: EventId) -> Result<u32> {
        let store = &self.env.store;
        self.env
            .retrying(|| store.get_event(event_id))
            .await?
            .ok_or(TicketingError::EventNotFound(event_id))?;

        let cancelled = store.cancel_event_tickets(event_id).await?;
        tracing::info!(cancelled, "Event tickets cancelled");
        Ok(cancelled)
    }
}
