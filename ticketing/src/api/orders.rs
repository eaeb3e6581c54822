//! Payment hook endpoints, called by the payment collaborator.
//!
//! - POST /api/orders/:id/paid - Payment confirmed
//! - POST /api/orders/:id/cancel - Payment failed or order withdrawn
//! - POST /api/events/:id/cancel-tickets - Event called off

use super::error::ApiError;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use turnstile_core::types::{EventId, Order, OrderId};
use uuid::Uuid;

/// Mark an order paid.
pub async fn confirm_payment(
    Path(order_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .app
        .orders
        .confirm_payment(OrderId::from_uuid(order_id))
        .await?;
    Ok(Json(order))
}

/// Response of an order cancellation.
#[derive(Debug, Serialize)]
pub struct CancelOrderResponse {
    /// The cancelled order
    pub order: Order,
    /// Tickets cancelled with it
    pub tickets_cancelled: u32,
}

/// Cancel an order and its valid tickets.
pub async fn cancel_order(
    Path(order_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<CancelOrderResponse>, ApiError> {
    let cancellation = state
        .app
        .orders
        .cancel_order(OrderId::from_uuid(order_id))
        .await?;
    Ok(Json(CancelOrderResponse {
        order: cancellation.order,
        tickets_cancelled: cancellation.tickets_cancelled,
    }))
}

/// Response of an event ticket cancellation.
#[derive(Debug, Serialize)]
pub struct CancelEventTicketsResponse {
    /// Tickets cancelled
    pub tickets_cancelled: u32,
}

/// Cancel every valid ticket of an event.
pub async fn cancel_event_tickets(
    Path(event_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<CancelEventTicketsResponse>, ApiError> {
    let tickets_cancelled = state
        .app
        .orders
        .cancel_event_tickets(EventId::from_uuid(event_id))
        .await?;
    Ok(Json(CancelEventTicketsResponse { tickets_cancelled }))
}
