//! Purchase and pricing API endpoints.
//!
//! - POST /api/events/:id/purchase - Buy tickets (requires caller)
//! - GET /api/ticket-types/:id/price - Current price of a ticket type

use super::error::ApiError;
use super::extract::Caller;
use crate::server::state::AppState;
use crate::types::{PurchaseLine, PurchaseReceipt, PurchaseRequest, TicketTypePrice};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use turnstile_core::types::{EventId, TicketTypeId};
use uuid::Uuid;

/// Body of a purchase request.
#[derive(Debug, Deserialize)]
pub struct PurchaseBody {
    /// Ticket types and quantities
    pub lines: Vec<PurchaseLine>,
}

/// Buy tickets for an event.
///
/// Returns the pending order and one ticket per unit.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/events/550e8400-e29b-41d4-a716-446655440000/purchase \
///   -H "x-user-id: 7c9e6679-7425-40de-944b-e07fc1f90ae7" \
///   -H "Content-Type: application/json" \
///   -d '{"lines": [{"ticket_type_id": "a1b2c3d4-0000-0000-0000-000000000000", "quantity": 2}]}'
/// ```
pub async fn purchase(
    Caller(user_id): Caller,
    Path(event_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<PurchaseBody>,
) -> Result<(StatusCode, Json<PurchaseReceipt>), ApiError> {
    let receipt = state
        .app
        .inventory
        .purchase(PurchaseRequest {
            event_id: EventId::from_uuid(event_id),
            user_id,
            lines: body.lines,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Current price of a ticket type.
///
/// Public endpoint - no caller required.
pub async fn ticket_type_price(
    Path(ticket_type_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<TicketTypePrice>, ApiError> {
    let price = state
        .app
        .inventory
        .ticket_type_price(TicketTypeId::from_uuid(ticket_type_id))
        .await?;
    Ok(Json(price))
}
