//! Ticket API endpoints.
//!
//! - GET /api/tickets - Tickets held by the caller
//! - GET /api/tickets/:id - One of the caller's tickets
//! - POST /api/scan - Validate an entry code at the gate

use super::error::ApiError;
use super::extract::Caller;
use crate::server::state::AppState;
use crate::types::ScanVerdict;
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use turnstile_core::types::{TicketDetails, TicketId};
use uuid::Uuid;

/// List the caller's tickets, newest first.
pub async fn list_tickets(
    Caller(user_id): Caller,
    State(state): State<AppState>,
) -> Result<Json<Vec<TicketDetails>>, ApiError> {
    let tickets = state.app.inventory.list_user_tickets(user_id).await?;
    Ok(Json(tickets))
}

/// Get one of the caller's tickets.
///
/// Tickets held by someone else are reported as not found.
pub async fn get_ticket(
    Caller(user_id): Caller,
    Path(ticket_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<TicketDetails>, ApiError> {
    let ticket = state
        .app
        .inventory
        .get_ticket(TicketId::from_uuid(ticket_id), user_id)
        .await?;
    Ok(Json(ticket))
}

/// Body of a scan request.
#[derive(Debug, Deserialize)]
pub struct ScanBody {
    /// Code read from the QR image
    pub code: String,
}

/// Validate an entry code.
///
/// Always answers 200 with a verdict; `valid: false` carries the reason.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/scan \
///   -H "x-user-id: 7c9e6679-7425-40de-944b-e07fc1f90ae7" \
///   -H "Content-Type: application/json" \
///   -d '{"code": "PA-3F2A9C0B5E7D41A8B6C2D9E0F1A2B3C4"}'
/// ```
pub async fn scan(
    Caller(scanner): Caller,
    State(state): State<AppState>,
    Json(body): Json<ScanBody>,
) -> Result<Json<ScanVerdict>, ApiError> {
    tracing::debug!(%scanner, "Scan received");
    let verdict = state.app.entry.validate(&body.code).await?;
    Ok(Json(verdict))
}
