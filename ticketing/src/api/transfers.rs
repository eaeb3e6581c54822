//! Ticket transfer API endpoints.
//!
//! - POST /api/tickets/:id/transfers - Offer a ticket to someone
//! - POST /api/transfers/claim - Redeem a transfer code
//! - POST /api/transfers/:id/cancel - Withdraw a transfer
//! - GET /api/transfers/pending - Caller's open outgoing transfers
//! - GET /api/transfers/history - Caller's sent and received transfers

use super::error::ApiError;
use super::extract::Caller;
use crate::server::state::AppState;
use crate::types::{TransferRecipient, TransferView};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use turnstile_core::types::{Ticket, TicketId, TicketTransfer, TransferId};
use uuid::Uuid;

/// Offer a ticket to a recipient identified by phone or email.
pub async fn initiate_transfer(
    Caller(user_id): Caller,
    Path(ticket_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(recipient): Json<TransferRecipient>,
) -> Result<(StatusCode, Json<TicketTransfer>), ApiError> {
    let transfer = state
        .app
        .transfers
        .initiate(TicketId::from_uuid(ticket_id), user_id, recipient)
        .await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

/// Body of a claim request.
#[derive(Debug, Deserialize)]
pub struct ClaimBody {
    /// Transfer code as typed by the recipient
    pub code: String,
}

/// Redeem a transfer code. Returns the ticket with its new entry code.
pub async fn claim_transfer(
    Caller(user_id): Caller,
    State(state): State<AppState>,
    Json(body): Json<ClaimBody>,
) -> Result<Json<Ticket>, ApiError> {
    let ticket = state.app.transfers.claim(&body.code, user_id).await?;
    Ok(Json(ticket))
}

/// Withdraw a pending transfer.
pub async fn cancel_transfer(
    Caller(user_id): Caller,
    Path(transfer_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<TicketTransfer>, ApiError> {
    let transfer = state
        .app
        .transfers
        .cancel(TransferId::from_uuid(transfer_id), user_id)
        .await?;
    Ok(Json(transfer))
}

/// Outgoing transfers still waiting to be claimed.
pub async fn pending_transfers(
    Caller(user_id): Caller,
    State(state): State<AppState>,
) -> Result<Json<Vec<TicketTransfer>>, ApiError> {
    Ok(Json(state.app.transfers.pending(user_id).await?))
}

/// Sent and received transfers.
pub async fn transfer_history(
    Caller(user_id): Caller,
    State(state): State<AppState>,
) -> Result<Json<Vec<TransferView>>, ApiError> {
    Ok(Json(state.app.transfers.history(user_id).await?))
}
