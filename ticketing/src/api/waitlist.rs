//! Waitlist API endpoints.
//!
//! - POST /api/events/:id/waitlist - Join
//! - DELETE /api/events/:id/waitlist - Leave
//! - GET /api/events/:id/waitlist - Caller's status and position
//! - POST /api/events/:id/waitlist/notify - Notify the next users (internal)

use super::error::ApiError;
use super::extract::Caller;
use crate::app::JoinWaitlist;
use crate::server::state::AppState;
use crate::types::{WaitlistNotification, WaitlistStatus};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use turnstile_core::types::{EventId, WaitlistEntry};
use uuid::Uuid;

/// Join an event's waitlist.
pub async fn join_waitlist(
    Caller(user_id): Caller,
    Path(event_id): Path<Uuid>,
    State(state): State<AppState>,
    body: Option<Json<JoinWaitlist>>,
) -> Result<(StatusCode, Json<WaitlistEntry>), ApiError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let entry = state
        .app
        .waitlist
        .join(EventId::from_uuid(event_id), user_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Leave an event's waitlist.
pub async fn leave_waitlist(
    Caller(user_id): Caller,
    Path(event_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state
        .app
        .waitlist
        .leave(EventId::from_uuid(event_id), user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's waitlist status for an event.
pub async fn waitlist_status(
    Caller(user_id): Caller,
    Path(event_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<WaitlistStatus>, ApiError> {
    let status = state
        .app
        .waitlist
        .status(EventId::from_uuid(event_id), user_id)
        .await?;
    Ok(Json(status))
}

/// Body of a notify request.
#[derive(Debug, Deserialize)]
pub struct NotifyBody {
    /// Units that became available
    pub available: u32,
}

/// Notify the next waiting users that tickets are available.
pub async fn notify_waitlist(
    Path(event_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<NotifyBody>,
) -> Result<Json<WaitlistNotification>, ApiError> {
    let summary = state
        .app
        .waitlist
        .notify(EventId::from_uuid(event_id), body.available)
        .await?;
    Ok(Json(summary))
}
