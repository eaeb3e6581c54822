//! Router configuration for the ticketing system.
//!
//! Builds the complete Axum router with all endpoints.

use super::health::{health_check, metrics, readiness_check};
use super::state::AppState;
use crate::api::{orders, purchases, tickets, transfers, waitlist};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Configures all routes including:
/// - Health checks
/// - Purchases and price previews
/// - Tickets and gate scanning
/// - Transfers
/// - Waitlists
/// - Payment hooks
///
/// # Arguments
///
/// - `state`: Application state to share with handlers
///
/// # Returns
///
/// Configured Axum router ready to serve requests.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Purchases
        .route("/events/:id/purchase", post(purchases::purchase))
        .route("/ticket-types/:id/price", get(purchases::ticket_type_price))
        // Tickets
        .route("/tickets", get(tickets::list_tickets))
        .route("/tickets/:id", get(tickets::get_ticket))
        .route("/scan", post(tickets::scan))
        // Transfers
        .route("/tickets/:id/transfers", post(transfers::initiate_transfer))
        .route("/transfers/claim", post(transfers::claim_transfer))
        .route("/transfers/pending", get(transfers::pending_transfers))
        .route("/transfers/history", get(transfers::transfer_history))
        .route("/transfers/:id/cancel", post(transfers::cancel_transfer))
        // Waitlist
        .route(
            "/events/:id/waitlist",
            post(waitlist::join_waitlist)
                .delete(waitlist::leave_waitlist)
                .get(waitlist::waitlist_status),
        )
        .route("/events/:id/waitlist/notify", post(waitlist::notify_waitlist))
        // Payment hooks (internal)
        .route("/orders/:id/paid", post(orders::confirm_payment))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        .route("/events/:id/cancel-tickets", post(orders::cancel_event_tickets));

    Router::new()
        // Health checks (no caller required)
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // API routes under /api prefix
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the router served on the metrics address.
///
/// Kept apart from the API router so Prometheus can scrape a port that is
/// not exposed publicly.
pub fn build_metrics_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .with_state(state)
}
