//! Business metrics for the ticketing system.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `ticketing_purchases_total{outcome}` - Purchase attempts by outcome
//! - `ticketing_purchase_conflicts_total` - Commit attempts lost to a concurrent purchase
//! - `ticketing_tickets_sold_total` - Tickets issued
//! - `ticketing_revenue_minor_total` - Order totals in minor currency units
//! - `ticketing_scans_total{reason}` - Gate scans by verdict reason
//! - `ticketing_transfers_total{status}` - Transfers by lifecycle step
//! - `ticketing_waitlist_notifications_total{outcome}` - Waitlist dispatches
//! - `ticketing_orders_total{status}` - Order status transitions
//!
//! ## Histograms
//! - `ticketing_purchase_duration_seconds` - End-to-end purchase latency
//! - `ticketing_purchase_commit_attempts` - Commit attempts per purchase

use metrics::{describe_counter, describe_histogram};
use std::time::Duration;

/// Initialize and register all business metrics descriptions.
///
/// This should be called once at application startup, before any metrics are recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "ticketing_purchases_total",
        "Purchase attempts by outcome (committed, rejected, contention)"
    );
    describe_counter!(
        "ticketing_purchase_conflicts_total",
        "Commit attempts lost to a concurrent purchase"
    );
    describe_counter!("ticketing_tickets_sold_total", "Total number of tickets issued");
    describe_counter!(
        "ticketing_revenue_minor_total",
        "Order totals in minor currency units"
    );
    describe_histogram!(
        "ticketing_purchase_duration_seconds",
        "Time taken to validate, price and commit a purchase"
    );
    describe_histogram!(
        "ticketing_purchase_commit_attempts",
        "Commit attempts needed per purchase"
    );

    describe_counter!("ticketing_scans_total", "Gate scans by verdict reason");

    describe_counter!(
        "ticketing_transfers_total",
        "Transfers by lifecycle step (initiated, claimed, cancelled, expired)"
    );

    describe_counter!(
        "ticketing_waitlist_notifications_total",
        "Waitlist notifications by outcome (delivered, failed, skipped)"
    );

    describe_counter!(
        "ticketing_orders_total",
        "Order status transitions (paid, cancelled)"
    );

    tracing::info!("Business metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record a committed purchase.
///
/// # Arguments
///
/// * `tickets` - Tickets issued
/// * `total_minor` - Order total in minor units
/// * `attempts` - Commit attempts it took
/// * `duration` - Time from request to commit
pub fn record_purchase_committed(
    tickets: u32,
    total_minor: u64,
    attempts: u32,
    duration: Duration,
) {
    metrics::counter!("ticketing_purchases_total", "outcome" => "committed").increment(1);
    metrics::counter!("ticketing_tickets_sold_total").increment(u64::from(tickets));
    metrics::counter!("ticketing_revenue_minor_total").increment(total_minor);
    metrics::histogram!("ticketing_purchase_commit_attempts").record(f64::from(attempts));
    metrics::histogram!("ticketing_purchase_duration_seconds").record(duration.as_secs_f64());
    tracing::debug!(tickets, total_minor, attempts, "Recorded purchase_committed metric");
}

/// Record a purchase rejected by validation or inventory.
///
/// # Arguments
///
/// * `code` - Error code of the rejection
pub fn record_purchase_rejected(code: &'static str) {
    metrics::counter!("ticketing_purchases_total", "outcome" => "rejected", "code" => code)
        .increment(1);
}

/// Record a lost commit attempt.
pub fn record_purchase_conflict() {
    metrics::counter!("ticketing_purchase_conflicts_total").increment(1);
}

/// Record a gate scan verdict.
///
/// # Arguments
///
/// * `reason` - Verdict reason code
pub fn record_scan(reason: &'static str) {
    metrics::counter!("ticketing_scans_total", "reason" => reason).increment(1);
}

/// Record a transfer lifecycle step.
///
/// # Arguments
///
/// * `status` - `initiated`, `claimed`, `cancelled` or `expired`
pub fn record_transfer(status: &'static str) {
    metrics::counter!("ticketing_transfers_total", "status" => status).increment(1);
}

/// Record transfers expired by the sweep.
pub fn record_transfers_expired(count: u64) {
    metrics::counter!("ticketing_transfers_total", "status" => "expired").increment(count);
}

/// Record one waitlist dispatch.
///
/// # Arguments
///
/// * `outcome` - `delivered`, `failed` or `skipped`
pub fn record_waitlist_notification(outcome: &'static str) {
    metrics::counter!("ticketing_waitlist_notifications_total", "outcome" => outcome).increment(1);
}

/// Record an order status transition.
///
/// # Arguments
///
/// * `status` - New status label
pub fn record_order_transition(status: &'static str) {
    metrics::counter!("ticketing_orders_total", "status" => status).increment(1);
}
