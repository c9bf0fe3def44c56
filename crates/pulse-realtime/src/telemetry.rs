//! Metric names recorded by the broadcast core.
//!
//! Recording is a no-op until the host process installs a recorder.

/// Registered sessions (gauge).
pub const SESSIONS_ACTIVE: &str = "realtime_sessions_active";
/// Accepted subscriptions (counter, labels: kind).
pub const SUBSCRIPTIONS_TOTAL: &str = "realtime_subscriptions_total";
/// Rejected subscriptions (counter, labels: code).
pub const SUBSCRIPTIONS_REJECTED_TOTAL: &str = "realtime_subscriptions_rejected_total";
/// Events handed to the publisher (counter).
pub const ACTIVITY_PUBLISHED_TOTAL: &str = "activity_published_total";
/// Successful deliveries (counter).
pub const ACTIVITY_DELIVERIES_TOTAL: &str = "activity_deliveries_total";
/// Failed deliveries (counter, labels: reason).
pub const ACTIVITY_DELIVERY_FAILURES_TOTAL: &str = "activity_delivery_failures_total";
/// Deliveries skipped because the recipient left before dispatch (counter).
pub const ACTIVITY_DELIVERIES_SKIPPED_TOTAL: &str = "activity_deliveries_skipped_total";
/// Backfill queries that failed at the store (counter).
pub const BACKFILL_FAILURES_TOTAL: &str = "backfill_failures_total";
/// Sessions evicted by the stale sweep (counter).
pub const STALE_EVICTIONS_TOTAL: &str = "realtime_stale_evictions_total";

/// Every name above, for validation.
pub const ALL: [&str; 9] = [
    SESSIONS_ACTIVE,
    SUBSCRIPTIONS_TOTAL,
    SUBSCRIPTIONS_REJECTED_TOTAL,
    ACTIVITY_PUBLISHED_TOTAL,
    ACTIVITY_DELIVERIES_TOTAL,
    ACTIVITY_DELIVERY_FAILURES_TOTAL,
    ACTIVITY_DELIVERIES_SKIPPED_TOTAL,
    BACKFILL_FAILURES_TOTAL,
    STALE_EVICTIONS_TOTAL,
];
