//! Metric-style structured log events for the sandbox engine.
//!
//! Every helper emits a `tracing` event tagged with a `metric` field and, where a
//! running total makes sense, bumps a process-wide counter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

static QUERIES_EXECUTED_TOTAL: AtomicU64 = AtomicU64::new(0);
static QUERY_REJECTIONS_TOTAL: AtomicU64 = AtomicU64::new(0);
static QUERY_FAILURES_TOTAL: AtomicU64 = AtomicU64::new(0);
static POOL_EXHAUSTED_TOTAL: AtomicU64 = AtomicU64::new(0);
static RESETS_COMPLETED_TOTAL: AtomicU64 = AtomicU64::new(0);
static RESET_FAILURES_TOTAL: AtomicU64 = AtomicU64::new(0);

fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Records execution latency for a statement that reached the database.
pub fn record_query_latency(query_id: Uuid, pool: &str, duration: Duration, row_count: usize) {
    let total = QUERIES_EXECUTED_TOTAL.fetch_add(1, Ordering::Relaxed) + 1;
    info!(
        metric = "query_latency_ms",
        query_id = %query_id,
        pool,
        latency_ms = duration_ms(duration),
        rows = row_count,
        queries_executed_total = total
    );
}

/// Records a statement turned away before acquiring a connection.
pub fn record_query_rejection(query_id: Uuid, user: &str, reason: &str) {
    let total = QUERY_REJECTIONS_TOTAL.fetch_add(1, Ordering::Relaxed) + 1;
    warn!(
        metric = "query_rejected",
        query_id = %query_id,
        user,
        reason,
        query_rejections_total = total
    );
}

/// Records a statement the database refused.
pub fn record_query_failure(query_id: Uuid, pool: &str, duration: Duration, error: &str) {
    let total = QUERY_FAILURES_TOTAL.fetch_add(1, Ordering::Relaxed) + 1;
    warn!(
        metric = "query_failure",
        query_id = %query_id,
        pool,
        latency_ms = duration_ms(duration),
        error,
        query_failures_total = total
    );
}

/// Marks a checkout that timed out.
pub fn record_pool_exhausted(pool: &str) {
    let total = POOL_EXHAUSTED_TOTAL.fetch_add(1, Ordering::Relaxed) + 1;
    warn!(metric = "pool_exhausted", pool, pool_exhausted_total = total);
}

/// Logs a reset state transition.
pub fn record_reset_phase(reset_id: Uuid, phase: &str) {
    info!(metric = "reset_phase", reset_id = %reset_id, phase);
}

/// Records a completed reset with its total duration.
pub fn record_reset_completed(reset_id: Uuid, duration: Duration) {
    let total = RESETS_COMPLETED_TOTAL.fetch_add(1, Ordering::Relaxed) + 1;
    info!(
        metric = "reset_latency_ms",
        reset_id = %reset_id,
        latency_ms = duration_ms(duration),
        resets_completed_total = total
    );
}

/// Records a reset that stopped in `stage`.
pub fn record_reset_failure(reset_id: Uuid, stage: &str, error: &str) {
    let total = RESET_FAILURES_TOTAL.fetch_add(1, Ordering::Relaxed) + 1;
    warn!(
        metric = "reset_failure",
        reset_id = %reset_id,
        stage,
        error,
        reset_failures_total = total
    );
}

/// Records how long catalog introspection took.
pub fn record_introspection_latency(pool: &str, duration: Duration, table_count: usize) {
    info!(
        metric = "introspection_latency_ms",
        pool,
        latency_ms = duration_ms(duration),
        tables = table_count
    );
}

/// Snapshot of the process-wide counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    /// Statements that reached the database and succeeded
    pub queries_executed: u64,
    /// Statements rejected by validation or the identifier guard
    pub query_rejections: u64,
    /// Statements the database refused
    pub query_failures: u64,
    /// Checkout timeouts
    pub pool_exhausted: u64,
    /// Completed resets
    pub resets_completed: u64,
    /// Failed resets
    pub reset_failures: u64,
}

/// Reads every counter.
pub fn counters() -> CounterSnapshot {
    CounterSnapshot {
        queries_executed: QUERIES_EXECUTED_TOTAL.load(Ordering::Relaxed),
        query_rejections: QUERY_REJECTIONS_TOTAL.load(Ordering::Relaxed),
        query_failures: QUERY_FAILURES_TOTAL.load(Ordering::Relaxed),
        pool_exhausted: POOL_EXHAUSTED_TOTAL.load(Ordering::Relaxed),
        resets_completed: RESETS_COMPLETED_TOTAL.load(Ordering::Relaxed),
        reset_failures: RESET_FAILURES_TOTAL.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_only_move_forward() {
        let before = counters();
        record_query_rejection(Uuid::new_v4(), "learner", "empty statement");
        record_pool_exhausted("practice");
        record_reset_failure(Uuid::new_v4(), "seed", "duplicate key");
        let after = counters();
        assert!(after.query_rejections > before.query_rejections);
        assert!(after.pool_exhausted > before.pool_exhausted);
        assert!(after.reset_failures > before.reset_failures);
    }
}
