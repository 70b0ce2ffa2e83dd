// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the fallback buffer.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host process is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `fallback_store_` prefix for all metrics
//! - `_total` suffix for counters
//!
//! # Labels
//! - `cause`: capacity, expired
//! - `status`: success, error

use metrics::{counter, gauge};

/// Set current buffered item count
pub fn set_buffered_items(count: usize) {
    gauge!("fallback_store_items").set(count as f64);
}

/// Set records awaiting reconciliation
pub fn set_pending_items(count: usize) {
    gauge!("fallback_store_pending_items").set(count as f64);
}

/// Set database availability (1 = available, 0 = unavailable)
pub fn set_database_available(available: bool) {
    gauge!("fallback_store_database_available").set(if available { 1.0 } else { 0.0 });
}

/// Record records dropped from the buffer without being persisted
pub fn record_eviction(cause: &'static str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        "fallback_store_evictions_total",
        "cause" => cause
    )
    .increment(count as u64);
}

/// Record a durable-write attempt reported back to the buffer
pub fn record_persistence_attempt(success: bool) {
    let status = if success { "success" } else { "error" };
    counter!(
        "fallback_store_persistence_attempts_total",
        "status" => status
    )
    .increment(1);
}

/// Record records removed after a confirmed durable write
pub fn record_persisted(count: usize) {
    counter!("fallback_store_persisted_total").increment(count as u64);
}

/// Record a reconciliation pass
pub fn record_reconcile_batch(succeeded: usize, failed: usize) {
    counter!("fallback_store_reconcile_batches_total").increment(1);
    counter!(
        "fallback_store_reconciled_items_total",
        "status" => "success"
    )
    .increment(succeeded as u64);
    counter!(
        "fallback_store_reconciled_items_total",
        "status" => "error"
    )
    .increment(failed as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: These tests verify the API compiles and doesn't panic.
    // No recorder is installed, so every call is a no-op.

    #[test]
    fn test_gauges() {
        set_buffered_items(42);
        set_pending_items(7);
        set_database_available(true);
        set_database_available(false);
    }

    #[test]
    fn test_eviction_metrics() {
        record_eviction("capacity", 1);
        record_eviction("expired", 10);
        record_eviction("expired", 0);
    }

    #[test]
    fn test_persistence_metrics() {
        record_persistence_attempt(true);
        record_persistence_attempt(false);
        record_persisted(3);
        record_reconcile_batch(5, 1);
    }
}
