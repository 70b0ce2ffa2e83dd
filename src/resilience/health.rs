// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Database connectivity tracking for the reconciliation loop.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::storage::traits::DurableStore;

/// Consecutive-failure tracker for database probes.
///
/// Every probe result is forwarded to the buffer as-is; this type only adds
/// escalation. Once `max_reconnect_attempts` probes in a row have failed,
/// the outage is logged as an error, once per outage.
pub struct DatabaseHealth {
    /// Last probe result
    healthy: AtomicBool,
    /// Consecutive failure count
    failures: AtomicU32,
    /// Whether the current outage has already been escalated
    escalated: AtomicBool,
    max_reconnect_attempts: u32,
    /// Lock for probing (prevent thundering herd)
    checking: Mutex<()>,
}

impl DatabaseHealth {
    pub fn new(max_reconnect_attempts: u32) -> Self {
        Self {
            healthy: AtomicBool::new(true), // Assume healthy until proven otherwise
            failures: AtomicU32::new(0),
            escalated: AtomicBool::new(false),
            max_reconnect_attempts: max_reconnect_attempts.max(1),
            checking: Mutex::new(()),
        }
    }

    /// Record a successful probe or write.
    pub fn record_success(&self) {
        let failures = self.failures.swap(0, Ordering::AcqRel);
        self.healthy.store(true, Ordering::Release);
        if self.escalated.swap(false, Ordering::AcqRel) {
            info!(failed_attempts = failures, "Database reachable again after escalated outage");
        }
    }

    /// Record a failed probe.
    pub fn record_failure(&self) {
        let failures = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
        self.healthy.store(false, Ordering::Release);
        if failures >= self.max_reconnect_attempts && !self.escalated.swap(true, Ordering::AcqRel) {
            error!(
                failures,
                max_reconnect_attempts = self.max_reconnect_attempts,
                "Database still unreachable after maximum reconnect attempts, continuing to probe"
            );
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn failure_count(&self) -> u32 {
        self.failures.load(Ordering::Acquire)
    }

    /// Whether the reconnect budget for this outage is spent.
    pub fn is_escalated(&self) -> bool {
        self.escalated.load(Ordering::Acquire)
    }

    /// Ping the database and record the outcome.
    pub async fn check<T>(&self, db: &dyn DurableStore<T>) -> bool {
        // Prevent multiple simultaneous checks
        let _guard = self.checking.lock().await;

        match db.ping().await {
            Ok(()) => {
                self.record_success();
                true
            }
            Err(_) => {
                self.record_failure();
                false
            }
        }
    }
}

impl Default for DatabaseHealth {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::StoredRecord;
    use crate::storage::traits::PersistError;
    use async_trait::async_trait;

    struct Flaky {
        up: AtomicBool,
    }

    #[async_trait]
    impl DurableStore<()> for Flaky {
        async fn ping(&self) -> Result<(), PersistError> {
            if self.up.load(Ordering::Acquire) {
                Ok(())
            } else {
                Err(PersistError::Unavailable("refused".into()))
            }
        }

        async fn persist(&self, _record: &StoredRecord<()>) -> Result<(), PersistError> {
            Ok(())
        }
    }

    #[test]
    fn test_initial_state() {
        let health = DatabaseHealth::new(3);
        assert!(health.is_healthy());
        assert_eq!(health.failure_count(), 0);
        assert!(!health.is_escalated());
    }

    #[test]
    fn test_single_failure_marks_unhealthy() {
        let health = DatabaseHealth::new(3);
        health.record_failure();
        assert!(!health.is_healthy());
        assert!(!health.is_escalated());
    }

    #[test]
    fn test_escalates_at_max_attempts() {
        let health = DatabaseHealth::new(3);

        health.record_failure();
        health.record_failure();
        assert!(!health.is_escalated());

        health.record_failure();
        assert!(health.is_escalated());
        assert_eq!(health.failure_count(), 3);

        // Keeps counting, escalation stays latched
        health.record_failure();
        assert!(health.is_escalated());
        assert_eq!(health.failure_count(), 4);
    }

    #[test]
    fn test_success_resets() {
        let health = DatabaseHealth::new(2);
        health.record_failure();
        health.record_failure();
        assert!(health.is_escalated());

        health.record_success();
        assert!(health.is_healthy());
        assert_eq!(health.failure_count(), 0);
        assert!(!health.is_escalated());
    }

    #[test]
    fn test_zero_budget_is_clamped() {
        let health = DatabaseHealth::new(0);
        health.record_failure();
        assert!(health.is_escalated());
    }

    #[tokio::test]
    async fn test_check_pings_store() {
        let health = DatabaseHealth::default();
        let db = Flaky { up: AtomicBool::new(false) };

        assert!(!health.check::<()>(&db).await);
        assert_eq!(health.failure_count(), 1);

        db.up.store(true, Ordering::Release);
        assert!(health.check::<()>(&db).await);
        assert!(health.is_healthy());
    }
}
