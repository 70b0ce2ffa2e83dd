// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Reconciliation loop: drains buffered records into the database.
//!
//! This is the collaborator the buffer itself never calls. It probes the
//! database on a fixed interval, reports availability to the buffer, and
//! when the database is up, writes every pending record and removes the
//! ones whose commit is confirmed.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fallback_store::{FallbackBuffer, FallbackConfig, OAuthConnection, Reconciler, DurableStore};
//! use tokio::sync::watch;
//!
//! # async fn example(db: Arc<dyn DurableStore<OAuthConnection>>) {
//! let buffer = Arc::new(FallbackBuffer::<OAuthConnection>::new(FallbackConfig::default()).unwrap());
//! let reconciler = Arc::new(Reconciler::new(Arc::clone(&buffer), db));
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let task = tokio::spawn({
//!     let reconciler = Arc::clone(&reconciler);
//!     async move { reconciler.run(shutdown_rx).await }
//! });
//!
//! // ... serve OAuth callbacks, buffering into `buffer` on database errors ...
//!
//! shutdown_tx.send(true).ok();
//! task.await.ok();
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::buffer::FallbackBuffer;
use crate::metrics;
use crate::storage::memory::MemoryStore;
use crate::storage::traits::{DurableStore, RecordStore};

use super::health::DatabaseHealth;

/// Result of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Records a durable write was attempted for
    pub total: usize,
    /// Confirmed and removed from the buffer
    pub succeeded: usize,
    /// Write failed; still buffered
    pub failed: usize,
}

impl BatchResult {
    /// Check if all attempted records succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Drives pending records from a [`FallbackBuffer`] into a [`DurableStore`].
pub struct Reconciler<T, S = MemoryStore<T>> {
    buffer: Arc<FallbackBuffer<T, S>>,
    db: Arc<dyn DurableStore<T>>,
    health: DatabaseHealth,
    /// Whether a drain is in progress
    draining: AtomicBool,
    interval: Duration,
}

impl<T, S> Reconciler<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: RecordStore<T> + 'static,
{
    pub fn new(buffer: Arc<FallbackBuffer<T, S>>, db: Arc<dyn DurableStore<T>>) -> Self {
        let config = buffer.config();
        let health = DatabaseHealth::new(config.max_db_reconnect_attempts);
        let interval = config.reconnect_interval();
        Self {
            buffer,
            db,
            health,
            draining: AtomicBool::new(false),
            interval,
        }
    }

    /// Override the probe interval taken from the buffer config.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn health(&self) -> &DatabaseHealth {
        &self.health
    }

    #[must_use]
    pub fn buffer(&self) -> &Arc<FallbackBuffer<T, S>> {
        &self.buffer
    }

    /// Ping the database and report the result to the buffer.
    pub async fn probe(&self) -> bool {
        let available = self.health.check(self.db.as_ref()).await;
        self.buffer.update_database_status(available);
        available
    }

    /// Write every pending record to the database.
    ///
    /// Stops early on [`crate::PersistError::Unavailable`] and marks the
    /// database down. Returns an empty result if another drain is running.
    pub async fn drain(&self) -> BatchResult {
        if self.draining.swap(true, Ordering::AcqRel) {
            debug!("Reconciliation already in progress, skipping");
            return BatchResult::default();
        }
        let _guard = DrainGuard(&self.draining);

        let pending = self.buffer.pending_persistence();
        if pending.is_empty() {
            return BatchResult::default();
        }

        let queued = pending.len();
        info!(pending = queued, "Starting reconciliation pass");

        let mut result = BatchResult::default();
        for record in pending {
            result.total += 1;
            match self.db.persist(&record).await {
                Ok(()) => {
                    // A re-add during the write stays pending for the next pass
                    if !self.buffer.complete_persistence(&record) {
                        debug!(id = %record.id, "Buffered entry changed during write, not removed");
                    }
                    self.health.record_success();
                    result.succeeded += 1;
                }
                Err(e) => {
                    self.buffer.fail_persistence(&record, &e.to_string());
                    result.failed += 1;

                    if e.is_unavailable() {
                        warn!(
                            id = %record.id,
                            error = %e,
                            remaining = queued - result.total,
                            "Database unavailable during reconciliation, stopping pass"
                        );
                        self.health.record_failure();
                        self.buffer.update_database_status(false);
                        break;
                    }
                    warn!(id = %record.id, error = %e, "Database rejected buffered record");
                }
            }
        }

        metrics::record_reconcile_batch(result.succeeded, result.failed);
        info!(
            total = result.total,
            succeeded = result.succeeded,
            failed = result.failed,
            "Reconciliation pass complete"
        );
        result
    }

    /// One tick: probe, then drain if the database is up.
    pub async fn run_once(&self) -> Option<BatchResult> {
        if self.probe().await {
            Some(self.drain().await)
        } else {
            debug!(failures = self.health.failure_count(), "Database unreachable, skipping drain");
            None
        }
    }

    /// Tick every interval until `shutdown` flips to `true` or its sender drops.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "Reconciliation loop started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Reconciliation loop stopped");
    }
}

/// RAII guard to reset draining flag.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
