// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pending-persistence bookkeeping and database availability.
//!
//! Reconciliation is a two-step protocol. The loop first reports each
//! durable-write attempt through [`FallbackBuffer::update_persistence_attempt`]
//! and only then, once the commit is confirmed, calls
//! [`FallbackBuffer::mark_persisted`]. A missing error is never taken as
//! proof that the record is safe.
//!
//! Both steps are keyed by id alone. A caller holding the snapshot it wrote
//! should use [`FallbackBuffer::complete_persistence`] and
//! [`FallbackBuffer::fail_persistence`] instead: they act only if the buffered
//! entry is still the same insertion, so a record re-added while its
//! predecessor was being written stays pending.

use crate::metrics;
use crate::record::StoredRecord;
use crate::storage::traits::RecordStore;

use super::{BufferState, FallbackBuffer};

impl<T, S> FallbackBuffer<T, S>
where
    T: Clone + Send,
    S: RecordStore<T>,
{
    /// Live records still waiting for a durable write.
    #[must_use]
    pub fn pending_persistence(&self) -> Vec<StoredRecord<T>> {
        let now = self.now();
        let mut state = self.state.lock();
        self.sweep_locked(&mut state, now);
        state
            .store
            .iter()
            .filter(|r| r.needs_persistence)
            .cloned()
            .collect()
    }

    /// Drop a record whose durable write has been confirmed.
    ///
    /// Returns whether the record was still buffered.
    pub fn mark_persisted(&self, id: &str) -> bool {
        let now = self.now();
        let mut state = self.state.lock();
        self.remove_persisted_locked(&mut state, id, now)
    }

    /// Log one durable-write attempt for `id`.
    ///
    /// Increments the attempt counter and stamps the attempt time. With an
    /// error, the error is stored and a warning emitted; without one, any
    /// previous error is cleared. Records that have already expired or been
    /// removed are ignored.
    pub fn update_persistence_attempt(&self, id: &str, error: Option<&str>) {
        let now = self.now();
        let mut state = self.state.lock();
        if !self.record_attempt_locked(&mut state, id, now, error) {
            self.log.debug(
                now,
                "Persistence attempt for record no longer buffered",
                vec![("id", id.to_string())],
            );
        }
    }

    /// Log a successful write of `written` and drop it from the buffer.
    ///
    /// Acts only if the buffered entry for that id is the same insertion as
    /// `written`. Returns whether the entry was removed.
    pub fn complete_persistence(&self, written: &StoredRecord<T>) -> bool {
        let now = self.now();
        let mut state = self.state.lock();
        if !self.is_current_locked(&state, written, now) {
            return false;
        }
        self.record_attempt_locked(&mut state, &written.id, now, None);
        self.remove_persisted_locked(&mut state, &written.id, now)
    }

    /// Log a failed write of `attempted`.
    ///
    /// Like [`complete_persistence`](Self::complete_persistence), a newer
    /// entry under the same id is left untouched. Returns whether the attempt
    /// was recorded.
    pub fn fail_persistence(&self, attempted: &StoredRecord<T>, error: &str) -> bool {
        let now = self.now();
        let mut state = self.state.lock();
        if !self.is_current_locked(&state, attempted, now) {
            return false;
        }
        self.record_attempt_locked(&mut state, &attempted.id, now, Some(error))
    }

    fn is_current_locked(&self, state: &BufferState<S>, snapshot: &StoredRecord<T>, now: i64) -> bool {
        let current = state
            .store
            .get(&snapshot.id)
            .map(|record| record.generation);
        match current {
            Some(generation) if generation == snapshot.generation => true,
            Some(generation) => {
                self.log.info(
                    now,
                    "Record re-added during persistence, keeping newer entry",
                    vec![
                        ("id", snapshot.id.clone()),
                        ("written_generation", snapshot.generation.to_string()),
                        ("current_generation", generation.to_string()),
                    ],
                );
                false
            }
            None => {
                self.log.debug(
                    now,
                    "Persistence result for record no longer buffered",
                    vec![("id", snapshot.id.clone())],
                );
                false
            }
        }
    }

    fn record_attempt_locked(&self, state: &mut BufferState<S>, id: &str, now: i64, error: Option<&str>) -> bool {
        let Some(record) = state.store.get_mut(id) else {
            return false;
        };

        record.record_attempt(now, error);
        let attempts = record.metadata.persistence_attempts;
        metrics::record_persistence_attempt(error.is_none());

        match error {
            Some(err) => self.log.warn(
                now,
                "Persistence attempt failed",
                vec![
                    ("id", id.to_string()),
                    ("attempts", attempts.to_string()),
                    ("error", err.to_string()),
                ],
            ),
            None => self.log.debug(
                now,
                "Persistence attempt completed",
                vec![("id", id.to_string()), ("attempts", attempts.to_string())],
            ),
        }
        true
    }

    fn remove_persisted_locked(&self, state: &mut BufferState<S>, id: &str, now: i64) -> bool {
        let Some(record) = state.store.remove(id) else {
            return false;
        };

        metrics::record_persisted(1);
        self.log.info(
            now,
            "Record persisted to database, removed from buffer",
            vec![
                ("id", record.id),
                ("persistence_attempts", record.metadata.persistence_attempts.to_string()),
            ],
        );
        self.publish_gauges(state);
        true
    }

    /// Record the latest database availability probe.
    ///
    /// Only the flag and check timestamp change. On reconnect with
    /// `auto_persist_on_reconnect` set, the number of records now eligible
    /// for reconciliation is logged; nothing is persisted from here.
    pub fn update_database_status(&self, available: bool) {
        let now = self.now();
        let mut state = self.state.lock();
        let was_available = state.database_available;
        state.database_available = available;
        state.last_database_check = Some(now);
        metrics::set_database_available(available);

        match (was_available, available) {
            (false, true) => {
                self.log.info(now, "Database connection restored", Vec::new());
                if self.config.auto_persist_on_reconnect {
                    let retention = self.config.retention_millis();
                    let eligible = state
                        .store
                        .iter()
                        .filter(|r| r.needs_persistence && !r.is_expired(now, retention))
                        .count();
                    self.log.info(
                        now,
                        "Buffered records eligible for persistence",
                        vec![("count", eligible.to_string())],
                    );
                }
            }
            (true, false) => {
                self.log.warn(
                    now,
                    "Database unavailable, buffering writes in memory",
                    vec![("items", state.store.len().to_string())],
                );
            }
            _ => {
                self.log.debug(
                    now,
                    "Database status checked",
                    vec![("available", available.to_string())],
                );
            }
        }
    }

    #[must_use]
    pub fn is_database_available(&self) -> bool {
        self.state.lock().database_available
    }
}
