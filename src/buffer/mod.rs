// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The fallback buffer.
//!
//! [`FallbackBuffer`] ties together:
//! - a [`RecordStore`] holding buffered records
//! - retention-window expiration, swept before every read path
//! - oldest-insertion eviction when the store is full
//! - pending-persistence bookkeeping for the reconciliation loop
//! - database availability and the derived [`crate::StorageMode`]
//!
//! # Example
//!
//! ```
//! use fallback_store::{BufferReason, FallbackBuffer, FallbackConfig, OAuthConnection, StorageMode};
//!
//! let buffer = FallbackBuffer::new(FallbackConfig::default()).unwrap();
//!
//! // Durable write failed: buffer the connection and mark the database down
//! buffer.update_database_status(false);
//! buffer.add(
//!     "conn-1",
//!     OAuthConnection::new("org-1", "slack", "U123"),
//!     BufferReason::DatabaseUnavailable,
//! );
//!
//! assert!(buffer.connection_exists("org-1", "slack", "U123"));
//! assert_eq!(buffer.storage_status().mode, StorageMode::Memory);
//!
//! // Later, the reconciliation loop persists it
//! for record in buffer.pending_persistence() {
//!     buffer.update_persistence_attempt(&record.id, None);
//!     buffer.mark_persisted(&record.id);
//! }
//! assert!(buffer.get("conn-1").is_none());
//! ```

mod api;
mod persistence;
mod stats;

pub use stats::BufferStatistics;

use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, FallbackConfig};
use crate::expiration;
use crate::logging::{EventLogger, EventSink, TracingSink};
use crate::metrics;
use crate::record::StoredRecord;
use crate::storage::memory::MemoryStore;
use crate::storage::traits::RecordStore;

/// Component tag on every emitted log event.
pub const COMPONENT: &str = "fallback-store";

/// Everything guarded by the buffer lock.
pub(super) struct BufferState<S> {
    pub(super) store: S,
    pub(super) database_available: bool,
    pub(super) last_database_check: Option<i64>,
    /// Next insertion generation handed to a record
    pub(super) next_generation: u64,
}

/// Bounded, time-limited buffer for records that could not be written to
/// the database.
///
/// # Thread Safety
///
/// All operations serialize on a single mutex around the store and the
/// database state. The store is small and bounded, so there is no per-key
/// locking. Share one instance through an `Arc`.
pub struct FallbackBuffer<T, S = MemoryStore<T>> {
    pub(super) config: FallbackConfig,
    pub(super) state: Mutex<BufferState<S>>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) log: EventLogger,
    _payload: PhantomData<fn() -> T>,
}

impl<T> FallbackBuffer<T, MemoryStore<T>>
where
    T: Clone + Send,
{
    /// Buffer over a [`MemoryStore`], wall clock and `tracing` sink.
    pub fn new(config: FallbackConfig) -> Result<Self, ConfigError> {
        let store = MemoryStore::with_capacity(config.max_memory_items);
        Self::with_parts(config, store, Arc::new(SystemClock), Arc::new(TracingSink))
    }
}

impl<T, S> FallbackBuffer<T, S>
where
    T: Clone + Send,
    S: RecordStore<T>,
{
    /// Assemble a buffer from explicit collaborators.
    pub fn with_parts(
        config: FallbackConfig,
        store: S,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let log = EventLogger::new(COMPONENT, config.log_level, sink);
        log.info(
            clock.now_millis(),
            "Fallback buffer initialized",
            vec![
                ("max_memory_items", config.max_memory_items.to_string()),
                ("memory_retention_minutes", config.memory_retention_minutes.to_string()),
                ("db_reconnect_interval_ms", config.db_reconnect_interval_ms.to_string()),
                ("max_db_reconnect_attempts", config.max_db_reconnect_attempts.to_string()),
                ("auto_persist_on_reconnect", config.auto_persist_on_reconnect.to_string()),
            ],
        );

        Ok(Self {
            config,
            state: Mutex::new(BufferState {
                store,
                // Assume healthy until a probe says otherwise
                database_available: true,
                last_database_check: None,
                next_generation: 0,
            }),
            clock,
            log,
            _payload: PhantomData,
        })
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the event sink, keeping the configured level filter.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.log = EventLogger::new(COMPONENT, self.config.log_level, sink);
        self
    }

    #[must_use]
    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.config.max_memory_items
    }

    pub(super) fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Sweep the whole store, logging and counting what expired.
    pub(super) fn sweep_locked(&self, state: &mut BufferState<S>, now: i64) -> usize {
        let expired = expiration::sweep::<T, S>(&mut state.store, now, self.config.retention_millis());
        if !expired.is_empty() {
            let unpersisted = expired.iter().filter(|r| r.needs_persistence).count();
            metrics::record_eviction("expired", expired.len());
            self.log.info(
                now,
                "Expired buffered records",
                vec![
                    ("count", expired.len().to_string()),
                    ("unpersisted", unpersisted.to_string()),
                    ("cutoff", expiration::cutoff(now, self.config.retention_millis()).to_string()),
                ],
            );
            for record in expired.iter().filter(|r| r.needs_persistence) {
                self.log.warn(
                    now,
                    "Record expired before it was persisted",
                    vec![
                        ("id", record.id.clone()),
                        ("persistence_attempts", record.metadata.persistence_attempts.to_string()),
                    ],
                );
            }
        }
        expired.len()
    }

    /// Lazy expiry for a single key.
    pub(super) fn sweep_one_locked(&self, state: &mut BufferState<S>, id: &str, now: i64) {
        if expiration::sweep_one::<T, S>(&mut state.store, id, now, self.config.retention_millis()) {
            metrics::record_eviction("expired", 1);
            self.log.debug(now, "Expired buffered record on access", vec![("id", id.to_string())]);
        }
    }

    /// Free one slot: sweep expired records, then evict by insertion order.
    pub(super) fn make_room_locked(&self, state: &mut BufferState<S>, now: i64) {
        self.sweep_locked(state, now);

        while state.store.len() >= self.config.max_memory_items {
            let Some(oldest) = state.store.oldest_id() else {
                break;
            };
            let Some(evicted) = state.store.remove(&oldest) else {
                break;
            };
            metrics::record_eviction("capacity", 1);
            self.log.warn(
                now,
                "Buffer at capacity, evicted oldest record",
                vec![
                    ("id", evicted.id.clone()),
                    ("needs_persistence", evicted.needs_persistence.to_string()),
                    ("persistence_attempts", evicted.metadata.persistence_attempts.to_string()),
                    ("max_memory_items", self.config.max_memory_items.to_string()),
                ],
            );
        }
    }

    /// Insert with capacity enforcement. Caller holds the lock.
    pub(super) fn insert_locked(
        &self,
        state: &mut BufferState<S>,
        mut record: StoredRecord<T>,
        now: i64,
    ) -> StoredRecord<T> {
        record.generation = state.next_generation;
        state.next_generation += 1;

        if !state.store.contains(&record.id) && state.store.len() >= self.config.max_memory_items {
            self.make_room_locked(state, now);
        }

        let replaced = state.store.insert(record.clone()).is_some();
        self.log.debug(
            now,
            if replaced { "Replaced buffered record" } else { "Buffered record in memory" },
            vec![
                ("id", record.id.clone()),
                ("reason", record.metadata.reason.to_string()),
                ("needs_persistence", record.needs_persistence.to_string()),
                ("items", state.store.len().to_string()),
            ],
        );
        self.publish_gauges(state);
        record
    }

    pub(super) fn publish_gauges(&self, state: &BufferState<S>) {
        metrics::set_buffered_items(state.store.len());
        metrics::set_pending_items(state.store.iter().filter(|r| r.needs_persistence).count());
    }
}
