// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Status and statistics reporting.

use serde::{Deserialize, Serialize};

use crate::status::StorageStatus;
use crate::storage::traits::RecordStore;

use super::FallbackBuffer;

/// Point-in-time summary of buffer contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferStatistics {
    pub total_items: usize,
    pub pending_persistence: usize,
    /// Mean record age, truncated to whole seconds (0 when empty)
    pub average_age_secs: u64,
    /// Earliest `stored_at` among live records
    pub oldest_item: Option<i64>,
    /// Latest `stored_at` among live records
    pub newest_item: Option<i64>,
    /// Attempts summed over records whose last attempt failed
    pub failed_persistence_attempts: u64,
}

impl<T, S> FallbackBuffer<T, S>
where
    T: Clone + Send,
    S: RecordStore<T>,
{
    /// Current operating mode, counts and warning.
    #[must_use]
    pub fn storage_status(&self) -> StorageStatus {
        let now = self.now();
        let mut state = self.state.lock();
        self.sweep_locked(&mut state, now);

        let memory_items = state.store.len();
        let pending = state.store.iter().filter(|r| r.needs_persistence).count();
        self.publish_gauges(&state);

        StorageStatus::from_counts(
            state.database_available,
            state.last_database_check,
            memory_items,
            pending,
        )
    }

    #[must_use]
    pub fn statistics(&self) -> BufferStatistics {
        let now = self.now();
        let mut state = self.state.lock();
        self.sweep_locked(&mut state, now);

        let mut stats = BufferStatistics::default();
        let mut total_age_millis: u64 = 0;

        for record in state.store.iter() {
            stats.total_items += 1;
            if record.needs_persistence {
                stats.pending_persistence += 1;
            }
            if record.metadata.last_persistence_error.is_some() {
                stats.failed_persistence_attempts += u64::from(record.metadata.persistence_attempts);
            }
            total_age_millis += record.age_millis(now);
            stats.oldest_item = Some(stats.oldest_item.map_or(record.stored_at, |t| t.min(record.stored_at)));
            stats.newest_item = Some(stats.newest_item.map_or(record.stored_at, |t| t.max(record.stored_at)));
        }

        if stats.total_items > 0 {
            stats.average_age_secs = total_age_millis / stats.total_items as u64 / 1000;
        }
        stats
    }
}
