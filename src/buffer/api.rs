// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Record store operations and connection queries.

use crate::record::{BufferReason, ConnectionPayload, StoredRecord};
use crate::storage::traits::RecordStore;

use super::FallbackBuffer;

impl<T, S> FallbackBuffer<T, S>
where
    T: Clone + Send,
    S: RecordStore<T>,
{
    // ═══════════════════════════════════════════════════════════════════════════
    // API: Record Store
    // ═══════════════════════════════════════════════════════════════════════════

    /// Insert or replace a record, stamping it with the current time.
    ///
    /// Never fails for lack of room: when a new id arrives at a full store,
    /// expired records are swept first and, if that frees nothing, the
    /// oldest-inserted record is evicted. Replacing an existing id does not
    /// evict anything.
    pub fn add(&self, id: impl Into<String>, payload: T, reason: BufferReason) -> StoredRecord<T> {
        let now = self.now();
        let record = StoredRecord::new(id, payload, reason, now);
        let mut state = self.state.lock();
        self.insert_locked(&mut state, record, now)
    }

    /// Fetch a live record. Expired and absent are indistinguishable.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<StoredRecord<T>> {
        let now = self.now();
        let mut state = self.state.lock();
        self.sweep_one_locked(&mut state, id, now);
        state.store.get(id).cloned()
    }

    /// All live records, in no particular order.
    #[must_use]
    pub fn get_all(&self) -> Vec<StoredRecord<T>> {
        let now = self.now();
        let mut state = self.state.lock();
        self.sweep_locked(&mut state, now);
        state.store.iter().cloned().collect()
    }

    /// Delete a record. Returns whether anything was removed.
    pub fn remove(&self, id: &str) -> bool {
        let now = self.now();
        let mut state = self.state.lock();
        let removed = state.store.remove(id).is_some();
        if removed {
            self.log.debug(now, "Removed buffered record", vec![("id", id.to_string())]);
            self.publish_gauges(&state);
        }
        removed
    }

    /// Delete everything, returning how many records were dropped.
    pub fn clear(&self) -> usize {
        let now = self.now();
        let mut state = self.state.lock();
        let count = state.store.clear();
        self.log.info(now, "Cleared fallback buffer", vec![("count", count.to_string())]);
        self.publish_gauges(&state);
        count
    }

    /// Live records matching `predicate`.
    fn find_where(&self, mut predicate: impl FnMut(&StoredRecord<T>) -> bool) -> Vec<StoredRecord<T>> {
        let now = self.now();
        let mut state = self.state.lock();
        self.sweep_locked(&mut state, now);
        state
            .store
            .iter()
            .filter(|record| predicate(*record))
            .cloned()
            .collect()
    }
}

impl<T, S> FallbackBuffer<T, S>
where
    T: Clone + Send + ConnectionPayload,
    S: RecordStore<T>,
{
    // ═══════════════════════════════════════════════════════════════════════════
    // API: Connection Queries
    // ═══════════════════════════════════════════════════════════════════════════

    #[must_use]
    pub fn find_by_organization(&self, organization_id: &str) -> Vec<StoredRecord<T>> {
        self.find_where(|r| r.payload.organization_id() == organization_id)
    }

    #[must_use]
    pub fn find_by_platform(&self, organization_id: &str, platform_type: &str) -> Vec<StoredRecord<T>> {
        self.find_where(|r| {
            r.payload.organization_id() == organization_id && r.payload.platform_type() == platform_type
        })
    }

    /// Whether a live record exists for this connection triple.
    ///
    /// Not atomic with a later [`add`](Self::add); use
    /// [`add_if_absent`](Self::add_if_absent) when duplicates must be ruled
    /// out under concurrency.
    #[must_use]
    pub fn connection_exists(&self, organization_id: &str, platform_type: &str, platform_user_id: &str) -> bool {
        let now = self.now();
        let mut state = self.state.lock();
        self.sweep_locked(&mut state, now);
        let found = state.store.iter().any(|r| {
            r.payload.organization_id() == organization_id
                && r.payload.platform_type() == platform_type
                && r.payload.platform_user_id() == platform_user_id
        });
        found
    }

    /// Insert only if no live record holds the same connection triple.
    ///
    /// The check and the insert happen under one lock acquisition. Returns
    /// `None` when a duplicate was found.
    pub fn add_if_absent(&self, id: impl Into<String>, payload: T, reason: BufferReason) -> Option<StoredRecord<T>> {
        let now = self.now();
        let mut state = self.state.lock();
        self.sweep_locked(&mut state, now);

        if let Some(existing) = state.store.iter().find(|r| r.payload.same_connection(&payload)) {
            self.log.debug(
                now,
                "Connection already buffered, skipping insert",
                vec![
                    ("existing_id", existing.id.clone()),
                    ("organization_id", payload.organization_id().to_string()),
                    ("platform_type", payload.platform_type().to_string()),
                ],
            );
            return None;
        }

        let record = StoredRecord::new(id, payload, reason, now);
        Some(self.insert_locked(&mut state, record, now))
    }
}
