// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retention-window expiration.
//!
//! Sweeping is a pure function of the store contents, the current time and
//! the retention window. The buffer runs it before every read path; nothing
//! here schedules work on a timer.
//!
//! A record stored at `T` is live while `now < T + retention` and expired
//! once `now >= T + retention`.

use crate::record::StoredRecord;
use crate::storage::traits::RecordStore;

/// Absolute cutoff: records stored at or before this instant are expired.
#[must_use]
pub fn cutoff(now: i64, retention_millis: i64) -> i64 {
    now.saturating_sub(retention_millis)
}

/// Remove every expired record, returning what was removed.
pub fn sweep<T, S>(store: &mut S, now: i64, retention_millis: i64) -> Vec<StoredRecord<T>>
where
    S: RecordStore<T> + ?Sized,
{
    store.retain(&mut |record| !record.is_expired(now, retention_millis))
}

/// Single-key lazy check: drop `id` if it has expired.
///
/// Returns `true` when the record was removed.
pub fn sweep_one<T, S>(store: &mut S, id: &str, now: i64, retention_millis: i64) -> bool
where
    S: RecordStore<T> + ?Sized,
{
    let expired = store
        .get(id)
        .is_some_and(|record| record.is_expired(now, retention_millis));
    if expired {
        store.remove(id);
    }
    expired
}
