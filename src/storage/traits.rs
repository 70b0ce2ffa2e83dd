// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use thiserror::Error;

use crate::record::StoredRecord;

/// Outcome of a durable write or probe, reported by the database client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistError {
    /// The database could not be reached; retrying other records now is pointless
    #[error("database unavailable: {0}")]
    Unavailable(String),
    /// The database answered but refused this record
    #[error("database rejected record: {0}")]
    Rejected(String),
}

impl PersistError {
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Keyed storage behind [`crate::FallbackBuffer`].
///
/// Implementations are plain single-owner maps: the buffer serializes every
/// call through its own lock, so methods take `&mut self` for mutation and
/// need no interior synchronization. Capacity and expiration policy live in
/// the buffer; a store only has to remember insertion order well enough to
/// answer [`RecordStore::oldest_id`].
pub trait RecordStore<T>: Send {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    fn get(&self, id: &str) -> Option<&StoredRecord<T>>;

    fn get_mut(&mut self, id: &str) -> Option<&mut StoredRecord<T>>;

    /// Insert or replace. A replaced record counts as a new insertion for
    /// [`RecordStore::oldest_id`]. Returns the previous record, if any.
    fn insert(&mut self, record: StoredRecord<T>) -> Option<StoredRecord<T>>;

    fn remove(&mut self, id: &str) -> Option<StoredRecord<T>>;

    /// Remove everything, returning how many records were dropped.
    fn clear(&mut self) -> usize;

    /// Keep only records matching `keep`, returning the removed records.
    fn retain(&mut self, keep: &mut dyn FnMut(&StoredRecord<T>) -> bool) -> Vec<StoredRecord<T>>;

    /// Id of the earliest-inserted surviving record.
    fn oldest_id(&self) -> Option<String>;

    /// All records, in no particular order.
    fn iter(&self) -> Box<dyn Iterator<Item = &StoredRecord<T>> + '_>;
}

/// The primary database, as seen by the reconciliation loop.
#[async_trait]
pub trait DurableStore<T>: Send + Sync {
    /// Cheap connectivity probe.
    async fn ping(&self) -> Result<(), PersistError>;

    /// Durably write one buffered record. `Ok` means the commit is confirmed.
    async fn persist(&self, record: &StoredRecord<T>) -> Result<(), PersistError>;
}
