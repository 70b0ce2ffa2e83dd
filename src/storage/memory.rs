// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::HashMap;

use crate::record::StoredRecord;
use super::traits::RecordStore;

struct Slot<T> {
    /// Insertion sequence; lower is older
    seq: u64,
    record: StoredRecord<T>,
}

/// `HashMap`-backed store with insertion-order tracking.
pub struct MemoryStore<T> {
    data: HashMap<String, Slot<T>>,
    next_seq: u64,
}

impl<T> MemoryStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            next_seq: 0,
        }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: HashMap::with_capacity(capacity),
            next_seq: 0,
        }
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> RecordStore<T> for MemoryStore<T> {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn get(&self, id: &str) -> Option<&StoredRecord<T>> {
        self.data.get(id).map(|slot| &slot.record)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut StoredRecord<T>> {
        self.data.get_mut(id).map(|slot| &mut slot.record)
    }

    fn insert(&mut self, record: StoredRecord<T>) -> Option<StoredRecord<T>> {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.data
            .insert(record.id.clone(), Slot { seq, record })
            .map(|slot| slot.record)
    }

    fn remove(&mut self, id: &str) -> Option<StoredRecord<T>> {
        self.data.remove(id).map(|slot| slot.record)
    }

    fn clear(&mut self) -> usize {
        let count = self.data.len();
        self.data.clear();
        count
    }

    fn retain(&mut self, keep: &mut dyn FnMut(&StoredRecord<T>) -> bool) -> Vec<StoredRecord<T>> {
        let doomed: Vec<String> = self
            .data
            .iter()
            .filter(|(_, slot)| !keep(&slot.record))
            .map(|(id, _)| id.clone())
            .collect();

        doomed
            .iter()
            .filter_map(|id| self.data.remove(id))
            .map(|slot| slot.record)
            .collect()
    }

    fn oldest_id(&self) -> Option<String> {
        self.data
            .iter()
            .min_by_key(|(_, slot)| slot.seq)
            .map(|(id, _)| id.clone())
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &StoredRecord<T>> + '_> {
        Box::new(self.data.values().map(|slot| &slot.record))
    }
}
