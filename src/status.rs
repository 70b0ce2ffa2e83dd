// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Operating mode derived from database availability and buffer contents.
//!
//! The mode is never stored. It is recomputed from three inputs on every
//! status request:
//!
//! | database | items | pending | mode       |
//! |----------|-------|---------|------------|
//! | down     | 0     | -       | `database` |
//! | down     | > 0   | any     | `memory`   |
//! | up       | any   | 0       | `database` |
//! | up       | any   | > 0     | `hybrid`   |
//!
//! # Example
//!
//! ```
//! use fallback_store::StorageMode;
//!
//! let mode = StorageMode::derive(false, 3, 2);
//! assert_eq!(mode, StorageMode::Memory);
//! assert!(!mode.is_database_only());
//!
//! let warning = StorageMode::warning(false, 3, 2).unwrap();
//! assert!(warning.contains('3') && warning.contains('2'));
//!
//! assert_eq!(StorageMode::derive(true, 5, 0), StorageMode::Database);
//! assert_eq!(StorageMode::warning(true, 5, 0), None);
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Everything lives in the database; the buffer holds nothing that matters
    Database,
    /// Database unreachable; buffered records are the only copy
    Memory,
    /// Database reachable, but buffered records still await reconciliation
    Hybrid,
}

impl StorageMode {
    #[must_use]
    pub fn derive(database_available: bool, memory_items: usize, pending_items: usize) -> Self {
        match (database_available, memory_items, pending_items) {
            (false, 0, _) => Self::Database,
            (false, _, _) => Self::Memory,
            (true, _, 0) => Self::Database,
            (true, _, _) => Self::Hybrid,
        }
    }

    /// Human-readable warning for degraded modes.
    #[must_use]
    pub fn warning(database_available: bool, memory_items: usize, pending_items: usize) -> Option<String> {
        match Self::derive(database_available, memory_items, pending_items) {
            Self::Database => None,
            Self::Memory => Some(format!(
                "Database unavailable, {memory_items} items stored in memory, {pending_items} pending persistence"
            )),
            Self::Hybrid => Some(format!("{pending_items} items pending database persistence")),
        }
    }

    #[must_use]
    pub fn is_database_only(&self) -> bool {
        matches!(self, Self::Database)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Memory => "memory",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot returned by [`crate::FallbackBuffer::storage_status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStatus {
    pub mode: StorageMode,
    pub database_available: bool,
    /// When availability was last reported (epoch millis)
    pub last_database_check: Option<i64>,
    pub memory_items: usize,
    pub pending_persistence: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl StorageStatus {
    #[must_use]
    pub fn from_counts(
        database_available: bool,
        last_database_check: Option<i64>,
        memory_items: usize,
        pending_persistence: usize,
    ) -> Self {
        Self {
            mode: StorageMode::derive(database_available, memory_items, pending_persistence),
            database_available,
            last_database_check,
            memory_items,
            pending_persistence,
            warning: StorageMode::warning(database_available, memory_items, pending_persistence),
        }
    }
}
