// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Fallback Store
//!
//! A resilient in-memory buffer for OAuth connection records, used while the
//! primary database is unreachable.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     OAuth callback path                     │
//! │  • Durable write fails → add(.., DatabaseUnavailable)      │
//! │  • Reads consult the buffer before reporting "not found"   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      FallbackBuffer                         │
//! │  • Bounded: evicts oldest insertion when full              │
//! │  • TTL: expired records swept before every read            │
//! │  • Tracks records pending durable persistence              │
//! │  • Derives database / memory / hybrid mode                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                    (probe + drain every interval)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Reconciler                           │
//! │  • Pings the DurableStore, reports availability            │
//! │  • Persists pending records, removes confirmed ones        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use fallback_store::{BufferReason, FallbackBuffer, FallbackConfig, OAuthConnection};
//!
//! let config = FallbackConfig {
//!     max_memory_items: 500,
//!     memory_retention_minutes: 30,
//!     ..Default::default()
//! };
//! let buffer = FallbackBuffer::new(config).unwrap();
//!
//! buffer.update_database_status(false);
//! buffer.add(
//!     "conn-42",
//!     OAuthConnection::new("org-1", "github", "octocat").with_access_token("gho_x"),
//!     BufferReason::DatabaseUnavailable,
//! );
//!
//! let status = buffer.storage_status();
//! assert_eq!(status.memory_items, 1);
//! assert_eq!(status.pending_persistence, 1);
//! println!("{}", status.warning.unwrap_or_default());
//! ```
//!
//! ## Logging
//!
//! Buffer operations emit structured [`logging::LogEvent`]s through an
//! [`logging::EventSink`]. The default [`logging::TracingSink`] forwards them
//! to `tracing`; tests can swap in a [`logging::CollectingSink`]. The
//! reconciliation loop logs through `tracing` directly.
//!
//! ## Modules
//!
//! - [`buffer`]: the [`FallbackBuffer`] itself
//! - [`storage`]: the [`RecordStore`] seam, the in-memory store and the [`DurableStore`] trait
//! - [`resilience`]: database health tracking and the [`Reconciler`]
//! - [`status`]: [`StorageMode`] derivation and status reports
//! - [`config`]: [`FallbackConfig`] and log levels
//! - [`metrics`]: counters and gauges via the `metrics` facade

pub mod buffer;
pub mod clock;
pub mod config;
pub mod expiration;
pub mod logging;
pub mod metrics;
pub mod record;
pub mod resilience;
pub mod status;
pub mod storage;

pub use buffer::{BufferStatistics, FallbackBuffer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, FallbackConfig, LogLevel};
pub use logging::{CollectingSink, EventLogger, EventSink, LogEvent, TracingSink};
pub use record::{BufferReason, ConnectionPayload, OAuthConnection, RecordMetadata, StoredRecord};
pub use resilience::health::DatabaseHealth;
pub use resilience::reconciler::{BatchResult, Reconciler};
pub use status::{StorageMode, StorageStatus};
pub use storage::memory::MemoryStore;
pub use storage::traits::{DurableStore, PersistError, RecordStore};
