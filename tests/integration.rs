// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Integration tests for the buffer and reconciliation loop.
//!
//! The database is an in-process [`DurableStore`] whose availability can be
//! toggled, so outages and recoveries are deterministic.
//!
//! # Test Organization
//! - `happy_*` - Normal operation: buffering, lookup, reconciliation
//! - `failure_*` - Failure scenarios: outages mid-drain, expiry, rejection

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use fallback_store::{
    BufferReason, CollectingSink, DurableStore, FallbackBuffer, FallbackConfig, LogLevel, ManualClock,
    MemoryStore, OAuthConnection, PersistError, Reconciler, StorageMode, StoredRecord,
};

// =============================================================================
// Helpers
// =============================================================================

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "fallback_store=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Connection table keyed by buffer id.
#[derive(Default)]
struct FakeDatabase {
    down: AtomicBool,
    /// Fail with `Unavailable` after this many successful writes
    fail_after: Mutex<Option<usize>>,
    writes: AtomicUsize,
    rows: Mutex<HashMap<String, OAuthConnection>>,
}

impl FakeDatabase {
    fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::Release);
    }

    fn insert(&self, id: &str, conn: OAuthConnection) -> Result<(), PersistError> {
        if self.down.load(Ordering::Acquire) {
            return Err(PersistError::Unavailable("connect ECONNREFUSED".into()));
        }
        self.rows.lock().insert(id.to_string(), conn);
        Ok(())
    }

    fn row_count(&self) -> usize {
        self.rows.lock().len()
    }
}

#[async_trait]
impl DurableStore<OAuthConnection> for FakeDatabase {
    async fn ping(&self) -> Result<(), PersistError> {
        if self.down.load(Ordering::Acquire) {
            Err(PersistError::Unavailable("connect ECONNREFUSED".into()))
        } else {
            Ok(())
        }
    }

    async fn persist(&self, record: &StoredRecord<OAuthConnection>) -> Result<(), PersistError> {
        let limit = *self.fail_after.lock();
        if let Some(limit) = limit {
            if self.writes.load(Ordering::Acquire) >= limit {
                self.set_down(true);
            }
        }
        self.insert(&record.id, record.payload.clone())?;
        self.writes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

struct Fixture {
    buffer: Arc<FallbackBuffer<OAuthConnection>>,
    db: Arc<FakeDatabase>,
    clock: Arc<ManualClock>,
    sink: Arc<CollectingSink>,
    reconciler: Arc<Reconciler<OAuthConnection>>,
}

fn fixture(max_items: usize, retention_minutes: u64) -> Fixture {
    init_tracing();
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let sink = Arc::new(CollectingSink::new());
    let config = FallbackConfig {
        max_memory_items: max_items,
        memory_retention_minutes: retention_minutes,
        db_reconnect_interval_ms: 1_000,
        max_db_reconnect_attempts: 3,
        log_level: LogLevel::Debug,
        ..Default::default()
    };
    let buffer = Arc::new(
        FallbackBuffer::with_parts(config, MemoryStore::new(), clock.clone(), sink.clone()).unwrap(),
    );
    let db = Arc::new(FakeDatabase::default());
    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&buffer),
        db.clone() as Arc<dyn DurableStore<OAuthConnection>>,
    ));
    Fixture { buffer, db, clock, sink, reconciler }
}

/// What an OAuth callback does: write through, buffer on failure.
fn save_connection(f: &Fixture, id: &str, conn: OAuthConnection) {
    if let Err(e) = f.db.insert(id, conn.clone()) {
        assert!(e.is_unavailable());
        f.buffer.update_database_status(false);
        f.buffer.add(id, conn, BufferReason::DatabaseUnavailable);
    }
}

fn slack(user: &str) -> OAuthConnection {
    OAuthConnection::new("org-1", "slack", user)
        .with_access_token(format!("xoxb-{user}"))
        .with_scopes(["chat:write", "channels:read"])
}

// =============================================================================
// Happy path
// =============================================================================

#[test]
fn happy_database_up_nothing_buffered() {
    let f = fixture(10, 60);
    save_connection(&f, "c1", slack("U1"));

    assert_eq!(f.db.row_count(), 1);
    let status = f.buffer.storage_status();
    assert_eq!(status.mode, StorageMode::Database);
    assert_eq!(status.memory_items, 0);
    assert!(status.warning.is_none());
}

#[tokio::test]
async fn happy_outage_then_reconcile() {
    let f = fixture(10, 60);
    f.db.set_down(true);

    save_connection(&f, "c1", slack("U1"));
    save_connection(&f, "c2", slack("U2"));
    save_connection(&f, "c3", OAuthConnection::new("org-2", "github", "octocat"));

    // Lookups during the outage see buffered connections
    assert!(f.buffer.connection_exists("org-1", "slack", "U2"));
    assert_eq!(f.buffer.find_by_organization("org-1").len(), 2);
    assert_eq!(f.buffer.find_by_platform("org-2", "github").len(), 1);

    let status = f.buffer.storage_status();
    assert_eq!(status.mode, StorageMode::Memory);
    assert_eq!(status.pending_persistence, 3);

    // Probe fails while down
    assert!(f.reconciler.run_once().await.is_none());

    f.db.set_down(false);
    let result = f.reconciler.run_once().await.unwrap();
    assert_eq!(result.total, 3);
    assert!(result.is_success());

    assert_eq!(f.db.row_count(), 3);
    let status = f.buffer.storage_status();
    assert_eq!(status.mode, StorageMode::Database);
    assert!(status.database_available);
    assert_eq!(status.memory_items, 0);

    assert!(f
        .sink
        .events()
        .iter()
        .any(|e| e.message == "Database connection restored"));
}

#[tokio::test]
async fn happy_manual_override_is_never_persisted() {
    let f = fixture(10, 60);
    f.buffer.add("cache", slack("U9"), BufferReason::ManualOverride);

    let result = f.reconciler.run_once().await.unwrap();
    assert_eq!(result.total, 0);
    assert_eq!(f.db.row_count(), 0);
    assert!(f.buffer.get("cache").is_some());
    assert_eq!(f.buffer.storage_status().mode, StorageMode::Database);
}

#[tokio::test]
async fn happy_add_if_absent_deduplicates_retried_callback() {
    let f = fixture(10, 60);
    f.db.set_down(true);
    f.buffer.update_database_status(false);

    assert!(f
        .buffer
        .add_if_absent("c1", slack("U1"), BufferReason::DatabaseUnavailable)
        .is_some());
    // Same user retries the OAuth flow under a new id
    assert!(f
        .buffer
        .add_if_absent("c1-retry", slack("U1"), BufferReason::DatabaseUnavailable)
        .is_none());

    f.db.set_down(false);
    let result = f.reconciler.run_once().await.unwrap();
    assert_eq!(result.succeeded, 1);
    assert_eq!(f.db.row_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn happy_background_loop_recovers() {
    let f = fixture(10, 60);
    f.db.set_down(true);
    save_connection(&f, "c1", slack("U1"));

    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn({
        let reconciler = Arc::clone(&f.reconciler);
        async move { reconciler.run(rx).await }
    });

    // A few ticks while the database is down
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert!(f.buffer.get("c1").is_some());
    assert!(f.reconciler.health().failure_count() >= 2);

    f.db.set_down(false);
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert!(f.buffer.get("c1").is_none());
    assert_eq!(f.db.row_count(), 1);
    assert_eq!(f.reconciler.health().failure_count(), 0);

    tx.send(true).unwrap();
    task.await.unwrap();
}

// =============================================================================
// Failure scenarios
// =============================================================================

#[tokio::test]
async fn failure_outage_mid_drain_keeps_remainder() {
    let f = fixture(10, 60);
    f.db.set_down(true);
    for i in 0..4 {
        save_connection(&f, &format!("c{i}"), slack(&format!("U{i}")));
    }
    f.db.set_down(false);
    *f.db.fail_after.lock() = Some(2);

    let result = f.reconciler.run_once().await.unwrap();
    assert_eq!(result.succeeded, 2);
    assert_eq!(result.failed, 1);
    assert!(!result.is_success());

    assert!(!f.buffer.is_database_available());
    assert_eq!(f.buffer.pending_persistence().len(), 2);
    assert_eq!(f.buffer.storage_status().mode, StorageMode::Memory);

    *f.db.fail_after.lock() = None;
    f.db.set_down(false);
    let result = f.reconciler.run_once().await.unwrap();
    assert_eq!(result.succeeded, 2);
    assert_eq!(f.db.row_count(), 4);
    assert!(f.buffer.get_all().is_empty());
}

#[tokio::test]
async fn failure_long_outage_expires_records() {
    let f = fixture(10, 1);
    f.db.set_down(true);
    save_connection(&f, "old", slack("U1"));
    f.clock.advance(Duration::from_secs(30));
    save_connection(&f, "new", slack("U2"));
    f.clock.advance(Duration::from_secs(30));

    // "old" is exactly one retention window old
    assert!(f.buffer.get("old").is_none());
    assert!(f.buffer.get("new").is_some());

    f.db.set_down(false);
    let result = f.reconciler.run_once().await.unwrap();
    assert_eq!(result.total, 1);
    assert_eq!(f.db.row_count(), 1);
}

#[tokio::test]
async fn failure_buffer_full_evicts_oldest() {
    let f = fixture(3, 60);
    f.db.set_down(true);
    for i in 0..5 {
        save_connection(&f, &format!("c{i}"), slack(&format!("U{i}")));
    }

    let mut ids: Vec<String> = f.buffer.get_all().into_iter().map(|r| r.id).collect();
    ids.sort();
    assert_eq!(ids, vec!["c2", "c3", "c4"]);
    assert!(!f.buffer.connection_exists("org-1", "slack", "U0"));

    let evictions = f
        .sink
        .at_level(LogLevel::Warn)
        .into_iter()
        .filter(|e| e.field("id").is_some_and(|id| id == "c0" || id == "c1"))
        .count();
    assert_eq!(evictions, 2);
}

#[tokio::test]
async fn failure_repeated_probes_escalate() {
    let f = fixture(10, 60);
    f.db.set_down(true);

    for _ in 0..3 {
        assert!(!f.reconciler.probe().await);
    }
    assert!(f.reconciler.health().is_escalated());
    assert!(!f.buffer.is_database_available());

    f.db.set_down(false);
    assert!(f.reconciler.probe().await);
    assert!(!f.reconciler.health().is_escalated());
}
