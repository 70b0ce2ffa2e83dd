// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Buffered record data structures.
//!
//! A [`StoredRecord`] wraps a caller payload with the bookkeeping the buffer
//! needs: when it was stored, why, and how reconciliation has gone so far.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a record was placed in the buffer.
///
/// Only [`BufferReason::DatabaseUnavailable`] queues a record for
/// reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferReason {
    /// The durable write failed because the database was unreachable
    DatabaseUnavailable,
    /// Buffered deliberately by an operator or caller; never persisted from here
    ManualOverride,
}

impl BufferReason {
    #[must_use]
    pub fn needs_persistence(&self) -> bool {
        matches!(self, Self::DatabaseUnavailable)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DatabaseUnavailable => "database_unavailable",
            Self::ManualOverride => "manual_override",
        }
    }
}

impl std::fmt::Display for BufferReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconciliation bookkeeping for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// When the caller first tried to store this record (epoch millis)
    pub original_attempt: i64,
    pub reason: BufferReason,
    /// Number of durable-write attempts so far. Never decreases.
    pub persistence_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_persistence_attempt: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_persistence_error: Option<String>,
}

/// One buffered item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord<T> {
    /// Caller-supplied key, immutable for the record's lifetime
    pub id: String,
    pub payload: T,
    /// Insertion timestamp (epoch millis); drives expiration
    pub stored_at: i64,
    pub needs_persistence: bool,
    pub metadata: RecordMetadata,
    /// Insertion stamp assigned by the buffer. Re-adding an id yields a new
    /// generation even within the same millisecond.
    #[serde(default)]
    pub generation: u64,
}

impl<T> StoredRecord<T> {
    /// Build a fresh record stamped at `now`.
    pub fn new(id: impl Into<String>, payload: T, reason: BufferReason, now: i64) -> Self {
        Self {
            id: id.into(),
            payload,
            stored_at: now,
            needs_persistence: reason.needs_persistence(),
            metadata: RecordMetadata {
                original_attempt: now,
                reason,
                persistence_attempts: 0,
                last_persistence_attempt: None,
                last_persistence_error: None,
            },
            generation: 0,
        }
    }

    /// Whether the retention window has elapsed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: i64, retention_millis: i64) -> bool {
        now.saturating_sub(self.stored_at) >= retention_millis
    }

    /// Age at `now` in milliseconds (zero for clock skew into the future).
    #[must_use]
    pub fn age_millis(&self, now: i64) -> u64 {
        now.saturating_sub(self.stored_at).max(0) as u64
    }

    /// Log one persistence attempt. `error` of `None` clears any earlier error.
    pub(crate) fn record_attempt(&mut self, now: i64, error: Option<&str>) {
        self.metadata.persistence_attempts = self.metadata.persistence_attempts.saturating_add(1);
        self.metadata.last_persistence_attempt = Some(now);
        self.metadata.last_persistence_error = error.map(str::to_string);
    }
}

/// Lookup fields the buffer's connection queries rely on.
pub trait ConnectionPayload {
    fn organization_id(&self) -> &str;
    fn platform_type(&self) -> &str;
    fn platform_user_id(&self) -> &str;

    /// Same organization, platform and platform user.
    fn same_connection(&self, other: &Self) -> bool {
        self.organization_id() == other.organization_id()
            && self.platform_type() == other.platform_type()
            && self.platform_user_id() == other.platform_user_id()
    }
}

/// Snapshot of a completed OAuth handshake.
///
/// # Example
///
/// ```
/// use fallback_store::{ConnectionPayload, OAuthConnection};
///
/// let conn = OAuthConnection::new("org-1", "slack", "U123")
///     .with_access_token("xoxb-token");
///
/// assert_eq!(conn.platform_type(), "slack");
/// assert_eq!(conn.access_token.as_deref(), Some("xoxb-token"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthConnection {
    pub organization_id: String,
    pub platform_type: String,
    pub platform_user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Token expiry (epoch millis)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Platform-specific extras (team name, workspace URL, ...)
    #[serde(default)]
    pub metadata: Value,
}

impl OAuthConnection {
    pub fn new(
        organization_id: impl Into<String>,
        platform_type: impl Into<String>,
        platform_user_id: impl Into<String>,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            platform_type: platform_type.into(),
            platform_user_id: platform_user_id.into(),
            access_token: None,
            refresh_token: None,
            expires_at: None,
            scopes: Vec::new(),
            metadata: Value::Null,
        }
    }

    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }
}

impl ConnectionPayload for OAuthConnection {
    fn organization_id(&self) -> &str {
        &self.organization_id
    }

    fn platform_type(&self) -> &str {
        &self.platform_type
    }

    fn platform_user_id(&self) -> &str {
        &self.platform_user_id
    }
}
