// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the fallback buffer.
//!
//! The buffer takes an already-resolved configuration. Loading it from files
//! or the environment is left to the host process; every field has a serde
//! default so partial documents deserialize cleanly.
//!
//! # Example
//!
//! ```
//! use fallback_store::{FallbackConfig, LogLevel};
//!
//! // Minimal config (uses defaults)
//! let config = FallbackConfig::default();
//! assert_eq!(config.max_memory_items, 100);
//! assert_eq!(config.log_level, LogLevel::Info);
//!
//! // Tuned config
//! let config = FallbackConfig {
//!     max_memory_items: 500,
//!     memory_retention_minutes: 15,
//!     auto_persist_on_reconnect: false,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum severity of log events the buffer hands to its sink.
///
/// Ordered so that `Debug < Info < Warn < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(ConfigError::UnknownLogLevel(other.to_string())),
        }
    }
}

/// Rejected configuration values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_memory_items must be at least 1")]
    ZeroCapacity,
    #[error("memory_retention_minutes must be at least 1")]
    ZeroRetention,
    #[error("unknown log level '{0}' (expected debug, info, warn or error)")]
    UnknownLogLevel(String),
}

/// Configuration for [`crate::FallbackBuffer`] and the reconciliation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Maximum number of buffered records (default: 100)
    #[serde(default = "default_max_memory_items")]
    pub max_memory_items: usize,

    /// Retention window in minutes before a record expires (default: 60)
    #[serde(default = "default_memory_retention_minutes")]
    pub memory_retention_minutes: u64,

    /// Interval between database probes in the reconciliation loop
    #[serde(default = "default_db_reconnect_interval_ms")]
    pub db_reconnect_interval_ms: u64,

    /// Consecutive failed probes before the outage is escalated to an error
    #[serde(default = "default_max_db_reconnect_attempts")]
    pub max_db_reconnect_attempts: u32,

    /// Announce pending records when the database comes back
    #[serde(default = "default_auto_persist_on_reconnect")]
    pub auto_persist_on_reconnect: bool,

    /// Minimum level of emitted log events
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_max_memory_items() -> usize { 100 }
fn default_memory_retention_minutes() -> u64 { 60 }
fn default_db_reconnect_interval_ms() -> u64 { 30_000 }
fn default_max_db_reconnect_attempts() -> u32 { 10 }
fn default_auto_persist_on_reconnect() -> bool { true }

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            max_memory_items: default_max_memory_items(),
            memory_retention_minutes: default_memory_retention_minutes(),
            db_reconnect_interval_ms: default_db_reconnect_interval_ms(),
            max_db_reconnect_attempts: default_max_db_reconnect_attempts(),
            auto_persist_on_reconnect: default_auto_persist_on_reconnect(),
            log_level: LogLevel::default(),
        }
    }
}

impl FallbackConfig {
    /// Check the values the buffer cannot operate without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_memory_items == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.memory_retention_minutes == 0 {
            return Err(ConfigError::ZeroRetention);
        }
        Ok(())
    }

    /// Retention window as a duration.
    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.memory_retention_minutes.saturating_mul(60))
    }

    /// Retention window in epoch-millisecond units.
    #[must_use]
    pub fn retention_millis(&self) -> i64 {
        i64::try_from(self.retention().as_millis()).unwrap_or(i64::MAX)
    }

    #[must_use]
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.db_reconnect_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FallbackConfig::default();
        assert_eq!(config.max_memory_items, 100);
        assert_eq!(config.memory_retention_minutes, 60);
        assert_eq!(config.db_reconnect_interval_ms, 30_000);
        assert_eq!(config.max_db_reconnect_attempts, 10);
        assert!(config.auto_persist_on_reconnect);
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: FallbackConfig =
            serde_json::from_str(r#"{"max_memory_items": 5, "log_level": "warn"}"#).unwrap();
        assert_eq!(config.max_memory_items, 5);
        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.memory_retention_minutes, 60);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = FallbackConfig { max_memory_items: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity));

        let config = FallbackConfig { memory_retention_minutes: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroRetention));
    }

    #[test]
    fn test_retention_conversion() {
        let config = FallbackConfig { memory_retention_minutes: 2, ..Default::default() };
        assert_eq!(config.retention(), Duration::from_secs(120));
        assert_eq!(config.retention_millis(), 120_000);
    }

    #[test]
    fn test_log_level_ordering_and_parsing() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);

        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(" debug ".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert!(matches!(
            "verbose".parse::<LogLevel>(),
            Err(ConfigError::UnknownLogLevel(_))
        ));
        assert_eq!(LogLevel::Error.to_string(), "error");
    }
}
