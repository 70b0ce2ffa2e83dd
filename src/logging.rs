// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Structured log events emitted by the buffer.
//!
//! The buffer never formats or writes logs itself. It builds a [`LogEvent`],
//! drops it if it is below the configured [`LogLevel`], and hands it to an
//! injected [`EventSink`]. The default [`TracingSink`] forwards to `tracing`.
//!
//! # Example
//!
//! ```
//! use fallback_store::logging::{CollectingSink, EventLogger};
//! use fallback_store::LogLevel;
//! use std::sync::Arc;
//!
//! let sink = Arc::new(CollectingSink::new());
//! let logger = EventLogger::new("oauth-buffer", LogLevel::Warn, sink.clone());
//!
//! logger.info(0, "dropped: below threshold", Vec::new());
//! logger.warn(0, "kept", vec![("id", "conn-1".to_string())]);
//!
//! assert_eq!(sink.len(), 1);
//! assert_eq!(sink.events()[0].message, "kept");
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::LogLevel;

/// One structured log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub level: LogLevel,
    /// Epoch millis, taken from the buffer's clock
    pub timestamp: i64,
    pub component: &'static str,
    pub message: String,
    pub fields: Vec<(&'static str, String)>,
}

impl LogEvent {
    /// Look up a field value by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// `key=value` pairs, space separated.
struct Fields<'a>(&'a [(&'static str, String)]);

impl fmt::Display for Fields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

/// Destination for buffer log events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LogEvent);
}

/// Forwards events to the `tracing` macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &LogEvent) {
        let fields = Fields(&event.fields);
        match event.level {
            LogLevel::Debug => debug!(component = event.component, fields = %fields, "{}", event.message),
            LogLevel::Info => info!(component = event.component, fields = %fields, "{}", event.message),
            LogLevel::Warn => warn!(component = event.component, fields = %fields, "{}", event.message),
            LogLevel::Error => error!(component = event.component, fields = %fields, "{}", event.message),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<LogEvent>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Events at exactly `level`.
    #[must_use]
    pub fn at_level(&self, level: LogLevel) -> Vec<LogEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: &LogEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Level-filtering front end over a sink.
#[derive(Clone)]
pub struct EventLogger {
    component: &'static str,
    min_level: LogLevel,
    sink: Arc<dyn EventSink>,
}

impl fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLogger")
            .field("component", &self.component)
            .field("min_level", &self.min_level)
            .finish_non_exhaustive()
    }
}

impl EventLogger {
    pub fn new(component: &'static str, min_level: LogLevel, sink: Arc<dyn EventSink>) -> Self {
        Self {
            component,
            min_level,
            sink,
        }
    }

    #[must_use]
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    pub fn log(
        &self,
        level: LogLevel,
        timestamp: i64,
        message: impl Into<String>,
        fields: Vec<(&'static str, String)>,
    ) {
        if !self.enabled(level) {
            return;
        }
        self.sink.emit(&LogEvent {
            level,
            timestamp,
            component: self.component,
            message: message.into(),
            fields,
        });
    }

    pub fn debug(&self, timestamp: i64, message: impl Into<String>, fields: Vec<(&'static str, String)>) {
        self.log(LogLevel::Debug, timestamp, message, fields);
    }

    pub fn info(&self, timestamp: i64, message: impl Into<String>, fields: Vec<(&'static str, String)>) {
        self.log(LogLevel::Info, timestamp, message, fields);
    }

    pub fn warn(&self, timestamp: i64, message: impl Into<String>, fields: Vec<(&'static str, String)>) {
        self.log(LogLevel::Warn, timestamp, message, fields);
    }

    pub fn error(&self, timestamp: i64, message: impl Into<String>, fields: Vec<(&'static str, String)>) {
        self.log(LogLevel::Error, timestamp, message, fields);
    }
}
