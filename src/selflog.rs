//! Self-diagnostics for faults inside the sink itself.
//!
//! The crate runs as a `tracing` layer, so its own problems cannot be
//! reported through `tracing` without feeding back into the layer. They
//! go through a [`SelfLog`] instead, which writes to stderr by default.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};

/// One internal fault report, e.g. an event that could not be formatted
/// or a batch the backend rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Timestamp of the affected event, or of the fault itself when no
    /// single event is involved.
    pub timestamp: DateTime<Utc>,
    /// Raw message template of the affected event.
    pub message_template: Option<String>,
    /// Rendered cause.
    pub error: String,
}

impl Diagnostic {
    /// Report for one event that is being dropped.
    pub fn event(
        timestamp: DateTime<Utc>,
        message_template: impl Into<String>,
        error: impl fmt::Display,
    ) -> Self {
        Self {
            timestamp,
            message_template: Some(message_template.into()),
            error: error.to_string(),
        }
    }

    /// Report not tied to a single event.
    pub fn new(error: impl fmt::Display) -> Self {
        Self {
            timestamp: Utc::now(),
            message_template: None,
            error: error.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ts = self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        match &self.message_template {
            Some(template) => write!(
                f,
                "Event at {} with message template {} could not be formatted into JSON and will be dropped: {}",
                ts, template, self.error
            ),
            None => write!(f, "{} {}", ts, self.error),
        }
    }
}

impl Diagnostic {
    /// One-line JSON form, for log collectors that scrape stderr.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Destination for [`Diagnostic`]s.
pub trait SelfLog: Send + Sync {
    fn write(&self, diagnostic: Diagnostic);
}

/// Writes diagnostics to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSelfLog;

impl SelfLog for StderrSelfLog {
    fn write(&self, diagnostic: Diagnostic) {
        eprintln!("{}", diagnostic);
    }
}

/// Writes diagnostics to stderr as JSON objects, one per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStderrSelfLog;

impl SelfLog for JsonStderrSelfLog {
    fn write(&self, diagnostic: Diagnostic) {
        match diagnostic.to_json() {
            Ok(line) => eprintln!("{}", line),
            Err(_) => eprintln!("{}", diagnostic),
        }
    }
}

/// Keeps diagnostics in memory so they can be inspected later.
#[derive(Debug, Default)]
pub struct MemorySelfLog {
    entries: Mutex<Vec<Diagnostic>>,
}

impl MemorySelfLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of everything recorded so far.
    pub fn entries(&self) -> Vec<Diagnostic> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SelfLog for MemorySelfLog {
    fn write(&self, diagnostic: Diagnostic) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }
}

/// Default diagnostics channel.
pub fn stderr() -> Arc<dyn SelfLog> {
    Arc::new(StderrSelfLog)
}
