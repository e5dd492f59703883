//! Session Log Recorder
//!
//! Append-only record of diagnostic events for the current session, read by
//! an optional inspector panel. Entries are never mutated or removed while
//! the session lives; a new session starts with an empty recorder.
//!
//! Every entry is also mirrored to `tracing` so the same events reach the
//! process log.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a log entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// Lifecycle information
    Info,
    /// A send was acknowledged
    Success,
    /// A failure
    Error,
    /// A message was sent to the agent
    Request,
    /// A reply arrived from the agent
    Response,
}

impl LogKind {
    /// Uppercase label for inspector panels
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
            Self::Request => "REQUEST",
            Self::Response => "RESPONSE",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Log entry identifier (sequence number within one recorder)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogEntryId(pub u64);

/// One recorded event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Entry ID
    pub id: LogEntryId,
    /// When the entry was recorded
    pub timestamp: DateTime<Utc>,
    /// Entry kind
    pub kind: LogKind,
    /// Human-readable message
    pub message: String,
    /// Structured payload (e.g. a content preview)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Append-only diagnostic log for one session
#[derive(Clone, Debug, Default)]
pub struct LogRecorder {
    entries: Vec<LogEntry>,
    next_id: u64,
}

impl LogRecorder {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry and return its ID
    pub fn record(
        &mut self,
        kind: LogKind,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> LogEntryId {
        let id = LogEntryId(self.next_id);
        self.next_id += 1;

        let message = message.into();
        match kind {
            LogKind::Error => tracing::warn!(kind = %kind, details = ?details, "{message}"),
            LogKind::Request | LogKind::Response => {
                tracing::debug!(kind = %kind, details = ?details, "{message}");
            }
            LogKind::Info | LogKind::Success => tracing::info!(kind = %kind, "{message}"),
        }

        self.entries.push(LogEntry {
            id,
            timestamp: Utc::now(),
            kind,
            message,
            details,
        });
        id
    }

    /// All entries in emission order
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Entries recorded after the given number of entries
    ///
    /// Lets a surface render only what is new since its last render.
    #[must_use]
    pub fn entries_since(&self, seen: usize) -> &[LogEntry] {
        &self.entries[seen.min(self.entries.len())..]
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries of one kind
    #[must_use]
    pub fn count(&self, kind: LogKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    /// Most recent entry
    #[must_use]
    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    /// Kinds in emission order
    #[must_use]
    pub fn kinds(&self) -> Vec<LogKind> {
        self.entries.iter().map(|e| e.kind).collect()
    }

    /// Drop everything; only used when a new session begins
    pub(crate) fn reset(&mut self) {
        self.entries.clear();
        self.next_id = 0;
    }
}
