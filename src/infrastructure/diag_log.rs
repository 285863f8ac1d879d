//! Per-session diagnostic event log (append-only JSONL).
//!
//! Records state reads, write attempts and outcomes, and monotonicity
//! violations. Consumed only by the diagnostics service; never required for
//! correctness of the decision path, so every append failure is swallowed
//! with a log line.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One diagnostic event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagEvent {
    StateRead {
        timestamp: DateTime<Utc>,
        turn_count: u64,
        /// Whether the canonical file parsed, or a fresh state was substituted.
        fresh: bool,
    },
    WriteAttempt {
        timestamp: DateTime<Utc>,
        attempt: u32,
        turn_count: u64,
    },
    WriteSuccess {
        timestamp: DateTime<Utc>,
        turn_count: u64,
    },
    WriteFailure {
        timestamp: DateTime<Utc>,
        attempt: u32,
        error: String,
    },
    MonotonicityViolation {
        timestamp: DateTime<Utc>,
        old_turn_count: u64,
        new_turn_count: u64,
    },
}

impl DiagEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::StateRead { timestamp, .. }
            | Self::WriteAttempt { timestamp, .. }
            | Self::WriteSuccess { timestamp, .. }
            | Self::WriteFailure { timestamp, .. }
            | Self::MonotonicityViolation { timestamp, .. } => *timestamp,
        }
    }
}

/// Appends and reads per-session diagnostic logs under a state directory.
#[derive(Debug, Clone)]
pub struct DiagLog {
    dir: PathBuf,
}

impl DiagLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.diag.jsonl"))
    }

    /// Append one event. Failures are logged and swallowed; diagnostics must
    /// never interfere with the decision path.
    pub fn append(&self, session_id: &str, event: &DiagEvent) {
        if let Err(err) = self.try_append(session_id, event) {
            warn!(session_id, error = %err, "failed to append diagnostic event");
        }
    }

    fn try_append(&self, session_id: &str, event: &DiagEvent) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let line = serde_json::to_string(event)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut file =
            OpenOptions::new().create(true).append(true).open(self.path_for(session_id))?;
        writeln!(file, "{line}")
    }

    /// Read all events for a session, skipping malformed lines.
    pub fn read_all(&self, session_id: &str) -> Vec<DiagEvent> {
        read_jsonl(&self.path_for(session_id))
    }
}

/// Shared JSONL reader: tolerates and skips malformed lines rather than
/// failing the whole read.
pub fn read_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> Vec<T> {
    let Ok(raw) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(error = %err, "skipping malformed log line");
                None
            }
        })
        .collect()
}
