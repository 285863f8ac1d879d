//! Per-session append-only redirect audit log (JSONL).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use tracing::warn;

use crate::domain::models::RedirectRecord;

use super::diag_log::read_jsonl;

/// Records every redirect (block) issued for a session.
#[derive(Debug, Clone)]
pub struct RedirectLog {
    dir: PathBuf,
}

impl RedirectLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.redirects.jsonl"))
    }

    /// Append one redirect record. Failures are logged and swallowed; the
    /// audit log is not allowed to affect the decision.
    pub fn append(&self, session_id: &str, record: &RedirectRecord) {
        if let Err(err) = self.try_append(session_id, record) {
            warn!(session_id, error = %err, "failed to append redirect record");
        }
    }

    fn try_append(&self, session_id: &str, record: &RedirectRecord) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let line = serde_json::to_string(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut file =
            OpenOptions::new().create(true).append(true).open(self.path_for(session_id))?;
        writeln!(file, "{line}")
    }

    /// All redirect records for a session, skipping malformed lines.
    pub fn read_all(&self, session_id: &str) -> Vec<RedirectRecord> {
        read_jsonl(&self.path_for(session_id))
    }

    /// Number of redirects already recorded; the next record is 1-indexed
    /// from here.
    pub fn count(&self, session_id: &str) -> u32 {
        self.read_all(session_id).len() as u32
    }
}
