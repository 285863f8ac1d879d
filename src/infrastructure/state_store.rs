//! Durable per-session turn state with an atomic write protocol.
//!
//! Save protocol: write the full state to a temporary file in the same
//! directory, flush and force it to stable storage, read it back and verify
//! the written `turn_count`, atomically rename over the canonical file, then
//! read the canonical file back and verify again. Failures retry with
//! exponential backoff and are finally abandoned without raising: the
//! in-memory decision for this turn already happened and must not be blocked
//! by a storage fault.
//!
//! The protocol gives crash-safety, not mutual exclusion; callers serialize
//! evaluations per session (one termination attempt at a time).

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::domain::errors::StateStoreError;
use crate::domain::models::{StateConfig, TurnState};

use super::diag_log::{DiagEvent, DiagLog};

/// File-backed store for `TurnState`, one JSON file per session.
pub struct TurnStateStore {
    dir: PathBuf,
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    diag: DiagLog,
    /// `turn_count` observed at load time, per session; used for the
    /// advisory monotonicity check on save.
    loaded_turn_counts: Mutex<HashMap<String, u64>>,
}

impl TurnStateStore {
    pub fn new(config: &StateConfig) -> Self {
        let dir = PathBuf::from(&config.dir);
        Self {
            diag: DiagLog::new(&dir),
            dir,
            max_retries: config.max_save_retries.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            loaded_turn_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Store rooted at `dir` with the default retry policy. Convenience for
    /// tests and the CLI state commands.
    pub fn at_dir(dir: impl Into<PathBuf>) -> Self {
        let mut config = StateConfig::default();
        config.dir = dir.into().to_string_lossy().into_owned();
        Self::new(&config)
    }

    fn state_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }

    fn temp_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!(".{session_id}.json.tmp"))
    }

    /// Load a session's state, falling back to a fresh empty state on any
    /// parse or I/O error. Never fails.
    pub fn load(&self, session_id: &str) -> TurnState {
        let (state, fresh) = match self.try_load(session_id) {
            Ok(state) => (state, false),
            Err(err) => {
                debug!(session_id, error = %err, "no usable state file, starting fresh");
                (TurnState::new(session_id), true)
            }
        };

        self.loaded_turn_counts
            .lock()
            .expect("loaded_turn_counts lock poisoned")
            .insert(session_id.to_string(), state.turn_count);
        self.diag.append(
            session_id,
            &DiagEvent::StateRead { timestamp: Utc::now(), turn_count: state.turn_count, fresh },
        );
        state
    }

    fn try_load(&self, session_id: &str) -> Result<TurnState, StateStoreError> {
        let raw = std::fs::read_to_string(self.state_path(session_id))
            .map_err(|e| StateStoreError::io("read canonical", e))?;
        serde_json::from_str(&raw).map_err(|e| StateStoreError::Corrupt(e.to_string()))
    }

    /// Save a session's state with retries. A failed save is abandoned after
    /// the retry budget; the caller's decision stands either way.
    pub async fn save(&self, state: &TurnState) {
        let session_id = state.session_id.as_str();
        self.check_monotonicity(state);

        let mut backoff = self.initial_backoff;
        let mut last_error = String::new();
        for attempt in 1..=self.max_retries {
            self.diag.append(
                session_id,
                &DiagEvent::WriteAttempt {
                    timestamp: Utc::now(),
                    attempt,
                    turn_count: state.turn_count,
                },
            );
            match self.try_save_once(state) {
                Ok(()) => {
                    self.diag.append(
                        session_id,
                        &DiagEvent::WriteSuccess {
                            timestamp: Utc::now(),
                            turn_count: state.turn_count,
                        },
                    );
                    self.loaded_turn_counts
                        .lock()
                        .expect("loaded_turn_counts lock poisoned")
                        .insert(session_id.to_string(), state.turn_count);
                    return;
                }
                Err(err) => {
                    last_error = err.to_string();
                    warn!(session_id, attempt, error = %last_error, "state save attempt failed");
                    self.diag.append(
                        session_id,
                        &DiagEvent::WriteFailure {
                            timestamp: Utc::now(),
                            attempt,
                            error: last_error.clone(),
                        },
                    );
                    if attempt < self.max_retries {
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(self.max_backoff);
                    }
                }
            }
        }

        let abandoned = StateStoreError::SaveAbandoned {
            attempts: self.max_retries,
            last_error,
        };
        warn!(session_id, error = %abandoned, "abandoning state save");
    }

    /// Advisory monotonicity check: a decreasing `turn_count` is logged but
    /// never aborts the save.
    fn check_monotonicity(&self, state: &TurnState) {
        let previous = self
            .loaded_turn_counts
            .lock()
            .expect("loaded_turn_counts lock poisoned")
            .get(&state.session_id)
            .copied();
        if let Some(old) = previous {
            if state.turn_count < old {
                warn!(
                    session_id = %state.session_id,
                    old_turn_count = old,
                    new_turn_count = state.turn_count,
                    "turn_count decreased; saving anyway"
                );
                self.diag.append(
                    &state.session_id,
                    &DiagEvent::MonotonicityViolation {
                        timestamp: Utc::now(),
                        old_turn_count: old,
                        new_turn_count: state.turn_count,
                    },
                );
            }
        }
    }

    /// One pass of the write-verify-rename-verify protocol.
    fn try_save_once(&self, state: &TurnState) -> Result<(), StateStoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| StateStoreError::io("create dir", e))?;
        let temp = self.temp_path(&state.session_id);
        let canonical = self.state_path(&state.session_id);

        let payload = serde_json::to_vec_pretty(state)
            .map_err(|e| StateStoreError::Corrupt(e.to_string()))?;

        let mut file = File::create(&temp).map_err(|e| StateStoreError::io("create temp", e))?;
        file.write_all(&payload).map_err(|e| StateStoreError::io("write temp", e))?;
        file.flush().map_err(|e| StateStoreError::io("flush temp", e))?;
        file.sync_all().map_err(|e| StateStoreError::io("sync temp", e))?;
        drop(file);

        Self::verify(&temp, state.turn_count)?;

        std::fs::rename(&temp, &canonical).map_err(|e| StateStoreError::io("rename", e))?;

        Self::verify(&canonical, state.turn_count)
    }

    /// Read a state file back and check the written `turn_count` matches.
    fn verify(path: &Path, expected: u64) -> Result<(), StateStoreError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StateStoreError::io("read back", e))?;
        let written: TurnState =
            serde_json::from_str(&raw).map_err(|e| StateStoreError::Corrupt(e.to_string()))?;
        if written.turn_count == expected {
            Ok(())
        } else {
            Err(StateStoreError::VerificationFailed { expected, actual: written.turn_count })
        }
    }

    /// Diagnostic events recorded for a session.
    pub fn diag_events(&self, session_id: &str) -> Vec<DiagEvent> {
        self.diag.read_all(session_id)
    }
}
