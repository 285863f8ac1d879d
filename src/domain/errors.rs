//! Domain errors for the stopgate engine.
//!
//! Every boundary returns an explicit `Result`; the caller of each layer is
//! responsible for mapping error variants to that layer's fail-open outcome
//! instead of propagating. No error in this crate is allowed to surface as a
//! user-visible crash or to block session termination indefinitely.

use thiserror::Error;

/// Errors while loading or validating the rule definition source.
///
/// All variants are recovered locally by substituting the built-in fallback
/// rule set; they exist so the recovery is visible in logs.
#[derive(Debug, Error)]
pub enum RuleStoreError {
    #[error("Rule source not found: {0}")]
    SourceMissing(String),

    #[error("Rule source is not a list of records")]
    NotAList,

    #[error("Failed to parse rule source: {0}")]
    ParseFailed(String),

    #[error("Rule source contained no valid considerations")]
    NoValidRules,
}

/// Errors from a single rule check. Mapped to `satisfied = true` (fail-open)
/// by the pipeline, scoped to that one rule only.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("Check timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("External analyzer failed: {0}")]
    AnalyzerFailed(String),

    #[error("Check task aborted: {0}")]
    TaskAborted(String),
}

/// Errors from the turn-state persistence layer. Saves are retried with
/// backoff, then abandoned without changing the turn's decision.
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("I/O error during {step}: {source}")]
    Io {
        step: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("State file failed to parse: {0}")]
    Corrupt(String),

    #[error("Write verification failed: expected turn_count {expected}, read back {actual}")]
    VerificationFailed { expected: u64, actual: u64 },

    #[error("Save abandoned after {attempts} attempts: {last_error}")]
    SaveAbandoned { attempts: u32, last_error: String },
}

impl StateStoreError {
    pub fn io(step: &'static str, source: std::io::Error) -> Self {
        Self::Io { step, source }
    }
}

/// Top-level engine errors. The outermost fail-open backstop converts any of
/// these into an approve decision with a distinguishing reason tag.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Transcript could not be read: {0}")]
    TranscriptUnavailable(String),

    #[error(transparent)]
    StateStore(#[from] StateStoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type GateResult<T> = Result<T, GateError>;
