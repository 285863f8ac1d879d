//! Port for an optional external semantic analyzer.
//!
//! A deployment may plug in a higher-quality analyzer (an LLM call, a
//! classifier service) that replaces a rule's built-in heuristic. The engine
//! must function correctly with no analyzer configured; analyzer absence,
//! timeout, or failure always falls back to the built-in heuristics.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::{Consideration, SessionType, Transcript};

/// Verdict returned by an external analyzer for one consideration.
#[derive(Debug, Clone)]
pub struct AnalyzerVerdict {
    pub satisfied: bool,
    pub reason: String,
}

/// Analyzer failures. The pipeline maps every variant to its heuristic
/// fallback; none of these ever reaches the decision engine.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Analyzer unavailable: {0}")]
    Unavailable(String),

    #[error("Analyzer request failed: {0}")]
    RequestFailed(String),

    #[error("Analyzer returned an unusable response: {0}")]
    InvalidResponse(String),
}

/// External semantic analyzer for rule checks.
///
/// Arguments are `Arc`-owned so the pipeline can race the call against a
/// deadline on a spawned task and abandon it on timeout without lifetime
/// entanglement; a late result is simply dropped with its task.
#[async_trait]
pub trait SemanticAnalyzer: Send + Sync {
    async fn assess(
        &self,
        transcript: Arc<Transcript>,
        consideration: Arc<Consideration>,
        session_type: SessionType,
    ) -> Result<AnalyzerVerdict, AnalyzerError>;
}
