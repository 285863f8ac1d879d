//! Session classifier: assigns a category used to filter applicable rules.
//!
//! Classification is a priority-ordered decision over transcript-derived
//! signals. Development signals (code writes, test runs, PR operations)
//! outrank everything else. An explicit override from the control surface
//! takes precedence over all signals.

use tracing::debug;

use crate::domain::models::{SessionType, Transcript};

/// Classifies a transcript into one of the four session categories.
pub struct SessionClassifier;

impl SessionClassifier {
    /// Classify the session, honoring an explicit override first.
    pub fn classify(transcript: &Transcript, override_type: Option<SessionType>) -> SessionType {
        if let Some(forced) = override_type {
            debug!(session_type = forced.as_str(), "session type forced by override");
            return forced;
        }

        let resolved = Self::classify_signals(transcript);
        debug!(session_type = resolved.as_str(), "session classified");
        resolved
    }

    fn classify_signals(transcript: &Transcript) -> SessionType {
        // Fail-open default: nothing observable happened, so no rule should
        // be in a position to block.
        if transcript.is_empty() {
            return SessionType::Informational;
        }

        let code_writes = transcript.code_writes().len();
        let test_runs = transcript.test_commands().len();
        let pr_ops = transcript.has_pr_operations();
        if code_writes > 0 || test_runs > 0 || pr_ops {
            return SessionType::Development;
        }

        let total_writes = transcript.written_paths().len();
        let reads = transcript.read_only_ops();
        if total_writes == 0 && (reads == 0 || transcript.initial_question_density() > 0.5) {
            return SessionType::Informational;
        }

        if reads >= 2 && total_writes == 0 {
            return SessionType::Investigation;
        }

        let doc_writes = transcript.doc_config_writes().len();
        let vcs_only = !transcript.vcs_commands().is_empty() && code_writes == 0;
        if (total_writes > 0 && doc_writes == total_writes) || vcs_only {
            return SessionType::Maintenance;
        }

        // Writes that are neither code nor docs, no reads to speak of.
        // Treat as maintenance rather than development; nothing suggests
        // code work happened.
        if total_writes > 0 {
            return SessionType::Maintenance;
        }

        SessionType::Informational
    }
}
