//! Delta analyzer: inspects only the transcript produced since the last
//! block, avoiding full re-analysis.
//!
//! Given the prior block's failures, determines which were plausibly
//! addressed in the delta and extracts new completion claims. Absence of
//! evidence is not failure — it only means "not yet shown to be addressed".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::models::{FailureEvidence, TranscriptEntry};

/// Phrases that count as a completion claim.
const CLAIM_VOCABULARY: &[&str] = &[
    "done",
    "complete",
    "completed",
    "finished",
    "implemented",
    "fixed",
    "all set",
    "ready for review",
    "tests pass",
    "working now",
];

/// Characters of surrounding context captured around a claim keyword so a
/// reviewer can judge the claim, not just see the bare word.
const CLAIM_CONTEXT_WINDOW: usize = 80;

/// A detected completion claim with its surrounding context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionClaim {
    pub phrase: String,
    pub context: String,
}

/// Output of one delta analysis.
#[derive(Debug, Clone, Default)]
pub struct DeltaReport {
    /// Consideration id -> evidence string for failures plausibly addressed
    /// in the delta.
    pub addressed: BTreeMap<String, String>,
    pub claims: Vec<CompletionClaim>,
    /// Terse log-level summary; not a decision input.
    pub summary: String,
}

/// Analyzes the transcript slice past the watermark.
pub struct DeltaAnalyzer;

impl DeltaAnalyzer {
    /// `delta` is exactly the transcript slice between the recorded
    /// watermark and the current transcript length.
    pub fn analyze(delta: &[TranscriptEntry], previous_failures: &[FailureEvidence]) -> DeltaReport {
        let delta_text = delta.iter().map(TranscriptEntry::text).collect::<Vec<_>>().join("\n");
        let delta_lower = delta_text.to_lowercase();

        let mut addressed = BTreeMap::new();
        for failure in previous_failures {
            if let Some(evidence) =
                Self::corroborating_evidence(&failure.consideration_id, delta, &delta_lower)
            {
                addressed.insert(failure.consideration_id.clone(), evidence);
            }
        }

        let claims = Self::detect_claims(&delta_text);
        let summary = format!(
            "delta: {} new entries, {} prior failure(s) addressed, {} completion claim(s)",
            delta.len(),
            addressed.len(),
            claims.len()
        );
        debug!(%summary, "delta analysis complete");

        DeltaReport { addressed, claims, summary }
    }

    /// Rule-specific corroboration. Structural signals first, then textual
    /// markers; returns a non-empty evidence string on a hit.
    fn corroborating_evidence(
        consideration_id: &str,
        delta: &[TranscriptEntry],
        delta_lower: &str,
    ) -> Option<String> {
        match consideration_id {
            "todos_complete" => {
                let all_complete = delta
                    .iter()
                    .rev()
                    .find_map(TranscriptEntry::todo_items)
                    .is_some_and(|items| items.iter().all(|i| i.is_completed()));
                if all_complete {
                    return Some("task list updated with every item completed".to_string());
                }
                Self::text_evidence(delta_lower, &["todos complete", "all items completed"])
            }
            "tests_passing" => {
                let test_run = delta.iter().filter_map(TranscriptEntry::command).any(|c| {
                    c.contains("test")
                });
                if test_run {
                    return Some("a test command was run in the delta".to_string());
                }
                Self::text_evidence(delta_lower, &["tests pass", "test result: ok", "all passing"])
            }
            "no_placeholders" => {
                let edited = delta.iter().any(|e| e.written_content().is_some());
                if edited {
                    return Some("content was rewritten in the delta".to_string());
                }
                Self::text_evidence(delta_lower, &["removed the placeholder", "implemented the stub"])
            }
            "work_committed" => {
                let committed = delta
                    .iter()
                    .filter_map(TranscriptEntry::command)
                    .any(|c| c.contains("git commit"));
                if committed {
                    return Some("a commit command was run in the delta".to_string());
                }
                Self::text_evidence(delta_lower, &["committed", "pushed"])
            }
            "questions_resolved" => {
                Self::text_evidence(delta_lower, &["answered", "clarified", "decided to", "going with"])
            }
            other => {
                // Fall back to a mention of the rule's topic words.
                let topic: Vec<&str> =
                    other.split('_').filter(|w| w.len() > 3).collect();
                let hit = topic.iter().find(|w| delta_lower.contains(**w))?;
                Some(format!("delta mentions \"{hit}\""))
            }
        }
    }

    fn text_evidence(delta_lower: &str, markers: &[&str]) -> Option<String> {
        markers
            .iter()
            .find(|m| delta_lower.contains(**m))
            .map(|m| format!("delta contains \"{m}\""))
    }

    /// Scan for completion-claim phrases, capturing a bounded window of
    /// context around each match.
    fn detect_claims(delta_text: &str) -> Vec<CompletionClaim> {
        let lower = delta_text.to_lowercase();
        let mut claims = Vec::new();
        for phrase in CLAIM_VOCABULARY {
            for (pos, _) in lower.match_indices(phrase) {
                let start = pos.saturating_sub(CLAIM_CONTEXT_WINDOW);
                let end = (pos + phrase.len() + CLAIM_CONTEXT_WINDOW).min(delta_text.len());
                // Clamp to char boundaries so slicing cannot panic.
                let start = (0..=start).rev().find(|&i| delta_text.is_char_boundary(i)).unwrap_or(0);
                let end = (end..=delta_text.len())
                    .find(|&i| delta_text.is_char_boundary(i))
                    .unwrap_or(delta_text.len());
                claims.push(CompletionClaim {
                    phrase: (*phrase).to_string(),
                    context: delta_text[start..end].trim().to_string(),
                });
            }
        }
        claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Role;
    use chrono::Utc;
    use serde_json::json;

    fn failure(id: &str) -> FailureEvidence {
        FailureEvidence {
            consideration_id: id.to_string(),
            reason: "unsatisfied".to_string(),
            evidence_quote: None,
            timestamp: Utc::now(),
            was_claimed_complete: false,
        }
    }

    fn agent_msg(text: &str) -> TranscriptEntry {
        TranscriptEntry::Message { role: Role::Agent, text: text.to_string() }
    }

    #[test]
    fn test_empty_delta_fabricates_nothing() {
        let report = DeltaAnalyzer::analyze(&[], &[failure("tests_passing"), failure("x")]);
        assert!(report.addressed.is_empty());
        assert!(report.claims.is_empty());
        assert!(report.summary.contains("0 new entries"));
    }

    #[test]
    fn test_test_command_in_delta_addresses_tests_failure() {
        let delta = vec![TranscriptEntry::ToolCall {
            tool: "Bash".to_string(),
            input: json!({"command": "cargo test"}),
            output: Some("test result: ok".to_string()),
        }];
        let report = DeltaAnalyzer::analyze(&delta, &[failure("tests_passing")]);
        let evidence = report.addressed.get("tests_passing").expect("addressed");
        assert!(!evidence.is_empty());
    }

    #[test]
    fn test_todo_snapshot_in_delta_addresses_todos_failure() {
        let delta = vec![TranscriptEntry::ToolCall {
            tool: "TodoWrite".to_string(),
            input: json!({"todos": [
                {"content": "a", "status": "completed"},
                {"content": "b", "status": "completed"},
            ]}),
            output: None,
        }];
        let report = DeltaAnalyzer::analyze(&delta, &[failure("todos_complete")]);
        assert!(report.addressed.contains_key("todos_complete"));
    }

    #[test]
    fn test_incomplete_todo_snapshot_is_not_evidence() {
        let delta = vec![TranscriptEntry::ToolCall {
            tool: "TodoWrite".to_string(),
            input: json!({"todos": [{"content": "a", "status": "pending"}]}),
            output: None,
        }];
        let report = DeltaAnalyzer::analyze(&delta, &[failure("todos_complete")]);
        assert!(!report.addressed.contains_key("todos_complete"));
    }

    #[test]
    fn test_claims_carry_context_window() {
        let delta = vec![agent_msg(
            "After rerunning the suite everything is green, so the refactor is complete and \
             I believe we can stop here.",
        )];
        let report = DeltaAnalyzer::analyze(&delta, &[]);
        assert!(!report.claims.is_empty());
        let claim = &report.claims[0];
        assert!(claim.context.len() > claim.phrase.len(), "context is not the bare keyword");
        assert!(claim.context.contains("refactor"));
    }

    #[test]
    fn test_repeated_claim_phrase_yields_one_claim_per_occurrence() {
        let delta = vec![
            agent_msg("The parser rewrite is done."),
            agent_msg("And the migration script is done as well."),
        ];
        let report = DeltaAnalyzer::analyze(&delta, &[]);
        let done_claims: Vec<_> =
            report.claims.iter().filter(|c| c.phrase == "done").collect();
        assert_eq!(done_claims.len(), 2);
        assert!(done_claims[0].context.contains("parser rewrite"));
        assert!(done_claims[1].context.contains("migration script"));
    }

    #[test]
    fn test_unrelated_delta_does_not_address() {
        let delta = vec![agent_msg("Reading some more code.")];
        let report = DeltaAnalyzer::analyze(&delta, &[failure("work_committed")]);
        assert!(report.addressed.is_empty());
    }
}
