//! Decision engine: aggregates checker results into approve/block.
//!
//! Block iff at least one blocker-severity rule is unsatisfied. Warnings are
//! advisory only and never gate termination, but failed warnings are listed
//! in the continuation prompt so the agent sees them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::models::{Consideration, EvaluationReport, Severity};

/// Fixed instruction appended to every continuation prompt.
const BYPASS_INSTRUCTION: &str = "If a concern genuinely does not apply to this session, say so \
explicitly and finish the remaining items; the gate auto-approves after repeated blocks.";

/// Final verdict for one termination attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Approve,
    Block,
}

/// The gate's decision for one turn, plus the text the host relays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateDecision {
    pub verdict: Verdict,
    /// Short machine-readable tag explaining how the verdict was reached.
    pub reason: String,
    /// Present on block: the prompt redirecting the agent.
    #[serde(default)]
    pub continuation_prompt: Option<String>,
    /// Present on approve: summary of satisfied rules.
    #[serde(default)]
    pub summary: Option<String>,
}

impl GateDecision {
    pub fn approve(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Approve,
            reason: reason.into(),
            continuation_prompt: None,
            summary: None,
        }
    }

    pub fn block(reason: impl Into<String>, continuation_prompt: String) -> Self {
        Self {
            verdict: Verdict::Block,
            reason: reason.into(),
            continuation_prompt: Some(continuation_prompt),
            summary: None,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.verdict == Verdict::Approve
    }

    #[must_use]
    pub fn with_summary(mut self, summary: String) -> Self {
        self.summary = Some(summary);
        self
    }
}

/// Aggregates an `EvaluationReport` into a `GateDecision`.
pub struct DecisionEngine;

impl DecisionEngine {
    /// Decide and render. `considerations` supplies the question/category
    /// text for rendering; it must contain every rule that produced a
    /// result (missing ids render with their id as the question).
    pub fn decide(report: &EvaluationReport, considerations: &[Consideration]) -> GateDecision {
        if report.has_blockers() {
            let prompt = Self::continuation_prompt(report, considerations);
            GateDecision::block("blocker-rules-failed", prompt)
        } else {
            GateDecision::approve("all-blockers-satisfied")
                .with_summary(Self::approval_summary(report, considerations))
        }
    }

    /// Group failed rules (blockers and warnings) by category and render
    /// each failing rule's question under its category heading.
    fn continuation_prompt(
        report: &EvaluationReport,
        considerations: &[Consideration],
    ) -> String {
        let lookup: BTreeMap<&str, &Consideration> =
            considerations.iter().map(|c| (c.id.as_str(), c)).collect();

        let mut by_category: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for result in report.failed_blockers().into_iter().chain(report.failed_warnings()) {
            let id = result.consideration_id.as_str();
            let (category, question) = lookup
                .get(id)
                .map_or((id.to_string(), id.to_string()), |c| {
                    (c.category.clone(), c.question.clone())
                });
            let tag = match result.severity {
                Severity::Blocker => "",
                Severity::Warning => " (warning)",
            };
            by_category
                .entry(category)
                .or_default()
                .push(format!("- {question}{tag}\n  {}", result.reason));
        }

        let mut lines =
            vec!["The session is not ready to finish. Address the following:".to_string()];
        for (category, items) in by_category {
            lines.push(format!("\n## {category}"));
            lines.extend(items);
        }
        lines.push(format!("\n{BYPASS_INSTRUCTION}"));
        lines.join("\n")
    }

    /// List every satisfied rule by its question text with a completion marker.
    fn approval_summary(report: &EvaluationReport, considerations: &[Consideration]) -> String {
        let lookup: BTreeMap<&str, &Consideration> =
            considerations.iter().map(|c| (c.id.as_str(), c)).collect();

        let mut lines = Vec::new();
        for result in report.satisfied_results() {
            let id = result.consideration_id.as_str();
            let question = lookup.get(id).map_or(id, |c| c.question.as_str());
            lines.push(format!("[done] {question}"));
        }
        if lines.is_empty() {
            "No rules applied to this session.".to_string()
        } else {
            lines.join("\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ApplicableSessions, CheckerResult};

    fn consideration(id: &str, category: &str, question: &str, severity: Severity) -> Consideration {
        Consideration {
            id: id.to_string(),
            category: category.to_string(),
            question: question.to_string(),
            severity,
            checker: "generic".to_string(),
            enabled: true,
            applicable_session_types: ApplicableSessions::All,
        }
    }

    #[test]
    fn test_warnings_never_gate() {
        let rules = vec![consideration("w1", "docs", "Docs updated?", Severity::Warning)];
        let report = EvaluationReport::new(vec![CheckerResult::unsatisfied(
            "w1",
            "no docs",
            Severity::Warning,
        )]);

        let decision = DecisionEngine::decide(&report, &rules);
        assert!(decision.is_approved());
        assert!(decision.continuation_prompt.is_none());
    }

    #[test]
    fn test_single_blocker_gates() {
        let rules = vec![consideration(
            "todos_complete",
            "task tracking",
            "Are all tracked todo items completed?",
            Severity::Blocker,
        )];
        let report = EvaluationReport::new(vec![CheckerResult::unsatisfied(
            "todos_complete",
            "1 of 3 todo items still open",
            Severity::Blocker,
        )]);

        let decision = DecisionEngine::decide(&report, &rules);
        assert_eq!(decision.verdict, Verdict::Block);
        let prompt = decision.continuation_prompt.expect("prompt on block");
        assert!(prompt.contains("## task tracking"));
        assert!(prompt.contains("Are all tracked todo items completed?"));
        assert!(prompt.contains("auto-approves"));
    }

    #[test]
    fn test_blocker_and_warning_both_listed() {
        let rules = vec![
            consideration("b1", "verification", "Tests pass?", Severity::Blocker),
            consideration("w1", "docs", "Docs updated?", Severity::Warning),
        ];
        let report = EvaluationReport::new(vec![
            CheckerResult::unsatisfied("b1", "no tests", Severity::Blocker),
            CheckerResult::unsatisfied("w1", "no docs", Severity::Warning),
        ]);

        let decision = DecisionEngine::decide(&report, &rules);
        assert_eq!(decision.verdict, Verdict::Block);
        let prompt = decision.continuation_prompt.expect("prompt");
        assert!(prompt.contains("## verification"));
        assert!(prompt.contains("## docs"));
        assert!(prompt.contains("Docs updated? (warning)"));
    }

    #[test]
    fn test_approval_summary_lists_satisfied_questions() {
        let rules = vec![
            consideration("a", "quality", "Work complete?", Severity::Blocker),
            consideration("b", "docs", "Docs updated?", Severity::Warning),
        ];
        let report = EvaluationReport::new(vec![
            CheckerResult::satisfied("a", "ok", Severity::Blocker),
            CheckerResult::satisfied("b", "ok", Severity::Warning),
        ]);

        let decision = DecisionEngine::decide(&report, &rules);
        assert!(decision.is_approved());
        let summary = decision.summary.expect("summary on approve");
        assert!(summary.contains("[done] Work complete?"));
        assert!(summary.contains("[done] Docs updated?"));
    }
}
