//! Per-rule check results and the aggregated evaluation report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::consideration::Severity;

/// Outcome of checking one consideration. Created once per applicable,
/// enabled rule per evaluation; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerResult {
    pub consideration_id: String,
    pub satisfied: bool,
    pub reason: String,
    pub severity: Severity,
}

impl CheckerResult {
    pub fn satisfied(id: impl Into<String>, reason: impl Into<String>, severity: Severity) -> Self {
        Self { consideration_id: id.into(), satisfied: true, reason: reason.into(), severity }
    }

    pub fn unsatisfied(
        id: impl Into<String>,
        reason: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self { consideration_id: id.into(), satisfied: false, reason: reason.into(), severity }
    }
}

/// All checker results for one evaluation, keyed by consideration id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub results: BTreeMap<String, CheckerResult>,
}

impl EvaluationReport {
    pub fn new(results: Vec<CheckerResult>) -> Self {
        Self {
            results: results.into_iter().map(|r| (r.consideration_id.clone(), r)).collect(),
        }
    }

    /// Unsatisfied blocker-severity results.
    pub fn failed_blockers(&self) -> Vec<&CheckerResult> {
        self.results
            .values()
            .filter(|r| !r.satisfied && r.severity == Severity::Blocker)
            .collect()
    }

    /// Unsatisfied warning-severity results.
    pub fn failed_warnings(&self) -> Vec<&CheckerResult> {
        self.results
            .values()
            .filter(|r| !r.satisfied && r.severity == Severity::Warning)
            .collect()
    }

    /// True iff at least one blocker failed.
    pub fn has_blockers(&self) -> bool {
        !self.failed_blockers().is_empty()
    }

    pub fn satisfied_results(&self) -> Vec<&CheckerResult> {
        self.results.values().filter(|r| r.satisfied).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_blockers_only_on_failed_blockers() {
        let report = EvaluationReport::new(vec![
            CheckerResult::satisfied("a", "ok", Severity::Blocker),
            CheckerResult::unsatisfied("b", "missing tests", Severity::Warning),
        ]);
        assert!(!report.has_blockers());
        assert_eq!(report.failed_warnings().len(), 1);

        let report = EvaluationReport::new(vec![CheckerResult::unsatisfied(
            "a",
            "todos open",
            Severity::Blocker,
        )]);
        assert!(report.has_blockers());
        assert_eq!(report.failed_blockers().len(), 1);
    }

    #[test]
    fn test_satisfied_listing() {
        let report = EvaluationReport::new(vec![
            CheckerResult::satisfied("a", "ok", Severity::Blocker),
            CheckerResult::satisfied("b", "ok", Severity::Warning),
            CheckerResult::unsatisfied("c", "nope", Severity::Blocker),
        ]);
        assert_eq!(report.satisfied_results().len(), 2);
    }
}
