//! Rule store: loads and validates considerations from a declarative source.
//!
//! Validation is per-item: a source with one valid and one invalid record
//! yields a rule set containing only the valid record. An absent, malformed,
//! or empty source substitutes the built-in fallback set. The gate must
//! never fail to start because of a malformed rule file.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, warn};

use crate::domain::errors::RuleStoreError;
use crate::domain::models::{ApplicableSessions, Consideration, SessionType, Severity};

/// Loader for the consideration rule set.
pub struct RuleStore;

impl RuleStore {
    /// Load considerations from a YAML rule file. Never fails: any problem
    /// with the source yields the built-in fallback set.
    pub fn load_from_file(path: impl AsRef<Path>) -> Vec<Consideration> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::load_from_str(&raw),
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "rule source unreadable, using built-in considerations"
                );
                Self::builtin_considerations()
            }
        }
    }

    /// Load considerations from raw YAML. Falls back to the built-in set on
    /// any parse failure or when no item survives validation.
    pub fn load_from_str(raw: &str) -> Vec<Consideration> {
        match Self::try_load(raw) {
            Ok(rules) => rules,
            Err(err) => {
                warn!(error = %err, "using built-in considerations");
                Self::builtin_considerations()
            }
        }
    }

    fn try_load(raw: &str) -> Result<Vec<Consideration>, RuleStoreError> {
        let value: serde_json::Value = serde_yaml::from_str(raw)
            .map_err(|e| RuleStoreError::ParseFailed(e.to_string()))?;
        let items = value.as_array().ok_or(RuleStoreError::NotAList)?;

        let mut rules = Vec::new();
        for (index, item) in items.iter().enumerate() {
            match Self::validate_item(item) {
                Ok(rule) => rules.push(rule),
                Err(reason) => {
                    warn!(index, reason, "dropping invalid consideration");
                }
            }
        }

        if rules.is_empty() {
            return Err(RuleStoreError::NoValidRules);
        }
        debug!(count = rules.len(), "loaded considerations from source");
        Ok(rules)
    }

    /// Schema validation for one record. Returns a human-readable rejection
    /// reason on failure.
    fn validate_item(item: &serde_json::Value) -> Result<Consideration, &'static str> {
        let obj = item.as_object().ok_or("not a structured record")?;

        let id = obj.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
        let category = obj.get("category").and_then(|v| v.as_str()).ok_or("missing category")?;
        let question = obj.get("question").and_then(|v| v.as_str()).ok_or("missing question")?;
        let severity = match obj.get("severity").and_then(|v| v.as_str()) {
            Some("blocker") => Severity::Blocker,
            Some("warning") => Severity::Warning,
            Some(_) => return Err("severity not one of blocker|warning"),
            None => return Err("missing severity"),
        };
        let checker = obj.get("checker").and_then(|v| v.as_str()).ok_or("missing checker")?;
        let enabled = match obj.get("enabled") {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(_) => return Err("enabled is not boolean"),
            None => return Err("missing enabled"),
        };

        let applicable_session_types = match obj.get("applicable_session_types") {
            None => ApplicableSessions::default(),
            Some(v) => Self::parse_applicable(v)?,
        };

        Ok(Consideration {
            id: id.to_string(),
            category: category.to_string(),
            question: question.to_string(),
            severity,
            checker: checker.to_string(),
            enabled,
            applicable_session_types,
        })
    }

    fn parse_applicable(value: &serde_json::Value) -> Result<ApplicableSessions, &'static str> {
        let list = value.as_array().ok_or("applicable_session_types is not a list")?;
        if list.is_empty() {
            return Ok(ApplicableSessions::default());
        }
        if list.iter().any(|v| v.as_str() == Some("*")) {
            return Ok(ApplicableSessions::All);
        }
        let mut set = BTreeSet::new();
        for v in list {
            let s = v.as_str().ok_or("session type is not a string")?;
            match SessionType::parse_str(s) {
                Some(t) => {
                    set.insert(t);
                }
                None => return Err("unknown session type"),
            }
        }
        Ok(ApplicableSessions::Only(set))
    }

    /// The fixed built-in fallback set: five critical rules with ids that
    /// are stable across versions.
    pub fn builtin_considerations() -> Vec<Consideration> {
        let blocker = |id: &str, category: &str, question: &str, checker: &str| Consideration {
            id: id.to_string(),
            category: category.to_string(),
            question: question.to_string(),
            severity: Severity::Blocker,
            checker: checker.to_string(),
            enabled: true,
            applicable_session_types: ApplicableSessions::development_only(),
        };

        vec![
            blocker(
                "todos_complete",
                "task tracking",
                "Are all tracked todo items completed?",
                "todos_complete",
            ),
            blocker(
                "tests_passing",
                "verification",
                "Were the tests run and did they pass after the code changes?",
                "tests_passing",
            ),
            blocker(
                "no_placeholders",
                "implementation quality",
                "Is the written code free of TODO/FIXME markers and stubbed-out functions?",
                "no_placeholders",
            ),
            blocker(
                "questions_resolved",
                "communication",
                "Have all questions the agent raised been resolved rather than left hanging?",
                "questions_resolved",
            ),
            blocker(
                "work_committed",
                "version control",
                "Have the code changes been committed?",
                "work_committed",
            ),
        ]
    }
}
