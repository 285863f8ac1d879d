//! Consideration (rule) model.
//!
//! A consideration pairs a human-readable question with a severity and a
//! checker reference. The rule set is loaded once at engine construction
//! and is immutable for the life of an evaluation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Session categories a session can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    /// Code was written, tests run, or PRs touched.
    Development,
    /// Pure question-answering, no observable work.
    Informational,
    /// Docs/config-only writes or version-control housekeeping.
    Maintenance,
    /// Read-only exploration of the codebase.
    Investigation,
}

impl SessionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Informational => "informational",
            Self::Maintenance => "maintenance",
            Self::Investigation => "investigation",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "development" => Some(Self::Development),
            "informational" => Some(Self::Informational),
            "maintenance" => Some(Self::Maintenance),
            "investigation" => Some(Self::Investigation),
            _ => None,
        }
    }
}

/// Rule severity. Only blocker failures gate termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Blocker,
    Warning,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocker => "blocker",
            Self::Warning => "warning",
        }
    }
}

/// Which session types a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicableSessions {
    /// Applies to every session type (`"*"` in rule files).
    All,
    /// Applies only to the listed types.
    Only(BTreeSet<SessionType>),
}

impl ApplicableSessions {
    /// Absent/empty lists mean "development sessions only" for backward
    /// compatibility with rule files written before session typing existed.
    pub fn development_only() -> Self {
        Self::Only(BTreeSet::from([SessionType::Development]))
    }

    pub fn includes(&self, session_type: SessionType) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(&session_type),
        }
    }
}

impl Default for ApplicableSessions {
    fn default() -> Self {
        Self::development_only()
    }
}

/// A single completion-gate rule.
#[derive(Debug, Clone)]
pub struct Consideration {
    /// Unique id, stable across versions.
    pub id: String,
    /// Grouping used for reporting and continuation prompts.
    pub category: String,
    /// The question the rule asks about the session.
    pub question: String,
    pub severity: Severity,
    /// Name of a built-in heuristic, or "generic".
    pub checker: String,
    pub enabled: bool,
    pub applicable_session_types: ApplicableSessions,
}

impl Consideration {
    /// Whether this rule participates in an evaluation for `session_type`,
    /// given the per-rule override map from the control surface. A rule runs
    /// only if both its own `enabled` flag and the override (default true)
    /// are set.
    pub fn applies(&self, session_type: SessionType, override_enabled: bool) -> bool {
        self.enabled && override_enabled && self.applicable_session_types.includes(session_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(enabled: bool, applicable: ApplicableSessions) -> Consideration {
        Consideration {
            id: "r1".to_string(),
            category: "quality".to_string(),
            question: "Is the work done?".to_string(),
            severity: Severity::Blocker,
            checker: "generic".to_string(),
            enabled,
            applicable_session_types: applicable,
        }
    }

    #[test]
    fn test_default_applicability_is_development_only() {
        let r = rule(true, ApplicableSessions::default());
        assert!(r.applies(SessionType::Development, true));
        assert!(!r.applies(SessionType::Informational, true));
        assert!(!r.applies(SessionType::Investigation, true));
    }

    #[test]
    fn test_wildcard_applies_everywhere() {
        let r = rule(true, ApplicableSessions::All);
        assert!(r.applies(SessionType::Informational, true));
        assert!(r.applies(SessionType::Maintenance, true));
    }

    #[test]
    fn test_override_intersects_with_enabled() {
        let r = rule(true, ApplicableSessions::All);
        assert!(!r.applies(SessionType::Development, false));

        let disabled = rule(false, ApplicableSessions::All);
        assert!(!disabled.applies(SessionType::Development, true));
    }

    #[test]
    fn test_session_type_round_trip() {
        for t in [
            SessionType::Development,
            SessionType::Informational,
            SessionType::Maintenance,
            SessionType::Investigation,
        ] {
            assert_eq!(SessionType::parse_str(t.as_str()), Some(t));
        }
        assert_eq!(SessionType::parse_str("bogus"), None);
    }
}
