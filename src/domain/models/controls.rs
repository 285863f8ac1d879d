//! Control surface supplied by the host process.

use std::collections::HashMap;

use super::consideration::SessionType;

/// Host-supplied switches consulted before and during an evaluation.
#[derive(Debug, Clone, Default)]
pub struct GateControls {
    /// When set, the engine short-circuits to approve without side effects.
    pub disabled: bool,
    /// Forced session type, taking precedence over classification.
    pub session_type_override: Option<SessionType>,
    /// Per-rule enable overrides, intersected with each rule's own
    /// `enabled` flag. Missing entries default to enabled.
    pub rule_overrides: HashMap<String, bool>,
}

impl GateControls {
    /// Override state for one rule; absent means enabled.
    pub fn rule_enabled(&self, id: &str) -> bool {
        self.rule_overrides.get(id).copied().unwrap_or(true)
    }

    /// Build controls from environment variables. Used by the CLI layer;
    /// tests construct `GateControls` directly.
    ///
    /// - `STOPGATE_DISABLED=1|true` disables the gate
    /// - `STOPGATE_SESSION_TYPE` forces a session type (unknown values ignored)
    pub fn from_env() -> Self {
        let disabled = std::env::var("STOPGATE_DISABLED")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let session_type_override = std::env::var("STOPGATE_SESSION_TYPE")
            .ok()
            .and_then(|v| SessionType::parse_str(&v));
        Self { disabled, session_type_override, rule_overrides: HashMap::new() }
    }
}
