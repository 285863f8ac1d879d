//! Gate engine: orchestrates one termination-attempt evaluation.
//!
//! Flow per attempt: consult the control surface, classify the session,
//! filter the rule set, analyze the transcript delta since the last block,
//! run the checker pipeline, aggregate into a decision, then persist the
//! turn state and audit records for the decision taken.
//!
//! Every internal failure resolves to approve. Blocking a session because
//! the gate itself broke is the one outcome this component must never
//! produce.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::errors::GateResult;
use crate::domain::models::{
    Config, Consideration, EscalationPolicy, FailureEvidence, GateControls, RedirectRecord,
    Transcript,
};
use crate::domain::ports::SemanticAnalyzer;
use crate::infrastructure::{RedirectLog, TurnStateStore};
use crate::services::classifier::SessionClassifier;
use crate::services::decision::{DecisionEngine, GateDecision};
use crate::services::delta::DeltaAnalyzer;
use crate::services::heuristics::CheckerRegistry;
use crate::services::pipeline::CheckerPipeline;
use crate::services::rule_store::RuleStore;

/// The completion gate. One instance serves one project directory.
pub struct GateEngine {
    considerations: Vec<Consideration>,
    pipeline: CheckerPipeline,
    state_store: TurnStateStore,
    redirect_log: RedirectLog,
    escalation: EscalationPolicy,
}

impl GateEngine {
    /// Build an engine from configuration. Rule loading never fails; a bad
    /// rule source substitutes the built-in set.
    pub fn new(config: &Config, analyzer: Option<Arc<dyn SemanticAnalyzer>>) -> Self {
        let considerations = RuleStore::load_from_file(&config.rules_path);
        Self::with_considerations(config, analyzer, considerations)
    }

    /// Build an engine with an explicit rule set. Used by tests.
    pub fn with_considerations(
        config: &Config,
        analyzer: Option<Arc<dyn SemanticAnalyzer>>,
        considerations: Vec<Consideration>,
    ) -> Self {
        let pipeline = CheckerPipeline::new(
            CheckerRegistry::with_builtins(),
            analyzer,
            Duration::from_millis(config.checker.check_timeout_ms),
        );
        Self {
            considerations,
            pipeline,
            state_store: TurnStateStore::new(&config.state),
            redirect_log: RedirectLog::new(&config.state.dir),
            escalation: EscalationPolicy::new(config.escalation.auto_approve_threshold),
        }
    }

    /// Evaluate one termination attempt. Never fails: internal errors are
    /// logged and resolved to approve.
    pub async fn evaluate(
        &self,
        session_id: &str,
        transcript: &Transcript,
        controls: &GateControls,
    ) -> GateDecision {
        if controls.disabled {
            info!(session_id, "gate disabled by control surface");
            return GateDecision::approve("gate-disabled");
        }

        match self.evaluate_inner(session_id, transcript, controls).await {
            Ok(decision) => decision,
            Err(err) => {
                warn!(session_id, error = %err, "evaluation failed internally, approving");
                GateDecision::approve("internal-error")
            }
        }
    }

    async fn evaluate_inner(
        &self,
        session_id: &str,
        transcript: &Transcript,
        controls: &GateControls,
    ) -> GateResult<GateDecision> {
        let session_type =
            SessionClassifier::classify(transcript, controls.session_type_override);

        let applicable: Vec<Consideration> = self
            .considerations
            .iter()
            .filter(|c| c.applies(session_type, controls.rule_enabled(&c.id)))
            .cloned()
            .collect();

        let mut state = self.state_store.load(session_id);
        state.turn_count += 1;

        if applicable.is_empty() {
            info!(
                session_id,
                session_type = session_type.as_str(),
                "no applicable rules, approving"
            );
            state.record_approval();
            self.state_store.save(&state).await;
            return Ok(GateDecision::approve("no-applicable-rules"));
        }

        // Delta since the last block. With no prior block the watermark is
        // zero and the delta is the whole transcript, which still yields the
        // completion claims for this turn.
        let delta = transcript.slice_from(state.last_analyzed_transcript_index);
        let delta_report = DeltaAnalyzer::analyze(delta, state.last_block_failures());

        let report = self.pipeline.evaluate(transcript, &applicable, session_type).await;
        let mut decision = DecisionEngine::decide(&report, &applicable);

        if decision.is_approved() {
            info!(session_id, turn_count = state.turn_count, "termination approved");
            state.record_approval();
            self.state_store.save(&state).await;
            return Ok(decision);
        }

        let claimed = !delta_report.claims.is_empty();
        let failures: Vec<FailureEvidence> = report
            .failed_blockers()
            .into_iter()
            .chain(report.failed_warnings())
            .map(|r| FailureEvidence {
                consideration_id: r.consideration_id.clone(),
                reason: r.reason.clone(),
                evidence_quote: None,
                timestamp: Utc::now(),
                was_claimed_complete: claimed,
            })
            .collect();
        let failed_ids: Vec<String> =
            failures.iter().map(|f| f.consideration_id.clone()).collect();
        let claims: Vec<String> =
            delta_report.claims.iter().map(|c| c.context.clone()).collect();

        state.record_block(failures, claims, transcript.len());

        // Acknowledge concerns the delta already shows progress on, so a
        // redirect does not read as if earlier fixes went unnoticed.
        if !delta_report.addressed.is_empty() {
            if let Some(prompt) = decision.continuation_prompt.as_mut() {
                prompt.push_str("\n\nProgress noted since the last redirect:\n");
                for (id, evidence) in &delta_report.addressed {
                    prompt.push_str(&format!("- {id}: {evidence}\n"));
                }
            }
        }

        if self.escalation.should_auto_approve(&state) {
            // Escape valve: the streak hit the budget, so the block is
            // converted into a forced approval and the streak resets.
            warn!(
                session_id,
                consecutive_blocks = state.consecutive_blocks,
                "block budget exhausted, force-approving"
            );
            state.record_approval();
            self.state_store.save(&state).await;
            return Ok(GateDecision::approve("auto-approve-escalation"));
        }

        if let Some(message) = self.escalation.escalation_message(&state) {
            if let Some(prompt) = decision.continuation_prompt.as_mut() {
                prompt.push_str("\n\n");
                prompt.push_str(&message);
            }
        }

        info!(
            session_id,
            turn_count = state.turn_count,
            consecutive_blocks = state.consecutive_blocks,
            failed = ?failed_ids,
            "termination blocked"
        );

        self.state_store.save(&state).await;
        self.redirect_log.append(
            session_id,
            &RedirectRecord {
                id: uuid::Uuid::new_v4(),
                redirect_number: self.redirect_log.count(session_id) + 1,
                timestamp: Utc::now(),
                failed_considerations: failed_ids,
                continuation_prompt: decision
                    .continuation_prompt
                    .clone()
                    .unwrap_or_default(),
                work_summary: Some(delta_report.summary),
            },
        );

        Ok(decision)
    }

    /// Read-only view of the persisted state for a session.
    pub fn session_state(&self, session_id: &str) -> crate::domain::models::TurnState {
        self.state_store.load(session_id)
    }

    /// Diagnostic events recorded for a session.
    pub fn diag_events(&self, session_id: &str) -> Vec<crate::infrastructure::DiagEvent> {
        self.state_store.diag_events(session_id)
    }

    /// Redirect audit records for a session.
    pub fn redirects(&self, session_id: &str) -> Vec<RedirectRecord> {
        self.redirect_log.read_all(session_id)
    }

    /// The active rule set, post-load.
    pub fn considerations(&self) -> &[Consideration] {
        &self.considerations
    }
}
