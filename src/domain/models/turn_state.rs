//! Durable per-session turn state and block history.
//!
//! One `TurnState` exists per session. It is created empty on first load
//! and only ever reset (fields zeroed) by an approval, never deleted.
//! Invariant: `consecutive_blocks == block_history.len()` after every
//! transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Evidence recorded for one failed rule at block time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEvidence {
    pub consideration_id: String,
    pub reason: String,
    /// Verbatim transcript excerpt backing the failure, when one exists.
    #[serde(default)]
    pub evidence_quote: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Whether the agent had claimed this work complete when it failed.
    #[serde(default)]
    pub was_claimed_complete: bool,
}

/// Snapshot of one block decision, appended to the block history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSnapshot {
    /// 1-indexed position within the current block streak.
    pub block_number: u32,
    pub timestamp: DateTime<Utc>,
    /// Last analyzed transcript position before this block.
    pub transcript_index: usize,
    /// Transcript length at the time of this block.
    pub transcript_length: usize,
    pub failures: Vec<FailureEvidence>,
    /// Completion claims detected in the transcript delta.
    #[serde(default)]
    pub completion_claims: Vec<String>,
}

/// Per-session durable state driving the escalation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnState {
    pub session_id: String,
    /// Monotonically non-decreasing count of termination-attempt evaluations.
    pub turn_count: u64,
    /// Back-to-back block decisions since the last approval.
    pub consecutive_blocks: u32,
    #[serde(default)]
    pub first_block_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_block_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub block_history: Vec<BlockSnapshot>,
    /// Watermark: transcript index up to which content has been analyzed.
    #[serde(default)]
    pub last_analyzed_transcript_index: usize,
}

impl TurnState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            turn_count: 0,
            consecutive_blocks: 0,
            first_block_timestamp: None,
            last_block_timestamp: None,
            block_history: Vec::new(),
            last_analyzed_transcript_index: 0,
        }
    }

    /// Record a block: append a snapshot, bump the streak counter, advance
    /// the watermark to the current transcript length, set timestamps.
    pub fn record_block(
        &mut self,
        failures: Vec<FailureEvidence>,
        completion_claims: Vec<String>,
        transcript_length: usize,
    ) {
        let now = Utc::now();
        self.consecutive_blocks += 1;
        self.block_history.push(BlockSnapshot {
            block_number: self.consecutive_blocks,
            timestamp: now,
            transcript_index: self.last_analyzed_transcript_index,
            transcript_length,
            failures,
            completion_claims,
        });
        self.last_analyzed_transcript_index = transcript_length;
        if self.first_block_timestamp.is_none() {
            self.first_block_timestamp = Some(now);
        }
        self.last_block_timestamp = Some(now);
    }

    /// Approval reset: zero the streak, clear history and timestamps, zero
    /// the watermark. `turn_count` is never reset.
    pub fn record_approval(&mut self) {
        self.consecutive_blocks = 0;
        self.block_history.clear();
        self.first_block_timestamp = None;
        self.last_block_timestamp = None;
        self.last_analyzed_transcript_index = 0;
    }

    /// Failures recorded by the most recent block, if any.
    pub fn last_block_failures(&self) -> &[FailureEvidence] {
        self.block_history.last().map_or(&[], |s| s.failures.as_slice())
    }

    /// Invariant check used by tests and diagnostics.
    pub fn is_consistent(&self) -> bool {
        self.consecutive_blocks as usize == self.block_history.len()
    }
}

/// Escalation policy over the consecutive-block counter.
///
/// Fail-open escape valve: once the streak reaches the threshold the gate
/// force-approves regardless of rule outcomes, so a rule that can never be
/// satisfied by the available heuristics cannot strand the session.
#[derive(Debug, Clone, Copy)]
pub struct EscalationPolicy {
    pub auto_approve_threshold: u32,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self { auto_approve_threshold: 10 }
    }
}

impl EscalationPolicy {
    pub fn new(auto_approve_threshold: u32) -> Self {
        Self { auto_approve_threshold }
    }

    /// True unconditionally once the streak reaches the threshold,
    /// independent of whether any failure was actually addressed.
    pub fn should_auto_approve(&self, state: &TurnState) -> bool {
        state.consecutive_blocks >= self.auto_approve_threshold
    }

    /// Warning message for the block budget. Silent below the halfway
    /// point; between half and full threshold reports the remaining budget.
    pub fn escalation_message(&self, state: &TurnState) -> Option<String> {
        let n = self.auto_approve_threshold;
        let blocks = state.consecutive_blocks;
        if blocks * 2 >= n && blocks < n {
            Some(format!(
                "Escalation: {} consecutive blocks; {} more before the gate auto-approves.",
                blocks,
                n - blocks
            ))
        } else {
            None
        }
    }
}

/// One entry of the per-session append-only redirect audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectRecord {
    /// Stable record id, assigned at append time.
    pub id: uuid::Uuid,
    /// 1-indexed redirect counter.
    pub redirect_number: u32,
    pub timestamp: DateTime<Utc>,
    pub failed_considerations: Vec<String>,
    pub continuation_prompt: String,
    #[serde(default)]
    pub work_summary: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(id: &str) -> FailureEvidence {
        FailureEvidence {
            consideration_id: id.to_string(),
            reason: "unsatisfied".to_string(),
            evidence_quote: None,
            timestamp: Utc::now(),
            was_claimed_complete: false,
        }
    }

    #[test]
    fn test_block_advances_counter_and_watermark() {
        let mut state = TurnState::new("s1");
        state.record_block(vec![evidence("todos_complete")], vec![], 12);

        assert_eq!(state.consecutive_blocks, 1);
        assert_eq!(state.block_history.len(), 1);
        assert_eq!(state.block_history[0].block_number, 1);
        assert_eq!(state.block_history[0].transcript_index, 0);
        assert_eq!(state.last_analyzed_transcript_index, 12);
        assert!(state.first_block_timestamp.is_some());
        assert!(state.is_consistent());

        state.record_block(vec![evidence("tests_passing")], vec![], 20);
        assert_eq!(state.consecutive_blocks, 2);
        assert_eq!(state.block_history[1].block_number, 2);
        assert_eq!(state.block_history[1].transcript_index, 12);
        assert!(state.is_consistent());
    }

    #[test]
    fn test_approval_resets_everything_but_turn_count() {
        let mut state = TurnState::new("s1");
        state.turn_count = 7;
        state.record_block(vec![evidence("x")], vec!["done".to_string()], 5);
        state.record_approval();

        assert_eq!(state.turn_count, 7);
        assert_eq!(state.consecutive_blocks, 0);
        assert!(state.block_history.is_empty());
        assert!(state.first_block_timestamp.is_none());
        assert!(state.last_block_timestamp.is_none());
        assert_eq!(state.last_analyzed_transcript_index, 0);
        assert!(state.is_consistent());
    }

    #[test]
    fn test_auto_approve_exactly_at_threshold() {
        let policy = EscalationPolicy::default();
        let mut state = TurnState::new("s1");

        for i in 0..10 {
            assert!(
                !policy.should_auto_approve(&state),
                "must not auto-approve at {i} blocks"
            );
            state.record_block(vec![evidence("x")], vec![], i);
        }
        assert_eq!(state.consecutive_blocks, 10);
        assert!(policy.should_auto_approve(&state));
    }

    #[test]
    fn test_escalation_message_window() {
        let policy = EscalationPolicy::new(10);
        let mut state = TurnState::new("s1");

        for _ in 0..4 {
            state.record_block(vec![], vec![], 0);
        }
        assert!(policy.escalation_message(&state).is_none(), "silent below half");

        state.record_block(vec![], vec![], 0);
        let msg = policy.escalation_message(&state).expect("message from halfway");
        assert!(msg.contains('5'));

        for _ in 0..5 {
            state.record_block(vec![], vec![], 0);
        }
        assert!(policy.escalation_message(&state).is_none(), "no message at threshold");
    }
}
