//! Persistence round-trips and escalation state-machine properties.

use chrono::Utc;
use proptest::prelude::*;

use stopgate::domain::models::{EscalationPolicy, FailureEvidence, StateConfig, TurnState};
use stopgate::infrastructure::TurnStateStore;

fn evidence(id: &str) -> FailureEvidence {
    FailureEvidence {
        consideration_id: id.to_string(),
        reason: "unsatisfied".to_string(),
        evidence_quote: None,
        timestamp: Utc::now(),
        was_claimed_complete: false,
    }
}

#[tokio::test]
async fn state_survives_store_recreation() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StateConfig::default();
    config.dir = dir.path().to_string_lossy().into_owned();
    config.initial_backoff_ms = 1;

    {
        let store = TurnStateStore::new(&config);
        let mut state = store.load("s1");
        state.turn_count = 3;
        state.record_block(vec![evidence("tests_passing")], vec!["done".to_string()], 14);
        store.save(&state).await;
    }

    // New store instance, same directory: no in-memory carryover.
    let store = TurnStateStore::new(&config);
    let state = store.load("s1");
    assert_eq!(state.turn_count, 3);
    assert_eq!(state.consecutive_blocks, 1);
    assert_eq!(state.last_analyzed_transcript_index, 14);
    assert_eq!(state.block_history[0].completion_claims, vec!["done".to_string()]);
    assert!(state.is_consistent());
}

#[tokio::test]
async fn truncated_state_file_yields_fresh_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StateConfig::default();
    config.dir = dir.path().to_string_lossy().into_owned();
    config.initial_backoff_ms = 1;

    let store = TurnStateStore::new(&config);
    let mut state = store.load("s1");
    state.turn_count = 9;
    store.save(&state).await;

    // Simulate a torn write by truncating the canonical file.
    let path = dir.path().join("s1.json");
    let raw = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, &raw[..raw.len() / 2]).unwrap();

    let state = store.load("s1");
    assert_eq!(state.turn_count, 0, "corrupt file falls back to fresh state");
}

proptest! {
    /// Any interleaving of blocks and approvals preserves the streak
    /// invariant and never loses turn_count to an approval.
    #[test]
    fn streak_invariant_holds_under_any_op_sequence(ops in proptest::collection::vec(any::<bool>(), 0..40)) {
        let mut state = TurnState::new("prop");
        let mut expected_turns = 0_u64;

        for is_block in ops {
            state.turn_count += 1;
            expected_turns += 1;
            if is_block {
                state.record_block(vec![evidence("x")], vec![], expected_turns as usize);
            } else {
                state.record_approval();
            }
            prop_assert!(state.is_consistent());
            prop_assert_eq!(state.turn_count, expected_turns);
            prop_assert_eq!(
                state.block_history.is_empty(),
                state.first_block_timestamp.is_none()
            );
        }
    }

    /// Auto-approve fires exactly when the streak reaches the threshold.
    #[test]
    fn auto_approve_iff_threshold_reached(threshold in 1u32..20, blocks in 0u32..40) {
        let policy = EscalationPolicy::new(threshold);
        let mut state = TurnState::new("prop");
        for _ in 0..blocks {
            state.record_block(vec![], vec![], 0);
        }
        prop_assert_eq!(policy.should_auto_approve(&state), blocks >= threshold);
    }

    /// The escalation message exists only in the half-open window
    /// [ceil(N/2), N) of the streak.
    #[test]
    fn escalation_message_window(threshold in 2u32..20, blocks in 0u32..40) {
        let policy = EscalationPolicy::new(threshold);
        let mut state = TurnState::new("prop");
        for _ in 0..blocks {
            state.record_block(vec![], vec![], 0);
        }
        let expected = blocks * 2 >= threshold && blocks < threshold;
        prop_assert_eq!(policy.escalation_message(&state).is_some(), expected);
    }
}
