//! Diagnostics: pattern analysis over a session's diagnostic event log.
//!
//! Looks for persistence pathologies that the fail-open decision path hides
//! by design: a counter that never advances, a counter moving backwards, and
//! writes that keep failing.

use serde::{Deserialize, Serialize};

use crate::infrastructure::DiagEvent;

/// Consecutive successful writes of the same turn_count before the counter is
/// considered stalled.
const STALL_THRESHOLD: usize = 3;

/// Minimum write attempts before the failure rate is meaningful.
const FAILURE_RATE_MIN_ATTEMPTS: usize = 5;

/// Failure fraction above which write reliability is flagged.
const FAILURE_RATE_THRESHOLD: f64 = 0.5;

/// One suspicious pattern found in the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// The same turn_count was written successfully several times in a row.
    StalledCounter { turn_count: u64, occurrences: usize },
    /// The turn_count moved backwards at least once.
    OscillatingCounter { violations: usize },
    /// Too many write attempts are failing.
    HighWriteFailureRate { attempts: usize, failures: usize },
}

impl Finding {
    /// Human-readable description for CLI output.
    pub fn describe(&self) -> String {
        match self {
            Self::StalledCounter { turn_count, occurrences } => format!(
                "turn counter stalled at {turn_count}: written unchanged {occurrences} times in a row"
            ),
            Self::OscillatingCounter { violations } => {
                format!("turn counter moved backwards {violations} time(s)")
            }
            Self::HighWriteFailureRate { attempts, failures } => {
                format!("{failures} of {attempts} state write attempts failed")
            }
        }
    }
}

/// Summary of one session's diagnostic log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub session_id: String,
    pub events_analyzed: usize,
    pub findings: Vec<Finding>,
}

impl DiagnosticReport {
    pub fn is_healthy(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Analyzes diagnostic event streams.
pub struct Diagnostics;

impl Diagnostics {
    pub fn analyze(session_id: &str, events: &[DiagEvent]) -> DiagnosticReport {
        let mut findings = Vec::new();

        if let Some(finding) = Self::detect_stall(events) {
            findings.push(finding);
        }
        if let Some(finding) = Self::detect_oscillation(events) {
            findings.push(finding);
        }
        if let Some(finding) = Self::detect_failure_rate(events) {
            findings.push(finding);
        }

        DiagnosticReport {
            session_id: session_id.to_string(),
            events_analyzed: events.len(),
            findings,
        }
    }

    /// A run of successful writes all carrying the same turn_count means the
    /// counter increments are not taking effect.
    fn detect_stall(events: &[DiagEvent]) -> Option<Finding> {
        let mut run: Option<(u64, usize)> = None;
        let mut worst: Option<(u64, usize)> = None;

        for event in events {
            if let DiagEvent::WriteSuccess { turn_count, .. } = event {
                run = match run {
                    Some((value, len)) if value == *turn_count => Some((value, len + 1)),
                    _ => Some((*turn_count, 1)),
                };
                if let Some((value, len)) = run {
                    if worst.map_or(true, |(_, worst_len)| len > worst_len) {
                        worst = Some((value, len));
                    }
                }
            }
        }

        worst
            .filter(|(_, len)| *len >= STALL_THRESHOLD)
            .map(|(turn_count, occurrences)| Finding::StalledCounter { turn_count, occurrences })
    }

    /// Backwards movement is recorded explicitly by the store, and is also
    /// derivable from consecutive successful writes.
    fn detect_oscillation(events: &[DiagEvent]) -> Option<Finding> {
        let mut violations = events
            .iter()
            .filter(|e| matches!(e, DiagEvent::MonotonicityViolation { .. }))
            .count();

        let mut last_written: Option<u64> = None;
        for event in events {
            if let DiagEvent::WriteSuccess { turn_count, .. } = event {
                if last_written.is_some_and(|prev| *turn_count < prev) {
                    violations += 1;
                }
                last_written = Some(*turn_count);
            }
        }

        (violations > 0).then_some(Finding::OscillatingCounter { violations })
    }

    fn detect_failure_rate(events: &[DiagEvent]) -> Option<Finding> {
        let attempts = events
            .iter()
            .filter(|e| matches!(e, DiagEvent::WriteAttempt { .. }))
            .count();
        let failures = events
            .iter()
            .filter(|e| matches!(e, DiagEvent::WriteFailure { .. }))
            .count();

        if attempts < FAILURE_RATE_MIN_ATTEMPTS {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = failures as f64 / attempts as f64;
        (rate > FAILURE_RATE_THRESHOLD).then_some(Finding::HighWriteFailureRate {
            attempts,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn success(turn_count: u64) -> DiagEvent {
        DiagEvent::WriteSuccess { timestamp: Utc::now(), turn_count }
    }

    fn attempt(attempt: u32, turn_count: u64) -> DiagEvent {
        DiagEvent::WriteAttempt { timestamp: Utc::now(), attempt, turn_count }
    }

    fn failure(attempt: u32) -> DiagEvent {
        DiagEvent::WriteFailure {
            timestamp: Utc::now(),
            attempt,
            error: "disk full".to_string(),
        }
    }

    #[test]
    fn test_healthy_log_has_no_findings() {
        let events = vec![
            attempt(1, 1),
            success(1),
            attempt(1, 2),
            success(2),
            attempt(1, 3),
            success(3),
        ];
        let report = Diagnostics::analyze("s1", &events);
        assert!(report.is_healthy());
        assert_eq!(report.events_analyzed, 6);
    }

    #[test]
    fn test_stalled_counter_detected() {
        let events = vec![success(4), success(4), success(4)];
        let report = Diagnostics::analyze("s1", &events);
        assert!(report
            .findings
            .contains(&Finding::StalledCounter { turn_count: 4, occurrences: 3 }));
    }

    #[test]
    fn test_two_repeats_is_not_a_stall() {
        let events = vec![success(4), success(4), success(5)];
        let report = Diagnostics::analyze("s1", &events);
        assert!(report.is_healthy());
    }

    #[test]
    fn test_oscillation_from_explicit_violation_event() {
        let events = vec![DiagEvent::MonotonicityViolation {
            timestamp: Utc::now(),
            old_turn_count: 5,
            new_turn_count: 2,
        }];
        let report = Diagnostics::analyze("s1", &events);
        assert!(report.findings.contains(&Finding::OscillatingCounter { violations: 1 }));
    }

    #[test]
    fn test_oscillation_derived_from_writes() {
        let events = vec![success(5), success(2)];
        let report = Diagnostics::analyze("s1", &events);
        assert!(report.findings.contains(&Finding::OscillatingCounter { violations: 1 }));
    }

    #[test]
    fn test_high_failure_rate_needs_minimum_attempts() {
        // 2 of 3 failing is above the rate but below the attempt floor.
        let events = vec![attempt(1, 1), failure(1), attempt(2, 1), failure(2), attempt(3, 1), success(1)];
        let report = Diagnostics::analyze("s1", &events);
        assert!(!report
            .findings
            .iter()
            .any(|f| matches!(f, Finding::HighWriteFailureRate { .. })));
    }

    #[test]
    fn test_high_failure_rate_detected() {
        let mut events = Vec::new();
        for i in 1..=6 {
            events.push(attempt(i, 1));
            if i <= 4 {
                events.push(failure(i));
            }
        }
        let report = Diagnostics::analyze("s1", &events);
        assert!(report
            .findings
            .contains(&Finding::HighWriteFailureRate { attempts: 6, failures: 4 }));
    }
}
