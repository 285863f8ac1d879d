//! Checker pipeline: evaluates each applicable rule under a timeout guard.
//!
//! Evaluation order per rule: external analyzer (when configured) raced
//! against the deadline; on analyzer absence, timeout, or failure, the
//! rule's named built-in heuristic; unknown names resolve to the generic
//! keyword heuristic. Every failure mode maps to `satisfied = true` — a
//! buggy or slow rule must never strand the user in a blocked session.
//!
//! Checks run on spawned tasks so a timed-out check is abandoned rather
//! than awaited; its eventual result is dropped with its task and can never
//! be applied to a later evaluation of the same rule.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::errors::CheckError;
use crate::domain::models::{
    CheckerResult, Consideration, EvaluationReport, SessionType, Transcript,
};
use crate::domain::ports::SemanticAnalyzer;
use crate::services::heuristics::{CheckerRegistry, HeuristicOutcome};

/// Evaluates considerations against a transcript, one `CheckerResult` per
/// enabled, applicable rule. Never returns an error to the caller.
pub struct CheckerPipeline {
    registry: CheckerRegistry,
    analyzer: Option<Arc<dyn SemanticAnalyzer>>,
    check_timeout: Duration,
}

impl CheckerPipeline {
    pub fn new(
        registry: CheckerRegistry,
        analyzer: Option<Arc<dyn SemanticAnalyzer>>,
        check_timeout: Duration,
    ) -> Self {
        Self { registry, analyzer, check_timeout }
    }

    /// Evaluate all considerations. Results are isolated per evaluation:
    /// the `Arc`s cloned into spawned tasks belong to this call only.
    pub async fn evaluate(
        &self,
        transcript: &Transcript,
        considerations: &[Consideration],
        session_type: SessionType,
    ) -> EvaluationReport {
        let transcript = Arc::new(transcript.clone());
        let mut results = Vec::with_capacity(considerations.len());
        for consideration in considerations {
            let result = self
                .check_one(Arc::clone(&transcript), Arc::new(consideration.clone()), session_type)
                .await;
            results.push(result);
        }
        EvaluationReport::new(results)
    }

    async fn check_one(
        &self,
        transcript: Arc<Transcript>,
        consideration: Arc<Consideration>,
        session_type: SessionType,
    ) -> CheckerResult {
        if let Some(analyzer) = &self.analyzer {
            match self
                .run_analyzer(Arc::clone(analyzer), Arc::clone(&transcript), Arc::clone(&consideration), session_type)
                .await
            {
                Ok(verdict) => {
                    return CheckerResult {
                        consideration_id: consideration.id.clone(),
                        satisfied: verdict.satisfied,
                        reason: verdict.reason,
                        severity: consideration.severity,
                    };
                }
                Err(err) => {
                    debug!(
                        consideration_id = %consideration.id,
                        error = %err,
                        "external analyzer unavailable, falling back to heuristic"
                    );
                }
            }
        }

        self.run_heuristic(transcript, consideration).await
    }

    /// Race the external analyzer against the deadline on a spawned task.
    /// The task is aborted on timeout; a late verdict is discarded.
    async fn run_analyzer(
        &self,
        analyzer: Arc<dyn SemanticAnalyzer>,
        transcript: Arc<Transcript>,
        consideration: Arc<Consideration>,
        session_type: SessionType,
    ) -> Result<crate::domain::ports::AnalyzerVerdict, CheckError> {
        let handle = tokio::spawn(async move {
            analyzer.assess(transcript, consideration, session_type).await
        });

        match tokio::time::timeout(self.check_timeout, handle).await {
            Ok(Ok(Ok(verdict))) => Ok(verdict),
            Ok(Ok(Err(err))) => Err(CheckError::AnalyzerFailed(err.to_string())),
            Ok(Err(join_err)) => Err(CheckError::TaskAborted(join_err.to_string())),
            Err(_) => Err(CheckError::Timeout {
                timeout_ms: self.check_timeout.as_millis() as u64,
            }),
        }
    }

    /// Run the named built-in heuristic under the same timeout guard.
    /// Timeout or panic yields `satisfied = true` with the cause as reason.
    async fn run_heuristic(
        &self,
        transcript: Arc<Transcript>,
        consideration: Arc<Consideration>,
    ) -> CheckerResult {
        let heuristic = self.registry.resolve(&consideration.checker);
        let task_transcript = Arc::clone(&transcript);
        let task_consideration = Arc::clone(&consideration);
        let handle = tokio::task::spawn_blocking(move || {
            heuristic.check(&task_transcript, &task_consideration)
        });

        let outcome: Result<HeuristicOutcome, CheckError> =
            match tokio::time::timeout(self.check_timeout, handle).await {
                Ok(Ok(outcome)) => Ok(outcome),
                Ok(Err(join_err)) => Err(CheckError::TaskAborted(join_err.to_string())),
                Err(_) => Err(CheckError::Timeout {
                    timeout_ms: self.check_timeout.as_millis() as u64,
                }),
            };

        match outcome {
            Ok(outcome) => CheckerResult {
                consideration_id: consideration.id.clone(),
                satisfied: outcome.satisfied,
                reason: outcome.reason,
                severity: consideration.severity,
            },
            Err(err) => {
                warn!(
                    consideration_id = %consideration.id,
                    error = %err,
                    "rule check failed, treating as satisfied (fail-open)"
                );
                CheckerResult::satisfied(
                    consideration.id.clone(),
                    format!("check could not complete, treated as satisfied: {err}"),
                    consideration.severity,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ApplicableSessions, Severity, TranscriptEntry};
    use crate::domain::ports::{AnalyzerError, AnalyzerVerdict};
    use async_trait::async_trait;
    use serde_json::json;

    fn rule(id: &str, checker: &str, severity: Severity) -> Consideration {
        Consideration {
            id: id.to_string(),
            category: "test".to_string(),
            question: "Is the work complete?".to_string(),
            severity,
            checker: checker.to_string(),
            enabled: true,
            applicable_session_types: ApplicableSessions::All,
        }
    }

    fn pipeline_without_analyzer(timeout: Duration) -> CheckerPipeline {
        CheckerPipeline::new(CheckerRegistry::with_builtins(), None, timeout)
    }

    struct SlowAnalyzer;

    #[async_trait]
    impl SemanticAnalyzer for SlowAnalyzer {
        async fn assess(
            &self,
            _transcript: Arc<Transcript>,
            _consideration: Arc<Consideration>,
            _session_type: SessionType,
        ) -> Result<AnalyzerVerdict, AnalyzerError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(AnalyzerVerdict { satisfied: false, reason: "too late".to_string() })
        }
    }

    struct FailingAnalyzer;

    #[async_trait]
    impl SemanticAnalyzer for FailingAnalyzer {
        async fn assess(
            &self,
            _transcript: Arc<Transcript>,
            _consideration: Arc<Consideration>,
            _session_type: SessionType,
        ) -> Result<AnalyzerVerdict, AnalyzerError> {
            Err(AnalyzerError::RequestFailed("boom".to_string()))
        }
    }

    struct SleepyHeuristic;

    impl crate::services::heuristics::Heuristic for SleepyHeuristic {
        fn name(&self) -> &'static str {
            "sleepy"
        }

        fn check(&self, _: &Transcript, _: &Consideration) -> HeuristicOutcome {
            // Blocking sleep, deliberately past the pipeline deadline but
            // short enough that runtime shutdown is not held up.
            std::thread::sleep(Duration::from_millis(200));
            HeuristicOutcome::unsatisfied("too late to matter")
        }
    }

    struct DecisiveAnalyzer {
        satisfied: bool,
    }

    #[async_trait]
    impl SemanticAnalyzer for DecisiveAnalyzer {
        async fn assess(
            &self,
            _transcript: Arc<Transcript>,
            _consideration: Arc<Consideration>,
            _session_type: SessionType,
        ) -> Result<AnalyzerVerdict, AnalyzerError> {
            Ok(AnalyzerVerdict {
                satisfied: self.satisfied,
                reason: "analyzer verdict".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_analyzer_verdict_is_used_when_it_returns_in_time() {
        let pipeline = CheckerPipeline::new(
            CheckerRegistry::with_builtins(),
            Some(Arc::new(DecisiveAnalyzer { satisfied: false })),
            Duration::from_secs(5),
        );
        let report = pipeline
            .evaluate(
                &Transcript::default(),
                &[rule("r1", "generic", Severity::Blocker)],
                SessionType::Development,
            )
            .await;
        let result = &report.results["r1"];
        assert!(!result.satisfied);
        assert_eq!(result.reason, "analyzer verdict");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_analyzer_falls_back_to_heuristic() {
        // Generic heuristic always satisfies, so a fallback shows up as
        // satisfied=true even though the analyzer would have said no.
        let pipeline = CheckerPipeline::new(
            CheckerRegistry::with_builtins(),
            Some(Arc::new(SlowAnalyzer)),
            Duration::from_millis(50),
        );
        let report = pipeline
            .evaluate(
                &Transcript::default(),
                &[rule("r1", "generic", Severity::Blocker)],
                SessionType::Development,
            )
            .await;
        assert!(report.results["r1"].satisfied);
    }

    #[tokio::test]
    async fn test_failing_analyzer_falls_back_to_heuristic() {
        let pipeline = CheckerPipeline::new(
            CheckerRegistry::with_builtins(),
            Some(Arc::new(FailingAnalyzer)),
            Duration::from_secs(5),
        );
        // todos_complete heuristic sees an open todo, so the fallback path
        // produces a real unsatisfied result, not a swallowed failure.
        let transcript = Transcript::new(vec![TranscriptEntry::ToolCall {
            tool: "TodoWrite".to_string(),
            input: json!({"todos": [{"content": "finish", "status": "pending"}]}),
            output: None,
        }]);
        let report = pipeline
            .evaluate(
                &transcript,
                &[rule("todos_complete", "todos_complete", Severity::Blocker)],
                SessionType::Development,
            )
            .await;
        assert!(!report.results["todos_complete"].satisfied);
    }

    #[tokio::test]
    async fn test_slow_heuristic_times_out_as_satisfied() {
        let mut registry = CheckerRegistry::with_builtins();
        registry.register(Arc::new(SleepyHeuristic));
        let pipeline = CheckerPipeline::new(registry, None, Duration::from_millis(10));

        let report = pipeline
            .evaluate(
                &Transcript::default(),
                &[rule("r1", "sleepy", Severity::Blocker)],
                SessionType::Development,
            )
            .await;
        let result = &report.results["r1"];
        assert!(result.satisfied, "timed-out heuristic must not block");
        assert!(result.reason.contains("timed out"), "reason: {}", result.reason);
    }

    #[tokio::test]
    async fn test_unknown_checker_resolves_to_generic_and_satisfies() {
        let pipeline = pipeline_without_analyzer(Duration::from_secs(5));
        let report = pipeline
            .evaluate(
                &Transcript::default(),
                &[rule("mystery", "no_such_heuristic", Severity::Warning)],
                SessionType::Development,
            )
            .await;
        assert!(report.results["mystery"].satisfied);
    }

    #[tokio::test]
    async fn test_one_result_per_rule() {
        let pipeline = pipeline_without_analyzer(Duration::from_secs(5));
        let rules = vec![
            rule("a", "generic", Severity::Blocker),
            rule("b", "todos_complete", Severity::Warning),
            rule("c", "tests_passing", Severity::Blocker),
        ];
        let report =
            pipeline.evaluate(&Transcript::default(), &rules, SessionType::Development).await;
        assert_eq!(report.results.len(), 3);
    }
}
