//! Built-in rule heuristics and the checker registry.
//!
//! Each heuristic is a pure function of the transcript: it inspects
//! structural features (writes vs reads, markers in written content, test
//! command outcomes) and never has side effects. The registry resolves a
//! rule's checker name to a strategy; lookups can never fail because the
//! generic keyword heuristic is the required default entry.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::domain::models::{Consideration, Transcript};

/// Outcome of one heuristic check.
#[derive(Debug, Clone)]
pub struct HeuristicOutcome {
    pub satisfied: bool,
    pub reason: String,
    /// Verbatim transcript excerpt backing an unsatisfied outcome.
    pub evidence_quote: Option<String>,
}

impl HeuristicOutcome {
    pub fn satisfied(reason: impl Into<String>) -> Self {
        Self { satisfied: true, reason: reason.into(), evidence_quote: None }
    }

    pub fn unsatisfied(reason: impl Into<String>) -> Self {
        Self { satisfied: false, reason: reason.into(), evidence_quote: None }
    }

    pub fn with_evidence(mut self, quote: impl Into<String>) -> Self {
        self.evidence_quote = Some(quote.into());
        self
    }
}

/// A named built-in check over the transcript.
pub trait Heuristic: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, transcript: &Transcript, consideration: &Consideration) -> HeuristicOutcome;
}

/// Placeholder markers scanned for in written content.
const PLACEHOLDER_MARKERS: &[&str] = &[
    "TODO",
    "FIXME",
    "XXX:",
    "unimplemented!",
    "todo!(",
    "NotImplementedError",
    "raise NotImplemented",
    "placeholder",
    "not implemented yet",
];

/// Textual markers suggesting the test run failed.
const TEST_FAILURE_MARKERS: &[&str] =
    &["FAILED", "test result: FAILED", "failures:", "AssertionError", "Tests failed"];

/// Phrases an agent uses to hand a question back to the user.
const HANGING_QUESTION_OPENERS: &[&str] = &[
    "should i",
    "do you want",
    "would you like",
    "which of",
    "let me know",
    "shall i",
];

// ---------------------------------------------------------------------------
// Individual heuristics
// ---------------------------------------------------------------------------

struct TodosComplete;

impl Heuristic for TodosComplete {
    fn name(&self) -> &'static str {
        "todos_complete"
    }

    fn check(&self, transcript: &Transcript, _c: &Consideration) -> HeuristicOutcome {
        match transcript.latest_todo_snapshot() {
            None => HeuristicOutcome::satisfied("no task list was tracked this session"),
            Some(items) => {
                let open: Vec<&str> = items
                    .iter()
                    .filter(|i| !i.is_completed())
                    .map(|i| i.content.as_str())
                    .collect();
                if open.is_empty() {
                    HeuristicOutcome::satisfied(format!(
                        "all {} tracked todo items are completed",
                        items.len()
                    ))
                } else {
                    HeuristicOutcome::unsatisfied(format!(
                        "{} of {} todo items still open: {}",
                        open.len(),
                        items.len(),
                        open.join("; ")
                    ))
                    .with_evidence(open.join("; "))
                }
            }
        }
    }
}

struct TestsPassing;

impl Heuristic for TestsPassing {
    fn name(&self) -> &'static str {
        "tests_passing"
    }

    fn check(&self, transcript: &Transcript, _c: &Consideration) -> HeuristicOutcome {
        if transcript.code_writes().is_empty() {
            return HeuristicOutcome::satisfied("no code changes to verify");
        }
        let test_commands = transcript.test_commands();
        if test_commands.is_empty() {
            return HeuristicOutcome::unsatisfied("code was changed but no test command was run");
        }

        // Look at the output of the last test invocation only; earlier runs
        // may legitimately have failed before fixes.
        let last_failure = transcript
            .entries
            .iter()
            .rev()
            .find_map(|e| {
                let cmd = e.command()?;
                if !test_commands.contains(&cmd) {
                    return None;
                }
                Some(e.text())
            })
            .and_then(|text| {
                TEST_FAILURE_MARKERS
                    .iter()
                    .find(|m| text.contains(**m))
                    .map(|m| (*m).to_string())
            });

        match last_failure {
            Some(marker) => HeuristicOutcome::unsatisfied(format!(
                "the most recent test run shows a failure marker ({marker})"
            ))
            .with_evidence(marker),
            None => HeuristicOutcome::satisfied("tests were run with no failure markers"),
        }
    }
}

struct NoPlaceholders;

impl Heuristic for NoPlaceholders {
    fn name(&self) -> &'static str {
        "no_placeholders"
    }

    fn check(&self, transcript: &Transcript, _c: &Consideration) -> HeuristicOutcome {
        for entry in &transcript.entries {
            let Some(content) = entry.written_content() else { continue };
            for &marker in PLACEHOLDER_MARKERS {
                if let Some(pos) = content.find(marker) {
                    let line = content[..pos]
                        .rfind('\n')
                        .map_or(&content[..], |i| &content[i + 1..])
                        .lines()
                        .next()
                        .unwrap_or(marker)
                        .trim();
                    let path = entry.written_path().unwrap_or("<unknown>");
                    return HeuristicOutcome::unsatisfied(format!(
                        "written content in {path} contains a placeholder marker ({marker})"
                    ))
                    .with_evidence(line.to_string());
                }
            }
        }
        HeuristicOutcome::satisfied("no placeholder markers in written content")
    }
}

struct QuestionsResolved;

impl Heuristic for QuestionsResolved {
    fn name(&self) -> &'static str {
        "questions_resolved"
    }

    fn check(&self, transcript: &Transcript, _c: &Consideration) -> HeuristicOutcome {
        let Some(last) = transcript.agent_messages().last().copied() else {
            return HeuristicOutcome::satisfied("agent asked no questions");
        };
        let lower = last.to_lowercase();
        let hangs = last.contains('?')
            && HANGING_QUESTION_OPENERS.iter().any(|opener| lower.contains(opener));
        if hangs {
            let quote: String = last.chars().take(160).collect();
            HeuristicOutcome::unsatisfied(
                "the agent's final message hands a question back to the user",
            )
            .with_evidence(quote)
        } else {
            HeuristicOutcome::satisfied("no unresolved question in the agent's final message")
        }
    }
}

struct WorkCommitted;

impl Heuristic for WorkCommitted {
    fn name(&self) -> &'static str {
        "work_committed"
    }

    fn check(&self, transcript: &Transcript, _c: &Consideration) -> HeuristicOutcome {
        if transcript.code_writes().is_empty() {
            return HeuristicOutcome::satisfied("no code changes to commit");
        }
        let committed =
            transcript.vcs_commands().iter().any(|c| c.contains("commit"));
        if committed {
            HeuristicOutcome::satisfied("code changes were committed")
        } else {
            HeuristicOutcome::unsatisfied("code was changed but no commit command was run")
        }
    }
}

struct DocsUpdated;

impl Heuristic for DocsUpdated {
    fn name(&self) -> &'static str {
        "docs_updated"
    }

    fn check(&self, transcript: &Transcript, _c: &Consideration) -> HeuristicOutcome {
        let code = transcript.code_writes().len();
        if code == 0 {
            return HeuristicOutcome::satisfied("no code changes that would need documentation");
        }
        if transcript.doc_config_writes().is_empty() {
            HeuristicOutcome::unsatisfied(format!(
                "{code} code file(s) changed without any documentation update"
            ))
        } else {
            HeuristicOutcome::satisfied("documentation was touched alongside code changes")
        }
    }
}

/// Scratch-file names that do not belong in the repository root.
const ROOT_POLLUTION_PATTERNS: &[&str] = &["scratch", "tmp_", "temp_", "test_output", "debug_"];

struct NoRootPollution;

impl Heuristic for NoRootPollution {
    fn name(&self) -> &'static str {
        "no_root_pollution"
    }

    fn check(&self, transcript: &Transcript, _c: &Consideration) -> HeuristicOutcome {
        let offenders: Vec<&str> = transcript
            .written_paths()
            .into_iter()
            .filter(|p| {
                !p.contains('/')
                    && ROOT_POLLUTION_PATTERNS
                        .iter()
                        .any(|pat| p.to_lowercase().starts_with(pat))
            })
            .collect();
        if offenders.is_empty() {
            HeuristicOutcome::satisfied("no scratch files written to the repository root")
        } else {
            HeuristicOutcome::unsatisfied(format!(
                "scratch file(s) left in the repository root: {}",
                offenders.join(", ")
            ))
            .with_evidence(offenders.join(", "))
        }
    }
}

/// Investigation write-ups belong under a docs directory, not the root.
struct InvestigationDocsPlaced;

impl Heuristic for InvestigationDocsPlaced {
    fn name(&self) -> &'static str {
        "investigation_docs_placed"
    }

    fn check(&self, transcript: &Transcript, _c: &Consideration) -> HeuristicOutcome {
        let misplaced: Vec<&str> = transcript
            .written_paths()
            .into_iter()
            .filter(|p| {
                let lower = p.to_lowercase();
                let looks_like_notes = lower.ends_with(".md")
                    && (lower.contains("investigation")
                        || lower.contains("notes")
                        || lower.contains("findings"));
                looks_like_notes && !lower.starts_with("docs/")
            })
            .collect();
        if misplaced.is_empty() {
            HeuristicOutcome::satisfied("investigation notes are placed under docs/")
        } else {
            HeuristicOutcome::unsatisfied(format!(
                "investigation doc(s) written outside docs/: {}",
                misplaced.join(", ")
            ))
            .with_evidence(misplaced.join(", "))
        }
    }
}

struct PrReviewResponded;

impl Heuristic for PrReviewResponded {
    fn name(&self) -> &'static str {
        "pr_review_responded"
    }

    fn check(&self, transcript: &Transcript, _c: &Consideration) -> HeuristicOutcome {
        if !transcript.has_pr_operations() {
            return HeuristicOutcome::satisfied("no PR operations this session");
        }
        let text = transcript.joined_text().to_lowercase();
        let mentions_review = text.contains("review comment") || text.contains("requested changes");
        let responded = text.contains("addressed") || text.contains("replied") || text.contains("resolved");
        if mentions_review && !responded {
            HeuristicOutcome::unsatisfied("review comments were mentioned but never addressed")
        } else {
            HeuristicOutcome::satisfied("no unaddressed review comments detected")
        }
    }
}

struct CiPassing;

impl Heuristic for CiPassing {
    fn name(&self) -> &'static str {
        "ci_passing"
    }

    fn check(&self, transcript: &Transcript, _c: &Consideration) -> HeuristicOutcome {
        if !transcript.has_pr_operations() {
            return HeuristicOutcome::satisfied("no PR operations this session");
        }
        let text = transcript.joined_text().to_lowercase();
        for marker in ["ci failing", "checks failed", "ci is red", "build failed"] {
            if text.contains(marker) {
                return HeuristicOutcome::unsatisfied(format!(
                    "transcript reports a CI failure ({marker})"
                ))
                .with_evidence(marker.to_string());
            }
        }
        HeuristicOutcome::satisfied("no CI failure markers in the transcript")
    }
}

struct BranchCurrent;

impl Heuristic for BranchCurrent {
    fn name(&self) -> &'static str {
        "branch_current"
    }

    fn check(&self, transcript: &Transcript, _c: &Consideration) -> HeuristicOutcome {
        if transcript.vcs_commands().is_empty() {
            return HeuristicOutcome::satisfied("no version-control operations this session");
        }
        let text = transcript.joined_text().to_lowercase();
        for marker in ["behind 'origin", "behind origin", "behind main", "behind master"] {
            if text.contains(marker) {
                return HeuristicOutcome::unsatisfied(
                    "the working branch appears to be behind its upstream",
                )
                .with_evidence(marker.to_string());
            }
        }
        HeuristicOutcome::satisfied("no branch-currency problems detected")
    }
}

// ---------------------------------------------------------------------------
// Generic keyword heuristic
// ---------------------------------------------------------------------------

/// Short function words excluded from keyword extraction.
const STOP_WORDS: &[&str] = &[
    "this", "that", "have", "been", "with", "your", "from", "does", "what", "when", "were",
    "will", "would", "should", "there", "their", "about", "into",
];

/// Fallback keyword-presence check for rules without a dedicated heuristic.
///
/// Extracts content words from the rule's question and scans the transcript
/// for their presence. Always reports satisfied: keyword absence is logged
/// but never fails the rule. This conservative default is intentional; a
/// rule without a well-understood heuristic must not gate termination on a
/// keyword scan.
pub struct GenericKeyword;

impl GenericKeyword {
    fn keywords(question: &str) -> Vec<String> {
        question
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 3)
            .map(str::to_lowercase)
            .filter(|w| !STOP_WORDS.contains(&w.as_str()))
            .collect()
    }
}

impl Heuristic for GenericKeyword {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn check(&self, transcript: &Transcript, consideration: &Consideration) -> HeuristicOutcome {
        let keywords = Self::keywords(&consideration.question);
        let text = transcript.joined_text().to_lowercase();
        let missing: Vec<&String> = keywords.iter().filter(|k| !text.contains(k.as_str())).collect();

        if missing.is_empty() {
            HeuristicOutcome::satisfied("all question keywords appear in the transcript")
        } else {
            debug!(
                consideration_id = %consideration.id,
                missing = ?missing,
                "generic heuristic found missing keywords (not failing the rule)"
            );
            HeuristicOutcome::satisfied(format!(
                "generic check: {} of {} keywords absent, treated as satisfied",
                missing.len(),
                keywords.len()
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps a checker name to its strategy. The "generic" entry is the required
/// default, so resolution can never fail.
pub struct CheckerRegistry {
    checkers: HashMap<&'static str, Arc<dyn Heuristic>>,
    generic: Arc<dyn Heuristic>,
}

impl CheckerRegistry {
    /// Registry with every built-in heuristic installed.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            checkers: HashMap::new(),
            generic: Arc::new(GenericKeyword),
        };
        registry.register(Arc::new(TodosComplete));
        registry.register(Arc::new(TestsPassing));
        registry.register(Arc::new(NoPlaceholders));
        registry.register(Arc::new(QuestionsResolved));
        registry.register(Arc::new(WorkCommitted));
        registry.register(Arc::new(DocsUpdated));
        registry.register(Arc::new(NoRootPollution));
        registry.register(Arc::new(InvestigationDocsPlaced));
        registry.register(Arc::new(PrReviewResponded));
        registry.register(Arc::new(CiPassing));
        registry.register(Arc::new(BranchCurrent));
        registry
    }

    pub fn register(&mut self, heuristic: Arc<dyn Heuristic>) {
        self.checkers.insert(heuristic.name(), heuristic);
    }

    /// Resolve a checker name, falling back to the generic heuristic for
    /// unknown names.
    pub fn resolve(&self, name: &str) -> Arc<dyn Heuristic> {
        self.checkers.get(name).cloned().unwrap_or_else(|| Arc::clone(&self.generic))
    }
}

impl Default for CheckerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ApplicableSessions, Role, Severity, TranscriptEntry};
    use serde_json::json;

    fn rule(checker: &str) -> Consideration {
        Consideration {
            id: checker.to_string(),
            category: "test".to_string(),
            question: "Were the tests run and did they pass?".to_string(),
            severity: Severity::Blocker,
            checker: checker.to_string(),
            enabled: true,
            applicable_session_types: ApplicableSessions::All,
        }
    }

    fn write(path: &str, content: &str) -> TranscriptEntry {
        TranscriptEntry::ToolCall {
            tool: "Write".to_string(),
            input: json!({"file_path": path, "content": content}),
            output: None,
        }
    }

    fn bash(cmd: &str, output: &str) -> TranscriptEntry {
        TranscriptEntry::ToolCall {
            tool: "Bash".to_string(),
            input: json!({"command": cmd}),
            output: Some(output.to_string()),
        }
    }

    #[test]
    fn test_registry_resolves_unknown_to_generic() {
        let registry = CheckerRegistry::with_builtins();
        assert_eq!(registry.resolve("no_such_checker").name(), "generic");
        assert_eq!(registry.resolve("tests_passing").name(), "tests_passing");
    }

    #[test]
    fn test_todos_complete() {
        let c = rule("todos_complete");
        let heuristic = TodosComplete;

        let empty = Transcript::default();
        assert!(heuristic.check(&empty, &c).satisfied);

        let open = Transcript::new(vec![TranscriptEntry::ToolCall {
            tool: "TodoWrite".to_string(),
            input: json!({"todos": [
                {"content": "wire up API", "status": "completed"},
                {"content": "add tests", "status": "in_progress"},
            ]}),
            output: None,
        }]);
        let outcome = heuristic.check(&open, &c);
        assert!(!outcome.satisfied);
        assert!(outcome.reason.contains("add tests"));
        assert!(outcome.evidence_quote.is_some());
    }

    #[test]
    fn test_tests_passing_requires_test_run_after_code_change() {
        let c = rule("tests_passing");
        let heuristic = TestsPassing;

        let no_tests = Transcript::new(vec![write("src/lib.rs", "fn f() {}")]);
        assert!(!heuristic.check(&no_tests, &c).satisfied);

        let passing = Transcript::new(vec![
            write("src/lib.rs", "fn f() {}"),
            bash("cargo test", "test result: ok. 4 passed"),
        ]);
        assert!(heuristic.check(&passing, &c).satisfied);

        let failing = Transcript::new(vec![
            write("src/lib.rs", "fn f() {}"),
            bash("cargo test", "test result: FAILED. 1 failed"),
        ]);
        assert!(!heuristic.check(&failing, &c).satisfied);
    }

    #[test]
    fn test_tests_passing_only_considers_latest_run() {
        let c = rule("tests_passing");
        let heuristic = TestsPassing;

        let fixed = Transcript::new(vec![
            write("src/lib.rs", "fn f() {}"),
            bash("cargo test", "test result: FAILED. 1 failed"),
            bash("cargo test", "test result: ok. 5 passed"),
        ]);
        assert!(heuristic.check(&fixed, &c).satisfied);
    }

    #[test]
    fn test_no_placeholders() {
        let c = rule("no_placeholders");
        let heuristic = NoPlaceholders;

        let clean = Transcript::new(vec![write("src/lib.rs", "fn f() -> u32 { 42 }")]);
        assert!(heuristic.check(&clean, &c).satisfied);

        let stubbed = Transcript::new(vec![write("src/lib.rs", "fn f() {\n    todo!(\"later\")\n}")]);
        let outcome = heuristic.check(&stubbed, &c);
        assert!(!outcome.satisfied);
        assert!(outcome.reason.contains("src/lib.rs"));
    }

    #[test]
    fn test_questions_resolved() {
        let c = rule("questions_resolved");
        let heuristic = QuestionsResolved;

        let hanging = Transcript::new(vec![TranscriptEntry::Message {
            role: Role::Agent,
            text: "Should I also update the migration scripts?".to_string(),
        }]);
        assert!(!heuristic.check(&hanging, &c).satisfied);

        let resolved = Transcript::new(vec![TranscriptEntry::Message {
            role: Role::Agent,
            text: "All done, the migrations are updated.".to_string(),
        }]);
        assert!(heuristic.check(&resolved, &c).satisfied);
    }

    #[test]
    fn test_work_committed() {
        let c = rule("work_committed");
        let heuristic = WorkCommitted;

        let uncommitted = Transcript::new(vec![write("src/lib.rs", "fn f() {}")]);
        assert!(!heuristic.check(&uncommitted, &c).satisfied);

        let committed = Transcript::new(vec![
            write("src/lib.rs", "fn f() {}"),
            bash("git commit -am 'fix'", ""),
        ]);
        assert!(heuristic.check(&committed, &c).satisfied);
    }

    #[test]
    fn test_root_pollution() {
        let c = rule("no_root_pollution");
        let heuristic = NoRootPollution;

        let polluted = Transcript::new(vec![write("scratch_notes.py", "print(1)")]);
        assert!(!heuristic.check(&polluted, &c).satisfied);

        let placed = Transcript::new(vec![write("src/scratch_notes.py", "print(1)")]);
        assert!(heuristic.check(&placed, &c).satisfied);
    }

    #[test]
    fn test_investigation_docs_placement() {
        let c = rule("investigation_docs_placed");
        let heuristic = InvestigationDocsPlaced;

        let misplaced = Transcript::new(vec![write("INVESTIGATION_NOTES.md", "# findings")]);
        assert!(!heuristic.check(&misplaced, &c).satisfied);

        let placed = Transcript::new(vec![write("docs/investigation-startup.md", "# findings")]);
        assert!(heuristic.check(&placed, &c).satisfied);
    }

    #[test]
    fn test_ci_and_branch_markers() {
        let ci = CiPassing;
        let branch = BranchCurrent;

        let red = Transcript::new(vec![
            bash("gh pr create --fill", ""),
            bash("gh pr checks", "some checks failed"),
        ]);
        assert!(!ci.check(&red, &rule("ci_passing")).satisfied);

        let behind = Transcript::new(vec![bash(
            "git status",
            "Your branch is behind 'origin/main' by 3 commits",
        )]);
        assert!(!branch.check(&behind, &rule("branch_current")).satisfied);
    }

    #[test]
    fn test_generic_always_satisfied() {
        let heuristic = GenericKeyword;
        let c = rule("generic");

        // Keywords absent: still satisfied by design.
        let unrelated = Transcript::new(vec![TranscriptEntry::Message {
            role: Role::Agent,
            text: "completely different content".to_string(),
        }]);
        assert!(heuristic.check(&unrelated, &c).satisfied);

        let empty = Transcript::default();
        assert!(heuristic.check(&empty, &c).satisfied);
    }

    #[test]
    fn test_generic_keyword_extraction() {
        let words = GenericKeyword::keywords("Were the tests run and did they pass?");
        assert!(words.contains(&"tests".to_string()));
        assert!(!words.contains(&"the".to_string()), "short words excluded");
        assert!(!words.contains(&"were".to_string()), "stop words excluded");
    }
}
