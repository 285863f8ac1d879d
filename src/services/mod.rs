//! Service layer: classification, checking, decisions, and orchestration.

pub mod classifier;
pub mod decision;
pub mod delta;
pub mod diagnostics;
pub mod engine;
pub mod heuristics;
pub mod pipeline;
pub mod rule_store;

pub use classifier::SessionClassifier;
pub use decision::{DecisionEngine, GateDecision, Verdict};
pub use delta::{CompletionClaim, DeltaAnalyzer, DeltaReport};
pub use diagnostics::{DiagnosticReport, Diagnostics, Finding};
pub use engine::GateEngine;
pub use heuristics::CheckerRegistry;
pub use pipeline::CheckerPipeline;
pub use rule_store::RuleStore;
