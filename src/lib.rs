//! Stopgate - Completion Gate for Autonomous Coding Sessions
//!
//! Stopgate inspects the transcript of an autonomous coding session at each
//! termination attempt and decides whether the session may finish (approve)
//! or must continue with a redirecting prompt (block).
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Pure models, ports, and errors
//! - **Service Layer** (`services`): Classification, checking, decisions
//! - **Infrastructure Layer** (`infrastructure`): Config, logging, storage
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use stopgate::domain::models::{GateControls, Transcript};
//! use stopgate::services::GateEngine;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = stopgate::ConfigLoader::load().unwrap_or_default();
//!     let engine = GateEngine::new(&config, None);
//!     let transcript = Transcript::from_jsonl("");
//!     let decision = engine
//!         .evaluate("session-1", &transcript, &GateControls::from_env())
//!         .await;
//!     assert!(decision.is_approved());
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    Config, Consideration, EscalationPolicy, GateControls, SessionType, Severity, Transcript,
    TurnState,
};
pub use domain::ports::{AnalyzerVerdict, SemanticAnalyzer};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{GateDecision, GateEngine, Verdict};
