//! Ports (trait interfaces) for external collaborators.

pub mod analyzer;

pub use analyzer::{AnalyzerError, AnalyzerVerdict, SemanticAnalyzer};
