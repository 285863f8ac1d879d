pub mod config;
pub mod consideration;
pub mod controls;
pub mod report;
pub mod transcript;
pub mod turn_state;

pub use config::{CheckerConfig, Config, EscalationConfig, LoggingConfig, StateConfig};
pub use consideration::{ApplicableSessions, Consideration, SessionType, Severity};
pub use controls::GateControls;
pub use report::{CheckerResult, EvaluationReport};
pub use transcript::{Role, TodoItem, Transcript, TranscriptEntry};
pub use turn_state::{
    BlockSnapshot, EscalationPolicy, FailureEvidence, RedirectRecord, TurnState,
};
