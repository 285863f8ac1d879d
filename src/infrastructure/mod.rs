//! Infrastructure layer: configuration, logging, and durable storage.

pub mod config;
pub mod diag_log;
pub mod logging;
pub mod redirect_log;
pub mod state_store;

pub use config::{ConfigError, ConfigLoader};
pub use diag_log::{read_jsonl, DiagEvent, DiagLog};
pub use redirect_log::RedirectLog;
pub use state_store::TurnStateStore;
