//! Command-line interface layer.

pub mod commands;
pub mod output;
pub mod types;

pub use output::{output, CommandOutput};
pub use types::{Cli, Commands};

/// Report a command error on stderr in the requested format. Command errors
/// are operational problems (bad arguments, unwritable target directories),
/// never gate verdicts; verdicts are carried by the exit code.
pub fn handle_error(err: &anyhow::Error, json_mode: bool) {
    if json_mode {
        let payload = serde_json::json!({ "error": err.to_string() });
        eprintln!("{}", serde_json::to_string_pretty(&payload).unwrap_or_default());
    } else {
        eprintln!("error: {err:#}");
    }
}
