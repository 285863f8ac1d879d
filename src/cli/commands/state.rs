//! Implementation of the `stopgate state` commands.


use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, TurnState};
use crate::infrastructure::{ConfigLoader, TurnStateStore};

#[derive(Args, Debug)]
pub struct StateArgs {
    #[command(subcommand)]
    pub command: StateCommands,
}

#[derive(Subcommand, Debug)]
pub enum StateCommands {
    /// Show the persisted turn state for a session
    Show {
        /// Session id
        session_id: String,
    },

    /// Reset a session's turn state to a fresh empty state
    Reset {
        /// Session id
        session_id: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct StateOutput {
    pub state: TurnState,
}

impl CommandOutput for StateOutput {
    fn to_human(&self) -> String {
        let s = &self.state;
        let mut lines = vec![
            format!("session:            {}", s.session_id),
            format!("turn count:         {}", s.turn_count),
            format!("consecutive blocks: {}", s.consecutive_blocks),
            format!("analyzed watermark: {}", s.last_analyzed_transcript_index),
        ];
        if let Some(ts) = s.last_block_timestamp {
            lines.push(format!("last block:         {ts}"));
        }
        for snapshot in &s.block_history {
            let failed: Vec<&str> =
                snapshot.failures.iter().map(|f| f.consideration_id.as_str()).collect();
            lines.push(format!(
                "  block #{} at {}: {}",
                snapshot.block_number,
                snapshot.timestamp,
                failed.join(", ")
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ResetOutput {
    pub session_id: String,
    pub message: String,
}

impl CommandOutput for ResetOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: StateArgs, json_mode: bool) -> Result<u8> {
    let config = ConfigLoader::load().unwrap_or_else(|_| Config::default());
    let store = TurnStateStore::new(&config.state);

    match args.command {
        StateCommands::Show { session_id } => {
            let state = store.load(&session_id);
            output(&StateOutput { state }, json_mode);
        }
        StateCommands::Reset { session_id } => {
            store.save(&TurnState::new(&session_id)).await;
            output(
                &ResetOutput {
                    message: format!("Turn state for session '{session_id}' reset."),
                    session_id,
                },
                json_mode,
            );
        }
    }
    Ok(0)
}
