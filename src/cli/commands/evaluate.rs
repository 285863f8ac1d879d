//! Implementation of the `stopgate evaluate` command.
//!
//! Invoked by the host process when the agent attempts to finish. The hook
//! payload (session id + transcript path) arrives as JSON on stdin; both
//! fields can be overridden with flags. Exit status carries the verdict:
//! 0 approves the termination, 2 blocks it.

use std::io::Read;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Deserialize;
use tracing::warn;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{GateControls, Transcript};
use crate::infrastructure::ConfigLoader;
use crate::services::{GateDecision, GateEngine, Verdict};

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Session id (overrides the stdin payload)
    #[arg(long, env = "STOPGATE_SESSION_ID")]
    pub session_id: Option<String>,

    /// Transcript JSONL path (overrides the stdin payload)
    #[arg(long)]
    pub transcript: Option<PathBuf>,
}

/// Hook payload the host writes to stdin.
#[derive(Debug, Default, Deserialize)]
struct HookInput {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    transcript_path: Option<PathBuf>,
}

#[derive(Debug, serde::Serialize)]
pub struct EvaluateOutput {
    pub verdict: Verdict,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl CommandOutput for EvaluateOutput {
    fn to_human(&self) -> String {
        match self.verdict {
            Verdict::Approve => {
                let mut lines = vec![format!("approved ({})", self.reason)];
                if let Some(summary) = &self.summary {
                    lines.push(summary.clone());
                }
                lines.join("\n")
            }
            Verdict::Block => self
                .continuation_prompt
                .clone()
                .unwrap_or_else(|| format!("blocked ({})", self.reason)),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: EvaluateArgs, json_mode: bool) -> Result<u8> {
    let needs_stdin = args.session_id.is_none() || args.transcript.is_none();
    let hook = if needs_stdin { read_hook_input() } else { HookInput::default() };

    let session_id = args
        .session_id
        .or(hook.session_id)
        .unwrap_or_else(|| "default".to_string());
    let transcript_path = args.transcript.or(hook.transcript_path);

    let transcript = match transcript_path {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(raw) => Transcript::from_jsonl(&raw),
            Err(err) => {
                // Fail open: an unreadable transcript must not strand the
                // session in a blocked state.
                warn!(path = %path.display(), error = %err, "transcript unreadable, approving");
                let decision = GateDecision::approve("transcript-unavailable");
                return Ok(emit(&decision, json_mode));
            }
        },
        None => {
            warn!("no transcript supplied, approving");
            let decision = GateDecision::approve("transcript-unavailable");
            return Ok(emit(&decision, json_mode));
        }
    };

    let config = match ConfigLoader::load() {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "configuration invalid, using defaults");
            crate::domain::models::Config::default()
        }
    };

    let engine = GateEngine::new(&config, None);
    let decision = engine.evaluate(&session_id, &transcript, &GateControls::from_env()).await;
    Ok(emit(&decision, json_mode))
}

fn emit(decision: &GateDecision, json_mode: bool) -> u8 {
    let data = EvaluateOutput {
        verdict: decision.verdict,
        reason: decision.reason.clone(),
        continuation_prompt: decision.continuation_prompt.clone(),
        summary: decision.summary.clone(),
    };
    output(&data, json_mode);
    match decision.verdict {
        Verdict::Approve => 0,
        Verdict::Block => 2,
    }
}

fn read_hook_input() -> HookInput {
    let mut raw = String::new();
    if std::io::stdin().read_to_string(&mut raw).is_err() || raw.trim().is_empty() {
        return HookInput::default();
    }
    serde_json::from_str(&raw).unwrap_or_else(|err| {
        warn!(error = %err, "malformed hook payload on stdin, ignoring");
        HookInput::default()
    })
}
