//! Implementation of the `stopgate init` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio::fs;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

/// Starter rule file. Mirrors the built-in fallback set so editing it is a
/// strict customization, never a behavior change.
const STARTER_RULES: &str = r#"# Stopgate rules. Each entry is one consideration checked at every
# termination attempt. severity: blocker gates termination, warning is
# advisory. applicable_session_types defaults to [development]; use ["*"]
# for all session types.
- id: todos_complete
  category: task tracking
  question: Are all tracked todo items completed?
  severity: blocker
  checker: todos_complete
  enabled: true
- id: tests_passing
  category: verification
  question: Were the tests run and did they pass after the code changes?
  severity: blocker
  checker: tests_passing
  enabled: true
- id: no_placeholders
  category: implementation quality
  question: Is the written code free of TODO/FIXME markers and stubbed-out functions?
  severity: blocker
  checker: no_placeholders
  enabled: true
- id: questions_resolved
  category: communication
  question: Have all questions the agent raised been resolved rather than left hanging?
  severity: blocker
  checker: questions_resolved
  enabled: true
- id: work_committed
  category: version control
  question: Have the code changes been committed?
  severity: blocker
  checker: work_committed
  enabled: true
"#;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force reinitialization even if already initialized
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub files_created: Vec<String>,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if !self.files_created.is_empty() {
            lines.push("\nCreated:".to_string());
            for file in &self.files_created {
                lines.push(format!("  - {file}"));
            }
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<u8> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir().context("Failed to get current directory")?.join(&args.path)
    };

    let stopgate_dir = target_path.join(".stopgate");

    if stopgate_dir.exists() && !args.force {
        output(
            &InitOutput {
                success: false,
                message: "Project already initialized. Use --force to reinitialize.".to_string(),
                initialized_path: target_path,
                files_created: vec![],
            },
            json_mode,
        );
        return Ok(1);
    }

    fs::create_dir_all(stopgate_dir.join("state"))
        .await
        .context("Failed to create .stopgate directory")?;

    let mut files_created = vec![".stopgate/state/".to_string()];

    let config_yaml = serde_yaml::to_string(&Config::default())
        .context("Failed to render default configuration")?;
    fs::write(stopgate_dir.join("config.yaml"), config_yaml)
        .await
        .context("Failed to write .stopgate/config.yaml")?;
    files_created.push(".stopgate/config.yaml".to_string());

    fs::write(stopgate_dir.join("rules.yaml"), STARTER_RULES)
        .await
        .context("Failed to write .stopgate/rules.yaml")?;
    files_created.push(".stopgate/rules.yaml".to_string());

    output(
        &InitOutput {
            success: true,
            message: if args.force {
                "Project reinitialized successfully.".to_string()
            } else {
                "Project initialized successfully.".to_string()
            },
            initialized_path: target_path,
            files_created,
        },
        json_mode,
    );
    Ok(0)
}
