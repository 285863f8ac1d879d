//! Implementation of the `stopgate diagnose` command.


use anyhow::Result;
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::{ConfigLoader, TurnStateStore};
use crate::services::{DiagnosticReport, Diagnostics};

#[derive(Args, Debug)]
pub struct DiagnoseArgs {
    /// Session id
    pub session_id: String,
}

#[derive(Debug, serde::Serialize)]
pub struct DiagnoseOutput {
    pub report: DiagnosticReport,
}

impl CommandOutput for DiagnoseOutput {
    fn to_human(&self) -> String {
        let report = &self.report;
        if report.is_healthy() {
            return format!(
                "Session '{}': no issues found across {} event(s).",
                report.session_id, report.events_analyzed
            );
        }
        let mut lines = vec![format!(
            "Session '{}': {} issue(s) found across {} event(s):",
            report.session_id,
            report.findings.len(),
            report.events_analyzed
        )];
        for finding in &report.findings {
            lines.push(format!("  - {}", finding.describe()));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: DiagnoseArgs, json_mode: bool) -> Result<u8> {
    let config = ConfigLoader::load().unwrap_or_else(|_| Config::default());
    let store = TurnStateStore::new(&config.state);

    let events = store.diag_events(&args.session_id);
    let report = Diagnostics::analyze(&args.session_id, &events);
    let healthy = report.is_healthy();
    output(&DiagnoseOutput { report }, json_mode);

    Ok(u8::from(!healthy))
}
