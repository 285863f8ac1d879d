//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};

use super::commands::diagnose::DiagnoseArgs;
use super::commands::evaluate::EvaluateArgs;
use super::commands::init::InitArgs;
use super::commands::state::StateArgs;

#[derive(Parser)]
#[command(name = "stopgate")]
#[command(about = "Stopgate - Completion gate for autonomous coding sessions", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate one termination attempt (exit 0 = approve, 2 = block)
    Evaluate(EvaluateArgs),

    /// Inspect or reset a session's turn state
    State(StateArgs),

    /// Analyze a session's diagnostic event log
    Diagnose(DiagnoseArgs),

    /// Initialize stopgate configuration and a starter rule file
    Init(InitArgs),
}
