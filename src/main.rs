//! Stopgate CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use stopgate::cli::{Cli, Commands};
use stopgate::domain::models::Config;
use stopgate::infrastructure::{logging, ConfigLoader};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging_config = ConfigLoader::load().map_or_else(|_| Config::default().logging, |c| c.logging);
    if let Err(err) = logging::init(&logging_config) {
        eprintln!("warning: logging init failed: {err}");
    }

    let result = match cli.command {
        Commands::Evaluate(args) => stopgate::cli::commands::evaluate::execute(args, cli.json).await,
        Commands::State(args) => stopgate::cli::commands::state::execute(args, cli.json).await,
        Commands::Diagnose(args) => stopgate::cli::commands::diagnose::execute(args, cli.json).await,
        Commands::Init(args) => stopgate::cli::commands::init::execute(args, cli.json).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            stopgate::cli::handle_error(&err, cli.json);
            ExitCode::FAILURE
        }
    }
}
