//! ucimatch CLI - Command-line interface
//!
//! Modes:
//! - default: run a tournament between the given engines
//! - --compliance ENGINE: check one engine for UCI compliance and exit

mod compliance_cmd;
mod tournament_cmd;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ucimatch")]
#[command(about = "Run matches between UCI chess engines")]
#[command(version)]
struct Cli {
    /// Check the engine at this path for UCI compliance and exit
    #[arg(long, value_name = "ENGINE", conflicts_with = "engine")]
    compliance: Option<PathBuf>,

    #[command(flatten)]
    tournament: tournament_cmd::TournamentArgs,
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.compliance {
        Some(engine) => compliance_cmd::run(&engine),
        None => tournament_cmd::run(cli.tournament),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
