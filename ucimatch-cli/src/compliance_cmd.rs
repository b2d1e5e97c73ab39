//! Compliance command - check one engine against the UCI script

use std::io;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use ucimatch_engine::{check_compliance, CancellationToken, EngineConfiguration};

/// Run the compliance script; exit status 0 only when every step passes
pub fn run(engine: &Path) -> Result<ExitCode> {
    tracing::info!("Checking {} for UCI compliance", engine.display());

    let config = EngineConfiguration::new(engine);
    let mut stdout = io::stdout().lock();
    match check_compliance(config, &CancellationToken::new(), &mut stdout) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(failure) => {
            tracing::error!("{}", failure);
            Ok(ExitCode::FAILURE)
        }
    }
}
