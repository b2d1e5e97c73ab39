//! Protocol compliance checker
//!
//! Level 1 - Orchestration
//!
//! Runs a fixed script against one engine and stops at the first step that
//! fails.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::cancel::CancellationToken;
use crate::config::EngineConfiguration;
use crate::error::ConfigError;
use crate::session::{EngineSession, ProcessStatus};

/// Position used by the `position fen` step
pub const COMPLIANCE_FEN: &str =
    "3r2k1/p5n1/1pq1p2p/2p3p1/2P1P1n1/1P1P2pP/PN1Q2K1/5R2 w - - 0 27";

/// Searches the engine must answer, each with a scored info line
pub const COMPLIANCE_GO: [&str; 4] = [
    "go wtime 100",
    "go btime 100",
    "go wtime 100 winc 100 btime 100 binc 100",
    "go btime 100 binc 100 wtime 100 winc 100",
];

/// First failing step of a compliance run; step 0 means the engine never ran
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("step {step} failed: {message}")]
pub struct ComplianceFailure {
    pub step: usize,
    pub message: String,
}

struct Checker<'a, W: Write> {
    session: EngineSession,
    out: &'a mut W,
    step: usize,
    ping: Duration,
}

impl<W: Write> Checker<'_, W> {
    fn begin(&mut self, description: &str) {
        self.step += 1;
        // Report output is informational; an unwritable sink does not fail the check.
        let _ = writeln!(self.out, "Step {}: {}", self.step, description);
    }

    fn fail(&mut self, message: impl Into<String>) -> ComplianceFailure {
        let message = message.into();
        let _ = writeln!(self.out, "Failed: {}", message);
        ComplianceFailure {
            step: self.step,
            message,
        }
    }

    fn send(&mut self, line: &str) -> Result<(), ComplianceFailure> {
        self.session
            .write_engine(line)
            .map_err(|e| self.fail(e.to_string()))
    }

    fn expect_ready(&mut self) -> Result<(), ComplianceFailure> {
        match self.session.is_ready_within(self.ping) {
            ProcessStatus::Ok => Ok(()),
            status => Err(self.fail(format!("no readyok after isready ({:?})", status))),
        }
    }

    fn expect_scored_search(&mut self, go: &str) -> Result<(), ComplianceFailure> {
        self.send(go)?;
        match self.session.read_engine("bestmove", self.ping) {
            ProcessStatus::Ok => {}
            status => return Err(self.fail(format!("no bestmove after '{}' ({:?})", go, status))),
        }
        let info = self.session.last_info_line().to_string();
        if info.is_empty() {
            return Err(self.fail(format!("no info line before bestmove for '{}'", go)));
        }
        if !info.split_whitespace().any(|w| w == "score") {
            return Err(self.fail(format!("info line has no score: '{}'", info)));
        }
        Ok(())
    }

    fn run(&mut self) -> Result<(), ComplianceFailure> {
        self.begin("Start engine and check uci/uciok");
        self.session.start().map_err(|e| self.fail(e.to_string()))?;

        self.begin("Check isready/readyok");
        self.expect_ready()?;

        self.begin("Check ucinewgame and isready/readyok");
        self.send("ucinewgame")?;
        self.expect_ready()?;

        self.begin("Check position startpos");
        self.send("position startpos")?;
        self.expect_ready()?;

        self.begin("Check position fen");
        self.send(&format!("position fen {}", COMPLIANCE_FEN))?;
        self.expect_ready()?;

        for go in COMPLIANCE_GO {
            self.begin(&format!("Check {} and bestmove with a scored info line", go));
            self.expect_scored_search(go)?;
        }
        Ok(())
    }
}

/// Run the compliance script against `config`, reporting progress to `out`
pub fn check_compliance<W: Write>(
    config: EngineConfiguration,
    cancel: &CancellationToken,
    out: &mut W,
) -> Result<(), ComplianceFailure> {
    let _ = writeln!(out, "Testing engine: {}", config.cmd.display());
    if config.cmd.as_os_str().is_empty() {
        let message = ConfigError::EmptyCommand.to_string();
        let _ = writeln!(out, "Failed: {}", message);
        warn!("compliance check needs an engine path");
        return Err(ComplianceFailure { step: 0, message });
    }

    let ping = Duration::from_millis(config.timeouts.ping_ms);
    let name = config.name.clone();
    let mut checker = Checker {
        session: EngineSession::new(Arc::new(config), cancel.clone()),
        out,
        step: 0,
        ping,
    };
    let result = checker.run();

    if let Err(e) = checker.session.stop() {
        warn!(engine = %name, error = %e, "engine did not stop cleanly after compliance check");
    }
    match &result {
        Ok(()) => {
            let _ = writeln!(checker.out, "Engine passed all compliance checks.");
            info!(engine = %name, "compliance check passed");
        }
        Err(failure) => warn!(engine = %name, step = failure.step, "compliance check failed"),
    }
    result
}

/// True when the engine at `path` passes every compliance step
pub fn compliant(path: impl AsRef<Path>) -> bool {
    let config = EngineConfiguration::new(path.as_ref());
    check_compliance(config, &CancellationToken::new(), &mut io::stdout()).is_ok()
}
