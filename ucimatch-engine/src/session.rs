//! UCI engine session
//!
//! Level 2 - Protocol client
//!
//! An [`EngineSession`] drives one engine process through the UCI line
//! protocol. Every protocol call takes `&mut self`, so a session never has
//! more than one request in flight.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::config::EngineConfiguration;
use crate::error::EngineError;
use crate::info::{is_info_line, parse_bestmove};
use crate::limits::GoCommand;
use crate::opening::Opening;
use crate::process::{EngineProcess, LineEvent};

/// How long an engine gets to honour `quit` before it is killed
pub const STOP_GRACE: Duration = Duration::from_millis(300);

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Started,
    Ready,
    Searching,
    Stopped,
}

/// Outcome of waiting for an engine response
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessStatus {
    Ok,
    Timeout,
    Crashed,
    Interrupted,
}

/// One engine process bound to one configuration
pub struct EngineSession {
    id: u64,
    config: Arc<EngineConfiguration>,
    cancel: CancellationToken,
    process: Option<EngineProcess>,
    state: SessionState,
    /// Name reported by `id name`
    engine_id: Option<String>,
    last_info: String,
    last_response: String,
}

impl EngineSession {
    /// Create a session; no process is launched until [`start`](Self::start)
    pub fn new(config: Arc<EngineConfiguration>, cancel: CancellationToken) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            config,
            cancel,
            process: None,
            state: SessionState::NotStarted,
            engine_id: None,
            last_info: String::new(),
            last_response: String::new(),
        }
    }

    /// Launch the process, complete the handshake and apply options
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.process.is_some() {
            return Ok(());
        }

        let process = EngineProcess::spawn(&self.config).map_err(|e| EngineError::Start {
            engine: self.config.name.clone(),
            reason: e.to_string(),
        })?;
        debug!(engine = %self.config.name, pid = process.pid(), session = self.id, "engine spawned");
        self.process = Some(process);
        self.state = SessionState::Started;

        if let Err(e) = self.handshake() {
            self.kill();
            return Err(e);
        }
        Ok(())
    }

    fn handshake(&mut self) -> Result<(), EngineError> {
        let startup = Duration::from_millis(self.config.timeouts.startup_ms);
        self.write_engine("uci").map_err(|e| EngineError::Start {
            engine: self.config.name.clone(),
            reason: e.to_string(),
        })?;
        let status = self.read_engine("uciok", startup);
        self.require(status, "uciok", startup)?;

        let options: Vec<String> = self
            .config
            .options
            .iter()
            .map(|o| format!("setoption name {} value {}", o.name, o.value))
            .collect();
        for line in options {
            self.write_engine(&line)?;
        }
        Ok(())
    }

    /// `isready` with the configured ping timeout
    pub fn is_ready(&mut self) -> ProcessStatus {
        let ping = Duration::from_millis(self.config.timeouts.ping_ms);
        self.is_ready_within(ping)
    }

    /// `isready`, waiting at most `timeout` for `readyok`
    pub fn is_ready_within(&mut self, timeout: Duration) -> ProcessStatus {
        if self.write_engine("isready").is_err() {
            return ProcessStatus::Crashed;
        }
        let status = self.read_engine("readyok", timeout);
        if status == ProcessStatus::Ok && self.state != SessionState::Searching {
            self.state = SessionState::Ready;
        }
        status
    }

    /// `ucinewgame` followed by a readiness check
    pub fn new_game(&mut self) -> Result<(), EngineError> {
        self.write_engine("ucinewgame")?;
        let status = self.is_ready();
        let ping = Duration::from_millis(self.config.timeouts.ping_ms);
        self.require(status, "readyok", ping)
    }

    /// Write one command line
    pub fn write_engine(&mut self, line: &str) -> Result<(), EngineError> {
        let engine = &self.config.name;
        let process = self.process.as_mut().ok_or_else(|| EngineError::Write {
            engine: engine.clone(),
            source: io::Error::new(io::ErrorKind::NotConnected, "engine is not running"),
        })?;
        process.write_line(line).map_err(|source| EngineError::Write {
            engine: engine.clone(),
            source,
        })
    }

    /// Read lines until one starts with the word `token`
    ///
    /// Info lines are captured along the way and never match, `info string`
    /// lines included.
    pub fn read_engine(&mut self, token: &str, timeout: Duration) -> ProcessStatus {
        let deadline = Instant::now() + timeout;
        let Some(process) = self.process.as_ref() else {
            return ProcessStatus::Crashed;
        };
        loop {
            let line = match process.recv_line(deadline, &self.cancel) {
                LineEvent::Line(line) => line,
                LineEvent::Closed => return ProcessStatus::Crashed,
                LineEvent::Timeout => return ProcessStatus::Timeout,
                LineEvent::Interrupted => return ProcessStatus::Interrupted,
            };

            let first = line.split_whitespace().next();
            if first == Some("info") {
                if is_info_line(&line) {
                    self.last_info = line;
                }
                continue;
            }
            if let Some(name) = line.strip_prefix("id name ") {
                self.engine_id = Some(name.trim().to_string());
            }
            if first == Some(token) {
                self.last_response = line;
                if self.state == SessionState::Searching && token == "bestmove" {
                    self.state = SessionState::Ready;
                }
                return ProcessStatus::Ok;
            }
        }
    }

    /// Convert a non-Ok status into the matching error
    pub fn require(
        &self,
        status: ProcessStatus,
        expected: &str,
        waited: Duration,
    ) -> Result<(), EngineError> {
        let engine = self.config.name.clone();
        match status {
            ProcessStatus::Ok => Ok(()),
            ProcessStatus::Timeout => Err(EngineError::ProtocolTimeout {
                engine,
                expected: expected.to_string(),
                waited_ms: waited.as_millis() as u64,
            }),
            ProcessStatus::Crashed => Err(EngineError::Crash {
                engine,
                expected: expected.to_string(),
            }),
            ProcessStatus::Interrupted => Err(EngineError::Interrupted { engine }),
        }
    }

    /// Most recent info line since the last `go`, empty if none
    pub fn last_info_line(&self) -> &str {
        &self.last_info
    }

    /// Line that completed the last successful read
    pub fn last_response(&self) -> &str {
        &self.last_response
    }

    /// Send `position startpos|fen ... [moves ...]`
    pub fn position(&mut self, opening: &Opening, moves: &[String]) -> Result<(), EngineError> {
        let line = opening.position_command(moves);
        self.write_engine(&line)
    }

    /// Start a search; follow with `read_engine("bestmove", ...)`
    pub fn go(&mut self, command: &GoCommand) -> Result<(), EngineError> {
        self.last_info.clear();
        self.write_engine(&command.to_string())?;
        self.state = SessionState::Searching;
        Ok(())
    }

    /// Move from the last `bestmove` response
    pub fn best_move(&self) -> Option<&str> {
        parse_bestmove(&self.last_response)
    }

    /// Send `quit`, kill after the grace period, reap. Idempotent.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        self.state = SessionState::Stopped;
        match self.process.take() {
            Some(mut process) => process.terminate(STOP_GRACE).map_err(|source| EngineError::Stop {
                engine: self.config.name.clone(),
                source,
            }),
            None => Ok(()),
        }
    }

    /// Kill the process without any further protocol traffic
    pub fn kill(&mut self) {
        self.state = SessionState::Stopped;
        if let Some(mut process) = self.process.take() {
            if let Err(e) = process.kill() {
                warn!(engine = %self.config.name, error = %e, "failed to kill engine");
            }
        }
    }

    /// Non-blocking liveness check
    pub fn is_alive(&mut self) -> bool {
        self.process.as_mut().map_or(false, |p| !p.has_exited())
    }

    /// Unique id for this session's lifetime
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(EngineProcess::pid)
    }

    pub fn config(&self) -> &Arc<EngineConfiguration> {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Name the engine reported during the handshake
    pub fn engine_id(&self) -> Option<&str> {
        self.engine_id.as_deref()
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "engine did not stop cleanly");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::limits::{GoCommand, GoPayload};

    const FAKE_ENGINE: &str = r#"
while read -r cmd rest; do
  case "$cmd" in
    uci) echo "id name Fake 1.0"; echo "option name Hash type spin default 1 min 1 max 16"; echo "uciok" ;;
    isready) echo "readyok" ;;
    go) echo "info string thinking"; echo "info depth 1 score cp 12 nodes 20 pv e2e4"; echo "bestmove e2e4 ponder e7e5" ;;
    quit) exit 0 ;;
  esac
done
"#;

    fn session(script: &str) -> EngineSession {
        let config = EngineConfiguration::new("/bin/sh")
            .with_name("fake")
            .with_arg("-c")
            .with_arg(script)
            .with_option("Hash", "8");
        EngineSession::new(Arc::new(config), CancellationToken::new())
    }

    #[test]
    fn test_full_exchange() {
        let mut s = session(FAKE_ENGINE);
        assert_eq!(s.state(), SessionState::NotStarted);
        s.start().unwrap();
        assert_eq!(s.state(), SessionState::Started);
        assert_eq!(s.engine_id(), Some("Fake 1.0"));
        assert!(s.is_alive());

        s.new_game().unwrap();
        assert_eq!(s.state(), SessionState::Ready);
        s.position(&Opening::startpos(), &[]).unwrap();

        let go = GoCommand::new(GoPayload::MoveTime(50));
        s.go(&go).unwrap();
        assert_eq!(s.state(), SessionState::Searching);
        assert_eq!(s.last_info_line(), "");
        let status = s.read_engine("bestmove", Duration::from_secs(5));
        assert_eq!(status, ProcessStatus::Ok);
        assert_eq!(s.state(), SessionState::Ready);
        assert_eq!(s.best_move(), Some("e2e4"));
        assert_eq!(s.last_info_line(), "info depth 1 score cp 12 nodes 20 pv e2e4");

        // a reused session can start another game
        s.new_game().unwrap();

        s.stop().unwrap();
        assert_eq!(s.state(), SessionState::Stopped);
        assert!(!s.is_alive());
        s.stop().unwrap();
    }

    #[test]
    fn test_silent_engine_times_out() {
        let mut s = session("sleep 10");
        s.config = Arc::new(
            (*s.config)
                .clone()
                .with_timeouts(crate::config::ProtocolTimeouts {
                    startup_ms: 150,
                    ping_ms: 150,
                }),
        );
        let err = s.start().unwrap_err();
        assert!(matches!(err, EngineError::ProtocolTimeout { .. }), "{err}");
        assert_eq!(s.state(), SessionState::Stopped);
    }

    #[test]
    fn test_exiting_engine_is_crash() {
        let mut s = session("read -r line; exit 3");
        let err = s.start().unwrap_err();
        assert!(matches!(err, EngineError::Crash { .. }), "{err}");
        assert!(err.is_crash());
    }

    #[test]
    fn test_missing_binary_is_start_error() {
        let config = EngineConfiguration::new("/no/such/engine");
        let mut s = EngineSession::new(Arc::new(config), CancellationToken::new());
        assert!(matches!(s.start(), Err(EngineError::Start { .. })));
        assert!(matches!(s.write_engine("uci"), Err(EngineError::Write { .. })));
        assert_eq!(s.read_engine("uciok", Duration::from_millis(10)), ProcessStatus::Crashed);
    }

    #[test]
    fn test_cancellation_interrupts_read() {
        let cancel = CancellationToken::new();
        let config = EngineConfiguration::new("/bin/sh")
            .with_arg("-c")
            .with_arg(FAKE_ENGINE);
        let mut s = EngineSession::new(Arc::new(config), cancel.clone());
        s.start().unwrap();
        cancel.cancel();
        assert_eq!(
            s.read_engine("bestmove", Duration::from_secs(10)),
            ProcessStatus::Interrupted
        );
    }

    #[test]
    fn test_info_string_mentioning_token_does_not_match() {
        let chatty = r#"
while read -r cmd rest; do
  case "$cmd" in
    uci) echo "uciok" ;;
    isready) echo "info string readyok soon"; echo "readyok" ;;
    go) echo "info depth 3 score cp 5 pv d2d4"; echo "info string bestmove candidate is e2e4"; echo "bestmove d2d4" ;;
    quit) exit 0 ;;
  esac
done
"#;
        let mut s = session(chatty);
        s.start().unwrap();
        assert_eq!(s.is_ready(), ProcessStatus::Ok);
        assert_eq!(s.last_response(), "readyok");

        s.position(&Opening::startpos(), &[]).unwrap();
        s.go(&GoCommand::new(GoPayload::MoveTime(50))).unwrap();
        assert_eq!(s.read_engine("bestmove", Duration::from_secs(5)), ProcessStatus::Ok);
        assert_eq!(s.best_move(), Some("d2d4"));
        assert_eq!(s.last_info_line(), "info depth 3 score cp 5 pv d2d4");
    }

    #[test]
    fn test_sessions_have_distinct_ids() {
        let a = session(FAKE_ENGINE);
        let b = session(FAKE_ENGINE);
        assert_ne!(a.id(), b.id());
    }
}
