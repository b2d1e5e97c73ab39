//! Engine subprocess plumbing
//!
//! Level 4 - Utilities
//!
//! Standard output is drained by a reader thread and forwarded line by line
//! over a channel, so every read can be bounded by a deadline and polled for
//! cancellation. Standard error is drained by a second thread and logged.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::debug;

use crate::cancel::{CancellationToken, POLL_SLICE};
use crate::config::EngineConfiguration;

/// Result of waiting for one line of engine output
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineEvent {
    Line(String),
    /// Output closed, the process is gone
    Closed,
    Timeout,
    Interrupted,
}

/// A running engine process with line-oriented I/O
pub struct EngineProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<String>,
    name: String,
}

impl EngineProcess {
    /// Launch the configured command with piped standard streams
    pub fn spawn(config: &EngineConfiguration) -> io::Result<Self> {
        let mut command = Command::new(&config.cmd);
        command
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &config.dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn()?;
        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stdout not captured"))?;
        let stderr = child.stderr.take();

        let (tx, rx) = crossbeam_channel::unbounded();
        let name = config.name.clone();

        let spawned = thread::Builder::new()
            .name(format!("{}-stdout", name))
            .spawn(move || {
                let reader = BufReader::new(stdout);
                for line in reader.lines() {
                    let Ok(line) = line else { break };
                    let line = line.trim_end_matches('\r').to_string();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
        if let Err(e) = spawned {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }

        if let Some(stderr) = stderr {
            let engine = name.clone();
            // Logging stderr is best effort; the process works without it.
            let _ = thread::Builder::new()
                .name(format!("{}-stderr", name))
                .spawn(move || log_stderr(engine, stderr));
        }

        Ok(Self {
            child,
            stdin,
            lines: rx,
            name,
        })
    }

    /// OS process id
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Write one line and flush it
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "engine input closed"))?;
        debug!(engine = %self.name, "> {}", line);
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        stdin.write_all(buf.as_bytes())?;
        stdin.flush()
    }

    /// Wait for the next output line until `deadline`, in cancellable slices
    pub fn recv_line(&self, deadline: Instant, cancel: &CancellationToken) -> LineEvent {
        loop {
            if cancel.is_cancelled() {
                return LineEvent::Interrupted;
            }
            let now = Instant::now();
            if now >= deadline {
                return LineEvent::Timeout;
            }
            let wait = (deadline - now).min(POLL_SLICE);
            match self.lines.recv_timeout(wait) {
                Ok(line) => {
                    debug!(engine = %self.name, "< {}", line);
                    return LineEvent::Line(line);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return LineEvent::Closed,
            }
        }
    }

    /// Non-blocking exit check
    pub fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    /// Ask the engine to quit, kill it after `grace`, and reap it
    pub fn terminate(&mut self, grace: Duration) -> io::Result<()> {
        if !self.has_exited() {
            // The engine may already have closed its input.
            let _ = self.write_line("quit");
        }
        self.stdin = None;

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if self.child.try_wait()?.is_some() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(10));
        }

        debug!(engine = %self.name, pid = self.pid(), "engine ignored quit, killing");
        self.kill()
    }

    /// Kill the process without any protocol exchange and reap it
    pub fn kill(&mut self) -> io::Result<()> {
        self.stdin = None;
        match self.child.kill() {
            Ok(()) => {}
            // Already exited between the last poll and the kill.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
            Err(e) => return Err(e),
        }
        self.child.wait().map(|_| ())
    }
}

fn log_stderr(engine: String, stderr: impl Read) {
    let reader = BufReader::new(stderr);
    for line in reader.lines() {
        match line {
            Ok(line) => debug!(engine = %engine, "stderr: {}", line),
            Err(_) => break,
        }
    }
}
