//! Error types for engine processes and configuration
//!
//! Level 4 - Utilities

use std::io;

use thiserror::Error;

/// Failure talking to an engine process
#[derive(Debug, Error)]
pub enum EngineError {
    /// The process could not be spawned, or the handshake never completed
    #[error("failed to start engine '{engine}': {reason}")]
    Start { engine: String, reason: String },

    /// The engine did not answer within the allotted time
    #[error("engine '{engine}' did not send '{expected}' within {waited_ms} ms")]
    ProtocolTimeout {
        engine: String,
        expected: String,
        waited_ms: u64,
    },

    /// The engine answered with something malformed
    #[error("engine '{engine}' violated the protocol: {detail}")]
    ProtocolViolation { engine: String, detail: String },

    /// The process exited or closed its output
    #[error("engine '{engine}' crashed while waiting for '{expected}'")]
    Crash { engine: String, expected: String },

    /// Writing to the engine's input failed
    #[error("failed to write to engine '{engine}': {source}")]
    Write {
        engine: String,
        #[source]
        source: io::Error,
    },

    /// Terminating the process failed
    #[error("failed to stop engine '{engine}': {source}")]
    Stop {
        engine: String,
        #[source]
        source: io::Error,
    },

    /// The wait was abandoned because cancellation was requested
    #[error("interrupted while waiting for engine '{engine}'")]
    Interrupted { engine: String },
}

impl EngineError {
    /// True when the process itself is gone or unusable
    pub fn is_crash(&self) -> bool {
        matches!(
            self,
            EngineError::Start { .. } | EngineError::Crash { .. } | EngineError::Write { .. }
        )
    }
}

/// Invalid engine configuration or limit string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("engine command is empty")]
    EmptyCommand,

    #[error("engine '{name}': command '{cmd}' does not exist")]
    MissingCommand { name: String, cmd: String },

    #[error("engine '{name}' has no clock and no depth or nodes bound")]
    Unbounded { name: String },

    #[error("invalid time control '{0}'")]
    TimeControl(String),

    #[error("invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },

    #[error("unknown engine setting '{0}'")]
    UnknownKey(String),

    #[error("malformed engine setting '{0}', expected key=value")]
    Malformed(String),
}
