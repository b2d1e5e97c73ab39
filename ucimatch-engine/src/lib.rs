//! ucimatch Engine - UCI engine processes and protocol
//!
//! This crate provides everything needed to talk to one engine:
//! - Engine configuration and search limits
//! - Subprocess plumbing with deadline-bounded, cancellable reads
//! - The UCI session state machine
//! - A protocol compliance checker
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: check_compliance (orchestration)
//! - Level 2: EngineSession (protocol client)
//! - Level 3: info/bestmove parsing, go rendering (steps)
//! - Level 4: configuration, process I/O, errors

pub mod cancel;
pub mod compliance;
pub mod config;
pub mod error;
pub mod info;
pub mod limits;
pub mod opening;
pub mod process;
pub mod session;

pub use cancel::{CancellationToken, POLL_SLICE};
pub use compliance::{check_compliance, compliant, ComplianceFailure, COMPLIANCE_FEN, COMPLIANCE_GO};
pub use config::{EngineConfiguration, EngineOption, ProtocolTimeouts};
pub use error::{ConfigError, EngineError};
pub use info::{is_coordinate_move, is_info_line, parse_bestmove, parse_score, Score};
pub use limits::{Clock, EngineLimits, GoCommand, GoPayload};
pub use opening::{Opening, Side};
pub use session::{EngineSession, ProcessStatus, SessionState, STOP_GRACE};
