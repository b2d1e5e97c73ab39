//! Engine configuration
//!
//! Level 4 - Configuration
//!
//! An [`EngineConfiguration`] is immutable once built and compares by value,
//! so the same engine declared twice maps to the same cached processes.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::limits::{Clock, EngineLimits};

/// One UCI option sent as `setoption` after the handshake
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineOption {
    pub name: String,
    pub value: String,
}

/// Timeouts for protocol exchanges outside of a search
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtocolTimeouts {
    /// Time allowed between `uci` and `uciok`
    pub startup_ms: u64,
    /// Time allowed between `isready` and `readyok`
    pub ping_ms: u64,
}

impl Default for ProtocolTimeouts {
    fn default() -> Self {
        Self {
            startup_ms: 10_000,
            ping_ms: 10_000,
        }
    }
}

/// Everything needed to launch and drive one engine
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineConfiguration {
    /// Display name, unique within a tournament
    pub name: String,
    /// Executable path
    pub cmd: PathBuf,
    /// Command line arguments
    pub args: Vec<String>,
    /// Working directory (None = inherit)
    pub dir: Option<PathBuf>,
    /// UCI options applied in declaration order
    pub options: Vec<EngineOption>,
    pub limits: EngineLimits,
    pub timeouts: ProtocolTimeouts,
}

impl EngineConfiguration {
    /// Configuration for `cmd`, named after the executable's file stem
    pub fn new(cmd: impl Into<PathBuf>) -> Self {
        let cmd = cmd.into();
        let name = cmd
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            cmd,
            args: Vec::new(),
            dir: None,
            options: Vec::new(),
            limits: EngineLimits::default(),
            timeouts: ProtocolTimeouts::default(),
        }
    }

    /// Set display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append a command line argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set working directory
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Declare a UCI option
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push(EngineOption {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Set search limits
    pub fn with_limits(mut self, limits: EngineLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set protocol timeouts
    pub fn with_timeouts(mut self, timeouts: ProtocolTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Check that the engine can be launched and that its searches terminate
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cmd.as_os_str().is_empty() {
            return Err(ConfigError::EmptyCommand);
        }
        if !command_exists(&self.cmd, self.dir.as_deref()) {
            return Err(ConfigError::MissingCommand {
                name: self.name.clone(),
                cmd: self.cmd.display().to_string(),
            });
        }
        if let Clock::FixedPerMove { move_ms: 0 } = self.limits.clock {
            return Err(ConfigError::TimeControl("st=0".to_string()));
        }
        if !self.limits.is_bounded() {
            return Err(ConfigError::Unbounded {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Apply one `key=value` setting
    pub fn apply_setting(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "cmd" => {
                let renamed = self.name.is_empty() || self.name == default_name(&self.cmd);
                self.cmd = PathBuf::from(value);
                if renamed {
                    self.name = default_name(&self.cmd);
                }
            }
            "name" => self.name = value.to_string(),
            "arg" => self.args.push(value.to_string()),
            "dir" => self.dir = Some(PathBuf::from(value)),
            "tc" => self.limits.clock = value.parse()?,
            "st" => {
                let secs: f64 = value.parse().map_err(|_| invalid())?;
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(invalid());
                }
                self.limits.clock = Clock::FixedPerMove {
                    move_ms: (secs * 1000.0).round() as u64,
                };
            }
            "depth" => self.limits.depth = Some(value.parse().map_err(|_| invalid())?),
            "nodes" => self.limits.nodes = Some(value.parse().map_err(|_| invalid())?),
            "timemargin" => self.limits.margin_ms = value.parse().map_err(|_| invalid())?,
            "startup" => self.timeouts.startup_ms = value.parse().map_err(|_| invalid())?,
            "ping" => self.timeouts.ping_ms = value.parse().map_err(|_| invalid())?,
            _ => match key.strip_prefix("option.") {
                Some(option) if !option.is_empty() => {
                    self.options.push(EngineOption {
                        name: option.to_string(),
                        value: value.to_string(),
                    });
                }
                _ => return Err(ConfigError::UnknownKey(key.to_string())),
            },
        }
        Ok(())
    }
}

fn default_name(cmd: &Path) -> String {
    cmd.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Resolve `cmd` the way process spawning will
fn command_exists(cmd: &Path, dir: Option<&Path>) -> bool {
    if cmd.components().count() > 1 || cmd.is_absolute() {
        return match dir {
            Some(dir) if cmd.is_relative() => dir.join(cmd).is_file() || cmd.is_file(),
            _ => cmd.is_file(),
        };
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|p| p.join(cmd).is_file()))
        .unwrap_or(false)
        || cmd.is_file()
}

impl FromStr for EngineConfiguration {
    type Err = ConfigError;

    /// Parse whitespace separated settings, e.g.
    /// `cmd=./stockfish name=sf tc=10+0.1 option.Hash=16`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut config = EngineConfiguration::new(PathBuf::new());
        for token in s.split_whitespace() {
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| ConfigError::Malformed(token.to_string()))?;
            config.apply_setting(key, value)?;
        }
        if config.cmd.as_os_str().is_empty() {
            return Err(ConfigError::EmptyCommand);
        }
        Ok(config)
    }
}
