//! Search limits and `go` command rendering
//!
//! Level 4 - Configuration

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How an engine's thinking time is budgeted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Clock {
    /// No clock; the search is bounded by depth or nodes only
    Infinite,
    /// Base time per period plus an increment after every move
    Increment {
        base_ms: u64,
        increment_ms: u64,
        /// Moves per period; the base time is added again when a period ends
        moves_to_go: Option<u32>,
    },
    /// A fixed budget for every move
    FixedPerMove { move_ms: u64 },
}

impl Default for Clock {
    fn default() -> Self {
        Clock::Infinite
    }
}

impl Clock {
    pub fn is_clocked(&self) -> bool {
        !matches!(self, Clock::Infinite)
    }
}

/// Parse seconds such as `60`, `0.6` or `1.25` into whole milliseconds
fn parse_seconds(text: &str, whole: &str) -> Result<u64, ConfigError> {
    let secs: f64 = text
        .trim()
        .parse()
        .map_err(|_| ConfigError::TimeControl(whole.to_string()))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigError::TimeControl(whole.to_string()));
    }
    Ok((secs * 1000.0).round() as u64)
}

impl FromStr for Clock {
    type Err = ConfigError;

    /// Accepts `inf`, `moves/seconds+inc`, `seconds+inc` and `seconds`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.eq_ignore_ascii_case("inf") || text.eq_ignore_ascii_case("infinite") {
            return Ok(Clock::Infinite);
        }

        let (moves_to_go, rest) = match text.split_once('/') {
            Some((moves, rest)) => {
                let moves: u32 = moves
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::TimeControl(s.to_string()))?;
                (if moves == 0 { None } else { Some(moves) }, rest)
            }
            None => (None, text),
        };

        let (base, increment) = match rest.split_once('+') {
            Some((base, inc)) => (parse_seconds(base, s)?, parse_seconds(inc, s)?),
            None => (parse_seconds(rest, s)?, 0),
        };

        if base == 0 {
            return Err(ConfigError::TimeControl(s.to_string()));
        }

        Ok(Clock::Increment {
            base_ms: base,
            increment_ms: increment,
            moves_to_go,
        })
    }
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = |ms: u64| ms as f64 / 1000.0;
        match self {
            Clock::Infinite => write!(f, "inf"),
            Clock::Increment {
                base_ms,
                increment_ms,
                moves_to_go,
            } => {
                if let Some(moves) = moves_to_go {
                    write!(f, "{}/", moves)?;
                }
                write!(f, "{}", secs(*base_ms))?;
                if *increment_ms > 0 {
                    write!(f, "+{}", secs(*increment_ms))?;
                }
                Ok(())
            }
            Clock::FixedPerMove { move_ms } => write!(f, "st={}", secs(*move_ms)),
        }
    }
}

/// Search limits applied to every `go` an engine receives
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineLimits {
    pub clock: Clock,
    pub depth: Option<u32>,
    pub nodes: Option<u64>,
    /// Grace added to every deadline before a time forfeit is declared
    pub margin_ms: u64,
}

impl EngineLimits {
    /// Limits with the given clock and no other bound
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            clock,
            ..Default::default()
        }
    }

    /// Limit search depth
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Limit searched nodes
    pub fn with_nodes(mut self, nodes: u64) -> Self {
        self.nodes = Some(nodes);
        self
    }

    /// Set time margin
    pub fn with_margin(mut self, margin_ms: u64) -> Self {
        self.margin_ms = margin_ms;
        self
    }

    /// A search under these limits is guaranteed to end on its own
    pub fn is_bounded(&self) -> bool {
        self.clock.is_clocked() || self.depth.is_some() || self.nodes.is_some()
    }
}

/// Time part of a `go` command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GoPayload {
    Clock {
        wtime: u64,
        btime: u64,
        winc: Option<u64>,
        binc: Option<u64>,
        movestogo: Option<u32>,
    },
    MoveTime(u64),
    Infinite,
}

/// A complete `go` command
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GoCommand {
    pub payload: GoPayload,
    pub depth: Option<u32>,
    pub nodes: Option<u64>,
}

impl GoCommand {
    pub fn new(payload: GoPayload) -> Self {
        Self {
            payload,
            depth: None,
            nodes: None,
        }
    }

    pub fn with_depth(mut self, depth: Option<u32>) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_nodes(mut self, nodes: Option<u64>) -> Self {
        self.nodes = nodes;
        self
    }
}

impl fmt::Display for GoCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "go")?;
        match &self.payload {
            GoPayload::Clock {
                wtime,
                btime,
                winc,
                binc,
                movestogo,
            } => {
                write!(f, " wtime {} btime {}", wtime, btime)?;
                if let Some(inc) = winc {
                    write!(f, " winc {}", inc)?;
                }
                if let Some(inc) = binc {
                    write!(f, " binc {}", inc)?;
                }
                if let Some(moves) = movestogo {
                    write!(f, " movestogo {}", moves)?;
                }
            }
            GoPayload::MoveTime(ms) => write!(f, " movetime {}", ms)?,
            GoPayload::Infinite => {
                if self.depth.is_none() && self.nodes.is_none() {
                    return write!(f, " infinite");
                }
            }
        }
        if let Some(depth) = self.depth {
            write!(f, " depth {}", depth)?;
        }
        if let Some(nodes) = self.nodes {
            write!(f, " nodes {}", nodes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clock_forms() {
        assert_eq!("inf".parse::<Clock>().unwrap(), Clock::Infinite);
        assert_eq!(
            "40/60+0.6".parse::<Clock>().unwrap(),
            Clock::Increment {
                base_ms: 60_000,
                increment_ms: 600,
                moves_to_go: Some(40)
            }
        );
        assert_eq!(
            "10+0.1".parse::<Clock>().unwrap(),
            Clock::Increment {
                base_ms: 10_000,
                increment_ms: 100,
                moves_to_go: None
            }
        );
        assert_eq!(
            "5".parse::<Clock>().unwrap(),
            Clock::Increment {
                base_ms: 5_000,
                increment_ms: 0,
                moves_to_go: None
            }
        );
    }

    #[test]
    fn test_parse_clock_rejects_garbage() {
        assert!("".parse::<Clock>().is_err());
        assert!("abc".parse::<Clock>().is_err());
        assert!("x/10".parse::<Clock>().is_err());
        assert!("0+1".parse::<Clock>().is_err());
        assert!("-5+1".parse::<Clock>().is_err());
    }

    #[test]
    fn test_clock_display() {
        let clock: Clock = "40/60+0.6".parse().unwrap();
        assert_eq!(clock.to_string(), "40/60+0.6");
        assert_eq!(Clock::FixedPerMove { move_ms: 1500 }.to_string(), "st=1.5");
    }

    #[test]
    fn test_bounded() {
        assert!(!EngineLimits::default().is_bounded());
        assert!(EngineLimits::default().with_depth(3).is_bounded());
        assert!(EngineLimits::default().with_nodes(1000).is_bounded());
        assert!(EngineLimits::with_clock(Clock::FixedPerMove { move_ms: 10 }).is_bounded());
    }

    #[test]
    fn test_render_clock_go() {
        let go = GoCommand::new(GoPayload::Clock {
            wtime: 1000,
            btime: 900,
            winc: Some(10),
            binc: Some(10),
            movestogo: Some(5),
        });
        assert_eq!(
            go.to_string(),
            "go wtime 1000 btime 900 winc 10 binc 10 movestogo 5"
        );
    }

    #[test]
    fn test_render_infinite_go() {
        assert_eq!(GoCommand::new(GoPayload::Infinite).to_string(), "go infinite");
        let bounded = GoCommand::new(GoPayload::Infinite).with_depth(Some(4));
        assert_eq!(bounded.to_string(), "go depth 4");
        let movetime = GoCommand::new(GoPayload::MoveTime(250)).with_nodes(Some(100));
        assert_eq!(movetime.to_string(), "go movetime 250 nodes 100");
    }
}
