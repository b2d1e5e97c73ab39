//! Per-game clocks
//!
//! Level 3 - Step-level implementation

use std::time::Duration;

use thiserror::Error;
use ucimatch_engine::{Clock, EngineLimits, GoCommand, GoPayload, Side};

/// An engine used more time than it had
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("{side} lost on time, {overrun_ms} ms over")]
pub struct TimeForfeit {
    pub side: Side,
    pub overrun_ms: u64,
}

/// Tracks both sides' clocks for one game
#[derive(Clone, Debug)]
pub struct TimeoutTracker {
    limits: [EngineLimits; 2],
    remaining: [u64; 2],
    moves_in_period: [u32; 2],
    unclocked_wait: Duration,
}

impl TimeoutTracker {
    pub fn new(white: &EngineLimits, black: &EngineLimits) -> Self {
        let base = |limits: &EngineLimits| match limits.clock {
            Clock::Increment { base_ms, .. } => base_ms,
            _ => 0,
        };
        Self {
            remaining: [base(white), base(black)],
            limits: [white.clone(), black.clone()],
            moves_in_period: [0; 2],
            unclocked_wait: Duration::from_secs(60),
        }
    }

    /// Cap on the wait for `bestmove` from an engine without a clock
    pub fn with_unclocked_wait(mut self, wait: Duration) -> Self {
        self.unclocked_wait = wait;
        self
    }

    /// Time left on `side`'s clock, None without an increment clock
    pub fn remaining(&self, side: Side) -> Option<u64> {
        match self.limits[side.index()].clock {
            Clock::Increment { .. } => Some(self.remaining[side.index()]),
            _ => None,
        }
    }

    pub fn is_clocked(&self, side: Side) -> bool {
        self.limits[side.index()].clock.is_clocked()
    }

    /// The `go` command for `side` to move
    pub fn go_command(&self, side: Side) -> GoCommand {
        let limits = &self.limits[side.index()];
        let payload = match limits.clock {
            Clock::Increment { moves_to_go, .. } => {
                let own = self.remaining[side.index()];
                let time = |s: Side| self.remaining(s).unwrap_or(own);
                let inc = |s: Side| match self.limits[s.index()].clock {
                    Clock::Increment { increment_ms, .. } if increment_ms > 0 => Some(increment_ms),
                    _ => None,
                };
                GoPayload::Clock {
                    wtime: time(Side::White),
                    btime: time(Side::Black),
                    winc: inc(Side::White),
                    binc: inc(Side::Black),
                    movestogo: moves_to_go.map(|m| m - self.moves_in_period[side.index()]),
                }
            }
            Clock::FixedPerMove { move_ms } => GoPayload::MoveTime(move_ms),
            Clock::Infinite => GoPayload::Infinite,
        };
        GoCommand::new(payload)
            .with_depth(limits.depth)
            .with_nodes(limits.nodes)
    }

    /// How long to wait for `side`'s `bestmove`
    pub fn deadline(&self, side: Side) -> Duration {
        let limits = &self.limits[side.index()];
        match limits.clock {
            Clock::Increment { .. } => {
                Duration::from_millis(self.remaining[side.index()] + limits.margin_ms)
            }
            Clock::FixedPerMove { move_ms } => Duration::from_millis(move_ms + limits.margin_ms),
            Clock::Infinite => self.unclocked_wait,
        }
    }

    /// Charge `elapsed` to `side`'s clock
    pub fn record(&mut self, side: Side, elapsed: Duration) -> Result<(), TimeForfeit> {
        let i = side.index();
        let elapsed_ms = elapsed.as_millis() as u64;
        let margin = self.limits[i].margin_ms;
        match self.limits[i].clock {
            Clock::Increment {
                base_ms,
                increment_ms,
                moves_to_go,
            } => {
                let allowed = self.remaining[i] + margin;
                if elapsed_ms >= allowed {
                    return Err(TimeForfeit {
                        side,
                        overrun_ms: elapsed_ms - self.remaining[i],
                    });
                }
                self.remaining[i] = self.remaining[i].saturating_sub(elapsed_ms) + increment_ms;
                if let Some(period) = moves_to_go {
                    self.moves_in_period[i] += 1;
                    if self.moves_in_period[i] >= period {
                        self.moves_in_period[i] = 0;
                        self.remaining[i] += base_ms;
                    }
                }
                Ok(())
            }
            Clock::FixedPerMove { move_ms } => {
                if elapsed_ms > move_ms + margin {
                    return Err(TimeForfeit {
                        side,
                        overrun_ms: elapsed_ms - move_ms,
                    });
                }
                Ok(())
            }
            Clock::Infinite => Ok(()),
        }
    }
}
