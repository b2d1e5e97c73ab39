//! Game runner - executes single games
//!
//! Level 3 - Step-level implementation

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;
use ucimatch_engine::{
    parse_score, EngineError, EngineSession, Opening, ProcessStatus, Score, Side,
};

use crate::adjudication::Adjudicator;
use crate::config::GameSettings;
use crate::result::{Outcome, PlayedMove};
use crate::rules::{GameRules, MoveVerdict};
use crate::timeout::{TimeForfeit, TimeoutTracker};

/// Why a game stopped before reaching a regular result
#[derive(Debug, Error)]
pub enum GameError {
    #[error("{side}: {source}")]
    Engine {
        side: Side,
        #[source]
        source: EngineError,
    },

    #[error(transparent)]
    TimeForfeit(#[from] TimeForfeit),

    #[error("{side} sent an illegal response: {detail}")]
    IllegalResponse { side: Side, detail: String },

    #[error("game interrupted")]
    Interrupted,
}

impl GameError {
    fn engine(side: Side, source: EngineError) -> Self {
        match source {
            EngineError::Interrupted { .. } => GameError::Interrupted,
            source => GameError::Engine { side, source },
        }
    }

    /// Side at fault, None when the game was interrupted
    pub fn culprit(&self) -> Option<Side> {
        match self {
            GameError::Engine { side, .. } | GameError::IllegalResponse { side, .. } => Some(*side),
            GameError::TimeForfeit(forfeit) => Some(forfeit.side),
            GameError::Interrupted => None,
        }
    }

    /// Result tag for the failure, None when the game is abandoned
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            GameError::Engine { source, .. } => Some(match source {
                EngineError::ProtocolTimeout { .. } => Outcome::Timeout,
                EngineError::ProtocolViolation { .. } => Outcome::IllegalResponse,
                _ => Outcome::Crash,
            }),
            GameError::TimeForfeit(_) => Some(Outcome::Timeout),
            GameError::IllegalResponse { .. } => Some(Outcome::IllegalResponse),
            GameError::Interrupted => None,
        }
    }
}

/// How a game ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameEnd {
    Finished {
        outcome: Outcome,
        reason: String,
        culprit: Option<Side>,
    },
    /// Abandoned because cancellation was requested
    Interrupted,
}

/// Everything the runner learned about one game
#[derive(Clone, Debug)]
pub struct PlayedGame {
    pub end: GameEnd,
    pub moves: Vec<PlayedMove>,
    /// Per side (white, black): the session can be reused
    pub healthy: [bool; 2],
}

/// Plays one game between two started sessions
pub struct GameRunner {
    settings: GameSettings,
    rules: Box<dyn GameRules>,
    adjudicator: Adjudicator,
    played: Vec<PlayedMove>,
}

impl GameRunner {
    /// Create a runner for one game
    pub fn new(settings: GameSettings, rules: Box<dyn GameRules>) -> Self {
        let adjudicator = Adjudicator::new(settings.adjudication);
        Self {
            settings,
            rules,
            adjudicator,
            played: Vec::new(),
        }
    }

    /// Play a game from `opening`, returning the outcome
    ///
    /// Sessions that crashed, timed out, misbehaved or were interrupted are
    /// killed without further protocol traffic and reported unhealthy.
    pub fn play(
        mut self,
        white: &mut EngineSession,
        black: &mut EngineSession,
        opening: &Opening,
    ) -> PlayedGame {
        let mut sessions = [white, black];
        let result = self.run(&mut sessions, opening);
        let mut healthy = [true, true];

        let end = match result {
            Ok((outcome, reason)) => GameEnd::Finished {
                outcome,
                reason,
                culprit: None,
            },
            Err(e) => match (e.outcome(), e.culprit()) {
                (Some(outcome), Some(side)) => {
                    debug!(side = %side, error = %e, "game ended by failure");
                    healthy[side.index()] = false;
                    sessions[side.index()].kill();
                    GameEnd::Finished {
                        outcome,
                        reason: e.to_string(),
                        culprit: Some(side),
                    }
                }
                _ => {
                    for session in sessions.iter_mut() {
                        session.kill();
                    }
                    healthy = [false, false];
                    GameEnd::Interrupted
                }
            },
        };

        PlayedGame {
            end,
            moves: self.played,
            healthy,
        }
    }

    fn run(
        &mut self,
        sessions: &mut [&mut EngineSession; 2],
        opening: &Opening,
    ) -> Result<(Outcome, String), GameError> {
        let white_limits = sessions[0].config().limits.clone();
        let black_limits = sessions[1].config().limits.clone();
        let mut tracker = TimeoutTracker::new(&white_limits, &black_limits)
            .with_unclocked_wait(Duration::from_millis(self.settings.unclocked_wait_ms));

        for side in [Side::White, Side::Black] {
            let session = &mut *sessions[side.index()];
            session.new_game().map_err(|e| GameError::engine(side, e))?;
        }
        for side in [Side::White, Side::Black] {
            let session = &mut *sessions[side.index()];
            session
                .position(opening, &[])
                .map_err(|e| GameError::engine(side, e))?;
            let status = session.is_ready();
            let ping = Duration::from_millis(session.config().timeouts.ping_ms);
            session
                .require(status, "readyok", ping)
                .map_err(|e| GameError::engine(side, e))?;
        }

        let mut moves: Vec<String> = Vec::new();
        let mut side = opening.side_to_move();
        loop {
            let session = &mut *sessions[side.index()];
            let (mv, score) = self.search(session, side, opening, &moves, &mut tracker)?;
            // book moves count towards the game length
            let plies = (opening.moves.len() + moves.len()) as u32 + 1;

            if let Some(end) = settle(side, self.rules.apply(side, &mv, score)) {
                return end;
            }
            moves.push(mv);

            if let Some(end) = settle(side, self.adjudicator.observe(side, score, plies)) {
                return end;
            }
            side = side.flip();
        }
    }

    /// One timed search by `side`; returns its move and reported score
    fn search(
        &mut self,
        session: &mut EngineSession,
        side: Side,
        opening: &Opening,
        moves: &[String],
        tracker: &mut TimeoutTracker,
    ) -> Result<(String, Option<Score>), GameError> {
        session
            .position(opening, moves)
            .map_err(|e| GameError::engine(side, e))?;
        let go = tracker.go_command(side);
        let deadline = tracker.deadline(side);

        let started = Instant::now();
        session.go(&go).map_err(|e| GameError::engine(side, e))?;
        let status = session.read_engine("bestmove", deadline);
        let elapsed = started.elapsed();

        if status == ProcessStatus::Timeout && tracker.is_clocked(side) {
            let forfeit = tracker.record(side, elapsed).err().unwrap_or(TimeForfeit {
                side,
                overrun_ms: 0,
            });
            return Err(forfeit.into());
        }
        session
            .require(status, "bestmove", deadline)
            .map_err(|e| GameError::engine(side, e))?;
        tracker.record(side, elapsed)?;

        let info = session.last_info_line();
        let score = if info.is_empty() {
            None
        } else {
            parse_score(info).map_err(|detail| GameError::IllegalResponse { side, detail })?
        };
        if score.is_none() && self.settings.require_score {
            return Err(GameError::IllegalResponse {
                side,
                detail: "search reported no score".to_string(),
            });
        }

        let mv = session
            .best_move()
            .ok_or_else(|| GameError::IllegalResponse {
                side,
                detail: format!("malformed bestmove line '{}'", session.last_response()),
            })?
            .to_string();

        self.played.push(PlayedMove {
            side,
            mv: mv.clone(),
            elapsed_ms: elapsed.as_millis() as u64,
            score,
        });
        Ok((mv, score))
    }
}

/// Result of `side`'s move, or `None` while the game goes on
fn settle(side: Side, verdict: MoveVerdict) -> Option<Result<(Outcome, String), GameError>> {
    let end = match verdict {
        MoveVerdict::Continue => return None,
        MoveVerdict::Decisive { winner, reason } => {
            let outcome = match winner {
                Side::White => Outcome::WhiteWin,
                Side::Black => Outcome::BlackWin,
            };
            Ok((outcome, reason))
        }
        MoveVerdict::Drawn { reason } => Ok((Outcome::Draw, reason)),
        MoveVerdict::Illegal { reason } => Err(GameError::IllegalResponse {
            side,
            detail: reason,
        }),
    };
    Some(end)
}
