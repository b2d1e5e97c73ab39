//! Game results and records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ucimatch_engine::{Opening, Score, Side};

/// How a game ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    WhiteWin,
    BlackWin,
    Draw,
    /// An engine died, failed to start or broke its pipe
    Crash,
    /// An engine overran its clock or a protocol timeout
    Timeout,
    /// An engine sent something unacceptable
    IllegalResponse,
}

impl Outcome {
    /// True for the three failure tags, which always carry a culprit
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Outcome::Crash | Outcome::Timeout | Outcome::IllegalResponse
        )
    }
}

/// Final result of one game
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub outcome: Outcome,
    pub reason: String,
    pub white: String,
    pub black: String,
    /// The pairing's first engine played white
    pub first_is_white: bool,
    /// Side responsible for a failure outcome
    pub culprit: Option<Side>,
}

impl GameResult {
    /// Name of the pairing's first engine
    pub fn first(&self) -> &str {
        if self.first_is_white {
            &self.white
        } else {
            &self.black
        }
    }

    /// Name of the pairing's second engine
    pub fn second(&self) -> &str {
        if self.first_is_white {
            &self.black
        } else {
            &self.white
        }
    }

    /// Side the first engine played
    pub fn first_side(&self) -> Side {
        if self.first_is_white {
            Side::White
        } else {
            Side::Black
        }
    }

    /// PGN-style result tag
    pub fn result_tag(&self) -> &'static str {
        match (self.outcome, self.culprit) {
            (Outcome::WhiteWin, _) | (_, Some(Side::Black)) => "1-0",
            (Outcome::BlackWin, _) | (_, Some(Side::White)) => "0-1",
            (Outcome::Draw, _) => "1/2-1/2",
            _ => "*",
        }
    }
}

/// One move as the engine reported it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayedMove {
    pub side: Side,
    pub mv: String,
    pub elapsed_ms: u64,
    pub score: Option<Score>,
}

/// Everything known about a finished game
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameRecord {
    pub round_id: usize,
    pub game_id: usize,
    pub opening: Opening,
    pub result: GameResult,
    pub moves: Vec<PlayedMove>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(outcome: Outcome, culprit: Option<Side>) -> GameResult {
        GameResult {
            outcome,
            reason: String::new(),
            white: "w".into(),
            black: "b".into(),
            first_is_white: false,
            culprit,
        }
    }

    #[test]
    fn test_first_and_second() {
        let r = result(Outcome::Draw, None);
        assert_eq!(r.first(), "b");
        assert_eq!(r.second(), "w");
        assert_eq!(r.first_side(), Side::Black);
    }

    #[test]
    fn test_result_tag() {
        assert_eq!(result(Outcome::WhiteWin, None).result_tag(), "1-0");
        assert_eq!(result(Outcome::Draw, None).result_tag(), "1/2-1/2");
        assert_eq!(result(Outcome::Timeout, Some(Side::White)).result_tag(), "0-1");
        assert_eq!(result(Outcome::Crash, Some(Side::Black)).result_tag(), "1-0");
        assert!(Outcome::IllegalResponse.is_failure());
        assert!(!Outcome::Draw.is_failure());
    }
}
