//! Rules collaborator deciding when a game is over
//!
//! The runner never checks move legality itself; it hands each move to a
//! [`GameRules`] implementation.

use std::sync::Arc;

use ucimatch_engine::{is_coordinate_move, Opening, Score, Side};

/// Effect of one move on the game
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveVerdict {
    Continue,
    Decisive { winner: Side, reason: String },
    Drawn { reason: String },
    /// The move is not acceptable; the mover loses
    Illegal { reason: String },
}

/// Per-game rules state
pub trait GameRules: Send {
    /// Apply `mv` played by `side`, which reported `score` for it
    fn apply(&mut self, side: Side, mv: &str, score: Option<Score>) -> MoveVerdict;
}

/// Builds fresh rules for each game
pub type RulesFactory = Arc<dyn Fn(&Opening) -> Box<dyn GameRules> + Send + Sync>;

/// Checks only the shape of moves
///
/// `(none)` and `0000` mean the mover has no legal move: a mate score
/// against the mover ends the game as checkmate, anything else as stalemate.
#[derive(Clone, Debug, Default)]
pub struct CoordinateMoveRules;

impl GameRules for CoordinateMoveRules {
    fn apply(&mut self, side: Side, mv: &str, score: Option<Score>) -> MoveVerdict {
        if mv == "(none)" || mv == "0000" {
            return match score {
                Some(Score::Mate(n)) if n <= 0 => MoveVerdict::Decisive {
                    winner: side.flip(),
                    reason: format!("{} is checkmated", side),
                },
                _ => MoveVerdict::Drawn {
                    reason: "stalemate".to_string(),
                },
            };
        }
        if !is_coordinate_move(mv) {
            return MoveVerdict::Illegal {
                reason: format!("'{}' is not a coordinate move", mv),
            };
        }
        MoveVerdict::Continue
    }
}

/// Factory for [`CoordinateMoveRules`]
pub fn coordinate_rules() -> RulesFactory {
    Arc::new(|_: &Opening| Box::new(CoordinateMoveRules) as Box<dyn GameRules>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_checks() {
        let mut rules = CoordinateMoveRules;
        assert_eq!(rules.apply(Side::White, "e2e4", None), MoveVerdict::Continue);
        assert!(matches!(
            rules.apply(Side::White, "Nf3", None),
            MoveVerdict::Illegal { .. }
        ));
    }

    #[test]
    fn test_no_move_endings() {
        let mut rules = CoordinateMoveRules;
        assert_eq!(
            rules.apply(Side::Black, "(none)", Some(Score::Mate(0))),
            MoveVerdict::Decisive {
                winner: Side::White,
                reason: "black is checkmated".to_string()
            }
        );
        assert!(matches!(
            rules.apply(Side::White, "0000", Some(Score::Centipawns(0))),
            MoveVerdict::Drawn { .. }
        ));
    }

    #[test]
    fn test_factory_builds_rules() {
        let factory = coordinate_rules();
        let mut rules = factory(&Opening::startpos());
        assert_eq!(rules.apply(Side::White, "a2a3", None), MoveVerdict::Continue);
    }
}
