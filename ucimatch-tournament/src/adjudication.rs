//! Score-based game adjudication
//!
//! Level 3 - Step-level implementation

use serde::{Deserialize, Serialize};
use ucimatch_engine::{Score, Side};

use crate::rules::MoveVerdict;

/// Resign when a side reports a losing score for `move_count` consecutive moves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResignRule {
    pub move_count: u32,
    /// Threshold in centipawns, positive
    pub score_cp: i32,
}

/// Draw when both sides report a near-zero score for `move_count` moves each
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRule {
    /// Full move number from which the rule applies
    pub move_number: u32,
    pub move_count: u32,
    pub score_cp: i32,
}

/// Full-move cap applied unless configured otherwise
pub const DEFAULT_MAX_MOVES: u32 = 200;

/// Adjudication rules for one game
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjudicationConfig {
    pub resign: Option<ResignRule>,
    pub draw: Option<DrawRule>,
    /// Declare a draw after this many full moves
    ///
    /// `None` relies on the rules collaborator alone to end the game.
    pub max_moves: Option<u32>,
}

impl Default for AdjudicationConfig {
    fn default() -> Self {
        Self {
            resign: None,
            draw: None,
            max_moves: Some(DEFAULT_MAX_MOVES),
        }
    }
}

/// Tracks consecutive scores during one game
#[derive(Clone, Debug)]
pub struct Adjudicator {
    config: AdjudicationConfig,
    losing_streak: [u32; 2],
    quiet_plies: u32,
}

fn is_losing(score: Score, threshold: i32) -> bool {
    match score {
        Score::Mate(n) => n <= 0,
        Score::Centipawns(cp) => cp <= -threshold,
    }
}

fn is_quiet(score: Score, threshold: i32) -> bool {
    match score {
        Score::Mate(_) => false,
        Score::Centipawns(cp) => cp.abs() <= threshold,
    }
}

impl Adjudicator {
    pub fn new(config: AdjudicationConfig) -> Self {
        Self {
            config,
            losing_streak: [0; 2],
            quiet_plies: 0,
        }
    }

    /// Feed the score `side` reported for its move; `plies` counts moves
    /// played in the game so far, including this one
    pub fn observe(&mut self, side: Side, score: Option<Score>, plies: u32) -> MoveVerdict {
        if let Some(rule) = self.config.resign {
            let streak = &mut self.losing_streak[side.index()];
            match score {
                Some(s) if is_losing(s, rule.score_cp) => *streak += 1,
                _ => *streak = 0,
            }
            if rule.move_count > 0 && *streak >= rule.move_count {
                return MoveVerdict::Decisive {
                    winner: side.flip(),
                    reason: format!("{} resigns", side),
                };
            }
        }

        if let Some(rule) = self.config.draw {
            let full_moves = plies.div_ceil(2);
            match score {
                Some(s) if full_moves >= rule.move_number && is_quiet(s, rule.score_cp) => {
                    self.quiet_plies += 1
                }
                _ => self.quiet_plies = 0,
            }
            if rule.move_count > 0 && self.quiet_plies >= rule.move_count * 2 {
                return MoveVerdict::Drawn {
                    reason: "draw by adjudication".to_string(),
                };
            }
        }

        if let Some(max) = self.config.max_moves {
            if plies >= max.saturating_mul(2) {
                return MoveVerdict::Drawn {
                    reason: format!("move limit of {} reached", max),
                };
            }
        }

        MoveVerdict::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resign_after_streak() {
        let mut adj = Adjudicator::new(AdjudicationConfig {
            resign: Some(ResignRule {
                move_count: 2,
                score_cp: 500,
            }),
            ..Default::default()
        });
        let bad = Some(Score::Centipawns(-600));
        assert_eq!(adj.observe(Side::Black, bad, 2), MoveVerdict::Continue);
        // a missing score breaks the streak
        assert_eq!(adj.observe(Side::Black, None, 4), MoveVerdict::Continue);
        assert_eq!(adj.observe(Side::Black, bad, 6), MoveVerdict::Continue);
        assert!(matches!(
            adj.observe(Side::Black, Some(Score::Mate(-3)), 8),
            MoveVerdict::Decisive {
                winner: Side::White,
                ..
            }
        ));
    }

    #[test]
    fn test_draw_needs_both_sides_quiet() {
        let mut adj = Adjudicator::new(AdjudicationConfig {
            draw: Some(DrawRule {
                move_number: 2,
                move_count: 2,
                score_cp: 10,
            }),
            ..Default::default()
        });
        let quiet = Some(Score::Centipawns(3));
        // before the starting move number the rule is inactive
        assert_eq!(adj.observe(Side::White, quiet, 1), MoveVerdict::Continue);
        assert_eq!(adj.observe(Side::Black, quiet, 2), MoveVerdict::Continue);
        assert_eq!(adj.observe(Side::White, quiet, 3), MoveVerdict::Continue);
        assert_eq!(adj.observe(Side::Black, quiet, 4), MoveVerdict::Continue);
        assert_eq!(adj.observe(Side::White, quiet, 5), MoveVerdict::Continue);
        assert!(matches!(
            adj.observe(Side::Black, quiet, 6),
            MoveVerdict::Drawn { .. }
        ));
    }

    #[test]
    fn test_default_caps_game_length() {
        let mut adj = Adjudicator::new(AdjudicationConfig::default());
        let last = DEFAULT_MAX_MOVES * 2;
        for ply in 1..last {
            let side = if ply % 2 == 1 { Side::White } else { Side::Black };
            assert_eq!(adj.observe(side, None, ply), MoveVerdict::Continue);
        }
        assert!(matches!(
            adj.observe(Side::Black, None, last),
            MoveVerdict::Drawn { .. }
        ));
    }

    #[test]
    fn test_max_moves() {
        let mut adj = Adjudicator::new(AdjudicationConfig {
            max_moves: Some(2),
            ..Default::default()
        });
        assert_eq!(adj.observe(Side::White, None, 3), MoveVerdict::Continue);
        assert!(matches!(
            adj.observe(Side::Black, None, 4),
            MoveVerdict::Drawn { .. }
        ));
    }
}
