//! Sides and starting positions

use serde::{Deserialize, Serialize};

/// Colour of the side to move
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    White,
    Black,
}

impl Side {
    /// The other side
    pub fn flip(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// 0 for white, 1 for black
    pub fn index(self) -> usize {
        match self {
            Side::White => 0,
            Side::Black => 1,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::White => write!(f, "white"),
            Side::Black => write!(f, "black"),
        }
    }
}

/// Starting position: an optional FEN plus moves played from it
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Opening {
    /// None = standard start position
    pub fen: Option<String>,
    pub moves: Vec<String>,
}

impl Opening {
    pub fn startpos() -> Self {
        Self::default()
    }

    pub fn from_fen(fen: impl Into<String>) -> Self {
        Self {
            fen: Some(fen.into()),
            moves: Vec::new(),
        }
    }

    pub fn with_moves(mut self, moves: Vec<String>) -> Self {
        self.moves = moves;
        self
    }

    /// Parse a line as either a FEN (six fields, or four with defaults) or
    /// a space separated move sequence from the start position
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let looks_like_fen = fields[0].matches('/').count() == 7;
        if looks_like_fen {
            let fen = if fields.len() == 4 {
                format!("{} 0 1", line)
            } else {
                fields.join(" ")
            };
            Some(Self::from_fen(fen))
        } else {
            Some(Self::startpos().with_moves(fields.iter().map(|m| m.to_string()).collect()))
        }
    }

    /// Side to move once the opening moves have been played
    pub fn side_to_move(&self) -> Side {
        let initial = match &self.fen {
            Some(fen) if fen.split_whitespace().nth(1) == Some("b") => Side::Black,
            _ => Side::White,
        };
        if self.moves.len() % 2 == 0 {
            initial
        } else {
            initial.flip()
        }
    }

    /// Render the `position` command with `extra` moves appended
    pub fn position_command(&self, extra: &[String]) -> String {
        let mut cmd = match &self.fen {
            Some(fen) => format!("position fen {}", fen),
            None => "position startpos".to_string(),
        };
        if !self.moves.is_empty() || !extra.is_empty() {
            cmd.push_str(" moves");
            for mv in self.moves.iter().chain(extra) {
                cmd.push(' ');
                cmd.push_str(mv);
            }
        }
        cmd
    }
}
