//! Parsing of `info` and `bestmove` lines

use serde::{Deserialize, Serialize};

/// Evaluation reported by an engine, from the mover's point of view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Score {
    Centipawns(i32),
    /// Moves until mate; negative when the mover is being mated
    Mate(i32),
}

/// Search information line, excluding free-text `info string` lines
pub fn is_info_line(line: &str) -> bool {
    let mut words = line.split_whitespace();
    words.next() == Some("info") && words.next() != Some("string")
}

/// Extract the score from an info line
///
/// `Ok(None)` when the line carries no score, `Err` when `score` is present
/// but not followed by `cp <int>` or `mate <int>`.
pub fn parse_score(line: &str) -> Result<Option<Score>, String> {
    let mut words = line.split_whitespace();
    while let Some(word) = words.next() {
        if word != "score" {
            continue;
        }
        let kind = words.next();
        let value = words.next().and_then(|v| v.parse::<i32>().ok());
        return match (kind, value) {
            (Some("cp"), Some(v)) => Ok(Some(Score::Centipawns(v))),
            (Some("mate"), Some(v)) => Ok(Some(Score::Mate(v))),
            _ => Err(format!("malformed score in '{}'", line)),
        };
    }
    Ok(None)
}

/// Move from `bestmove <mv> [ponder <mv>]`
pub fn parse_bestmove(line: &str) -> Option<&str> {
    let mut words = line.split_whitespace();
    if words.next() != Some("bestmove") {
        return None;
    }
    words.next()
}

/// Coordinate notation: `e2e4`, `e7e8q`
pub fn is_coordinate_move(mv: &str) -> bool {
    let b = mv.as_bytes();
    let square = |f: u8, r: u8| (b'a'..=b'h').contains(&f) && (b'1'..=b'8').contains(&r);
    match b.len() {
        4 => square(b[0], b[1]) && square(b[2], b[3]),
        5 => square(b[0], b[1]) && square(b[2], b[3]) && b"nbrq".contains(&b[4]),
        _ => false,
    }
}
