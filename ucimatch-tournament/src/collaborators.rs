//! Collaborator interfaces and their default implementations
//!
//! Level 4 - Utilities

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use ucimatch_engine::Opening;

use crate::result::GameRecord;

/// Source of starting positions
pub trait OpeningBook: Send + Sync {
    /// Opening for `encounter` (global index) in `round` (0-based)
    ///
    /// Must be deterministic in its arguments.
    fn opening(&self, round: usize, encounter: usize) -> Opening;
}

/// Cycles through a fixed list; an empty list always yields the start position
#[derive(Clone, Debug, Default)]
pub struct OpeningList {
    openings: Vec<Opening>,
}

impl OpeningList {
    pub fn new(openings: Vec<Opening>) -> Self {
        Self { openings }
    }

    /// Read one opening per line, FEN or move list; blank and `#` lines are skipped
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read openings from {}", path.display()))?;
        let openings: Vec<Opening> = text.lines().filter_map(Opening::parse_line).collect();
        Ok(Self::new(openings))
    }

    /// Shuffle the list with a seeded RNG
    pub fn shuffled(mut self, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.openings.shuffle(&mut rng);
        self
    }

    pub fn len(&self) -> usize {
        self.openings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.openings.is_empty()
    }
}

impl OpeningBook for OpeningList {
    fn opening(&self, _round: usize, encounter: usize) -> Opening {
        if self.openings.is_empty() {
            return Opening::startpos();
        }
        self.openings[encounter % self.openings.len()].clone()
    }
}

/// Assigns CPU cores to engine sessions
pub trait AffinityManager: Send + Sync {
    /// Cores assigned to the session, advisory only
    fn assign(&self, session_id: u64, pid: Option<u32>) -> std::result::Result<Vec<usize>, String>;
}

/// Leaves scheduling to the operating system
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAffinity;

impl AffinityManager for NoAffinity {
    fn assign(&self, _session_id: u64, _pid: Option<u32>) -> std::result::Result<Vec<usize>, String> {
        Ok(Vec::new())
    }
}

/// Destination for finished games
pub trait GameRecordSink: Send + Sync {
    fn append(&self, record: &GameRecord) -> Result<()>;
}

/// Drops every record
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardRecords;

impl GameRecordSink for DiscardRecords {
    fn append(&self, _record: &GameRecord) -> Result<()> {
        Ok(())
    }
}

/// Appends one JSON object per line
pub struct JsonLinesSink {
    out: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    /// Open `path` for appending, creating it if needed
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open record file {}", path.display()))?;
        Ok(Self {
            out: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl GameRecordSink for JsonLinesSink {
    fn append(&self, record: &GameRecord) -> Result<()> {
        let line = serde_json::to_string(record).context("failed to serialise game record")?;
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("record file lock poisoned"))?;
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{GameResult, Outcome};
    use chrono::Utc;

    #[test]
    fn test_opening_list_cycles() {
        let list = OpeningList::new(vec![
            Opening::startpos().with_moves(vec!["e2e4".into()]),
            Opening::startpos().with_moves(vec!["d2d4".into()]),
        ]);
        assert_eq!(list.opening(0, 0).moves, vec!["e2e4"]);
        assert_eq!(list.opening(0, 1).moves, vec!["d2d4"]);
        assert_eq!(list.opening(3, 2).moves, vec!["e2e4"]);
        assert_eq!(OpeningList::default().opening(1, 1), Opening::startpos());
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let openings: Vec<Opening> = (0..20)
            .map(|i| Opening::startpos().with_moves(vec![format!("m{}", i)]))
            .collect();
        let a = OpeningList::new(openings.clone()).shuffled(7);
        let b = OpeningList::new(openings.clone()).shuffled(7);
        let order = |l: &OpeningList| (0..l.len()).map(|i| l.opening(0, i)).collect::<Vec<_>>();
        assert_eq!(order(&a), order(&b));
        assert_ne!(order(&a), openings);
    }

    #[test]
    fn test_opening_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.txt");
        std::fs::write(
            &path,
            "# test book\ne2e4 e7e5\n\n8/8/8/8/8/8/8/K6k w - - 0 1\n",
        )
        .unwrap();
        let list = OpeningList::from_file(&path).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.opening(0, 1).fen.as_deref(), Some("8/8/8/8/8/8/8/K6k w - - 0 1"));
        assert!(OpeningList::from_file(dir.path().join("missing.txt")).is_err());
    }

    #[test]
    fn test_json_lines_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.jsonl");
        let sink = JsonLinesSink::create(&path).unwrap();
        let record = GameRecord {
            round_id: 1,
            game_id: 1,
            opening: Opening::startpos(),
            result: GameResult {
                outcome: Outcome::Draw,
                reason: "stalemate".into(),
                white: "a".into(),
                black: "b".into(),
                first_is_white: true,
                culprit: None,
            },
            moves: Vec::new(),
            finished_at: Utc::now(),
        };
        sink.append(&record).unwrap();
        sink.append(&record).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: GameRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.result.outcome, Outcome::Draw);
    }

    #[test]
    fn test_no_affinity_assigns_nothing() {
        assert_eq!(NoAffinity.assign(1, None), Ok(Vec::new()));
    }
}
