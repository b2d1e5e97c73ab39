//! Thread-safe scoreboard
//!
//! Level 3 - Step-level implementation
//!
//! Results are accumulated per (first, second) engine pair, from the first
//! engine's point of view. Every game lands in exactly one of wins, losses,
//! draws, crashes or timeouts; illegal responses are a subset of crashes.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::result::{GameResult, Outcome};

/// Accumulated results of one engine pair
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairStats {
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub crashes: u32,
    pub timeouts: u32,
    pub illegal_responses: u32,
    /// Failures charged to the first engine
    pub first_forfeits: u32,
    /// Failures charged to the second engine
    pub second_forfeits: u32,
}

impl PairStats {
    /// Add one game
    pub fn record(&mut self, result: &GameResult) {
        self.games += 1;
        match result.outcome {
            Outcome::WhiteWin if result.first_is_white => self.wins += 1,
            Outcome::WhiteWin => self.losses += 1,
            Outcome::BlackWin if result.first_is_white => self.losses += 1,
            Outcome::BlackWin => self.wins += 1,
            Outcome::Draw => self.draws += 1,
            Outcome::Crash => self.crashes += 1,
            Outcome::Timeout => self.timeouts += 1,
            Outcome::IllegalResponse => {
                self.crashes += 1;
                self.illegal_responses += 1;
            }
        }
        if result.outcome.is_failure() {
            match result.culprit {
                Some(side) if side == result.first_side() => self.first_forfeits += 1,
                Some(_) => self.second_forfeits += 1,
                None => {}
            }
        }
    }

    /// Points of the first engine: wins, half draws, opponent forfeits
    pub fn first_points(&self) -> f64 {
        self.wins as f64 + self.draws as f64 / 2.0 + self.second_forfeits as f64
    }

    /// Points of the second engine
    pub fn second_points(&self) -> f64 {
        self.losses as f64 + self.draws as f64 / 2.0 + self.first_forfeits as f64
    }

    /// Every game is accounted for exactly once
    pub fn is_consistent(&self) -> bool {
        self.games == self.wins + self.losses + self.draws + self.crashes + self.timeouts
            && self.illegal_responses <= self.crashes
    }
}

/// One row of a scoreboard snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairEntry {
    pub first: String,
    pub second: String,
    pub stats: PairStats,
}

/// Copy of the scoreboard taken under its lock, sorted by pair
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreboardSnapshot {
    pub pairs: Vec<PairEntry>,
}

impl ScoreboardSnapshot {
    pub fn games_played(&self) -> usize {
        self.pairs.iter().map(|p| p.stats.games as usize).sum()
    }

    /// Per-engine standings sorted by points (descending)
    pub fn standings(&self) -> Vec<Standing> {
        let mut by_name: FxHashMap<&str, Standing> = FxHashMap::default();
        for entry in &self.pairs {
            let s = &entry.stats;
            let first = by_name
                .entry(entry.first.as_str())
                .or_insert_with(|| Standing::new(&entry.first));
            first.games += s.games;
            first.wins += s.wins;
            first.losses += s.losses;
            first.draws += s.draws;
            first.forfeits += s.first_forfeits;
            first.points += s.first_points();

            let second = by_name
                .entry(entry.second.as_str())
                .or_insert_with(|| Standing::new(&entry.second));
            second.games += s.games;
            second.wins += s.losses;
            second.losses += s.wins;
            second.draws += s.draws;
            second.forfeits += s.second_forfeits;
            second.points += s.second_points();
        }

        let mut standings: Vec<Standing> = by_name.into_values().collect();
        standings.sort_by(|a, b| {
            b.points
                .partial_cmp(&a.points)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        standings
    }
}

/// Standing of one engine across all its pairs
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub name: String,
    pub games: u32,
    /// Wins + 0.5 * draws + opponent forfeits
    pub points: f64,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    /// Crashes, timeouts and illegal responses charged to this engine
    pub forfeits: u32,
}

impl Standing {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            games: 0,
            points: 0.0,
            wins: 0,
            losses: 0,
            draws: 0,
            forfeits: 0,
        }
    }

    /// Points per game (0.0 to 1.0)
    pub fn score_rate(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            self.points / self.games as f64
        }
    }

    /// Logistic Elo difference against the field, None at 0% or 100%
    pub fn elo_difference(&self) -> Option<f64> {
        let p = self.score_rate();
        if self.games == 0 || p <= 0.0 || p >= 1.0 {
            return None;
        }
        Some(-400.0 * (1.0 / p - 1.0).log10())
    }
}

/// Concurrently updated results table
#[derive(Debug, Default)]
pub struct Scoreboard {
    pairs: Mutex<FxHashMap<(String, String), PairStats>>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a saved snapshot
    pub fn from_snapshot(snapshot: &ScoreboardSnapshot) -> Self {
        let pairs = snapshot
            .pairs
            .iter()
            .map(|e| ((e.first.clone(), e.second.clone()), e.stats))
            .collect();
        Self {
            pairs: Mutex::new(pairs),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FxHashMap<(String, String), PairStats>> {
        // Every update is a single in-place increment, so a poisoned map is still whole.
        self.pairs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add one finished game, returning the total recorded so far
    pub fn record(&self, result: &GameResult) -> usize {
        let key = (result.first().to_string(), result.second().to_string());
        let mut pairs = self.lock();
        pairs.entry(key).or_default().record(result);
        pairs.values().map(|s| s.games as usize).sum()
    }

    /// Stats for one ordered pair
    pub fn pair(&self, first: &str, second: &str) -> Option<PairStats> {
        self.lock()
            .get(&(first.to_string(), second.to_string()))
            .copied()
    }

    /// Consistent copy of every pair
    pub fn snapshot(&self) -> ScoreboardSnapshot {
        let mut pairs: Vec<PairEntry> = self
            .lock()
            .iter()
            .map(|((first, second), stats)| PairEntry {
                first: first.clone(),
                second: second.clone(),
                stats: *stats,
            })
            .collect();
        pairs.sort_by(|a, b| (&a.first, &a.second).cmp(&(&b.first, &b.second)));
        ScoreboardSnapshot { pairs }
    }

    /// Per-engine standings
    pub fn standings(&self) -> Vec<Standing> {
        self.snapshot().standings()
    }

    /// Total games recorded
    pub fn games_played(&self) -> usize {
        self.lock().values().map(|s| s.games as usize).sum()
    }
}
