//! ucimatch Tournament - concurrent engine matches
//!
//! This crate provides tournament infrastructure:
//! - A session cache that keeps engine processes warm between games
//! - A fixed worker pool that plays games in parallel
//! - Resumable pairing schedules (round-robin, gauntlet)
//! - Clocks, adjudication and a thread-safe scoreboard
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: Tournament::run (orchestration)
//! - Level 2: worker loops, play_game (phases)
//! - Level 3: GameRunner, SessionCache, MatchGenerator, TimeoutTracker, Scoreboard (steps)
//! - Level 4: utilities, configuration, collaborators

mod adjudication;
mod cache;
mod collaborators;
mod config;
mod error;
mod game_runner;
mod generator;
mod pool;
mod result;
mod rules;
mod scoreboard;
mod snapshot;
mod timeout;
mod tournament;

#[cfg(test)]
mod test_support;

pub use adjudication::{AdjudicationConfig, Adjudicator, DrawRule, ResignRule, DEFAULT_MAX_MOVES};
pub use cache::SessionCache;
pub use collaborators::{
    AffinityManager, DiscardRecords, GameRecordSink, JsonLinesSink, NoAffinity, OpeningBook,
    OpeningList,
};
pub use config::{CacheConfig, GameSettings, OverflowPolicy, TournamentConfig, TournamentFormat};
pub use error::{AcquireError, PoolError, SetupError, SnapshotError};
pub use game_runner::{GameEnd, GameError, GameRunner, PlayedGame};
pub use generator::{Gauntlet, MatchGenerator, Pairing, PairingPolicy, RoundRobin};
pub use pool::WorkerPool;
pub use result::{GameRecord, GameResult, Outcome, PlayedMove};
pub use rules::{coordinate_rules, CoordinateMoveRules, GameRules, MoveVerdict, RulesFactory};
pub use scoreboard::{PairEntry, PairStats, Scoreboard, ScoreboardSnapshot, Standing};
pub use snapshot::{JsonSnapshotStore, ScheduleFingerprint, SnapshotStore, TournamentSnapshot};
pub use timeout::{TimeForfeit, TimeoutTracker};
pub use tournament::{Tournament, TournamentObserver};
