//! Configuration types for tournament play
//!
//! Level 4 - Utilities and configuration

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use ucimatch_engine::EngineConfiguration;

use crate::adjudication::AdjudicationConfig;
use crate::error::SetupError;
use crate::snapshot::ScheduleFingerprint;

/// Tournament format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TournamentFormat {
    /// Every pair of engines meets once per round
    #[default]
    RoundRobin,
    /// The first `seeds` engines each meet every other engine once per round
    Gauntlet { seeds: usize },
}

/// What the session cache does when every session of an engine is busy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Start another process; surplus sessions are stopped on release
    #[default]
    Spawn,
    /// Wait until a session is released
    Block,
}

/// Session cache sizing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Sessions kept per engine (None = one per worker)
    pub capacity: Option<usize>,
    pub overflow: OverflowPolicy,
}

impl CacheConfig {
    /// Capacity per engine for a pool of `workers` threads
    pub fn effective_capacity(&self, workers: usize) -> usize {
        self.capacity.unwrap_or(workers).max(1)
    }
}

/// Per-game settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    /// How long to wait for `bestmove` from an engine without a clock
    pub unclocked_wait_ms: u64,
    pub adjudication: AdjudicationConfig,
    /// Treat a search that reports no score as an illegal response
    pub require_score: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            unclocked_wait_ms: 60_000,
            adjudication: AdjudicationConfig::default(),
            require_score: false,
        }
    }
}

/// Tournament configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TournamentConfig {
    /// Participants, in schedule order
    pub engines: Vec<EngineConfiguration>,
    pub format: TournamentFormat,
    pub rounds: usize,
    /// Games per encounter (1 or 2); the second game swaps colours
    pub games_per_round: usize,
    /// Alternate colours between rounds when each encounter is a single game
    pub alternate_colors: bool,
    /// Games played in parallel
    pub concurrency: usize,
    pub cache: CacheConfig,
    pub game: GameSettings,
    /// Log progress every N completed games (0 = never)
    pub report_interval: usize,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            engines: Vec::new(),
            format: TournamentFormat::RoundRobin,
            rounds: 1,
            games_per_round: 2,
            alternate_colors: true,
            concurrency: 1,
            cache: CacheConfig::default(),
            game: GameSettings::default(),
            report_interval: 10,
        }
    }
}

impl TournamentConfig {
    /// Round-robin between `engines`
    pub fn round_robin(engines: Vec<EngineConfiguration>) -> Self {
        Self {
            engines,
            ..Default::default()
        }
    }

    /// Gauntlet where the first `seeds` engines face the rest
    pub fn gauntlet(engines: Vec<EngineConfiguration>, seeds: usize) -> Self {
        Self {
            engines,
            format: TournamentFormat::Gauntlet { seeds },
            ..Default::default()
        }
    }

    /// Set number of rounds
    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    /// Set games per encounter
    pub fn with_games_per_round(mut self, games: usize) -> Self {
        self.games_per_round = games;
        self
    }

    /// Set parallel games
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set cache sizing
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set per-game settings
    pub fn with_game_settings(mut self, game: GameSettings) -> Self {
        self.game = game;
        self
    }

    /// Enable or disable colour alternation
    pub fn with_alternate_colors(mut self, alternate: bool) -> Self {
        self.alternate_colors = alternate;
        self
    }

    /// Set progress report interval
    pub fn with_report_interval(mut self, interval: usize) -> Self {
        self.report_interval = interval;
        self
    }

    /// Reject configurations that cannot produce a valid schedule
    pub fn validate(&self) -> Result<(), SetupError> {
        let n = self.engines.len();
        if n < 2 {
            return Err(SetupError::TooFewEngines(n));
        }
        let mut names = HashSet::new();
        for engine in &self.engines {
            engine.validate()?;
            if !names.insert(engine.name.as_str()) {
                return Err(SetupError::DuplicateName(engine.name.clone()));
            }
        }
        if let TournamentFormat::Gauntlet { seeds } = self.format {
            if seeds == 0 || seeds >= n {
                return Err(SetupError::InvalidSeeds {
                    seeds,
                    max: n - 1,
                });
            }
        }
        if !(1..=2).contains(&self.games_per_round) {
            return Err(SetupError::InvalidGamesPerRound(self.games_per_round));
        }
        if self.rounds == 0 {
            return Err(SetupError::NoRounds);
        }
        if self.concurrency == 0 {
            return Err(SetupError::NoWorkers);
        }
        Ok(())
    }

    /// Identity of the schedule this configuration produces
    pub fn fingerprint(&self) -> ScheduleFingerprint {
        ScheduleFingerprint {
            engines: self.engines.iter().map(|e| e.name.clone()).collect(),
            format: self.format,
            rounds: self.rounds,
            games_per_round: self.games_per_round,
            alternate_colors: self.alternate_colors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ucimatch_engine::EngineLimits;

    fn engine(name: &str) -> EngineConfiguration {
        EngineConfiguration::new("/bin/sh")
            .with_name(name)
            .with_limits(EngineLimits::default().with_depth(1))
    }

    #[test]
    fn test_defaults() {
        let config = TournamentConfig::default();
        assert_eq!(config.format, TournamentFormat::RoundRobin);
        assert_eq!(config.games_per_round, 2);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.cache.overflow, OverflowPolicy::Spawn);
        assert_eq!(config.cache.effective_capacity(4), 4);
        assert_eq!(
            CacheConfig {
                capacity: Some(0),
                overflow: OverflowPolicy::Block
            }
            .effective_capacity(4),
            1
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_accepts_good_config() {
        let config = TournamentConfig::gauntlet(vec![engine("a"), engine("b"), engine("c")], 1)
            .with_rounds(2)
            .with_concurrency(2);
        assert!(config.validate().is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_rejects_bad_configs() {
        let one = TournamentConfig::round_robin(vec![engine("a")]);
        assert!(matches!(one.validate(), Err(SetupError::TooFewEngines(1))));

        let dup = TournamentConfig::round_robin(vec![engine("a"), engine("a")]);
        assert!(matches!(dup.validate(), Err(SetupError::DuplicateName(_))));

        let seeds = TournamentConfig::gauntlet(vec![engine("a"), engine("b")], 2);
        assert!(matches!(seeds.validate(), Err(SetupError::InvalidSeeds { .. })));

        let games = TournamentConfig::round_robin(vec![engine("a"), engine("b")])
            .with_games_per_round(3);
        assert!(matches!(
            games.validate(),
            Err(SetupError::InvalidGamesPerRound(3))
        ));

        let unbounded = TournamentConfig::round_robin(vec![
            engine("a"),
            EngineConfiguration::new("/bin/sh").with_name("b"),
        ]);
        assert!(matches!(unbounded.validate(), Err(SetupError::Engine(_))));

        let workers = TournamentConfig::round_robin(vec![engine("a"), engine("b")])
            .with_concurrency(0);
        assert!(matches!(workers.validate(), Err(SetupError::NoWorkers)));
    }

    #[test]
    fn test_fingerprint_tracks_schedule_shape() {
        let a = TournamentConfig::round_robin(vec![engine("a"), engine("b")]);
        let b = a.clone().with_concurrency(8);
        let c = a.clone().with_rounds(3);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
