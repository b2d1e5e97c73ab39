//! Error types for tournament infrastructure

use thiserror::Error;
use ucimatch_engine::{ConfigError, EngineError};

/// Failure to obtain a session from the cache
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error(transparent)]
    Start(#[from] EngineError),

    #[error("interrupted while waiting for a free '{engine}' session")]
    Interrupted { engine: String },
}

/// Worker pool failures
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to build worker pool: {0}")]
    Build(#[from] rayon::ThreadPoolBuildError),

    #[error("worker pool is shutting down")]
    ShuttingDown,
}

/// Problems that abort a tournament before any game is played
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("a tournament needs at least two engines, got {0}")]
    TooFewEngines(usize),

    #[error("engine name '{0}' is used more than once")]
    DuplicateName(String),

    #[error(transparent)]
    Engine(#[from] ConfigError),

    #[error("gauntlet seeds must be between 1 and {max}, got {seeds}")]
    InvalidSeeds { seeds: usize, max: usize },

    #[error("games per encounter must be 1 or 2, got {0}")]
    InvalidGamesPerRound(usize),

    #[error("rounds must be at least 1")]
    NoRounds,

    #[error("concurrency must be at least 1")]
    NoWorkers,

    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Snapshot persistence failures
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}
