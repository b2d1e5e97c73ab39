//! Tournament execution
//!
//! Level 1 - Orchestration and Level 2 - Phases

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};
use ucimatch_engine::{CancellationToken, EngineConfiguration, EngineError, EngineSession, Side};

use crate::cache::SessionCache;
use crate::collaborators::{
    AffinityManager, DiscardRecords, GameRecordSink, NoAffinity, OpeningBook, OpeningList,
};
use crate::config::{GameSettings, TournamentConfig};
use crate::error::{AcquireError, SetupError, SnapshotError};
use crate::game_runner::{GameEnd, GameRunner};
use crate::generator::{MatchGenerator, Pairing};
use crate::pool::WorkerPool;
use crate::result::{GameRecord, GameResult, Outcome, PlayedMove};
use crate::rules::{coordinate_rules, RulesFactory};
use crate::scoreboard::Scoreboard;
use crate::snapshot::{ScheduleFingerprint, SnapshotStore, TournamentSnapshot};

/// Notified after every recorded game
pub trait TournamentObserver: Send + Sync {
    fn game_finished(&self, record: &GameRecord, completed: usize, total: usize);
}

/// A configured tournament, ready to run
pub struct Tournament {
    config: TournamentConfig,
    cancel: CancellationToken,
    book: Arc<dyn OpeningBook>,
    records: Arc<dyn GameRecordSink>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    rules: RulesFactory,
    affinity: Arc<dyn AffinityManager>,
    observer: Option<Arc<dyn TournamentObserver>>,
    resume: Option<TournamentSnapshot>,
}

impl Tournament {
    /// Tournament from the start position with default collaborators
    pub fn new(config: TournamentConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            book: Arc::new(OpeningList::default()),
            records: Arc::new(DiscardRecords),
            snapshots: None,
            rules: coordinate_rules(),
            affinity: Arc::new(NoAffinity),
            observer: None,
            resume: None,
        }
    }

    /// Share `cancel` with every blocking wait of the run
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Set opening source
    pub fn with_book(mut self, book: Arc<dyn OpeningBook>) -> Self {
        self.book = book;
        self
    }

    /// Set game record destination
    pub fn with_records(mut self, records: Arc<dyn GameRecordSink>) -> Self {
        self.records = records;
        self
    }

    /// Save a snapshot after every game
    pub fn with_snapshots(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(store);
        self
    }

    /// Set rules collaborator
    pub fn with_rules(mut self, rules: RulesFactory) -> Self {
        self.rules = rules;
        self
    }

    /// Set CPU affinity collaborator
    pub fn with_affinity(mut self, affinity: Arc<dyn AffinityManager>) -> Self {
        self.affinity = affinity;
        self
    }

    /// Set progress observer
    pub fn with_observer(mut self, observer: Arc<dyn TournamentObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Continue an interrupted run of the same schedule
    pub fn resume_from(mut self, snapshot: TournamentSnapshot) -> Self {
        self.resume = Some(snapshot);
        self
    }

    /// Cancellation token of this run
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    // ========================================================================
    // Level 1 - Orchestration
    // ========================================================================

    /// Play every remaining game and return the final state
    ///
    /// Configuration problems abort before any game starts; game failures
    /// never abort the run.
    pub fn run(self) -> Result<TournamentSnapshot, SetupError> {
        self.config.validate()?;
        let fingerprint = self.config.fingerprint();

        let (scoreboard, completed) = match &self.resume {
            Some(snapshot) => {
                if snapshot.fingerprint != fingerprint {
                    warn!(
                        "resuming a snapshot taken with a different schedule; results may not line up"
                    );
                }
                (
                    Scoreboard::from_snapshot(&snapshot.scoreboard),
                    snapshot.scoreboard.games_played(),
                )
            }
            None => (Scoreboard::new(), 0),
        };

        let engines: Vec<Arc<EngineConfiguration>> =
            self.config.engines.iter().cloned().map(Arc::new).collect();
        let generator =
            MatchGenerator::from_config(&self.config, engines, Arc::clone(&self.book), completed);
        let total = generator.total();
        let workers = self.config.concurrency;

        info!(
            engines = self.config.engines.len(),
            total,
            remaining = total.saturating_sub(completed),
            workers,
            "starting tournament"
        );

        let cache = SessionCache::new(
            self.config.cache.effective_capacity(workers),
            self.config.cache.overflow,
            self.cancel.clone(),
        )
        .with_affinity(Arc::clone(&self.affinity));

        let shared = Arc::new(Shared {
            generator,
            cache,
            scoreboard,
            total,
            settings: self.config.game.clone(),
            report_interval: self.config.report_interval,
            fingerprint,
            cancel: self.cancel.clone(),
            rules: Arc::clone(&self.rules),
            records: Arc::clone(&self.records),
            snapshots: self.snapshots.clone(),
            save_lock: Mutex::new(()),
            observer: self.observer.clone(),
        });

        let pool = WorkerPool::new(workers)?;
        for _ in 0..workers {
            let shared = Arc::clone(&shared);
            pool.submit(move || shared.worker_loop())?;
        }
        pool.shutdown(None);
        shared.cache.shutdown();

        let snapshot = match &shared.snapshots {
            Some(store) => shared.save_snapshot(store.as_ref()).unwrap_or_else(|e| {
                warn!(error = %e, "failed to save final snapshot");
                shared.snapshot()
            }),
            None => shared.snapshot(),
        };
        if self.cancel.is_cancelled() {
            warn!(
                completed = snapshot.completed,
                total, "tournament interrupted; resume from the saved snapshot"
            );
        } else {
            info!(completed = snapshot.completed, total, "tournament finished");
        }
        Ok(snapshot)
    }
}

/// State shared by the worker loops
struct Shared {
    generator: MatchGenerator,
    cache: SessionCache,
    scoreboard: Scoreboard,
    total: usize,
    settings: GameSettings,
    report_interval: usize,
    fingerprint: ScheduleFingerprint,
    cancel: CancellationToken,
    rules: RulesFactory,
    records: Arc<dyn GameRecordSink>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    /// Held from taking a snapshot until it is saved
    save_lock: Mutex<()>,
    observer: Option<Arc<dyn TournamentObserver>>,
}

impl Shared {
    // ========================================================================
    // Level 2 - Phases
    // ========================================================================

    /// Pull pairings until the schedule is exhausted or the run is cancelled
    fn worker_loop(&self) {
        while !self.cancel.is_cancelled() {
            let Some(pairing) = self.generator.next() else {
                break;
            };
            self.play_game(&pairing);
        }
    }

    /// Acquire both engines, play, release, record
    fn play_game(&self, pairing: &Pairing) {
        debug!(
            game = pairing.game_id,
            round = pairing.round_id,
            white = %pairing.white.name,
            black = %pairing.black.name,
            "starting game"
        );

        // Always take the lower-indexed engine first so blocked acquirers
        // can never wait on each other in a cycle.
        let first_side = if pairing.first_is_white {
            Side::White
        } else {
            Side::Black
        };
        let first = match self.acquire(pairing, first_side) {
            Some(Ok(session)) => session,
            Some(Err(result)) => return self.finish(pairing, result, Vec::new()),
            None => return,
        };
        let second = match self.acquire(pairing, first_side.flip()) {
            Some(Ok(session)) => session,
            Some(Err(result)) => {
                self.cache.release(first, true);
                return self.finish(pairing, result, Vec::new());
            }
            None => {
                self.cache.release(first, false);
                return;
            }
        };
        let (mut white, mut black) = if pairing.first_is_white {
            (first, second)
        } else {
            (second, first)
        };

        let rules = (self.rules)(&pairing.opening);
        let played = GameRunner::new(self.settings.clone(), rules).play(
            &mut white,
            &mut black,
            &pairing.opening,
        );
        self.cache.release(white, played.healthy[0]);
        self.cache.release(black, played.healthy[1]);

        match played.end {
            GameEnd::Finished {
                outcome,
                reason,
                culprit,
            } => {
                let result = result_for(pairing, outcome, reason, culprit);
                self.finish(pairing, result, played.moves);
            }
            GameEnd::Interrupted => {
                debug!(game = pairing.game_id, "game abandoned");
            }
        }
    }

    // ========================================================================
    // Level 3 - Steps
    // ========================================================================

    /// Session for `side`; a start failure becomes a crash result charged to
    /// that side, an interruption yields None
    fn acquire(&self, pairing: &Pairing, side: Side) -> Option<Result<EngineSession, GameResult>> {
        let config = match side {
            Side::White => &pairing.white,
            Side::Black => &pairing.black,
        };
        match self.cache.acquire(config) {
            Ok(session) => Some(Ok(session)),
            Err(AcquireError::Interrupted { .. })
            | Err(AcquireError::Start(EngineError::Interrupted { .. })) => None,
            Err(AcquireError::Start(e)) => {
                warn!(engine = %config.name, error = %e, "engine failed to start");
                Some(Err(result_for(
                    pairing,
                    Outcome::Crash,
                    e.to_string(),
                    Some(side),
                )))
            }
        }
    }

    /// Record a finished game everywhere it needs to go
    fn finish(&self, pairing: &Pairing, result: GameResult, moves: Vec<PlayedMove>) {
        let completed = self.scoreboard.record(&result);

        let record = GameRecord {
            round_id: pairing.round_id,
            game_id: pairing.game_id,
            opening: pairing.opening.clone(),
            result,
            moves,
            finished_at: Utc::now(),
        };
        debug!(
            game = record.game_id,
            white = %record.result.white,
            black = %record.result.black,
            result = record.result.result_tag(),
            reason = %record.result.reason,
            "game finished"
        );

        if let Err(e) = self.records.append(&record) {
            warn!(game = record.game_id, error = %e, "failed to write game record");
        }
        if let Some(store) = &self.snapshots {
            if let Err(e) = self.save_snapshot(store.as_ref()) {
                warn!(error = %e, "failed to save snapshot");
            }
        }
        if let Some(observer) = &self.observer {
            observer.game_finished(&record, completed, self.total);
        }
        if self.report_interval > 0 && completed % self.report_interval == 0 {
            self.report_progress(completed);
        }
    }

    /// Save the current state; concurrent saves never go backwards
    fn save_snapshot(
        &self,
        store: &dyn SnapshotStore,
    ) -> Result<TournamentSnapshot, SnapshotError> {
        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.snapshot();
        store.save(&snapshot)?;
        Ok(snapshot)
    }

    fn report_progress(&self, completed: usize) {
        info!("progress: {}/{} games", completed, self.total);
        for (rank, standing) in self.scoreboard.standings().iter().enumerate() {
            info!(
                "  {}. {:<20} {:>6.1}/{:<4} +{} -{} ={} forfeits {}",
                rank + 1,
                standing.name,
                standing.points,
                standing.games,
                standing.wins,
                standing.losses,
                standing.draws,
                standing.forfeits
            );
        }
    }

    fn snapshot(&self) -> TournamentSnapshot {
        let scoreboard = self.scoreboard.snapshot();
        TournamentSnapshot {
            completed: scoreboard.games_played(),
            scoreboard,
            fingerprint: self.fingerprint.clone(),
        }
    }
}

fn result_for(
    pairing: &Pairing,
    outcome: Outcome,
    reason: String,
    culprit: Option<Side>,
) -> GameResult {
    GameResult {
        outcome,
        reason,
        white: pairing.white.name.clone(),
        black: pairing.black.name.clone(),
        first_is_white: pairing.first_is_white,
        culprit,
    }
}
