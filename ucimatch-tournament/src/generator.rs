//! Match generator - the pairing schedule
//!
//! Level 3 - Step-level implementation
//!
//! The schedule is round-major. Within a round, encounters come in policy
//! order; within an encounter, `games_per_round` games share one opening and
//! the second game swaps colours. Every pairing is a pure function of its
//! index, which is what makes resumption by count possible.

use std::sync::{Arc, Mutex, PoisonError};

use ucimatch_engine::{EngineConfiguration, Opening};

use crate::collaborators::OpeningBook;
use crate::config::{TournamentConfig, TournamentFormat};

/// One scheduled game
#[derive(Clone, Debug)]
pub struct Pairing {
    pub white: Arc<EngineConfiguration>,
    pub black: Arc<EngineConfiguration>,
    /// Index of the encounter's first engine in the participant list
    pub first: usize,
    pub second: usize,
    pub first_is_white: bool,
    pub opening: Opening,
    /// 1-based round number
    pub round_id: usize,
    /// 1-based position in the whole schedule
    pub game_id: usize,
}

/// A tournament format as an ordered sequence of pairings
pub trait PairingPolicy: Send {
    /// The pairing at the cursor, advancing it; None when exhausted
    fn next(&mut self) -> Option<Pairing>;

    /// Number of games in the whole schedule
    fn total(&self) -> usize;

    /// Games handed out so far
    fn position(&self) -> usize;

    /// Move the cursor to `position`
    fn seek(&mut self, position: usize);
}

/// Shared index arithmetic over a per-round encounter list
struct Schedule {
    engines: Vec<Arc<EngineConfiguration>>,
    encounters: Vec<(usize, usize)>,
    rounds: usize,
    games_per_round: usize,
    alternate_colors: bool,
    book: Arc<dyn OpeningBook>,
    cursor: usize,
    /// Opening of the most recent encounter, keyed by its global index
    last_opening: Option<(usize, Opening)>,
}

impl Schedule {
    fn new(
        engines: Vec<Arc<EngineConfiguration>>,
        encounters: Vec<(usize, usize)>,
        config: &TournamentConfig,
        book: Arc<dyn OpeningBook>,
    ) -> Self {
        Self {
            engines,
            encounters,
            rounds: config.rounds,
            games_per_round: config.games_per_round.max(1),
            alternate_colors: config.alternate_colors,
            book,
            cursor: 0,
            last_opening: None,
        }
    }

    fn total(&self) -> usize {
        self.encounters.len() * self.games_per_round * self.rounds
    }

    fn opening_for(&mut self, round: usize, encounter: usize) -> Opening {
        match &self.last_opening {
            Some((cached, opening)) if *cached == encounter => opening.clone(),
            _ => {
                let opening = self.book.opening(round, encounter);
                self.last_opening = Some((encounter, opening.clone()));
                opening
            }
        }
    }

    fn next(&mut self) -> Option<Pairing> {
        if self.cursor >= self.total() {
            return None;
        }
        let index = self.cursor;
        self.cursor += 1;

        let game_in_encounter = index % self.games_per_round;
        let encounter = index / self.games_per_round;
        let round = encounter / self.encounters.len();
        let (first, second) = self.encounters[encounter % self.encounters.len()];

        let first_is_white = if self.games_per_round == 2 {
            game_in_encounter == 0
        } else {
            !self.alternate_colors || round % 2 == 0
        };
        let (white, black) = if first_is_white {
            (first, second)
        } else {
            (second, first)
        };

        Some(Pairing {
            white: Arc::clone(&self.engines[white]),
            black: Arc::clone(&self.engines[black]),
            first,
            second,
            first_is_white,
            opening: self.opening_for(round, encounter),
            round_id: round + 1,
            game_id: index + 1,
        })
    }

    fn seek(&mut self, position: usize) {
        self.cursor = position.min(self.total());
    }
}

/// Every unordered pair once per round
pub struct RoundRobin {
    schedule: Schedule,
}

impl RoundRobin {
    pub fn new(
        engines: Vec<Arc<EngineConfiguration>>,
        config: &TournamentConfig,
        book: Arc<dyn OpeningBook>,
    ) -> Self {
        let n = engines.len();
        let mut encounters = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                encounters.push((i, j));
            }
        }
        Self {
            schedule: Schedule::new(engines, encounters, config, book),
        }
    }
}

impl PairingPolicy for RoundRobin {
    fn next(&mut self) -> Option<Pairing> {
        self.schedule.next()
    }

    fn total(&self) -> usize {
        self.schedule.total()
    }

    fn position(&self) -> usize {
        self.schedule.cursor
    }

    fn seek(&mut self, position: usize) {
        self.schedule.seek(position)
    }
}

/// The first `seeds` engines each meet every non-seed once per round
pub struct Gauntlet {
    schedule: Schedule,
}

impl Gauntlet {
    pub fn new(
        engines: Vec<Arc<EngineConfiguration>>,
        seeds: usize,
        config: &TournamentConfig,
        book: Arc<dyn OpeningBook>,
    ) -> Self {
        let n = engines.len();
        let seeds = seeds.min(n);
        let mut encounters = Vec::new();
        for seed in 0..seeds {
            for opponent in seeds..n {
                encounters.push((seed, opponent));
            }
        }
        Self {
            schedule: Schedule::new(engines, encounters, config, book),
        }
    }
}

impl PairingPolicy for Gauntlet {
    fn next(&mut self) -> Option<Pairing> {
        self.schedule.next()
    }

    fn total(&self) -> usize {
        self.schedule.total()
    }

    fn position(&self) -> usize {
        self.schedule.cursor
    }

    fn seek(&mut self, position: usize) {
        self.schedule.seek(position)
    }
}

/// Thread-safe front for a pairing policy
pub struct MatchGenerator {
    policy: Mutex<Box<dyn PairingPolicy>>,
}

impl MatchGenerator {
    /// Wrap `policy`, skipping the first `initial_matchcount` pairings
    pub fn new(mut policy: Box<dyn PairingPolicy>, initial_matchcount: usize) -> Self {
        policy.seek(initial_matchcount);
        Self {
            policy: Mutex::new(policy),
        }
    }

    /// Build the policy named by `config.format`
    pub fn from_config(
        config: &TournamentConfig,
        engines: Vec<Arc<EngineConfiguration>>,
        book: Arc<dyn OpeningBook>,
        initial_matchcount: usize,
    ) -> Self {
        let policy: Box<dyn PairingPolicy> = match config.format {
            TournamentFormat::RoundRobin => Box::new(RoundRobin::new(engines, config, book)),
            TournamentFormat::Gauntlet { seeds } => {
                Box::new(Gauntlet::new(engines, seeds, config, book))
            }
        };
        Self::new(policy, initial_matchcount)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Box<dyn PairingPolicy>> {
        // The cursor only moves after a pairing is fully built.
        self.policy.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Next pairing; each call yields a distinct one
    pub fn next(&self) -> Option<Pairing> {
        self.lock().next()
    }

    pub fn total(&self) -> usize {
        self.lock().total()
    }

    pub fn position(&self) -> usize {
        self.lock().position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::OpeningList;
    use std::collections::HashSet;
    use std::thread;

    fn engines(n: usize) -> Vec<Arc<EngineConfiguration>> {
        (0..n)
            .map(|i| Arc::new(EngineConfiguration::new("/bin/sh").with_name(format!("e{}", i))))
            .collect()
    }

    fn book() -> Arc<dyn OpeningBook> {
        let openings = (0..5)
            .map(|i| Opening::startpos().with_moves(vec![format!("a2a{}", i + 3)]))
            .collect();
        Arc::new(OpeningList::new(openings))
    }

    fn drain(generator: &MatchGenerator) -> Vec<(usize, usize, bool, usize, Opening)> {
        std::iter::from_fn(|| generator.next())
            .map(|p| (p.first, p.second, p.first_is_white, p.game_id, p.opening))
            .collect()
    }

    #[test]
    fn test_round_robin_order() {
        let config = TournamentConfig::default().with_rounds(2);
        let generator = MatchGenerator::from_config(&config, engines(3), book(), 0);
        assert_eq!(generator.total(), 3 * 2 * 2);

        let all = drain(&generator);
        let pairs: Vec<(usize, usize, bool)> = all.iter().map(|g| (g.0, g.1, g.2)).collect();
        assert_eq!(
            &pairs[..6],
            &[
                (0, 1, true),
                (0, 1, false),
                (0, 2, true),
                (0, 2, false),
                (1, 2, true),
                (1, 2, false)
            ]
        );
        // both games of an encounter share the opening
        assert_eq!(all[0].4, all[1].4);
        assert_ne!(all[0].4, all[2].4);
        assert_eq!(all.last().map(|g| g.3), Some(12));
        assert!(generator.next().is_none());
    }

    #[test]
    fn test_single_game_encounters_alternate_by_round() {
        let config = TournamentConfig::default()
            .with_games_per_round(1)
            .with_rounds(3);
        let generator = MatchGenerator::from_config(&config, engines(2), book(), 0);
        let colours: Vec<bool> = drain(&generator).iter().map(|g| g.2).collect();
        assert_eq!(colours, vec![true, false, true]);

        let fixed = config.with_alternate_colors(false);
        let generator = MatchGenerator::from_config(&fixed, engines(2), book(), 0);
        assert!(drain(&generator).iter().all(|g| g.2));
    }

    #[test]
    fn test_gauntlet_encounters() {
        let config = TournamentConfig {
            format: TournamentFormat::Gauntlet { seeds: 1 },
            games_per_round: 1,
            ..Default::default()
        };
        let generator = MatchGenerator::from_config(&config, engines(4), book(), 0);
        let pairs: Vec<(usize, usize)> = drain(&generator).iter().map(|g| (g.0, g.1)).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (0, 3)]);
    }

    #[test]
    fn test_resume_continues_sequence() {
        let config = TournamentConfig::default().with_rounds(3);
        let fresh = drain(&MatchGenerator::from_config(&config, engines(4), book(), 0));
        for k in [0, 1, 7, 17, fresh.len()] {
            let resumed = drain(&MatchGenerator::from_config(&config, engines(4), book(), k));
            let mut joined = fresh[..k].to_vec();
            joined.extend(resumed);
            assert_eq!(joined, fresh, "resume at {}", k);
        }
    }

    #[test]
    fn test_concurrent_next_yields_distinct_pairings() {
        let config = TournamentConfig::default().with_rounds(10);
        let generator = Arc::new(MatchGenerator::from_config(&config, engines(5), book(), 0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let generator = Arc::clone(&generator);
                thread::spawn(move || {
                    let mut ids = Vec::new();
                    while let Some(p) = generator.next() {
                        ids.push(p.game_id);
                    }
                    ids
                })
            })
            .collect();
        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id), "duplicate game {}", id);
            }
        }
        assert_eq!(seen.len(), generator.total());
        assert_eq!(generator.position(), generator.total());
    }
}
