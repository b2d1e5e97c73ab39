//! Tournament command - play a round-robin or gauntlet between engines
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: build_config(), build_tournament(), report_results()
//! - Level 3: parse_engines(), adjudication(), load_book()
//! - Level 4: formatting utilities

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use ucimatch_engine::{CancellationToken, EngineConfiguration};
use ucimatch_tournament::{
    AdjudicationConfig, CacheConfig, DrawRule, GameRecord, GameSettings, JsonLinesSink,
    JsonSnapshotStore, OpeningList, OverflowPolicy, ResignRule, Standing, Tournament,
    TournamentConfig, TournamentFormat, TournamentObserver, TournamentSnapshot,
    DEFAULT_MAX_MOVES,
};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    RoundRobin,
    Gauntlet,
}

#[derive(Args)]
pub struct TournamentArgs {
    /// Engine as key=value settings, e.g. "cmd=./sf name=sf tc=10+0.1 option.Hash=16"
    #[arg(long = "engine", value_name = "SPEC")]
    pub engine: Vec<String>,

    /// Settings applied to every engine before its own
    #[arg(long, value_name = "SPEC")]
    pub each: Option<String>,

    /// Tournament format
    #[arg(long, value_enum, default_value = "round-robin")]
    pub format: FormatArg,

    /// Number of gauntlet seeds (the first engines listed)
    #[arg(long, default_value = "1")]
    pub seeds: usize,

    /// Number of rounds
    #[arg(long, default_value = "1")]
    pub rounds: usize,

    /// Games per encounter (1 or 2, the second with colours swapped)
    #[arg(long, default_value = "2")]
    pub games: usize,

    /// Games played in parallel
    #[arg(long, default_value = "1")]
    pub concurrency: usize,

    /// Do not alternate colours between rounds for single-game encounters
    #[arg(long)]
    pub no_swap: bool,

    /// Opening file, one FEN or move list per line
    #[arg(long, value_name = "FILE")]
    pub openings: Option<PathBuf>,

    /// Shuffle the opening file
    #[arg(long)]
    pub random_openings: bool,

    /// Seed for the opening shuffle
    #[arg(long)]
    pub seed: Option<u64>,

    /// Append one JSON record per game to this file
    #[arg(long, value_name = "FILE")]
    pub records: Option<PathBuf>,

    /// Save resumable state to this file after every game
    #[arg(long, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Resume from the state file
    #[arg(long, requires = "state")]
    pub resume: bool,

    /// Resign after this many consecutive losing scores
    #[arg(long, requires = "resign_score")]
    pub resign_movecount: Option<u32>,

    /// Losing score threshold for resignation, in centipawns
    #[arg(long, requires = "resign_movecount")]
    pub resign_score: Option<i32>,

    /// Full move from which draw adjudication applies
    #[arg(long, default_value = "0")]
    pub draw_movenumber: u32,

    /// Moves per side with a near-zero score before a draw is declared
    #[arg(long, requires = "draw_score")]
    pub draw_movecount: Option<u32>,

    /// Near-zero score threshold for draws, in centipawns
    #[arg(long, requires = "draw_movecount")]
    pub draw_score: Option<i32>,

    /// Declare a draw after this many full moves
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_MOVES,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_moves: u32,

    /// Log standings every N games (0 = never)
    #[arg(long, default_value = "10")]
    pub report_interval: usize,

    /// A search without a score is an illegal response
    #[arg(long)]
    pub require_score: bool,

    /// Wait for bestmove from an engine without a clock, in milliseconds
    #[arg(long, default_value = "60000")]
    pub unclocked_wait_ms: u64,

    /// Sessions kept per engine (default: one per parallel game)
    #[arg(long)]
    pub cache_capacity: Option<usize>,

    /// Wait for a free session instead of starting extra processes
    #[arg(long)]
    pub block_on_capacity: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run tournament command
///
/// 1. Build and validate the configuration
/// 2. Wire the collaborators and the interrupt handler
/// 3. Play every game
/// 4. Report results
pub fn run(args: TournamentArgs) -> Result<ExitCode> {
    let config = build_config(&args)?;

    tracing::info!(
        "Starting {:?} with {} engines ({} rounds, {} parallel)",
        config.format,
        config.engines.len(),
        config.rounds,
        config.concurrency
    );

    let cancel = CancellationToken::new();
    install_interrupt_handler(&cancel);

    let progress = Arc::new(ProgressObserver::new());
    let tournament = build_tournament(&args, config, cancel.clone())?
        .with_observer(Arc::clone(&progress) as Arc<dyn TournamentObserver>);

    let snapshot = tournament.run().context("tournament setup failed")?;
    progress.finish();

    report_results(&snapshot, args.json);

    if cancel.is_cancelled() {
        Ok(ExitCode::from(130))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Turn command line arguments into a tournament configuration
fn build_config(args: &TournamentArgs) -> Result<TournamentConfig> {
    let engines = parse_engines(&args.engine, args.each.as_deref())?;

    let format = match args.format {
        FormatArg::RoundRobin => TournamentFormat::RoundRobin,
        FormatArg::Gauntlet => TournamentFormat::Gauntlet { seeds: args.seeds },
    };

    let config = TournamentConfig {
        engines,
        format,
        rounds: args.rounds,
        games_per_round: args.games,
        alternate_colors: !args.no_swap,
        concurrency: args.concurrency,
        cache: CacheConfig {
            capacity: args.cache_capacity,
            overflow: if args.block_on_capacity {
                OverflowPolicy::Block
            } else {
                OverflowPolicy::Spawn
            },
        },
        game: GameSettings {
            unclocked_wait_ms: args.unclocked_wait_ms,
            adjudication: adjudication(args),
            require_score: args.require_score,
        },
        report_interval: args.report_interval,
    };

    config.validate()?;
    Ok(config)
}

/// Attach openings, records, state and cancellation
fn build_tournament(
    args: &TournamentArgs,
    config: TournamentConfig,
    cancel: CancellationToken,
) -> Result<Tournament> {
    let mut tournament = Tournament::new(config)
        .with_cancellation(cancel)
        .with_book(Arc::new(load_book(args)?));

    if let Some(path) = &args.records {
        tournament = tournament.with_records(Arc::new(JsonLinesSink::create(path)?));
    }

    if let Some(path) = &args.state {
        if args.resume {
            let snapshot = JsonSnapshotStore::load(path)
                .with_context(|| format!("Failed to load state: {}", path.display()))?;
            tracing::info!(
                "Resuming after {} completed games from {}",
                snapshot.completed,
                path.display()
            );
            tournament = tournament.resume_from(snapshot);
        }
        tournament = tournament.with_snapshots(Arc::new(JsonSnapshotStore::new(path)));
    }

    Ok(tournament)
}

/// Report tournament results
fn report_results(snapshot: &TournamentSnapshot, json: bool) {
    if json {
        print_json_results(snapshot);
    } else {
        print_text_results(snapshot);
    }
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

/// Parse every `--engine` spec, with `--each` settings applied first
fn parse_engines(specs: &[String], each: Option<&str>) -> Result<Vec<EngineConfiguration>> {
    if specs.len() < 2 {
        bail!("at least two --engine options are required, got {}", specs.len());
    }
    specs
        .iter()
        .map(|spec| {
            let full = match each {
                Some(each) => format!("{} {}", each, spec),
                None => spec.clone(),
            };
            full.parse::<EngineConfiguration>()
                .with_context(|| format!("Invalid engine '{}'", spec))
        })
        .collect()
}

/// Adjudication rules from the command line
fn adjudication(args: &TournamentArgs) -> AdjudicationConfig {
    AdjudicationConfig {
        resign: args
            .resign_movecount
            .zip(args.resign_score)
            .map(|(move_count, score_cp)| ResignRule {
                move_count,
                score_cp,
            }),
        draw: args
            .draw_movecount
            .zip(args.draw_score)
            .map(|(move_count, score_cp)| DrawRule {
                move_number: args.draw_movenumber,
                move_count,
                score_cp,
            }),
        max_moves: Some(args.max_moves),
    }
}

/// Opening list from `--openings`, shuffled when asked
fn load_book(args: &TournamentArgs) -> Result<OpeningList> {
    let Some(path) = &args.openings else {
        return Ok(OpeningList::default());
    };
    let book = OpeningList::from_file(path)?;
    tracing::info!("Loaded {} openings from {}", book.len(), path.display());
    if args.random_openings {
        let seed = args.seed.unwrap_or_else(rand::random);
        tracing::info!("Shuffling openings with seed {}", seed);
        return Ok(book.shuffled(seed));
    }
    Ok(book)
}

/// Ctrl-C stops new games and interrupts the running ones
fn install_interrupt_handler(cancel: &CancellationToken) {
    let cancel = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
        tracing::warn!("Failed to install Ctrl-C handler: {}", e);
    }
}

// ============================================================================
// LEVEL 4 - UTILITIES
// ============================================================================

/// Progress bar fed by the tournament
struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) =
            ProgressStyle::with_template("{bar:40} {pos}/{len} games {elapsed_precise} {msg}")
        {
            bar.set_style(style);
        }
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl TournamentObserver for ProgressObserver {
    fn game_finished(&self, record: &GameRecord, completed: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(completed as u64);
        self.bar.set_message(format!(
            "{} {} {}",
            record.result.white,
            record.result.result_tag(),
            record.result.black
        ));
    }
}

fn format_elo(standing: &Standing) -> String {
    match standing.elo_difference() {
        Some(elo) => format!("{:+.0}", elo),
        None => "-".to_string(),
    }
}

/// Print results as JSON
fn print_json_results(snapshot: &TournamentSnapshot) {
    #[derive(serde::Serialize)]
    struct JsonOutput<'a> {
        completed: usize,
        standings: Vec<Standing>,
        snapshot: &'a TournamentSnapshot,
    }

    let output = JsonOutput {
        completed: snapshot.completed,
        standings: snapshot.scoreboard.standings(),
        snapshot,
    };

    if let Ok(json) = serde_json::to_string_pretty(&output) {
        println!("{}", json);
    }
}

/// Print results as text
fn print_text_results(snapshot: &TournamentSnapshot) {
    println!("\n=== Tournament Results ===");
    println!("Games played: {}", snapshot.completed);

    println!(
        "\n{:<4} {:<20} {:>7} {:>6} {:>5} {:>5} {:>5} {:>8} {:>6}",
        "Rank", "Engine", "Points", "Games", "W", "L", "D", "Forfeits", "Elo"
    );
    for (rank, s) in snapshot.scoreboard.standings().iter().enumerate() {
        println!(
            "{:<4} {:<20} {:>7.1} {:>6} {:>5} {:>5} {:>5} {:>8} {:>6}",
            rank + 1,
            s.name,
            s.points,
            s.games,
            s.wins,
            s.losses,
            s.draws,
            s.forfeits,
            format_elo(s)
        );
    }

    println!("\n=== Pairs ===");
    for pair in &snapshot.scoreboard.pairs {
        let st = &pair.stats;
        println!(
            "{} vs {}: {:.1} - {:.1} (+{} -{} ={}, crashes {}, timeouts {}, illegal {})",
            pair.first,
            pair.second,
            st.first_points(),
            st.second_points(),
            st.wins,
            st.losses,
            st.draws,
            st.crashes,
            st.timeouts,
            st.illegal_responses
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: TournamentArgs,
    }

    fn parse(argv: &[&str]) -> TournamentArgs {
        TestCli::parse_from(std::iter::once("ucimatch").chain(argv.iter().copied())).args
    }

    #[test]
    fn test_each_settings_apply_to_every_engine() {
        let engines = parse_engines(
            &["cmd=/bin/a".to_string(), "cmd=/bin/b depth=3".to_string()],
            Some("depth=5 option.Hash=16"),
        )
        .unwrap();
        assert_eq!(engines[0].limits.depth, Some(5));
        assert_eq!(engines[1].limits.depth, Some(3));
        assert_eq!(engines[1].options[0].name, "Hash");
    }

    #[test]
    fn test_zero_move_limit_is_rejected() {
        let argv = ["ucimatch", "--engine", "cmd=/bin/a", "--max-moves", "0"];
        assert!(TestCli::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_needs_two_engines() {
        assert!(parse_engines(&["cmd=/bin/a".to_string()], None).is_err());
    }

    #[test]
    fn test_adjudication_flags() {
        let args = parse(&[
            "--resign-movecount",
            "3",
            "--resign-score",
            "600",
            "--draw-movecount",
            "8",
            "--draw-score",
            "5",
            "--draw-movenumber",
            "30",
            "--max-moves",
            "200",
        ]);
        let adj = adjudication(&args);
        assert_eq!(
            adj.resign,
            Some(ResignRule {
                move_count: 3,
                score_cp: 600
            })
        );
        assert_eq!(
            adj.draw,
            Some(DrawRule {
                move_number: 30,
                move_count: 8,
                score_cp: 5
            })
        );
        assert_eq!(adj.max_moves, Some(200));
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--engine", "cmd=/bin/a", "--engine", "cmd=/bin/b"]);
        assert_eq!(args.engine.len(), 2);
        assert_eq!(args.format, FormatArg::RoundRobin);
        assert_eq!(args.games, 2);
        assert_eq!(args.concurrency, 1);
        assert!(!args.resume);
        assert_eq!(args.max_moves, DEFAULT_MAX_MOVES);
        assert_eq!(adjudication(&args), AdjudicationConfig::default());
    }
}
