//! Batch game runner.
//!
//! Plays one scenario across a range of seeds in parallel using rayon,
//! collecting outcomes and final hashes, and optionally saving every game
//! as a replay.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use mech_core::dice::SeededDiceRoller;
use mech_core::events::GameEndReason;
use mech_core::replay::Replay;
use mech_core::session::{Action, GameSession, ManualClock};
use mech_core::state::{GameSetup, GameStatus, Side};
use mech_core::summary::BattleSummary;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::strategies::Autopilot;

/// Session type used for autopilot games: seeded dice and a manual clock,
/// so the whole log is a function of the seed.
pub type AutoSession = GameSession<SeededDiceRoller, ManualClock>;

/// Upper bound on actions per game before it is called off.
pub const DEFAULT_MAX_ACTIONS: u32 = 5_000;

/// Play `setup` with `autopilot` on both sides until the game ends.
///
/// A game that is still running after `max_actions` actions is ended as
/// abandoned, so every returned session is over.
pub fn play_game(setup: GameSetup, autopilot: &Autopilot, seed: u64, max_actions: u32) -> Result<AutoSession, String> {
    let mut session = GameSession::new(setup, SeededDiceRoller::new(seed), ManualClock::new(0, 1))
        .map_err(|e| e.to_string())?;

    let mut actions = 0;
    while !session.is_over() {
        let next = autopilot.next_action(session.state());
        let Some(action) = next.filter(|_| actions < max_actions) else {
            warn!(seed, actions, "autopilot stopped before the game ended, abandoning");
            session
                .submit(Action::EndGame {
                    reason: GameEndReason::Abandoned,
                    winner: None,
                })
                .map_err(|e| e.reason())?;
            break;
        };
        session.submit(action).map_err(|e| format!("autopilot action rejected: {}", e.reason()))?;
        actions += 1;
    }
    debug!(seed, actions, events = session.events().len(), "game finished");
    Ok(session)
}

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Scenario label used in game ids and results
    pub scenario: String,
    /// Number of games to run
    pub game_count: u32,
    /// Maximum parallel games (0 = use rayon default)
    pub parallel_games: u32,
    /// Starting seed for deterministic runs
    pub seed_start: u64,
    /// Maximum actions per game
    pub max_actions: u32,
    /// Autopilot for both sides
    pub autopilot: Autopilot,
    /// Directory for per-game replays, if they should be kept
    pub replay_dir: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: "duel".to_string(),
            game_count: 100,
            parallel_games: 0,
            seed_start: 0,
            max_actions: DEFAULT_MAX_ACTIONS,
            autopilot: Autopilot::default(),
            replay_dir: None,
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario
    pub fn new(scenario: &str, game_count: u32) -> Self {
        Self {
            scenario: scenario.to_string(),
            game_count,
            ..Default::default()
        }
    }

    /// Set seed start
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set strategies
    pub fn with_autopilot(mut self, autopilot: Autopilot) -> Self {
        self.autopilot = autopilot;
        self
    }

    /// Keep a replay of every game
    pub fn with_replays(mut self, dir: PathBuf) -> Self {
        self.replay_dir = Some(dir);
        self
    }
}

/// Outcome of one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Dice seed
    pub seed: u64,
    /// Why it ended
    pub end_reason: Option<GameEndReason>,
    /// Winner, `None` for a draw
    pub winner: Option<Side>,
    /// Last turn reached
    pub turns: u32,
    /// Events in the log
    pub events: usize,
    /// Hash of the final derived state
    pub final_hash: u64,
    /// Units lost per side
    pub losses: BTreeMap<Side, usize>,
    /// Damage dealt per side
    pub damage: BTreeMap<Side, u32>,
}

impl GameRecord {
    /// Record a finished session.
    pub fn from_session(session: &AutoSession, seed: u64) -> Self {
        let summary = BattleSummary::from_events(session.events());
        let state = session.state();
        let (end_reason, winner) = match state.status {
            GameStatus::Ended { reason, winner } => (Some(reason), winner),
            _ => (None, None),
        };
        Self {
            seed,
            end_reason,
            winner,
            turns: state.turn,
            events: session.events().len(),
            final_hash: state.state_hash(),
            losses: Side::ALL.into_iter().map(|s| (s, summary.losses(s).len())).collect(),
            damage: Side::ALL.into_iter().map(|s| (s, summary.damage_dealt_by(s))).collect(),
        }
    }
}

/// Aggregate over a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Games that finished
    pub total_games: u32,
    /// Wins per side
    pub wins: BTreeMap<Side, u32>,
    /// Games without a winner
    pub draws: u32,
    /// Games per end reason
    pub end_reasons: BTreeMap<String, u32>,
    /// Mean turns per game
    pub average_turns: f64,
}

impl BatchSummary {
    /// Tally a set of records.
    pub fn from_games(games: &[GameRecord]) -> Self {
        let mut summary = Self {
            total_games: games.len() as u32,
            ..Self::default()
        };
        for game in games {
            match game.winner {
                Some(side) => *summary.wins.entry(side).or_insert(0) += 1,
                None => summary.draws += 1,
            }
            let reason = game
                .end_reason
                .map_or_else(|| "unfinished".to_string(), |r| format!("{r:?}"));
            *summary.end_reasons.entry(reason).or_insert(0) += 1;
        }
        if !games.is_empty() {
            summary.average_turns =
                games.iter().map(|g| f64::from(g.turns)).sum::<f64>() / f64::from(summary.total_games);
        }
        summary
    }

    /// Share of finished games won by `side`.
    pub fn win_rate(&self, side: Side) -> f64 {
        if self.total_games == 0 {
            return 0.0;
        }
        f64::from(self.wins.get(&side).copied().unwrap_or(0)) / f64::from(self.total_games)
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual game outcomes, in seed order
    pub games: Vec<GameRecord>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Error during batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Game index
    pub game_index: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Progress tracking for batch runs
#[derive(Debug)]
pub struct BatchProgress {
    /// Total games
    pub total: u32,
    /// Completed games
    completed: AtomicU32,
    /// Start time
    start_time: Instant,
}

impl BatchProgress {
    /// Create new progress tracker
    pub fn new(total: u32) -> Self {
        Self {
            total,
            completed: AtomicU32::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a completed game, returning the new count
    pub fn record_completion(&self) -> u32 {
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get current completion count
    pub fn current(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        f64::from(self.current()) / f64::from(self.total.max(1)) * 100.0
    }

    /// Get estimated time remaining
    pub fn eta(&self) -> Duration {
        let completed = self.current();
        if completed == 0 {
            return Duration::from_secs(0);
        }
        let per_game = self.start_time.elapsed().as_secs_f64() / f64::from(completed);
        Duration::from_secs_f64(per_game * f64::from(self.total.saturating_sub(completed)))
    }
}

fn run_single_game(setup: &GameSetup, seed: u64, config: &BatchConfig) -> Result<GameRecord, String> {
    let mut setup = setup.clone();
    setup.game_id = format!("{}-{seed}", config.scenario);
    let session = play_game(setup, &config.autopilot, seed, config.max_actions)?;

    if let Some(dir) = &config.replay_dir {
        let path = dir.join(format!("{}-{seed}.json", config.scenario));
        Replay::from_log(session.log(), Some(seed))
            .save(&path)
            .map_err(|e| format!("saving {}: {e}", path.display()))?;
    }
    Ok(GameRecord::from_session(&session, seed))
}

/// Run a batch of games
pub fn run_batch(setup: &GameSetup, config: BatchConfig) -> BatchResults {
    let start = Instant::now();
    let progress = BatchProgress::new(config.game_count);

    info!(
        "Starting batch run: {} games of '{}'",
        config.game_count, config.scenario
    );

    if let Some(dir) = &config.replay_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Cannot create replay directory {:?}: {}", dir, e);
        }
    }

    let run = || -> Vec<Result<GameRecord, BatchError>> {
        (0..config.game_count)
            .into_par_iter()
            .map(|i| {
                let seed = config.seed_start.wrapping_add(u64::from(i));
                let result = run_single_game(setup, seed, &config);
                let completed = progress.record_completion();
                if completed % 10 == 0 {
                    debug!(
                        "Progress: {}/{} ({:.0}%, eta {}s)",
                        completed,
                        config.game_count,
                        progress.percentage(),
                        progress.eta().as_secs()
                    );
                }
                result.map_err(|message| {
                    warn!("Game {} failed: {}", i, message);
                    BatchError {
                        game_index: i,
                        seed,
                        message,
                    }
                })
            })
            .collect()
    };

    // A local pool so repeated batches can pick their own width
    let results = if config.parallel_games > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games as usize)
            .build()
        {
            Ok(pool) => pool.install(run),
            Err(e) => {
                warn!("Falling back to the global pool: {}", e);
                run()
            }
        }
    } else {
        run()
    };

    let (games, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let games: Vec<GameRecord> = games.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} games in {:.1}s ({} errors)",
        games.len(),
        duration_seconds,
        errors.len()
    );

    BatchResults {
        config,
        games,
        summary,
        duration_seconds,
        errors,
    }
}

/// Verify determinism by playing the same seed several times, in parallel,
/// and comparing whole logs.
pub fn verify_determinism(setup: &GameSetup, autopilot: &Autopilot, seed: u64, runs: u32) -> Result<bool, String> {
    let logs: Vec<Result<AutoSession, String>> = (0..runs.max(2))
        .into_par_iter()
        .map(|_| play_game(setup.clone(), autopilot, seed, DEFAULT_MAX_ACTIONS))
        .collect();
    let logs: Vec<AutoSession> = logs.into_iter().collect::<Result<_, _>>()?;

    let first = &logs[0];
    let deterministic = logs.iter().all(|session| {
        session.events() == first.events() && session.state().state_hash() == first.state().state_hash()
    });
    if !deterministic {
        warn!(seed, "runs diverged");
    }
    Ok(deterministic)
}
