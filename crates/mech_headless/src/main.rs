//! Headless battle runner.
//!
//! This binary plays battles without a user interface, either on autopilot
//! or controlled via JSON on stdin/stdout. Designed for CI testing and
//! replay verification.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p mech_headless
//!
//! # Play one autopilot game
//! cargo run -p mech_headless -- run --scenario lance --seed 7 --replay lance.json
//!
//! # Play many seeds
//! cargo run -p mech_headless -- batch --scenario duel --count 200 --output results/
//!
//! # Check data files
//! cargo run -p mech_headless -- validate --units assets/units assets/scenarios/*.ron
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information
//!
//! See the protocol module for command/response format.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mech_core::dice::SeededDiceRoller;
use mech_core::replay::{Replay, ReplayPlayer};
use mech_core::session::{GameSession, SystemClock};
use mech_core::state::{GameSetup, Side};
use mech_core::summary::BattleSummary;
use mech_headless::{
    batch::{play_game, run_batch, verify_determinism, BatchConfig, DEFAULT_MAX_ACTIONS},
    runner::{HeadlessConfig, HeadlessRunner},
    scenario::Scenario,
    strategies::{Autopilot, Strategy},
    unit_loader::{default_unit_data_dir, TemplateRegistry},
};

#[derive(Parser)]
#[command(name = "mech_headless")]
#[command(about = "Headless BattleTech battle runner for autopilot games and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory of extra RON unit templates
    #[arg(long, global = true)]
    units: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Control a game over JSON lines on stdin/stdout
    Interactive {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "duel")]
        scenario: String,

        /// Dice seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Strategy used by the `auto` command for the player side
        #[arg(long, default_value = "aggressive")]
        player: String,

        /// Strategy used by the `auto` command for the opponent side
        #[arg(long, default_value = "aggressive")]
        opponent: String,
    },

    /// Play a single autopilot game
    Run {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "duel")]
        scenario: String,

        /// Dice seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Player strategy
        #[arg(long, default_value = "aggressive")]
        player: String,

        /// Opponent strategy
        #[arg(long, default_value = "aggressive")]
        opponent: String,

        /// Write the replay here
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Write the event log as JSON lines here
        #[arg(long)]
        log: Option<PathBuf>,
    },

    /// Play a scenario across many seeds
    Batch {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "duel")]
        scenario: String,

        /// Number of games to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel games (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Player strategy
        #[arg(long, default_value = "aggressive")]
        player: String,

        /// Opponent strategy
        #[arg(long, default_value = "aggressive")]
        opponent: String,

        /// Keep a replay of every game under the output directory
        #[arg(long)]
        replays: bool,
    },

    /// Verify determinism by playing the same seed multiple times
    Verify {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "duel")]
        scenario: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Play back a recorded game
    Replay {
        /// Replay file path
        #[arg(short, long)]
        file: PathBuf,

        /// Verify replay produces identical hash
        #[arg(long)]
        verify: bool,

        /// Stop at the end of this turn
        #[arg(long)]
        turn: Option<u32>,
    },

    /// Check unit templates and scenario files
    Validate {
        /// Scenario files to check
        scenarios: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    let registry = load_registry(cli.units.as_deref());

    match cli.command {
        Some(Commands::Interactive {
            scenario,
            seed,
            player,
            opponent,
        }) => cmd_interactive(&registry, &scenario, seed, &player, &opponent),
        Some(Commands::Run {
            scenario,
            seed,
            player,
            opponent,
            replay,
            log,
        }) => cmd_run(&registry, &scenario, seed, &player, &opponent, replay, log),
        Some(Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
            player,
            opponent,
            replays,
        }) => {
            let autopilot = fail_on_err(autopilot(&player, &opponent));
            let config = BatchConfig {
                scenario: scenario_label(&scenario),
                game_count: count,
                parallel_games: parallel,
                seed_start: seed,
                max_actions: DEFAULT_MAX_ACTIONS,
                autopilot,
                replay_dir: replays.then(|| output.join("replays")),
            };
            cmd_batch(&registry, &scenario, config, &output);
        }
        Some(Commands::Verify {
            scenario,
            seed,
            runs,
        }) => cmd_verify(&registry, &scenario, seed, runs),
        Some(Commands::Replay { file, verify, turn }) => cmd_replay(&file, verify, turn),
        Some(Commands::Validate { scenarios }) => cmd_validate(&registry, cli.units.as_deref(), &scenarios),
        None => {
            // Default: interactive mode
            cmd_interactive(&registry, "duel", 0, "aggressive", "aggressive");
        }
    }
}

fn fail_on_err<T>(result: Result<T, String>) -> T {
    result.unwrap_or_else(|message| {
        eprintln!("FATAL: {message}");
        std::process::exit(1);
    })
}

/// Standard templates plus whatever the unit directory adds.
fn load_registry(units: Option<&Path>) -> TemplateRegistry {
    let mut registry = TemplateRegistry::standard();
    let dir = units.map(Path::to_path_buf).or_else(default_unit_data_dir);
    if let Some(dir) = dir {
        match registry.load_from_directory(&dir) {
            Ok((loaded, failed)) => tracing::info!(
                dir = %dir.display(),
                loaded = loaded.len(),
                failed = failed.len(),
                "Loaded unit templates"
            ),
            Err(e) => tracing::warn!("Unit templates not loaded: {}", e),
        }
    }
    registry
}

fn autopilot(player: &str, opponent: &str) -> Result<Autopilot, String> {
    let pick = |name: &str| {
        Strategy::from_name(name).ok_or_else(|| {
            format!(
                "unknown strategy '{name}' (expected one of {})",
                Strategy::preset_names().join(", ")
            )
        })
    };
    Ok(Autopilot {
        player: pick(player)?,
        opponent: pick(opponent)?,
    })
}

fn scenario_label(name_or_path: &str) -> String {
    Path::new(name_or_path)
        .file_stem()
        .map_or_else(|| name_or_path.to_string(), |s| s.to_string_lossy().into_owned())
}

fn load_setup(registry: &TemplateRegistry, name_or_path: &str, game_id: String) -> Result<GameSetup, String> {
    let scenario = Scenario::resolve(name_or_path).map_err(|e| e.to_string())?;
    tracing::info!(scenario = %scenario.name, units = scenario.units.len(), "Loaded scenario");
    scenario.to_setup(game_id, registry).map_err(|e| e.to_string())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            let mut stdout = io::stdout().lock();
            let _ = writeln!(stdout, "{json}");
        }
        Err(e) => tracing::error!("Cannot serialize output: {}", e),
    }
}

fn print_summary(summary: &BattleSummary) {
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATTLE COMPLETE: {}", summary.game_id);
    eprintln!("{}", "=".repeat(50));
    eprintln!("Turns: {}", summary.turns);
    eprintln!("End reason: {:?}", summary.end_reason);
    eprintln!(
        "Winner: {}",
        summary.winner.map_or_else(|| "draw".to_string(), |side| format!("{side:?}"))
    );
    for (id, unit) in &summary.units {
        eprintln!(
            "  #{id} {:<12} {:?}: dealt {:>3}, took {:>3}, kills {:?}{}",
            unit.name,
            unit.side,
            unit.damage_dealt,
            unit.damage_received,
            unit.kills,
            unit.destroyed
                .map_or_else(String::new, |cause| format!(", destroyed ({cause:?})"))
        );
    }
}

/// Control a game over stdin/stdout
fn cmd_interactive(registry: &TemplateRegistry, scenario: &str, seed: u64, player: &str, opponent: &str) {
    tracing::info!("Starting interactive session");

    let setup = fail_on_err(load_setup(registry, scenario, format!("{}-{seed}", scenario_label(scenario))));
    let autopilot = fail_on_err(autopilot(player, opponent));
    let session = fail_on_err(
        GameSession::new(setup, SeededDiceRoller::new(seed), SystemClock).map_err(|e| e.to_string()),
    );

    let mut runner = HeadlessRunner::new(
        session,
        HeadlessConfig {
            seed: Some(seed),
            autopilot,
        },
    );
    if let Err(e) = runner.run(io::stdin().lock(), io::stdout().lock()) {
        eprintln!("FATAL: {e}");
        std::process::exit(1);
    }
}

/// Play a single autopilot game
fn cmd_run(
    registry: &TemplateRegistry,
    scenario: &str,
    seed: u64,
    player: &str,
    opponent: &str,
    replay: Option<PathBuf>,
    log: Option<PathBuf>,
) {
    let setup = fail_on_err(load_setup(registry, scenario, format!("{}-{seed}", scenario_label(scenario))));
    let autopilot = fail_on_err(autopilot(player, opponent));
    tracing::info!(seed, player, opponent, "Playing game");

    let session = fail_on_err(play_game(setup, &autopilot, seed, DEFAULT_MAX_ACTIONS));

    if let Some(path) = replay {
        let replay = Replay::from_log(session.log(), Some(seed));
        fail_on_err(replay.save(&path).map_err(|e| e.to_string()));
        tracing::info!(path = %path.display(), events = replay.event_count(), "Replay saved");
    }
    if let Some(path) = log {
        fail_on_err(session.log().save(&path).map_err(|e| e.to_string()));
        tracing::info!(path = %path.display(), "Event log saved");
    }

    let summary = BattleSummary::from_events(session.events());
    print_summary(&summary);
    print_json(&summary);
}

/// Play a scenario across many seeds
fn cmd_batch(registry: &TemplateRegistry, scenario: &str, config: BatchConfig, output: &Path) {
    let setup = fail_on_err(load_setup(registry, scenario, config.scenario.clone()));

    tracing::info!(
        scenario = %config.scenario,
        count = config.game_count,
        parallel = config.parallel_games,
        seed = config.seed_start,
        output = %output.display(),
        player = %config.autopilot.player.name,
        opponent = %config.autopilot.opponent.name,
        "Batch configuration"
    );

    if let Err(e) = std::fs::create_dir_all(output) {
        tracing::error!(error = %e, path = %output.display(), "Failed to create output directory");
        eprintln!(
            "FATAL: Cannot create output directory '{}': {}",
            output.display(),
            e
        );
        std::process::exit(1);
    }

    let results = run_batch(&setup, config);

    let results_path = output.join("batch_results.json");
    if let Err(e) = results.save(&results_path) {
        tracing::error!(error = %e, path = %results_path.display(), "Failed to save results");
        eprintln!("FATAL: Failed to save results: {}", e);
        std::process::exit(1);
    }

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Games played: {}", results.games.len());
    if !results.errors.is_empty() {
        eprintln!("Games failed: {}", results.errors.len());
    }
    for side in Side::ALL {
        eprintln!("{:?} win rate: {:.1}%", side, summary.win_rate(side) * 100.0);
    }
    eprintln!("Draws: {}", summary.draws);
    eprintln!("Average turns: {:.1}", summary.average_turns);
    for (reason, count) in &summary.end_reasons {
        eprintln!("  {reason}: {count}");
    }
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!("Results: {}", results_path.display());

    if !results.errors.is_empty() {
        std::process::exit(1);
    }
}

/// Verify determinism by playing the same seed multiple times
fn cmd_verify(registry: &TemplateRegistry, scenario: &str, seed: u64, runs: u32) {
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario,
        seed,
        runs
    );

    let setup = fail_on_err(load_setup(registry, scenario, scenario_label(scenario)));
    match verify_determinism(&setup, &Autopilot::default(), seed, runs) {
        Ok(true) => eprintln!("PASS: All {} runs produced identical logs", runs.max(2)),
        Ok(false) => {
            eprintln!("FAIL: Non-determinism detected!");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("FAIL: Error during verification: {}", e);
            std::process::exit(1);
        }
    }
}

/// Play back a recorded game
fn cmd_replay(file: &Path, verify: bool, turn: Option<u32>) {
    tracing::info!("Loading replay: {}", file.display());

    let replay = match Replay::load(file) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to load replay: {}", e);
            std::process::exit(1);
        }
    };

    eprintln!("Loaded replay:");
    eprintln!("  Game: {}", replay.game_id);
    eprintln!(
        "  Seed: {}",
        replay.seed.map_or_else(|| "unknown".to_string(), |s| s.to_string())
    );
    eprintln!("  Events: {}", replay.event_count());
    eprintln!("  Turns: {}", replay.final_turn());

    let mut player = ReplayPlayer::new(replay);

    if verify {
        eprintln!("Verifying replay...");
        match player.verify() {
            Ok(true) => {
                eprintln!("PASS: Replay verification successful");
                eprintln!("  Hash: {:016x}", player.replay().final_hash);
            }
            Ok(false) => {
                eprintln!("FAIL: Replay produced different hash!");
                eprintln!("  Expected: {:016x}", player.replay().final_hash);
                eprintln!("  Actual:   {:016x}", player.state().state_hash());
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("FAIL: Error during verification: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    match turn {
        Some(turn) => player.advance_to_turn_end(turn),
        None => while player.advance() {},
    }
    eprintln!(
        "Stopped at event {} ({:.0}%)",
        player.position(),
        player.progress_percent()
    );
    eprintln!("State hash: {:016x}", player.state().state_hash());

    let events = &player.replay().events[..player.position()];
    let summary = BattleSummary::from_events(events);
    print_summary(&summary);
    print_json(&mech_headless::protocol::StateView::of(player.state()));
}

/// Check unit templates and scenario files
fn cmd_validate(registry: &TemplateRegistry, units: Option<&Path>, scenarios: &[PathBuf]) {
    let mut failures = 0;

    if let Some(dir) = units {
        let mut scratch = TemplateRegistry::new();
        match scratch.load_from_directory(dir) {
            Ok((loaded, failed)) => {
                for id in &loaded {
                    eprintln!("OK    unit {id}");
                }
                for error in &failed {
                    eprintln!("FAIL  {error}");
                }
                failures += failed.len();
            }
            Err(e) => {
                eprintln!("FAIL  {e}");
                failures += 1;
            }
        }
    }

    for path in scenarios {
        let result = Scenario::load(path)
            .map_err(|e| e.to_string())
            .and_then(|scenario| {
                scenario
                    .to_setup(scenario_label(&path.to_string_lossy()), registry)
                    .map(|setup| (scenario.name, setup.units.len()))
                    .map_err(|e| e.to_string())
            });
        match result {
            Ok((name, units)) => eprintln!("OK    scenario {} ({name}, {units} units)", path.display()),
            Err(e) => {
                eprintln!("FAIL  scenario {}: {e}", path.display());
                failures += 1;
            }
        }
    }

    if failures > 0 {
        eprintln!("{failures} problem(s) found");
        std::process::exit(1);
    }
    eprintln!("All data valid");
}
