//! Headless battle runner for autopilot games and CI verification.
//!
//! This crate drives `mech_core` sessions without any user interface.
//! It provides:
//!
//! - **Scenarios**: RON battlefields and unit placements ([`scenario`])
//! - **Templates**: built-in and RON unit designs ([`unit_loader`])
//! - **Autopilot**: legality-only strategies for both sides ([`strategies`])
//! - **Batch runs**: many seeds in parallel with outcome tallies ([`batch`])
//! - **Interactive play**: a JSON-lines protocol on stdin/stdout ([`runner`])
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from a controller (submit, auto, query, ...)
//! - **stdout**: Events, snapshots and rejections (JSON)
//! - **stderr**: Logs (human-readable)
//!
//! See [`protocol`] module for the full command/response format.
//!
//! # Example
//!
//! ```bash
//! # Play interactively
//! echo '{"cmd":"auto","count":50}' | cargo run -p mech_headless
//!
//! # One autopilot game, saving the replay
//! cargo run -p mech_headless -- run --scenario lance --seed 7 --replay lance.json
//!
//! # Verify a replay
//! cargo run -p mech_headless -- replay --file lance.json --verify
//! ```

pub mod batch;
pub mod protocol;
pub mod runner;
pub mod scenario;
pub mod strategies;
pub mod unit_loader;

pub use batch::{play_game, run_batch, verify_determinism, BatchConfig, BatchResults};
pub use protocol::{Command, Response};
pub use runner::{HeadlessConfig, HeadlessRunner};
pub use scenario::{Scenario, ScenarioError};
pub use strategies::{Autopilot, Strategy};
pub use unit_loader::{default_unit_data_dir, TemplateRegistry, UnitLoadError};
