//! # Mech Core
//!
//! Deterministic combat resolution and event-sourced game state for
//! hex-map BattleTech battles.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No network or wall-clock dependence outside [`session::Clock`]
//! - No randomness outside an injected [`dice::DiceRoller`]
//!
//! This separation enables:
//! - Authoritative servers and thin clients folding the same log
//! - Headless batch runs
//! - Replay and divergence detection
//!
//! ## Crate Structure
//!
//! - [`hex`], [`map`] - Hex geometry, terrain and line of sight
//! - [`unit`], [`data`] - Unit definitions, critical slots and templates
//! - [`attack`], [`hit_location`], [`damage`], [`critical`] - Weapon fire
//! - [`heat`], [`piloting`], [`movement`] - Heat scale, PSRs, movement costs
//! - [`events`], [`reducer`], [`state`] - Event sourcing
//! - [`legality`], [`resolver`], [`session`] - Validating and resolving actions
//! - [`event_log`], [`replay`], [`summary`] - Persistence and playback

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod attack;
pub mod config;
pub mod critical;
pub mod damage;
pub mod data;
pub mod dice;
pub mod error;
pub mod event_log;
pub mod events;
pub mod heat;
pub mod hex;
pub mod hit_location;
pub mod legality;
pub mod map;
pub mod movement;
pub mod piloting;
pub mod reducer;
pub mod replay;
pub mod resolver;
pub mod session;
pub mod state;
pub mod summary;
pub mod unit;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::RulesConfig;
    pub use crate::data::{standard_template, standard_templates, UnitTemplate};
    pub use crate::dice::{DiceRoll, DiceRoller, ScriptedDiceRoller, SeededDiceRoller};
    pub use crate::error::{ActionError, GameError, Result};
    pub use crate::event_log::EventLog;
    pub use crate::events::{
        AttackDeclaration, GameEndReason, GameEvent, GameEventPayload, GameEventType, GamePhase,
    };
    pub use crate::hex::{HexCoordinate, HexDirection, MapConfig};
    pub use crate::map::BattleMap;
    pub use crate::movement::{MovementDeclaration, MovementType};
    pub use crate::reducer::{apply_event, derive_state};
    pub use crate::replay::{Replay, ReplayPlayer};
    pub use crate::session::{seeded_session, Action, Clock, GameSession, ManualClock, SystemClock};
    pub use crate::state::{GameSetup, GameState, GameStatus, Side, UnitId, UnitPosition, UnitSetup};
    pub use crate::summary::BattleSummary;
    pub use crate::unit::{Location, PilotDefinition, UnitDefinition};
}
