//! JSON protocol for headless game communication.
//!
//! The headless runner communicates via JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Commands from a controller
//! **Output (stdout):** Events, snapshots and rejections
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready",...}` with the creation hash
//! 2. The controller submits actions or asks the autopilot to play
//! 3. Every accepted action answers with the events it appended
//! 4. Rejected actions answer with the reason; the log is unchanged
//! 5. On game end, outputs `{"type":"game_over",...}`
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","game_id":"duel","events":1,"hash":...}
//! -> {"cmd":"submit","action":{"action":"roll_initiative"}}
//! <- {"type":"events","events":[...],"hash":...}
//! -> {"cmd":"submit","action":{"action":"stand_up","side":"Player","unit":1}}
//! <- {"type":"rejected","cmd":"submit","reason":"Unit 1 is not prone","error":{...}}
//! -> {"cmd":"auto","count":20}
//! <- {"type":"events","events":[...],"hash":...}
//! -> {"cmd":"quit"}
//! <- {"type":"bye"}
//! ```

use mech_core::error::ActionError;
use mech_core::events::{AttackDeclaration, GameEndReason, GameEvent, GamePhase};
use mech_core::hex::{HexCoordinate, HexDirection};
use mech_core::movement::MovementType;
use mech_core::session::Action;
use mech_core::state::{GameState, GameStatus, Side, UnitCombatState, UnitId};
use mech_core::summary::BattleSummary;
use serde::{Deserialize, Serialize};

/// Protocol version reported in `ready`.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (Controller -> Runner)
// ============================================================================

/// Commands that can be sent to the headless runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Submit an action to the session.
    Submit { action: Action },

    /// Let the autopilot take up to `count` actions (default: 1).
    Auto {
        #[serde(default = "default_count")]
        count: u32,
    },

    /// Snapshot the derived state.
    Query,

    /// Legal attacks and units still to move for a side.
    Legal { side: Side },

    /// Hexes a unit can end its move in.
    Destinations { unit: UnitId, movement: MovementType },

    /// Events from index `from` onwards.
    Events {
        #[serde(default)]
        from: usize,
    },

    /// Current state hash (for determinism verification).
    Hash,

    /// Post-battle summary so far.
    Summary,

    /// Save the log as a replay file.
    Save { path: String },

    /// Quit the runner.
    Quit,
}

const fn default_count() -> u32 {
    1
}

// ============================================================================
// Output Responses (Runner -> Controller)
// ============================================================================

/// Responses sent from the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready {
        version: String,
        game_id: String,
        events: usize,
        hash: u64,
    },

    /// Events appended by the last command.
    Events { events: Vec<GameEvent>, hash: u64 },

    /// The action was illegal; nothing was appended.
    Rejected {
        cmd: String,
        reason: String,
        error: ActionError,
    },

    /// Derived state snapshot.
    State { state: StateView },

    /// What a side may do right now.
    Legal {
        side: Side,
        awaiting_movement: Vec<UnitId>,
        attacks: Vec<AttackDeclaration>,
    },

    /// Reachable hexes for a unit.
    Destinations { unit: UnitId, hexes: Vec<HexCoordinate> },

    /// State hash for determinism verification.
    StateHash { events: usize, hash: u64 },

    /// Post-battle summary.
    Summary { summary: BattleSummary },

    /// Replay written.
    Saved { path: String, events: usize },

    /// Error processing a command.
    Error {
        message: String,
        cmd: Option<String>,
    },

    /// Game has ended.
    GameOver {
        reason: GameEndReason,
        winner: Option<Side>,
        turns: u32,
        hash: u64,
    },

    /// Goodbye message before shutdown.
    Bye,
}

// ============================================================================
// State Types
// ============================================================================

/// Snapshot of the whole game, trimmed for controllers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateView {
    pub game_id: String,
    pub turn: u32,
    pub phase: GamePhase,
    pub status: GameStatus,
    pub initiative_winner: Option<Side>,
    pub active_side: Option<Side>,
    pub locked: Vec<Side>,
    pub units: Vec<UnitView>,
    pub hash: u64,
}

impl StateView {
    /// Build a view of `state`.
    #[must_use]
    pub fn of(state: &GameState) -> Self {
        Self {
            game_id: state.game_id.clone(),
            turn: state.turn,
            phase: state.phase,
            status: state.status,
            initiative_winner: state.initiative_winner,
            active_side: state.active_side(),
            locked: state.locked_attacks.keys().copied().collect(),
            units: state.units.values().map(UnitView::of).collect(),
            hash: state.state_hash(),
        }
    }
}

/// State of a single unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitView {
    pub id: UnitId,
    pub side: Side,
    pub model: String,
    pub pilot: String,
    pub hex: HexCoordinate,
    pub facing: HexDirection,
    pub prone: bool,
    pub heat: u32,
    pub shutdown: bool,
    pub destroyed: bool,
    pub armor: u32,
    pub structure: u32,
    pub pilot_wounds: u8,
    pub conscious: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inactive: Option<String>,
}

impl UnitView {
    /// Build a view of one unit.
    #[must_use]
    pub fn of(unit: &UnitCombatState) -> Self {
        Self {
            id: unit.id,
            side: unit.side,
            model: unit.definition.name.clone(),
            pilot: unit.pilot.name.clone(),
            hex: unit.position.hex,
            facing: unit.position.facing,
            prone: unit.position.prone,
            heat: unit.heat,
            shutdown: unit.shutdown,
            destroyed: unit.destroyed,
            armor: unit.locations.values().map(|l| l.armor + l.rear_armor).sum(),
            structure: unit.locations.values().map(|l| l.structure).sum(),
            pilot_wounds: unit.pilot.wounds,
            conscious: unit.pilot.conscious,
            inactive: unit.inactive_reason().map(String::from),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Create a ready response.
    pub fn ready(state: &GameState, events: usize) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            game_id: state.game_id.clone(),
            events,
            hash: state.state_hash(),
        }
    }

    /// Create a rejection from an action error.
    pub fn rejected(cmd: &str, error: ActionError) -> Self {
        Self::Rejected {
            cmd: cmd.to_string(),
            reason: error.reason(),
            error,
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// `game_over` for an ended game, `None` otherwise.
    pub fn game_over(state: &GameState) -> Option<Self> {
        match state.status {
            GameStatus::Ended { reason, winner } => Some(Self::GameOver {
                reason,
                winner,
                turns: state.turn,
                hash: state.state_hash(),
            }),
            _ => None,
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"type":"error","message":"Serialization failed: {}"}}"#,
                e
            )
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get command name for responses.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Submit { .. } => "submit",
            Self::Auto { .. } => "auto",
            Self::Query => "query",
            Self::Legal { .. } => "legal",
            Self::Destinations { .. } => "destinations",
            Self::Events { .. } => "events",
            Self::Hash => "hash",
            Self::Summary => "summary",
            Self::Save { .. } => "save",
            Self::Quit => "quit",
        }
    }
}
