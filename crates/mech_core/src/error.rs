//! Error types for the combat core.
//!
//! Two families exist:
//! - [`ActionError`]: an illegal action was submitted. It is rejected before
//!   any event is created and carries the reason string shown to players.
//! - [`GameError`]: setup, data, persistence and internal consistency errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::{GameEndReason, GamePhase};
use crate::hex::HexCoordinate;
use crate::state::{Side, UnitId};

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for non-action failures.
#[derive(Debug, Error)]
pub enum GameError {
    /// The game setup could not be turned into an initial state.
    #[error("Invalid game setup: {0}")]
    InvalidSetup(String),

    /// A unit definition failed construction validation.
    #[error("Invalid unit definition '{unit}': {message}")]
    InvalidDefinition {
        /// Definition identifier.
        unit: String,
        /// What is wrong with it.
        message: String,
    },

    /// Data file parsing error.
    #[error("Failed to parse data '{source_name}': {message}")]
    DataParseError {
        /// File or label of the data that failed to parse.
        source_name: String,
        /// Error message.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Reading or writing a file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A replay was written by an incompatible version.
    #[error("Replay version mismatch: expected {expected}, got {found}")]
    ReplayVersionMismatch {
        /// Version this build understands.
        expected: u32,
        /// Version found in the file.
        found: u32,
    },

    /// Two derivations of the same log diverged.
    #[error("Desync detected at event {event}: local hash {local_hash:016x}, remote hash {remote_hash:016x}")]
    DesyncDetected {
        /// Index of the first event after which the hashes differ.
        event: u64,
        /// Local state hash.
        local_hash: u64,
        /// Remote state hash.
        remote_hash: u64,
    },

    /// Derived state violates a structural invariant.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// Typed rejection of an illegal action.
///
/// The `Display` text is the rejection reason surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ActionError {
    /// The game has already ended.
    #[error("the game is over")]
    GameOver,

    /// The action belongs to a different phase.
    #[error("action not allowed in {actual:?} phase (expected {expected:?})")]
    WrongPhase {
        /// Phase the action needs.
        expected: GamePhase,
        /// Current phase.
        actual: GamePhase,
    },

    /// The submitting side does not have the move.
    #[error("it is not {side:?}'s turn to act")]
    NotYourTurn {
        /// Side that tried to act.
        side: Side,
    },

    /// Initiative has already been rolled this turn.
    #[error("initiative already rolled for turn {turn}")]
    InitiativeAlreadyRolled {
        /// Current turn.
        turn: u32,
    },

    /// Unknown unit identifier.
    #[error("unit {0} does not exist")]
    UnitNotFound(UnitId),

    /// The unit belongs to the other side.
    #[error("unit {unit} is not controlled by {side:?}")]
    NotOwnUnit {
        /// Unit named in the action.
        unit: UnitId,
        /// Side that submitted the action.
        side: Side,
    },

    /// The unit has already used its movement this turn.
    #[error("unit {0} has already moved this turn")]
    AlreadyMoved(UnitId),

    /// The unit cannot act at all (destroyed, shut down, pilot out).
    #[error("unit {unit} cannot act: {reason}")]
    UnitCannotAct {
        /// Unit named in the action.
        unit: UnitId,
        /// Why it is inactive.
        reason: String,
    },

    /// A prone unit tried to move without standing first.
    #[error("unit {0} is prone and must stand up first")]
    UnitIsProne(UnitId),

    /// A standing unit tried to stand.
    #[error("unit {0} is already standing")]
    UnitNotProne(UnitId),

    /// The movement mode is not available to this unit.
    #[error("unit {unit} cannot use {mode} movement")]
    MovementModeUnavailable {
        /// Unit named in the action.
        unit: UnitId,
        /// Requested mode.
        mode: String,
    },

    /// The path needs more MP than the unit has.
    #[error("movement requires {required} MP but only {available} available")]
    InsufficientMovementPoints {
        /// MP the path costs.
        required: u32,
        /// MP the unit may spend.
        available: u32,
    },

    /// The path is malformed or crosses blocked terrain.
    #[error("illegal path: {0}")]
    IllegalPath(String),

    /// A hex lies outside the map.
    #[error("hex ({}, {}) is outside the map", .0.q, .0.r)]
    OutOfBounds(HexCoordinate),

    /// Another unit already occupies the destination.
    #[error("hex ({}, {}) is occupied", .0.q, .0.r)]
    HexOccupied(HexCoordinate),

    /// The target unit is already destroyed.
    #[error("target {0} is already destroyed")]
    TargetDestroyed(UnitId),

    /// A unit tried to attack itself.
    #[error("unit {0} cannot target itself")]
    SelfTarget(UnitId),

    /// Attacker and target share a hex.
    #[error("attacks at zero range are not allowed")]
    ZeroRange,

    /// The weapon index does not exist on the unit.
    #[error("unit {unit} has no weapon {weapon}")]
    WeaponNotFound {
        /// Attacking unit.
        unit: UnitId,
        /// Weapon index.
        weapon: usize,
    },

    /// The weapon has been destroyed.
    #[error("weapon {weapon} on unit {unit} is destroyed")]
    WeaponDestroyed {
        /// Attacking unit.
        unit: UnitId,
        /// Weapon index.
        weapon: usize,
    },

    /// The weapon was declared twice in one lock.
    #[error("weapon {weapon} on unit {unit} is already assigned")]
    WeaponAlreadyAssigned {
        /// Attacking unit.
        unit: UnitId,
        /// Weapon index.
        weapon: usize,
    },

    /// No ammunition remains for the weapon.
    #[error("no ammunition left for weapon {weapon} on unit {unit}")]
    NoAmmo {
        /// Attacking unit.
        unit: UnitId,
        /// Weapon index.
        weapon: usize,
    },

    /// The target lies outside the weapon's firing arc.
    #[error("target {target} is outside the firing arc of weapon {weapon}")]
    NotInFiringArc {
        /// Weapon index.
        weapon: usize,
        /// Target unit.
        target: UnitId,
    },

    /// The target is beyond the weapon's maximum range.
    #[error("target at range {distance} is beyond maximum range {maximum}")]
    OutOfRange {
        /// Hex distance to the target.
        distance: u32,
        /// Weapon maximum range.
        maximum: u32,
    },

    /// No line of sight to the target.
    #[error("no line of sight from unit {attacker} to unit {target}")]
    NoLineOfSight {
        /// Attacking unit.
        attacker: UnitId,
        /// Target unit.
        target: UnitId,
    },

    /// Indirect fire was requested with an invalid spotter or weapon.
    #[error("indirect fire not possible: {0}")]
    InvalidIndirectFire(String),

    /// The side has already locked its attacks this phase.
    #[error("{0:?} has already locked attacks this phase")]
    AlreadyLocked(Side),

    /// Revealed declarations do not match the locked commitment.
    #[error("declarations do not match {0:?}'s locked commitment")]
    CommitmentMismatch(Side),

    /// The game cannot be ended for that reason from outside.
    #[error("a game cannot be ended externally with reason {0:?}")]
    EndReasonNotAllowed(GameEndReason),
}

impl ActionError {
    /// Human-readable rejection reason.
    #[must_use]
    pub fn reason(&self) -> String {
        self.to_string()
    }
}
