//! Game events.
//!
//! The event log is the single source of truth. Every random outcome is
//! resolved before an event is created and stored in its payload, so folding
//! events never touches dice or the clock.

use serde::{Deserialize, Serialize};

use crate::critical::CriticalSlotHit;
use crate::damage::DamageRecord;
use crate::dice::DiceRoll;
use crate::hex::{HexCoordinate, HexDirection, RangeBracket};
use crate::hit_location::{HitLocation, HitTable};
use crate::movement::MovementType;
use crate::piloting::{FallDirection, PsrReason};
use crate::state::{GameSetup, Side, UnitId};
use crate::unit::Location;

/// Phases of a turn, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum GamePhase {
    /// Both sides roll 2d6.
    #[default]
    Initiative,
    /// Alternating unit movement.
    Movement,
    /// Simultaneous weapon fire.
    WeaponAttack,
    /// Heat bookkeeping and threshold checks.
    Heat,
    /// Piloting rolls, recovery and victory checks.
    End,
}

impl GamePhase {
    /// Phase that follows this one; End wraps to Initiative.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Initiative => Self::Movement,
            Self::Movement => Self::WeaponAttack,
            Self::WeaponAttack => Self::Heat,
            Self::Heat => Self::End,
            Self::End => Self::Initiative,
        }
    }
}

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameEndReason {
    /// One or both sides have no units left.
    Destruction,
    /// A side gave up.
    Concede,
    /// The turn limit was reached.
    TurnLimit,
    /// A scenario objective was met.
    Objective,
    /// A side was removed by the session layer.
    Forfeit,
    /// The session layer gave up on the game.
    Abandoned,
}

/// What took a unit out of the fight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DestructionCause {
    /// Center torso structure gone.
    CenterTorsoDestroyed,
    /// Head destroyed.
    HeadDestroyed,
    /// Third engine critical.
    EngineDestroyed,
    /// Pilot killed.
    PilotKilled,
}

/// Source of a pilot wound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PilotDamageSource {
    /// Damage to the head location.
    HeadHit,
    /// Ammunition exploded.
    AmmoExplosion,
    /// The unit fell.
    Fall,
    /// Heat leaking through life support.
    Heat,
}

/// Heat-phase roll that a unit survived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeatCheckKind {
    /// Avoided shutting down.
    Shutdown,
    /// Avoided an ammunition explosion.
    AmmoExplosion,
}

/// Why ammunition cooked off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AmmoExplosionCause {
    /// Critical hit on the bin.
    CriticalHit,
    /// Failed heat check.
    Heat,
}

/// One declared weapon attack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttackDeclaration {
    /// Firing unit.
    pub attacker: UnitId,
    /// Weapon index on the attacker.
    pub weapon: usize,
    /// Target unit.
    pub target: UnitId,
    /// Fired indirectly over a spotter.
    #[serde(default)]
    pub indirect: bool,
    /// Friendly spotter for indirect fire.
    #[serde(default)]
    pub spotter: Option<UnitId>,
}

/// Ammunition drawn by one shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AmmoUse {
    /// Bin index.
    pub bin: usize,
    /// Shots left in the bin afterwards.
    pub remaining: u32,
}

/// Source of a to-hit modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModifierKind {
    /// Range bracket.
    Range,
    /// Inside minimum range.
    MinimumRange,
    /// Attacker moved.
    AttackerMovement,
    /// Target moved.
    TargetMovement,
    /// Attacker heat.
    Heat,
    /// Woods in the target hex.
    TargetTerrain,
    /// Woods along the line of fire.
    InterveningTerrain,
    /// Attacker lying down.
    AttackerProne,
    /// Target lying down.
    TargetProne,
    /// Target shut down or pilot unconscious.
    ImmobileTarget,
    /// Indirect fire.
    IndirectFire,
    /// Spotter walked this turn.
    SpotterMoved,
    /// Not the attacker's primary target.
    SecondaryTarget,
    /// Weapon's own accuracy.
    Weapon,
    /// Sensor critical hits.
    SensorDamage,
    /// Arm actuator damage on an arm mount.
    ActuatorDamage,
    /// Pilot wounds.
    PilotWounds,
}

/// A single entry of the to-hit modifier stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToHitModifier {
    /// Source.
    pub kind: ModifierKind,
    /// Value added to the target number.
    pub value: i32,
}

/// How the to-hit number was assembled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToHitBreakdown {
    /// Gunnery skill.
    pub base: u8,
    /// Modifier stack in application order.
    pub modifiers: Vec<ToHitModifier>,
    /// Final target number.
    pub target: i32,
    /// Attacker to target distance.
    pub distance: u32,
    /// Range bracket.
    pub bracket: RangeBracket,
}

impl ToHitBreakdown {
    /// Value contributed by one kind of modifier.
    #[must_use]
    pub fn modifier(&self, kind: ModifierKind) -> i32 {
        self.modifiers
            .iter()
            .filter(|m| m.kind == kind)
            .map(|m| m.value)
            .sum()
    }
}

/// Cluster table result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterResult {
    /// Cluster roll.
    pub roll: DiceRoll,
    /// Modifier added to the roll.
    pub modifier: i32,
    /// Missiles or slugs that hit.
    pub hits: u32,
}

/// Damage applied to one hit location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DamageGroup {
    /// Hit location roll.
    pub roll: DiceRoll,
    /// Table used.
    pub table: HitTable,
    /// Location struck.
    pub hit: HitLocation,
    /// Damage after armor adjustments.
    pub damage: u32,
    /// Per-location changes, including transfers.
    pub records: Vec<DamageRecord>,
}

impl DamageGroup {
    /// Total armor and structure removed.
    #[must_use]
    pub fn total_damage(&self) -> u32 {
        self.records
            .iter()
            .map(|r| r.armor_damage + r.structure_damage)
            .sum()
    }
}

/// One initiative roll-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InitiativeRoll {
    /// Player roll.
    pub player: DiceRoll,
    /// Opponent roll.
    pub opponent: DiceRoll,
}

/// Variant-specific event data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameEventPayload {
    /// A game was set up.
    GameCreated {
        /// Full setup.
        setup: GameSetup,
    },
    /// The phase advanced.
    PhaseChanged {
        /// Previous phase.
        from: GamePhase,
        /// New phase.
        to: GamePhase,
        /// Turn of the new phase.
        turn: u32,
    },
    /// Initiative was decided; ties are rolled again.
    InitiativeRolled {
        /// Every roll-off including ties.
        rolls: Vec<InitiativeRoll>,
        /// Winner, who moves second.
        winner: Side,
    },
    /// A unit moved or held position.
    UnitMoved {
        /// Moving unit.
        unit: UnitId,
        /// Movement mode.
        movement: MovementType,
        /// Start hex.
        from: HexCoordinate,
        /// End hex.
        to: HexCoordinate,
        /// Final facing.
        facing: HexDirection,
        /// Hexes entered.
        path: Vec<HexCoordinate>,
        /// MP spent.
        mp_spent: u32,
        /// Hexes counted for target movement modifiers.
        hexes_moved: u32,
        /// Movement heat generated.
        heat: u32,
    },
    /// A prone unit got up.
    UnitStoodUp {
        /// Unit.
        unit: UnitId,
        /// Piloting roll.
        roll: DiceRoll,
        /// Target number.
        target: u8,
        /// Facing after standing.
        facing: HexDirection,
    },
    /// A prone unit failed to get up and stays down.
    StandFailed {
        /// Unit.
        unit: UnitId,
        /// Piloting roll, absent on an automatic failure.
        roll: Option<DiceRoll>,
        /// Target number, absent on an automatic failure.
        target: Option<u8>,
    },
    /// A piloting roll is owed in the End phase.
    PilotingSkillRollRequired {
        /// Unit.
        unit: UnitId,
        /// Trigger.
        reason: PsrReason,
    },
    /// A piloting roll was made.
    PilotingSkillRollMade {
        /// Unit.
        unit: UnitId,
        /// Trigger.
        reason: PsrReason,
        /// Roll, absent on an automatic failure.
        roll: Option<DiceRoll>,
        /// Target number, absent on an automatic failure.
        target: Option<u8>,
        /// Stayed up.
        success: bool,
    },
    /// A unit fell and is now prone.
    UnitFell {
        /// Unit.
        unit: UnitId,
        /// Fall direction d6.
        direction_roll: u8,
        /// Side landed on.
        direction: FallDirection,
        /// Facing after the fall.
        facing: HexDirection,
        /// Levels fallen.
        height: u32,
        /// Total fall damage.
        damage: u32,
        /// Damage clusters.
        groups: Vec<DamageGroup>,
    },
    /// A side locked its attack declarations.
    AttacksLocked {
        /// Side.
        side: Side,
        /// SHA-256 over the canonical declarations, hex encoded.
        commitment: String,
        /// Number of declarations behind the commitment.
        declaration_count: u32,
    },
    /// A locked declaration was revealed.
    AttackDeclared {
        /// Declaration.
        declaration: AttackDeclaration,
    },
    /// A weapon attack was resolved.
    AttackResolved {
        /// Declaration.
        declaration: AttackDeclaration,
        /// To-hit number assembly.
        to_hit: ToHitBreakdown,
        /// To-hit roll.
        roll: DiceRoll,
        /// Whether it hit.
        hit: bool,
        /// Weapon heat generated.
        heat: u32,
        /// Ammunition drawn.
        ammo: Option<AmmoUse>,
        /// Cluster result for cluster weapons that hit.
        cluster: Option<ClusterResult>,
        /// Damage by location group.
        groups: Vec<DamageGroup>,
        /// TAG designation landed.
        designated: bool,
    },
    /// An attack on a unit destroyed earlier this phase.
    AttackVoided {
        /// Declaration.
        declaration: AttackDeclaration,
        /// Heat still generated.
        heat: u32,
        /// Ammunition still drawn.
        ammo: Option<AmmoUse>,
    },
    /// Critical hits at a location.
    CriticalHitResolved {
        /// Unit.
        unit: UnitId,
        /// Location.
        location: Location,
        /// Determination roll, absent when the count was forced.
        determination: Option<DiceRoll>,
        /// Criticals from the determination table.
        rolled: u32,
        /// Criticals applied after armor rules.
        applied: u32,
        /// Slots hit.
        hits: Vec<CriticalSlotHit>,
        /// Arm or leg blown off.
        limb_blown_off: bool,
        /// Head destroyed.
        head_destroyed: bool,
    },
    /// An ammunition bin exploded.
    AmmoExploded {
        /// Unit.
        unit: UnitId,
        /// Bin index.
        bin: usize,
        /// Trigger.
        cause: AmmoExplosionCause,
        /// Explosion damage.
        damage: u32,
        /// Internal damage records.
        records: Vec<DamageRecord>,
    },
    /// Heat settled for a unit.
    HeatApplied {
        /// Unit.
        unit: UnitId,
        /// Heat before.
        previous: u32,
        /// Heat generated this turn.
        generated: u32,
        /// Heat dissipated.
        dissipated: u32,
        /// Heat after.
        current: u32,
    },
    /// A unit shut down.
    UnitShutdown {
        /// Unit.
        unit: UnitId,
        /// Heat level.
        heat: u32,
        /// Roll, absent when automatic.
        roll: Option<DiceRoll>,
        /// Target number, absent when automatic.
        target: Option<u8>,
    },
    /// A unit passed a heat-phase roll.
    HeatCheckPassed {
        /// Unit.
        unit: UnitId,
        /// Check kind.
        kind: HeatCheckKind,
        /// Roll.
        roll: DiceRoll,
        /// Target number.
        target: u8,
    },
    /// A shut-down unit restarted.
    UnitStartedUp {
        /// Unit.
        unit: UnitId,
        /// Roll, absent when automatic.
        roll: Option<DiceRoll>,
        /// Target number, absent when automatic.
        target: Option<u8>,
    },
    /// A shut-down unit failed to restart.
    StartupFailed {
        /// Unit.
        unit: UnitId,
        /// Roll.
        roll: DiceRoll,
        /// Target number.
        target: u8,
    },
    /// A pilot was wounded.
    PilotHit {
        /// Unit.
        unit: UnitId,
        /// Source.
        source: PilotDamageSource,
        /// New wounds.
        wounds: u8,
        /// Wounds in total.
        total: u8,
    },
    /// A consciousness or wake-up roll.
    PilotConsciousnessRolled {
        /// Unit.
        unit: UnitId,
        /// Roll.
        roll: DiceRoll,
        /// Target number.
        target: u8,
        /// Pilot is conscious afterwards.
        conscious: bool,
    },
    /// A unit was destroyed.
    UnitDestroyed {
        /// Unit.
        unit: UnitId,
        /// Cause.
        cause: DestructionCause,
        /// Attacking unit, if any.
        by: Option<UnitId>,
    },
    /// The game ended.
    GameEnded {
        /// Reason.
        reason: GameEndReason,
        /// Winner, `None` for a draw.
        winner: Option<Side>,
    },
}

/// Discriminant of [`GameEventPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum GameEventType {
    GameCreated,
    PhaseChanged,
    InitiativeRolled,
    UnitMoved,
    UnitStoodUp,
    StandFailed,
    PilotingSkillRollRequired,
    PilotingSkillRollMade,
    UnitFell,
    AttacksLocked,
    AttackDeclared,
    AttackResolved,
    AttackVoided,
    CriticalHitResolved,
    AmmoExploded,
    HeatApplied,
    UnitShutdown,
    HeatCheckPassed,
    UnitStartedUp,
    StartupFailed,
    PilotHit,
    PilotConsciousnessRolled,
    UnitDestroyed,
    GameEnded,
}

impl GameEventPayload {
    /// Discriminant of this payload.
    #[must_use]
    pub const fn event_type(&self) -> GameEventType {
        match self {
            Self::GameCreated { .. } => GameEventType::GameCreated,
            Self::PhaseChanged { .. } => GameEventType::PhaseChanged,
            Self::InitiativeRolled { .. } => GameEventType::InitiativeRolled,
            Self::UnitMoved { .. } => GameEventType::UnitMoved,
            Self::UnitStoodUp { .. } => GameEventType::UnitStoodUp,
            Self::StandFailed { .. } => GameEventType::StandFailed,
            Self::PilotingSkillRollRequired { .. } => GameEventType::PilotingSkillRollRequired,
            Self::PilotingSkillRollMade { .. } => GameEventType::PilotingSkillRollMade,
            Self::UnitFell { .. } => GameEventType::UnitFell,
            Self::AttacksLocked { .. } => GameEventType::AttacksLocked,
            Self::AttackDeclared { .. } => GameEventType::AttackDeclared,
            Self::AttackResolved { .. } => GameEventType::AttackResolved,
            Self::AttackVoided { .. } => GameEventType::AttackVoided,
            Self::CriticalHitResolved { .. } => GameEventType::CriticalHitResolved,
            Self::AmmoExploded { .. } => GameEventType::AmmoExploded,
            Self::HeatApplied { .. } => GameEventType::HeatApplied,
            Self::UnitShutdown { .. } => GameEventType::UnitShutdown,
            Self::HeatCheckPassed { .. } => GameEventType::HeatCheckPassed,
            Self::UnitStartedUp { .. } => GameEventType::UnitStartedUp,
            Self::StartupFailed { .. } => GameEventType::StartupFailed,
            Self::PilotHit { .. } => GameEventType::PilotHit,
            Self::PilotConsciousnessRolled { .. } => GameEventType::PilotConsciousnessRolled,
            Self::UnitDestroyed { .. } => GameEventType::UnitDestroyed,
            Self::GameEnded { .. } => GameEventType::GameEnded,
        }
    }

    /// Unit the event is about, if it concerns exactly one.
    #[must_use]
    pub fn subject(&self) -> Option<UnitId> {
        match self {
            Self::UnitMoved { unit, .. }
            | Self::UnitStoodUp { unit, .. }
            | Self::StandFailed { unit, .. }
            | Self::PilotingSkillRollRequired { unit, .. }
            | Self::PilotingSkillRollMade { unit, .. }
            | Self::UnitFell { unit, .. }
            | Self::CriticalHitResolved { unit, .. }
            | Self::AmmoExploded { unit, .. }
            | Self::HeatApplied { unit, .. }
            | Self::UnitShutdown { unit, .. }
            | Self::HeatCheckPassed { unit, .. }
            | Self::UnitStartedUp { unit, .. }
            | Self::StartupFailed { unit, .. }
            | Self::PilotHit { unit, .. }
            | Self::PilotConsciousnessRolled { unit, .. }
            | Self::UnitDestroyed { unit, .. } => Some(*unit),
            Self::AttackDeclared { declaration }
            | Self::AttackResolved { declaration, .. }
            | Self::AttackVoided { declaration, .. } => Some(declaration.attacker),
            Self::GameCreated { .. }
            | Self::PhaseChanged { .. }
            | Self::InitiativeRolled { .. }
            | Self::AttacksLocked { .. }
            | Self::GameEnded { .. } => None,
        }
    }
}

/// One entry of the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Position in the log, starting at 0.
    pub id: u64,
    /// Game identifier.
    pub game_id: String,
    /// Turn during which the event happened.
    pub turn: u32,
    /// Phase during which the event happened.
    pub phase: GamePhase,
    /// Milliseconds since the Unix epoch, supplied by the session clock.
    /// Never read by state derivation.
    pub timestamp: u64,
    /// Variant data.
    pub payload: GameEventPayload,
}

impl GameEvent {
    /// Discriminant of the payload.
    #[must_use]
    pub const fn event_type(&self) -> GameEventType {
        self.payload.event_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_cycle() {
        let mut phase = GamePhase::Initiative;
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(phase);
            phase = phase.next();
        }
        assert_eq!(phase, GamePhase::Initiative);
        assert_eq!(
            seen,
            vec![
                GamePhase::Initiative,
                GamePhase::Movement,
                GamePhase::WeaponAttack,
                GamePhase::Heat,
                GamePhase::End
            ]
        );
    }

    #[test]
    fn test_payload_is_tagged_by_type() {
        let payload = GameEventPayload::PhaseChanged {
            from: GamePhase::Movement,
            to: GamePhase::WeaponAttack,
            turn: 3,
        };
        let json = serde_json::to_value(&payload).expect("serializes");
        assert_eq!(json["type"], "PhaseChanged");
        assert_eq!(json["to"], "WeaponAttack");
        let back: GameEventPayload = serde_json::from_value(json).expect("deserializes");
        assert_eq!(back.event_type(), GameEventType::PhaseChanged);
    }

    #[test]
    fn test_end_reason_names() {
        let json = serde_json::to_string(&GameEndReason::TurnLimit).expect("serializes");
        assert_eq!(json, "\"turn_limit\"");
    }

    #[test]
    fn test_breakdown_sums_modifiers_by_kind() {
        let breakdown = ToHitBreakdown {
            base: 4,
            modifiers: vec![
                ToHitModifier { kind: ModifierKind::Range, value: 2 },
                ToHitModifier { kind: ModifierKind::IndirectFire, value: 1 },
                ToHitModifier { kind: ModifierKind::SpotterMoved, value: 1 },
            ],
            target: 8,
            distance: 5,
            bracket: RangeBracket::Medium,
        };
        assert_eq!(breakdown.modifier(ModifierKind::Range), 2);
        assert_eq!(breakdown.modifier(ModifierKind::Heat), 0);
    }
}
