//! Derived game state.
//!
//! [`GameState`] is never ground truth. It is the fold of the event log
//! (see [`crate::reducer`]) and can be rebuilt from any prefix of it. State
//! is serialized with bincode for snapshots and hashed for desync checks.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::config::RulesConfig;
use crate::error::{GameError, Result};
use crate::events::{AttackDeclaration, GameEndReason, GamePhase};
use crate::hex::{HexCoordinate, HexDirection};
use crate::map::BattleMap;
use crate::movement::MovementType;
use crate::piloting::{PsrReason, PILOT_DEATH_WOUNDS};
use crate::unit::{Location, PilotDefinition, SlotContent, UnitDefinition};

/// Unit identifier, unique within a game.
pub type UnitId = u32;

/// One of the two opposing sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    /// First player.
    Player,
    /// Second player.
    Opponent,
}

impl Side {
    /// Both sides.
    pub const ALL: [Self; 2] = [Self::Player, Self::Opponent];

    /// The other side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Player => Self::Opponent,
            Self::Opponent => Self::Player,
        }
    }
}

/// Where a unit stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitPosition {
    /// Hex occupied.
    pub hex: HexCoordinate,
    /// Facing 0..=5.
    pub facing: HexDirection,
    /// Lying down.
    #[serde(default)]
    pub prone: bool,
    /// Ground level of the hex.
    #[serde(default)]
    pub elevation: i32,
}

impl UnitPosition {
    /// A standing position at ground level 0.
    #[must_use]
    pub const fn new(hex: HexCoordinate, facing: HexDirection) -> Self {
        Self {
            hex,
            facing,
            prone: false,
            elevation: 0,
        }
    }

    /// Height used for line of sight: one level above ground when standing.
    #[must_use]
    pub const fn sight_level(&self) -> i32 {
        if self.prone {
            self.elevation
        } else {
            self.elevation + 1
        }
    }
}

/// Armor and structure remaining at one location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LocationState {
    /// Front armor.
    pub armor: u32,
    /// Rear armor.
    pub rear_armor: u32,
    /// Internal structure.
    pub structure: u32,
    /// Destroyed or blown off.
    pub destroyed: bool,
}

/// Pilot condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PilotState {
    /// Name.
    pub name: String,
    /// Gunnery skill.
    pub gunnery: u8,
    /// Piloting skill.
    pub piloting: u8,
    /// Wounds taken.
    pub wounds: u8,
    /// Awake and in control.
    pub conscious: bool,
}

impl PilotState {
    /// Pilot at the start of a battle.
    #[must_use]
    pub fn from_definition(definition: &PilotDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            gunnery: definition.gunnery,
            piloting: definition.piloting,
            wounds: definition.wounds,
            conscious: definition.wounds < PILOT_DEATH_WOUNDS,
        }
    }

    /// Six or more wounds.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.wounds >= PILOT_DEATH_WOUNDS
    }
}

/// What a unit did this turn. Reset at the start of each turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnActivity {
    /// Has used its movement.
    pub moved: bool,
    /// Movement mode used.
    pub movement: MovementType,
    /// Hexes counted for target movement modifiers.
    pub hexes_moved: u32,
    /// Heat built up this turn, applied in the Heat phase.
    pub heat_generated: u32,
    /// Damage taken in the current phase.
    pub damage_this_phase: u32,
    /// Designated by a TAG hit this turn.
    pub tagged: bool,
}

/// Derived combat snapshot of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitCombatState {
    /// Identifier.
    pub id: UnitId,
    /// Owning side.
    pub side: Side,
    /// Construction data.
    pub definition: UnitDefinition,
    /// Position.
    pub position: UnitPosition,
    /// Armor and structure per location.
    pub locations: BTreeMap<Location, LocationState>,
    /// Current heat.
    pub heat: u32,
    /// Shut down by heat.
    pub shutdown: bool,
    /// Out of the fight.
    pub destroyed: bool,
    /// Destroyed flag per weapon.
    pub weapons_destroyed: Vec<bool>,
    /// Shots left per ammo bin.
    pub ammo: Vec<u32>,
    /// Damaged flag per critical slot.
    pub damaged_slots: BTreeMap<Location, Vec<bool>>,
    /// Pilot.
    pub pilot: PilotState,
    /// Per-turn bookkeeping.
    pub activity: TurnActivity,
    /// Piloting rolls owed in the End phase.
    pub pending_psrs: Vec<PsrReason>,
}

impl UnitCombatState {
    /// Fresh unit at battle start.
    #[must_use]
    pub fn new(
        id: UnitId,
        side: Side,
        definition: UnitDefinition,
        pilot: &PilotDefinition,
        position: UnitPosition,
    ) -> Self {
        let locations = Location::ALL
            .into_iter()
            .map(|location| {
                let armor = definition.armor_at(location);
                (
                    location,
                    LocationState {
                        armor: armor.front,
                        rear_armor: armor.rear,
                        structure: definition.structure_at(location),
                        destroyed: false,
                    },
                )
            })
            .collect();
        let damaged_slots = definition
            .critical_slots
            .iter()
            .map(|(location, slots)| (*location, vec![false; slots.len()]))
            .collect();
        Self {
            id,
            side,
            weapons_destroyed: vec![false; definition.weapons.len()],
            ammo: definition.ammo.iter().map(|bin| bin.shots).collect(),
            damaged_slots,
            locations,
            definition,
            position,
            heat: 0,
            shutdown: false,
            destroyed: false,
            pilot: PilotState::from_definition(pilot),
            activity: TurnActivity::default(),
            pending_psrs: Vec::new(),
        }
    }

    /// Armor and structure at a location.
    #[must_use]
    pub fn location(&self, location: Location) -> LocationState {
        self.locations.get(&location).copied().unwrap_or_default()
    }

    /// Whether a location is gone.
    #[must_use]
    pub fn is_location_destroyed(&self, location: Location) -> bool {
        self.location(location).destroyed
    }

    /// Number of destroyed legs.
    #[must_use]
    pub fn destroyed_legs(&self) -> u32 {
        [Location::LeftLeg, Location::RightLeg]
            .into_iter()
            .filter(|&leg| self.is_location_destroyed(leg))
            .count() as u32
    }

    /// Whether a specific slot has been critically hit.
    #[must_use]
    pub fn is_slot_damaged(&self, location: Location, slot: usize) -> bool {
        self.damaged_slots
            .get(&location)
            .and_then(|slots| slots.get(slot))
            .copied()
            .unwrap_or(false)
    }

    /// Critically hit slots matching `predicate` in locations still attached.
    pub fn count_damaged(&self, predicate: impl Fn(SlotContent) -> bool) -> u32 {
        let mut count = 0;
        for (location, contents) in &self.definition.critical_slots {
            if self.is_location_destroyed(*location) {
                continue;
            }
            for (index, content) in contents.iter().enumerate() {
                if predicate(*content) && self.is_slot_damaged(*location, index) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Slots matching `predicate` that no longer work: critically hit, or
    /// in a destroyed location.
    pub fn count_lost(&self, predicate: impl Fn(SlotContent) -> bool) -> u32 {
        let mut count = 0;
        for (location, contents) in &self.definition.critical_slots {
            let gone = self.is_location_destroyed(*location);
            for (index, content) in contents.iter().enumerate() {
                if predicate(*content) && (gone || self.is_slot_damaged(*location, index)) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Damaged slots at one location whose content matches `predicate`.
    pub fn count_damaged_at(&self, location: Location, predicate: impl Fn(SlotContent) -> bool) -> u32 {
        self.definition
            .slots_at(location)
            .iter()
            .enumerate()
            .filter(|(index, content)| predicate(**content) && self.is_slot_damaged(location, *index))
            .count() as u32
    }

    /// Engine critical hits.
    #[must_use]
    pub fn engine_hits(&self) -> u32 {
        self.count_damaged(|slot| slot == SlotContent::Engine)
    }

    /// Whether life support has been hit.
    #[must_use]
    pub fn life_support_damaged(&self) -> bool {
        self.count_damaged(|slot| slot == SlotContent::LifeSupport) > 0
    }

    /// Heat sinks still working.
    #[must_use]
    pub fn working_heat_sinks(&self) -> u32 {
        let per_sink = self.definition.heat_sink_type.slots() as u32;
        let lost_slots = self.count_lost(|slot| slot == SlotContent::HeatSink);
        self.definition
            .heat_sinks
            .saturating_sub(lost_slots.div_ceil(per_sink))
    }

    /// Heat dissipated per turn.
    #[must_use]
    pub fn dissipation(&self) -> u32 {
        crate::heat::dissipation(
            self.working_heat_sinks(),
            self.definition.heat_sink_type.capacity(),
        )
    }

    /// Whether a weapon can still fire.
    #[must_use]
    pub fn is_weapon_operational(&self, weapon: usize) -> bool {
        weapon < self.definition.weapons.len()
            && !self.weapons_destroyed.get(weapon).copied().unwrap_or(true)
            && !self.is_location_destroyed(self.definition.weapons[weapon].location)
    }

    /// Ammo bin that would feed `weapon` next, if any has shots.
    ///
    /// Bins are drained in definition order.
    #[must_use]
    pub fn next_ammo_bin(&self, weapon: usize) -> Option<usize> {
        let spec = &self.definition.weapons.get(weapon)?.spec;
        self.definition
            .bins_for(spec)
            .find(|&bin| self.ammo.get(bin).copied().unwrap_or(0) > 0)
    }

    /// Total shots available for `weapon`.
    #[must_use]
    pub fn ammo_available(&self, weapon: usize) -> u32 {
        self.definition.weapons.get(weapon).map_or(0, |mount| {
            self.definition
                .bins_for(&mount.spec)
                .map(|bin| self.ammo.get(bin).copied().unwrap_or(0))
                .sum()
        })
    }

    /// Not destroyed, not shut down, pilot awake.
    #[must_use]
    pub fn is_operational(&self) -> bool {
        !self.destroyed && !self.shutdown && self.pilot.conscious && !self.pilot.is_dead()
    }

    /// Cannot move or dodge: shut down or pilot out.
    #[must_use]
    pub fn is_immobile(&self) -> bool {
        self.shutdown || !self.pilot.conscious
    }

    /// Why the unit cannot act, if it cannot.
    #[must_use]
    pub fn inactive_reason(&self) -> Option<&'static str> {
        if self.destroyed {
            Some("unit is destroyed")
        } else if self.pilot.is_dead() {
            Some("pilot is dead")
        } else if self.shutdown {
            Some("unit is shut down")
        } else if !self.pilot.conscious {
            Some("pilot is unconscious")
        } else {
            None
        }
    }
}

/// Per-unit setup entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSetup {
    /// Identifier.
    pub id: UnitId,
    /// Owning side.
    pub side: Side,
    /// Construction data.
    pub definition: UnitDefinition,
    /// Pilot.
    #[serde(default)]
    pub pilot: PilotDefinition,
    /// Starting position.
    pub position: UnitPosition,
}

/// Everything needed to start a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSetup {
    /// Game identifier.
    pub game_id: String,
    /// Battlefield.
    pub map: BattleMap,
    /// Units on both sides.
    pub units: Vec<UnitSetup>,
    /// Rules options.
    #[serde(default)]
    pub rules: RulesConfig,
    /// Turn after which the game ends.
    #[serde(default)]
    pub turn_limit: Option<u32>,
}

impl GameSetup {
    /// Check the setup before the first event is created.
    ///
    /// # Errors
    /// Returns [`GameError::InvalidSetup`] or [`GameError::InvalidDefinition`].
    pub fn validate(&self) -> Result<()> {
        if self.game_id.is_empty() {
            return Err(GameError::InvalidSetup("game id is empty".to_string()));
        }
        let mut ids = BTreeSet::new();
        let mut hexes = BTreeSet::new();
        for unit in &self.units {
            unit.definition.validate()?;
            if !ids.insert(unit.id) {
                return Err(GameError::InvalidSetup(format!("duplicate unit id {}", unit.id)));
            }
            let hex = unit.position.hex;
            if !self.map.is_in_bounds(hex) {
                return Err(GameError::InvalidSetup(format!(
                    "unit {} starts off the map at ({}, {})",
                    unit.id, hex.q, hex.r
                )));
            }
            if !hexes.insert(hex) {
                return Err(GameError::InvalidSetup(format!(
                    "unit {} shares hex ({}, {}) with another unit",
                    unit.id, hex.q, hex.r
                )));
            }
        }
        for side in Side::ALL {
            if !self.units.iter().any(|u| u.side == side) {
                return Err(GameError::InvalidSetup(format!("{side:?} has no units")));
            }
        }
        Ok(())
    }
}

/// Lifecycle of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameStatus {
    /// No `GameCreated` event folded yet.
    #[default]
    NotStarted,
    /// Turns are being played.
    InProgress,
    /// Terminal.
    Ended {
        /// Why it ended.
        reason: GameEndReason,
        /// Winning side, `None` for a draw.
        winner: Option<Side>,
    },
}

/// The full derived state of one game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameState {
    /// Game identifier.
    pub game_id: String,
    /// Current turn, starting at 1.
    pub turn: u32,
    /// Current phase.
    pub phase: GamePhase,
    /// Lifecycle.
    pub status: GameStatus,
    /// Battlefield.
    pub map: BattleMap,
    /// Rules options.
    pub rules: RulesConfig,
    /// Turn limit.
    pub turn_limit: Option<u32>,
    /// Units by id.
    pub units: BTreeMap<UnitId, UnitCombatState>,
    /// Initiative winner this turn.
    pub initiative_winner: Option<Side>,
    /// Side that made the last movement this turn.
    pub last_mover: Option<Side>,
    /// Attack commitments locked this phase.
    pub locked_attacks: BTreeMap<Side, String>,
    /// Attacks revealed this phase.
    pub declared_attacks: Vec<AttackDeclaration>,
    /// Number of events folded.
    pub events_applied: u64,
}

impl GameState {
    /// Look up a unit.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&UnitCombatState> {
        self.units.get(&id)
    }

    /// Units of one side.
    pub fn units_of(&self, side: Side) -> impl Iterator<Item = &UnitCombatState> {
        self.units.values().filter(move |unit| unit.side == side)
    }

    /// Living unit in a hex.
    #[must_use]
    pub fn unit_at(&self, hex: HexCoordinate) -> Option<&UnitCombatState> {
        self.units
            .values()
            .find(|unit| !unit.destroyed && unit.position.hex == hex)
    }

    /// Whether a side still has a unit in the fight.
    #[must_use]
    pub fn has_surviving_units(&self, side: Side) -> bool {
        self.units_of(side).any(|unit| !unit.destroyed)
    }

    /// Whether the game has ended.
    #[must_use]
    pub const fn is_over(&self) -> bool {
        matches!(self.status, GameStatus::Ended { .. })
    }

    /// The initiative loser, who moves first.
    #[must_use]
    pub fn first_mover(&self) -> Option<Side> {
        self.initiative_winner.map(Side::opposite)
    }

    /// Units of `side` that still owe a movement this phase.
    #[must_use]
    pub fn units_awaiting_movement(&self, side: Side) -> Vec<UnitId> {
        self.units_of(side)
            .filter(|unit| unit.is_operational() && !unit.activity.moved)
            .map(|unit| unit.id)
            .collect()
    }

    /// Side whose turn it is to move, `None` outside Movement or when done.
    ///
    /// Sides alternate starting with the initiative loser; a side with no
    /// units left to move is skipped.
    #[must_use]
    pub fn active_side(&self) -> Option<Side> {
        if self.phase != GamePhase::Movement || self.is_over() {
            return None;
        }
        let preferred = match self.last_mover {
            Some(side) => side.opposite(),
            None => self.first_mover()?,
        };
        [preferred, preferred.opposite()]
            .into_iter()
            .find(|&side| !self.units_awaiting_movement(side).is_empty())
    }

    /// Hash of the full derived state.
    ///
    /// Stable within one build; used to detect divergent derivations.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// Serialize to bytes.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| GameError::Serialization(e.to_string()))
    }

    /// Deserialize from bytes.
    ///
    /// # Errors
    /// Returns an error if the bytes are not a valid state.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| GameError::Serialization(e.to_string()))
    }

    /// Check structural invariants.
    ///
    /// No two living units share a hex, every unit is on the map, and
    /// armor/structure never exceed the unit's starting values.
    ///
    /// # Errors
    /// Returns [`GameError::InvariantViolation`] for the first violation.
    pub fn check_invariants(&self) -> Result<()> {
        let mut occupied = BTreeSet::new();
        for unit in self.units.values() {
            let hex = unit.position.hex;
            if !self.map.is_in_bounds(hex) {
                return Err(GameError::InvariantViolation(format!(
                    "unit {} is off the map at ({}, {})",
                    unit.id, hex.q, hex.r
                )));
            }
            if !unit.destroyed && !occupied.insert(hex) {
                return Err(GameError::InvariantViolation(format!(
                    "two units share hex ({}, {})",
                    hex.q, hex.r
                )));
            }
            for location in Location::ALL {
                let current = unit.location(location);
                let armor = unit.definition.armor_at(location);
                if current.armor > armor.front
                    || current.rear_armor > armor.rear
                    || current.structure > unit.definition.structure_at(location)
                {
                    return Err(GameError::InvariantViolation(format!(
                        "unit {} {} exceeds its maximum armor or structure",
                        unit.id,
                        location.abbreviation()
                    )));
                }
                if current.destroyed && current.structure != 0 {
                    return Err(GameError::InvariantViolation(format!(
                        "unit {} {} is destroyed with structure left",
                        unit.id,
                        location.abbreviation()
                    )));
                }
            }
            for (bin, &shots) in unit.ammo.iter().enumerate() {
                let max = unit.definition.ammo.get(bin).map_or(0, |b| b.shots);
                if shots > max {
                    return Err(GameError::InvariantViolation(format!(
                        "unit {} ammo bin {bin} holds {shots} of {max}",
                        unit.id
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::standard_template;

    fn hunchback(id: UnitId, side: Side, hex: HexCoordinate) -> UnitCombatState {
        let definition = standard_template("HBK-4G")
            .and_then(|t| t.build().ok())
            .expect("hunchback builds");
        UnitCombatState::new(
            id,
            side,
            definition,
            &PilotDefinition::default(),
            UnitPosition::new(hex, HexDirection::North),
        )
    }

    #[test]
    fn test_new_unit_matches_definition() {
        let unit = hunchback(1, Side::Player, HexCoordinate::new(0, 0));
        assert_eq!(unit.location(Location::CenterTorso).armor, 26);
        assert_eq!(unit.location(Location::CenterTorso).rear_armor, 5);
        assert_eq!(unit.location(Location::CenterTorso).structure, 16);
        assert_eq!(unit.ammo, vec![5, 5]);
        assert_eq!(unit.dissipation(), 13);
        assert!(unit.is_operational());
    }

    #[test]
    fn test_ammo_drains_bins_in_order() {
        let mut unit = hunchback(1, Side::Player, HexCoordinate::new(0, 0));
        assert_eq!(unit.next_ammo_bin(0), Some(0));
        unit.ammo[0] = 0;
        assert_eq!(unit.next_ammo_bin(0), Some(1));
        assert_eq!(unit.ammo_available(0), 5);
        unit.ammo[1] = 0;
        assert_eq!(unit.next_ammo_bin(0), None);
        // Energy weapons have no bins
        assert_eq!(unit.next_ammo_bin(1), None);
    }

    #[test]
    fn test_damaged_heat_sink_reduces_dissipation() {
        let mut unit = hunchback(1, Side::Player, HexCoordinate::new(0, 0));
        let (location, index) = unit
            .definition
            .critical_slots
            .iter()
            .find_map(|(loc, slots)| {
                slots
                    .iter()
                    .position(|s| *s == SlotContent::HeatSink)
                    .map(|i| (*loc, i))
            })
            .expect("hunchback carries external sinks");
        unit.damaged_slots.get_mut(&location).expect("slots")[index] = true;
        assert_eq!(unit.dissipation(), 12);
    }

    #[test]
    fn test_invariants_catch_stacking() {
        let mut state = GameState {
            map: BattleMap::open(crate::hex::MapConfig::new(8, 8)),
            ..GameState::default()
        };
        state.units.insert(1, hunchback(1, Side::Player, HexCoordinate::new(2, 2)));
        state.units.insert(2, hunchback(2, Side::Opponent, HexCoordinate::new(2, 2)));
        assert!(matches!(
            state.check_invariants(),
            Err(GameError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_state_hash_changes_with_state() {
        let mut state = GameState::default();
        let before = state.state_hash();
        state.turn = 2;
        assert_ne!(before, state.state_hash());
    }

    #[test]
    fn test_bincode_roundtrip() {
        let mut state = GameState::default();
        state.units.insert(1, hunchback(1, Side::Player, HexCoordinate::new(2, 2)));
        let bytes = state.serialize().expect("serializes");
        let restored = GameState::deserialize(&bytes).expect("deserializes");
        assert_eq!(state, restored);
    }
}
