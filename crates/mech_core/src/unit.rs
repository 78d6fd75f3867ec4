//! Unit definitions consumed by the combat core.
//!
//! A [`UnitDefinition`] is the read-only construction data for one unit:
//! tonnage, armor and structure per location, mounted weapons, ammunition,
//! heat sinks and the critical-slot layout. The combat core never mutates a
//! definition; damage lives in [`crate::state::UnitCombatState`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::hex::RangeProfile;

/// Hit location on a biped unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Location {
    /// HD
    Head,
    /// CT
    CenterTorso,
    /// LT
    LeftTorso,
    /// RT
    RightTorso,
    /// LA
    LeftArm,
    /// RA
    RightArm,
    /// LL
    LeftLeg,
    /// RL
    RightLeg,
}

impl Location {
    /// All locations in record-sheet order.
    pub const ALL: [Self; 8] = [
        Self::Head,
        Self::CenterTorso,
        Self::LeftTorso,
        Self::RightTorso,
        Self::LeftArm,
        Self::RightArm,
        Self::LeftLeg,
        Self::RightLeg,
    ];

    /// Record-sheet abbreviation.
    #[must_use]
    pub const fn abbreviation(self) -> &'static str {
        match self {
            Self::Head => "HD",
            Self::CenterTorso => "CT",
            Self::LeftTorso => "LT",
            Self::RightTorso => "RT",
            Self::LeftArm => "LA",
            Self::RightArm => "RA",
            Self::LeftLeg => "LL",
            Self::RightLeg => "RL",
        }
    }

    /// Where excess damage flows once this location is destroyed.
    #[must_use]
    pub const fn transfer_target(self) -> Option<Self> {
        match self {
            Self::LeftArm | Self::LeftLeg => Some(Self::LeftTorso),
            Self::RightArm | Self::RightLeg => Some(Self::RightTorso),
            Self::LeftTorso | Self::RightTorso => Some(Self::CenterTorso),
            Self::CenterTorso | Self::Head => None,
        }
    }

    /// Arm attached to a side torso.
    #[must_use]
    pub const fn attached_arm(self) -> Option<Self> {
        match self {
            Self::LeftTorso => Some(Self::LeftArm),
            Self::RightTorso => Some(Self::RightArm),
            _ => None,
        }
    }

    /// Torso locations carry rear armor.
    #[must_use]
    pub const fn has_rear_armor(self) -> bool {
        matches!(self, Self::CenterTorso | Self::LeftTorso | Self::RightTorso)
    }

    /// Center, left or right torso.
    #[must_use]
    pub const fn is_torso(self) -> bool {
        self.has_rear_armor()
    }

    /// Left or right arm.
    #[must_use]
    pub const fn is_arm(self) -> bool {
        matches!(self, Self::LeftArm | Self::RightArm)
    }

    /// Left or right leg.
    #[must_use]
    pub const fn is_leg(self) -> bool {
        matches!(self, Self::LeftLeg | Self::RightLeg)
    }

    /// Number of critical slots.
    #[must_use]
    pub const fn slot_count(self) -> usize {
        match self {
            Self::Head | Self::LeftLeg | Self::RightLeg => 6,
            _ => 12,
        }
    }
}

/// How an armor type modifies critical-hit counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CriticalHitRule {
    /// Crit count applied as rolled.
    Standard,
    /// Crit count halved, minimum one.
    Halved,
}

/// Armor type per location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ArmorType {
    /// Standard armor.
    #[default]
    Standard,
    /// Ferro-Fibrous.
    FerroFibrous,
    /// Clan Ferro-Fibrous.
    FerroFibrousClan,
    /// Light Ferro-Fibrous.
    LightFerroFibrous,
    /// Heavy Ferro-Fibrous.
    HeavyFerroFibrous,
    /// Stealth armor.
    Stealth,
    /// Reactive armor (halves missile damage).
    Reactive,
    /// Reflective armor (halves energy damage).
    Reflective,
    /// Hardened armor (halves all damage, rounding up).
    Hardened,
    /// Ferro-Lamellor (halves crit counts).
    FerroLamellor,
    /// Primitive armor.
    Primitive,
    /// Industrial armor.
    Industrial,
    /// Commercial armor.
    Commercial,
    /// Heavy industrial armor.
    HeavyIndustrial,
    /// Impact-resistant armor.
    ImpactResistant,
}

impl ArmorType {
    /// Critical-hit rule for this armor.
    #[must_use]
    pub const fn critical_hit_rule(self) -> CriticalHitRule {
        match self {
            Self::FerroLamellor => CriticalHitRule::Halved,
            _ => CriticalHitRule::Standard,
        }
    }

    /// Damage actually applied for one hit of `damage` from `category`.
    #[must_use]
    pub const fn adjust_damage(self, damage: u32, category: WeaponCategory) -> u32 {
        if damage == 0 {
            return 0;
        }
        match (self, category) {
            (Self::Reflective, WeaponCategory::Energy) | (Self::Reactive, WeaponCategory::Missile) => {
                let halved = damage / 2;
                if halved == 0 {
                    1
                } else {
                    halved
                }
            }
            (Self::Hardened, _) => damage.div_ceil(2),
            _ => damage,
        }
    }
}

/// Heat sink technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HeatSinkType {
    /// Single heat sink.
    #[default]
    Single,
    /// Inner Sphere double heat sink.
    Double,
    /// Clan double heat sink.
    DoubleClan,
    /// Compact heat sink.
    Compact,
    /// Laser heat sink.
    Laser,
}

impl HeatSinkType {
    /// Heat dissipated per working sink.
    #[must_use]
    pub const fn capacity(self) -> u32 {
        match self {
            Self::Single | Self::Compact => 1,
            Self::Double | Self::DoubleClan | Self::Laser => 2,
        }
    }

    /// Critical slots per sink outside the engine.
    #[must_use]
    pub const fn slots(self) -> usize {
        match self {
            Self::Single | Self::Compact => 1,
            Self::DoubleClan | Self::Laser => 2,
            Self::Double => 3,
        }
    }
}

/// Broad weapon family, used by special armor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponCategory {
    /// Lasers, PPCs.
    Energy,
    /// Autocannons, machine guns.
    Ballistic,
    /// LRM/SRM racks.
    Missile,
    /// Non-damaging equipment such as TAG.
    Equipment,
}

/// Cluster behaviour of a weapon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterProfile {
    /// Missiles or submunitions per shot (cluster table column).
    pub size: u32,
    /// Damage of each missile.
    pub damage_per_missile: u32,
    /// Missiles grouped per hit-location roll.
    pub group_size: u32,
}

/// Static weapon statistics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeaponSpec {
    /// Display name, also the ammunition key.
    pub name: String,
    /// Weapon family.
    pub category: WeaponCategory,
    /// Damage per hit (total for non-cluster weapons).
    pub damage: u32,
    /// Heat generated when fired.
    pub heat: u32,
    /// Minimum and maximum range.
    pub range: RangeProfile,
    /// Weapon-specific to-hit modifier (pulse lasers are negative).
    #[serde(default)]
    pub to_hit_modifier: i32,
    /// Cluster profile for missile racks and LB-X.
    #[serde(default)]
    pub cluster: Option<ClusterProfile>,
    /// Shots per ton of ammunition, `None` for energy weapons.
    #[serde(default)]
    pub ammo_per_ton: Option<u32>,
    /// Critical slots occupied.
    pub slots: usize,
    /// Can fire indirectly with a spotter.
    #[serde(default)]
    pub indirect_fire: bool,
    /// Semi-guided missiles benefit from TAG.
    #[serde(default)]
    pub semi_guided: bool,
    /// Target designator.
    #[serde(default)]
    pub tag: bool,
}

impl WeaponSpec {
    /// Whether the weapon consumes ammunition.
    #[must_use]
    pub const fn uses_ammo(&self) -> bool {
        self.ammo_per_ton.is_some()
    }

    /// Damage one round of ammunition does when it cooks off.
    #[must_use]
    pub fn explosion_damage_per_shot(&self) -> u32 {
        self.cluster
            .map_or(self.damage, |cluster| cluster.size * cluster.damage_per_missile)
    }
}

/// A weapon placed on a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeaponMount {
    /// Weapon statistics.
    pub spec: WeaponSpec,
    /// Location it is mounted in.
    pub location: Location,
    /// Fires into the rear arc.
    #[serde(default)]
    pub rear_mounted: bool,
}

/// One ton of ammunition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AmmoBin {
    /// Weapon name this ammunition feeds.
    pub weapon: String,
    /// Location of the bin.
    pub location: Location,
    /// Starting shots.
    pub shots: u32,
    /// Damage per shot if the bin explodes.
    pub damage_per_shot: u32,
}

/// Content of one critical slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotContent {
    /// Unused slot.
    Empty,
    /// Fusion engine.
    Engine,
    /// Gyro.
    Gyro,
    /// Cockpit.
    Cockpit,
    /// Life support.
    LifeSupport,
    /// Sensors.
    Sensors,
    /// Shoulder actuator.
    Shoulder,
    /// Upper arm actuator.
    UpperArm,
    /// Lower arm actuator.
    LowerArm,
    /// Hand actuator.
    Hand,
    /// Hip actuator.
    Hip,
    /// Upper leg actuator.
    UpperLeg,
    /// Lower leg actuator.
    LowerLeg,
    /// Foot actuator.
    Foot,
    /// External heat sink.
    HeatSink,
    /// Jump jet.
    JumpJet,
    /// Weapon by index into [`UnitDefinition::weapons`].
    Weapon(usize),
    /// Ammunition by index into [`UnitDefinition::ammo`].
    Ammo(usize),
    /// Cellular Ammunition Storage Equipment.
    Case,
    /// Endo-steel or similar bulk structure.
    Structure,
}

impl SlotContent {
    /// Whether a critical hit can land in this slot.
    #[must_use]
    pub const fn is_critable(self) -> bool {
        !matches!(self, Self::Empty)
    }

    /// Leg actuators below the hip.
    #[must_use]
    pub const fn is_leg_actuator(self) -> bool {
        matches!(self, Self::UpperLeg | Self::LowerLeg | Self::Foot)
    }
}

/// Armor allocation for one location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ArmorAllocation {
    /// Front armor points.
    pub front: u32,
    /// Rear armor points (torsos only).
    #[serde(default)]
    pub rear: u32,
    /// Armor type at this location.
    #[serde(default)]
    pub armor_type: ArmorType,
}

/// Pilot skills supplied by the campaign layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PilotDefinition {
    /// Callsign or name.
    pub name: String,
    /// Gunnery skill (lower is better).
    pub gunnery: u8,
    /// Piloting skill (lower is better).
    pub piloting: u8,
    /// Wounds carried into the battle.
    #[serde(default)]
    pub wounds: u8,
}

impl Default for PilotDefinition {
    fn default() -> Self {
        Self {
            name: "MechWarrior".to_string(),
            gunnery: 4,
            piloting: 5,
            wounds: 0,
        }
    }
}

/// Standard internal structure per location for a tonnage.
///
/// Returns `(center torso, side torso, arm, leg)`; the head is always 3.
#[must_use]
pub const fn standard_structure(tonnage: u32) -> Option<(u32, u32, u32, u32)> {
    let values = match tonnage {
        20 => (6, 5, 3, 4),
        25 => (8, 6, 4, 6),
        30 => (10, 7, 5, 7),
        35 => (11, 8, 6, 8),
        40 => (12, 10, 6, 10),
        45 => (14, 11, 7, 11),
        50 => (16, 12, 8, 12),
        55 => (18, 13, 9, 13),
        60 => (20, 14, 10, 14),
        65 => (21, 15, 10, 15),
        70 => (22, 15, 11, 15),
        75 => (23, 16, 12, 16),
        80 => (25, 17, 13, 17),
        85 => (27, 18, 14, 18),
        90 => (29, 19, 15, 19),
        95 => (30, 20, 16, 20),
        100 => (31, 21, 17, 21),
        _ => return None,
    };
    Some(values)
}

/// Head structure is fixed for every tonnage.
pub const HEAD_STRUCTURE: u32 = 3;

/// Maximum head armor.
pub const MAX_HEAD_ARMOR: u32 = 9;

/// Number of heat sinks the engine carries without using slots.
pub const ENGINE_HEAT_SINKS: u32 = 10;

/// Standard biped critical-slot layout with every free slot empty.
#[must_use]
pub fn standard_biped_slots() -> BTreeMap<Location, Vec<SlotContent>> {
    use SlotContent::{
        Cockpit, Empty, Engine, Foot, Gyro, Hand, Hip, LifeSupport, LowerArm, LowerLeg, Sensors,
        Shoulder, UpperArm, UpperLeg,
    };

    let arm = || {
        let mut slots = vec![Shoulder, UpperArm, LowerArm, Hand];
        slots.resize(12, Empty);
        slots
    };
    let leg = || vec![Hip, UpperLeg, LowerLeg, Foot, Empty, Empty];

    let mut layout = BTreeMap::new();
    layout.insert(
        Location::Head,
        vec![LifeSupport, Sensors, Cockpit, Empty, Sensors, LifeSupport],
    );
    let mut center = vec![Engine, Engine, Engine, Gyro, Gyro, Gyro, Gyro, Engine, Engine, Engine];
    center.resize(12, Empty);
    layout.insert(Location::CenterTorso, center);
    layout.insert(Location::LeftTorso, vec![Empty; 12]);
    layout.insert(Location::RightTorso, vec![Empty; 12]);
    layout.insert(Location::LeftArm, arm());
    layout.insert(Location::RightArm, arm());
    layout.insert(Location::LeftLeg, leg());
    layout.insert(Location::RightLeg, leg());
    layout
}

/// Read-only construction data for one unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitDefinition {
    /// Stable identifier, e.g. `"HBK-4G"`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Mass in tons.
    pub tonnage: u32,
    /// Base walking MP.
    pub walk_mp: u32,
    /// Base jumping MP.
    #[serde(default)]
    pub jump_mp: u32,
    /// Total heat sinks, engine-integrated included.
    pub heat_sinks: u32,
    /// Heat sink technology.
    #[serde(default)]
    pub heat_sink_type: HeatSinkType,
    /// Armor per location.
    pub armor: BTreeMap<Location, ArmorAllocation>,
    /// Internal structure per location.
    pub structure: BTreeMap<Location, u32>,
    /// Mounted weapons.
    #[serde(default)]
    pub weapons: Vec<WeaponMount>,
    /// Ammunition bins.
    #[serde(default)]
    pub ammo: Vec<AmmoBin>,
    /// Critical slots per location.
    pub critical_slots: BTreeMap<Location, Vec<SlotContent>>,
    /// Battle Value, informational only.
    #[serde(default)]
    pub battle_value: u32,
}

impl UnitDefinition {
    /// Armor allocation at a location.
    #[must_use]
    pub fn armor_at(&self, location: Location) -> ArmorAllocation {
        self.armor.get(&location).copied().unwrap_or_default()
    }

    /// Internal structure at a location.
    #[must_use]
    pub fn structure_at(&self, location: Location) -> u32 {
        self.structure.get(&location).copied().unwrap_or(0)
    }

    /// Slots at a location.
    #[must_use]
    pub fn slots_at(&self, location: Location) -> &[SlotContent] {
        self.critical_slots
            .get(&location)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether CASE protects a location.
    #[must_use]
    pub fn has_case(&self, location: Location) -> bool {
        self.slots_at(location).contains(&SlotContent::Case)
    }

    /// Ammo bins feeding a weapon.
    pub fn bins_for<'a>(&'a self, weapon: &'a WeaponSpec) -> impl Iterator<Item = usize> + 'a {
        self.ammo
            .iter()
            .enumerate()
            .filter(move |(_, bin)| bin.weapon == weapon.name)
            .map(|(index, _)| index)
    }

    /// Validate construction rules.
    ///
    /// # Errors
    /// Returns [`GameError::InvalidDefinition`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| {
            Err(GameError::InvalidDefinition {
                unit: self.id.clone(),
                message,
            })
        };

        if standard_structure(self.tonnage).is_none() {
            return fail(format!("unsupported tonnage {}", self.tonnage));
        }
        if self.walk_mp == 0 {
            return fail("walking MP must be at least 1".to_string());
        }
        if self.heat_sinks < ENGINE_HEAT_SINKS {
            return fail(format!("at least {ENGINE_HEAT_SINKS} heat sinks required"));
        }

        for location in Location::ALL {
            let structure = self.structure_at(location);
            if structure == 0 {
                return fail(format!("{} has no internal structure", location.abbreviation()));
            }
            let armor = self.armor_at(location);
            if armor.rear > 0 && !location.has_rear_armor() {
                return fail(format!("{} cannot carry rear armor", location.abbreviation()));
            }
            let total = armor.front + armor.rear;
            let max = if location == Location::Head {
                MAX_HEAD_ARMOR
            } else {
                structure * 2
            };
            if total > max {
                return fail(format!(
                    "{} armor {total} exceeds maximum {max}",
                    location.abbreviation()
                ));
            }
            let slots = self.slots_at(location);
            if slots.len() > location.slot_count() {
                return fail(format!(
                    "{} uses {} slots of {}",
                    location.abbreviation(),
                    slots.len(),
                    location.slot_count()
                ));
            }
            for slot in slots {
                match *slot {
                    SlotContent::Weapon(index) if index >= self.weapons.len() => {
                        return fail(format!("slot references missing weapon {index}"));
                    }
                    SlotContent::Ammo(index) if index >= self.ammo.len() => {
                        return fail(format!("slot references missing ammo bin {index}"));
                    }
                    _ => {}
                }
            }
        }

        for bin in &self.ammo {
            if !self.weapons.iter().any(|w| w.spec.name == bin.weapon && w.spec.uses_ammo()) {
                return fail(format!("ammunition for '{}' feeds no weapon", bin.weapon));
            }
        }
        for (index, weapon) in self.weapons.iter().enumerate() {
            if weapon.rear_mounted && !weapon.location.is_torso() {
                return fail(format!("weapon {index} is rear-mounted outside a torso"));
            }
            let placed = self
                .critical_slots
                .values()
                .flatten()
                .filter(|slot| **slot == SlotContent::Weapon(index))
                .count();
            if placed != weapon.spec.slots {
                return fail(format!(
                    "weapon {} occupies {placed} slots, expected {}",
                    weapon.spec.name, weapon.spec.slots
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_chain() {
        assert_eq!(Location::LeftArm.transfer_target(), Some(Location::LeftTorso));
        assert_eq!(Location::RightLeg.transfer_target(), Some(Location::RightTorso));
        assert_eq!(Location::LeftTorso.transfer_target(), Some(Location::CenterTorso));
        assert_eq!(Location::CenterTorso.transfer_target(), None);
        assert_eq!(Location::Head.transfer_target(), None);
    }

    #[test]
    fn test_special_armor_damage() {
        assert_eq!(ArmorType::Reflective.adjust_damage(5, WeaponCategory::Energy), 2);
        assert_eq!(ArmorType::Reflective.adjust_damage(1, WeaponCategory::Energy), 1);
        assert_eq!(ArmorType::Reflective.adjust_damage(10, WeaponCategory::Ballistic), 10);
        assert_eq!(ArmorType::Reactive.adjust_damage(5, WeaponCategory::Missile), 2);
        assert_eq!(ArmorType::Hardened.adjust_damage(5, WeaponCategory::Energy), 3);
        assert_eq!(ArmorType::Standard.adjust_damage(5, WeaponCategory::Energy), 5);
    }

    #[test]
    fn test_only_ferro_lamellor_halves_crits() {
        assert_eq!(ArmorType::FerroLamellor.critical_hit_rule(), CriticalHitRule::Halved);
        assert_eq!(ArmorType::Hardened.critical_hit_rule(), CriticalHitRule::Standard);
    }

    #[test]
    fn test_structure_table() {
        assert_eq!(standard_structure(50), Some((16, 12, 8, 12)));
        assert_eq!(standard_structure(100), Some((31, 21, 17, 21)));
        assert_eq!(standard_structure(52), None);
    }

    #[test]
    fn test_biped_layout_fits_locations() {
        let layout = standard_biped_slots();
        for location in Location::ALL {
            assert_eq!(layout[&location].len(), location.slot_count());
        }
        let engines = layout[&Location::CenterTorso]
            .iter()
            .filter(|s| **s == SlotContent::Engine)
            .count();
        assert_eq!(engines, 6);
    }

    #[test]
    fn test_heat_sink_capacity() {
        assert_eq!(HeatSinkType::Single.capacity(), 1);
        assert_eq!(HeatSinkType::Double.capacity(), 2);
        assert_eq!(HeatSinkType::Double.slots(), 3);
    }
}
