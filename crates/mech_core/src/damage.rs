//! Armor and structure damage.
//!
//! Damage eats armor first, then internal structure. Whatever is left after
//! a location is destroyed moves inward along [`Location::transfer_target`].
//! Every step is captured as a [`DamageRecord`] with absolute after-values,
//! so the reducer can replay it without recomputing anything.

use serde::{Deserialize, Serialize};

use crate::events::DestructionCause;
use crate::state::UnitCombatState;
use crate::unit::{Location, SlotContent};

/// Third engine hit destroys the unit.
pub const ENGINE_DESTRUCTION_HITS: u32 = 3;

/// Damage taken at one location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DamageRecord {
    /// Location.
    pub location: Location,
    /// Rear armor face.
    pub rear: bool,
    /// Armor removed.
    pub armor_damage: u32,
    /// Structure removed.
    pub structure_damage: u32,
    /// Armor left on the struck face.
    pub armor_after: u32,
    /// Structure left.
    pub structure_after: u32,
    /// Location destroyed by this damage.
    pub destroyed: bool,
}

impl DamageRecord {
    /// Internal structure was damaged but the location survived.
    #[must_use]
    pub const fn breaches_structure(&self) -> bool {
        self.structure_damage > 0 && !self.destroyed
    }
}

#[derive(Debug, Clone, Copy)]
enum DamageMode {
    Standard,
    Internal,
}

/// Apply `amount` damage to a unit starting at `location`.
///
/// Mutates the unit and returns the records describing each step,
/// including arms lost with a destroyed side torso.
pub fn apply_damage(
    unit: &mut UnitCombatState,
    location: Location,
    rear: bool,
    amount: u32,
) -> Vec<DamageRecord> {
    walk_damage(unit, location, rear, amount, DamageMode::Standard)
}

/// Apply damage that bypasses armor, as from an ammunition explosion.
///
/// CASE at a location vents whatever the location cannot absorb.
pub fn apply_internal_damage(
    unit: &mut UnitCombatState,
    location: Location,
    amount: u32,
) -> Vec<DamageRecord> {
    walk_damage(unit, location, false, amount, DamageMode::Internal)
}

fn walk_damage(
    unit: &mut UnitCombatState,
    mut location: Location,
    mut rear: bool,
    amount: u32,
    mode: DamageMode,
) -> Vec<DamageRecord> {
    let mut records = Vec::new();
    let mut remaining = amount;
    rear = rear && location.has_rear_armor();

    while remaining > 0 {
        let current = unit.location(location);
        if !current.destroyed {
            let armor_before = if rear { current.rear_armor } else { current.armor };
            let armor_damage = match mode {
                DamageMode::Standard => remaining.min(armor_before),
                DamageMode::Internal => 0,
            };
            remaining -= armor_damage;
            let structure_damage = remaining.min(current.structure);
            remaining -= structure_damage;
            let structure_after = current.structure - structure_damage;

            let record = DamageRecord {
                location,
                rear,
                armor_damage,
                structure_damage,
                armor_after: armor_before - armor_damage,
                structure_after,
                destroyed: structure_after == 0,
            };
            apply_record(unit, &record);
            records.push(record);

            if record.destroyed {
                if let Some(arm) = location.attached_arm() {
                    if !unit.is_location_destroyed(arm) {
                        let lost = DamageRecord {
                            location: arm,
                            rear: false,
                            armor_damage: 0,
                            structure_damage: 0,
                            armor_after: 0,
                            structure_after: 0,
                            destroyed: true,
                        };
                        apply_record(unit, &lost);
                        records.push(lost);
                    }
                }
            }
            if matches!(mode, DamageMode::Internal) && unit.definition.has_case(location) {
                break;
            }
        }
        if remaining == 0 {
            break;
        }
        match location.transfer_target() {
            Some(next) => {
                rear = rear && next.has_rear_armor();
                location = next;
            }
            None => break,
        }
    }
    records
}

/// Write a record's after-values into a unit.
pub fn apply_record(unit: &mut UnitCombatState, record: &DamageRecord) {
    let state = unit.locations.entry(record.location).or_default();
    if record.rear {
        state.rear_armor = record.armor_after;
    } else {
        state.armor = record.armor_after;
    }
    state.structure = record.structure_after;
    unit.activity.damage_this_phase += record.armor_damage + record.structure_damage;
    if record.destroyed {
        destroy_location(unit, record.location);
    }
}

/// Mark a location destroyed along with the weapons and ammo it holds.
pub fn destroy_location(unit: &mut UnitCombatState, location: Location) {
    let state = unit.locations.entry(location).or_default();
    state.destroyed = true;
    state.armor = 0;
    state.rear_armor = 0;
    state.structure = 0;

    for (index, mount) in unit.definition.weapons.iter().enumerate() {
        if mount.location == location {
            if let Some(flag) = unit.weapons_destroyed.get_mut(index) {
                *flag = true;
            }
        }
    }
    for (index, bin) in unit.definition.ammo.iter().enumerate() {
        if bin.location == location {
            if let Some(shots) = unit.ammo.get_mut(index) {
                *shots = 0;
            }
        }
    }
}

/// Whether the unit's current condition destroys it, and why.
#[must_use]
pub fn destruction_cause(unit: &UnitCombatState) -> Option<DestructionCause> {
    if unit.is_location_destroyed(Location::CenterTorso) {
        Some(DestructionCause::CenterTorsoDestroyed)
    } else if unit.is_location_destroyed(Location::Head) {
        Some(DestructionCause::HeadDestroyed)
    } else if unit.count_damaged(|slot| slot == SlotContent::Engine) >= ENGINE_DESTRUCTION_HITS {
        Some(DestructionCause::EngineDestroyed)
    } else if unit.pilot.is_dead() || unit.count_damaged(|slot| slot == SlotContent::Cockpit) > 0 {
        Some(DestructionCause::PilotKilled)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::standard_template;
    use crate::hex::{HexCoordinate, HexDirection};
    use crate::state::{Side, UnitPosition};
    use crate::unit::PilotDefinition;

    fn unit(id: &str) -> UnitCombatState {
        let definition = standard_template(id)
            .and_then(|t| t.build().ok())
            .expect("template builds");
        UnitCombatState::new(
            1,
            Side::Player,
            definition,
            &PilotDefinition::default(),
            UnitPosition::new(HexCoordinate::new(0, 0), HexDirection::North),
        )
    }

    #[test]
    fn test_armor_absorbs_first() {
        let mut target = unit("HBK-4G");
        let records = apply_damage(&mut target, Location::CenterTorso, false, 10);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].armor_damage, 10);
        assert_eq!(records[0].structure_damage, 0);
        assert_eq!(target.location(Location::CenterTorso).armor, 16);
        assert_eq!(target.activity.damage_this_phase, 10);
    }

    #[test]
    fn test_rear_hit_uses_rear_armor() {
        let mut target = unit("HBK-4G");
        let records = apply_damage(&mut target, Location::CenterTorso, true, 7);
        assert_eq!(records[0].armor_damage, 5);
        assert_eq!(records[0].structure_damage, 2);
        assert!(records[0].breaches_structure());
        assert_eq!(target.location(Location::CenterTorso).armor, 26);
        assert_eq!(target.location(Location::CenterTorso).structure, 14);
    }

    #[test]
    fn test_arm_destruction_transfers_to_torso() {
        let mut target = unit("HBK-4G");
        // Arm: 16 armor + 8 structure
        let records = apply_damage(&mut target, Location::LeftArm, false, 30);
        assert_eq!(records.len(), 2);
        assert!(records[0].destroyed);
        assert_eq!(records[1].location, Location::LeftTorso);
        assert_eq!(records[1].armor_damage, 6);
        assert!(target.is_location_destroyed(Location::LeftArm));
        assert!(target.weapons_destroyed[1]);
    }

    #[test]
    fn test_side_torso_takes_its_arm() {
        let mut target = unit("HBK-4G");
        // Right torso: 20 armor + 12 structure, AC/20 mounted there
        let records = apply_damage(&mut target, Location::RightTorso, false, 35);
        assert!(target.is_location_destroyed(Location::RightTorso));
        assert!(target.is_location_destroyed(Location::RightArm));
        assert!(target.weapons_destroyed[0]);
        assert!(target.weapons_destroyed[2]);
        let transfer = records.last().expect("transfer record");
        assert_eq!(transfer.location, Location::CenterTorso);
        assert_eq!(transfer.armor_damage, 3);
    }

    #[test]
    fn test_destroyed_location_passes_damage_through() {
        let mut target = unit("HBK-4G");
        destroy_location(&mut target, Location::LeftArm);
        let records = apply_damage(&mut target, Location::LeftArm, false, 5);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].location, Location::LeftTorso);
    }

    #[test]
    fn test_internal_damage_with_case_stops() {
        let mut target = unit("HBK-4G");
        target.definition.critical_slots.get_mut(&Location::LeftTorso).expect("slots")[11] =
            SlotContent::Case;
        let records = apply_internal_damage(&mut target, Location::LeftTorso, 100);
        assert_eq!(records[0].armor_damage, 0);
        assert!(records[0].destroyed);
        assert!(records.iter().all(|r| r.location != Location::CenterTorso));
        assert!(!target.is_location_destroyed(Location::CenterTorso));
        // Left torso armor is gone with the location
        assert_eq!(target.location(Location::LeftTorso).armor, 0);
    }

    #[test]
    fn test_internal_damage_without_case_reaches_center_torso() {
        let mut target = unit("HBK-4G");
        let records = apply_internal_damage(&mut target, Location::LeftTorso, 100);
        assert!(target.is_location_destroyed(Location::CenterTorso));
        assert_eq!(
            destruction_cause(&target),
            Some(DestructionCause::CenterTorsoDestroyed)
        );
        assert!(records.iter().all(|r| r.armor_damage == 0));
    }

    #[test]
    fn test_head_destruction_is_fatal() {
        let mut target = unit("HBK-4G");
        apply_damage(&mut target, Location::Head, false, 20);
        assert_eq!(destruction_cause(&target), Some(DestructionCause::HeadDestroyed));
    }

    #[test]
    fn test_replaying_records_matches() {
        let mut original = unit("AS7-D");
        let mut replayed = original.clone();
        let records = apply_damage(&mut original, Location::LeftLeg, false, 80);
        for record in &records {
            apply_record(&mut replayed, record);
        }
        assert_eq!(original, replayed);
    }
}
