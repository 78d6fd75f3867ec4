//! Piloting skill rolls, falls and pilot consciousness.

use serde::{Deserialize, Serialize};

use crate::hex::HexDirection;
use crate::hit_location::HitTable;
use crate::state::UnitCombatState;
use crate::unit::SlotContent;

/// Why a piloting skill roll is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PsrReason {
    /// Took heavy damage in one phase.
    HeavyDamage,
    /// A leg was destroyed.
    LegDestroyed,
    /// Gyro critical.
    GyroHit,
    /// Hip actuator critical.
    HipHit,
    /// Upper/lower leg or foot actuator critical.
    LegActuatorHit,
    /// Ran or jumped while running hot.
    HighHeatMovement,
    /// Jumped with leg or gyro damage.
    JumpWithDamage,
    /// Attempting to stand from prone.
    StandingUp,
}

impl PsrReason {
    /// Extra modifier for this reason.
    #[must_use]
    pub const fn modifier(self) -> i32 {
        match self {
            Self::HeavyDamage => 1,
            _ => 0,
        }
    }
}

/// Wounds that kill a pilot.
pub const PILOT_DEATH_WOUNDS: u8 = 6;

/// Points per fall damage cluster.
pub const FALL_CLUSTER_SIZE: u32 = 5;

/// Piloting roll target number, `None` when the roll fails automatically.
///
/// Piloting skill, plus pilot wounds, +3 for one gyro hit, +2 per hip hit,
/// +1 per other leg actuator hit and +5 per destroyed leg. A destroyed gyro
/// or an unconscious pilot fails automatically.
#[must_use]
pub fn psr_target(unit: &UnitCombatState, reason: PsrReason) -> Option<u8> {
    let gyro_hits = unit.count_damaged(|slot| slot == SlotContent::Gyro);
    if gyro_hits >= 2 || !unit.pilot.conscious || unit.pilot.is_dead() {
        return None;
    }
    let mut target = i32::from(unit.pilot.piloting) + i32::from(unit.pilot.wounds);
    target += gyro_hits as i32 * 3;
    target += unit.count_damaged(|slot| slot == SlotContent::Hip) as i32 * 2;
    target += unit.count_damaged(SlotContent::is_leg_actuator) as i32;
    target += unit.destroyed_legs() as i32 * 5;
    target += reason.modifier();
    Some(target.clamp(2, 13) as u8)
}

/// Fall damage: `ceil(tonnage / 10) * (height + 1)`.
#[must_use]
pub const fn fall_damage(tonnage: u32, height: u32) -> u32 {
    tonnage.div_ceil(10) * (height + 1)
}

/// Split fall damage into 5-point clusters, remainder last.
#[must_use]
pub fn fall_clusters(total: u32) -> Vec<u32> {
    let mut clusters = Vec::new();
    let mut remaining = total;
    while remaining > 0 {
        let cluster = remaining.min(FALL_CLUSTER_SIZE);
        clusters.push(cluster);
        remaining -= cluster;
    }
    clusters
}

/// Side a unit lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FallDirection {
    /// Falls forward.
    Front,
    /// Falls to the right.
    Right,
    /// Falls backward.
    Rear,
    /// Falls to the left.
    Left,
}

/// Fall direction for a d6 roll and the facing rotation it applies.
///
/// 1 front (+0), 2 right (+1), 3 right (+2), 4 rear (+3), 5 left (+4),
/// 6 left (+5).
#[must_use]
pub const fn fall_direction(roll: u8) -> (FallDirection, i32) {
    match roll {
        1 => (FallDirection::Front, 0),
        2 => (FallDirection::Right, 1),
        3 => (FallDirection::Right, 2),
        4 => (FallDirection::Rear, 3),
        5 => (FallDirection::Left, 4),
        _ => (FallDirection::Left, 5),
    }
}

impl FallDirection {
    /// Hit-location table for damage from this fall.
    #[must_use]
    pub const fn hit_table(self) -> HitTable {
        match self {
            Self::Front => HitTable::Front,
            Self::Right => HitTable::Right,
            Self::Rear => HitTable::Rear,
            Self::Left => HitTable::Left,
        }
    }
}

/// Facing after a fall with the given d6 roll.
#[must_use]
pub const fn facing_after_fall(facing: HexDirection, roll: u8) -> HexDirection {
    facing.rotate(fall_direction(roll).1)
}

/// Consciousness roll target for a wound total, `None` if no roll applies.
///
/// 1 wound: 3, 2: 5, 3: 7, 4: 10, 5: 11. Six wounds kill the pilot.
#[must_use]
pub const fn consciousness_target(wounds: u8) -> Option<u8> {
    match wounds {
        1 => Some(3),
        2 => Some(5),
        3 => Some(7),
        4 => Some(10),
        5 => Some(11),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fall_damage_formula() {
        assert_eq!(fall_damage(80, 0), 8);
        assert_eq!(fall_damage(60, 2), 18);
        assert_eq!(fall_damage(35, 0), 4);
    }

    #[test]
    fn test_fall_clusters() {
        assert_eq!(fall_clusters(8), vec![5, 3]);
        assert_eq!(fall_clusters(18), vec![5, 5, 5, 3]);
        assert_eq!(fall_clusters(10), vec![5, 5]);
        assert!(fall_clusters(0).is_empty());
    }

    #[test]
    fn test_fall_direction_table() {
        assert_eq!(fall_direction(1), (FallDirection::Front, 0));
        assert_eq!(fall_direction(2), (FallDirection::Right, 1));
        assert_eq!(fall_direction(3), (FallDirection::Right, 2));
        assert_eq!(fall_direction(4), (FallDirection::Rear, 3));
        assert_eq!(fall_direction(5), (FallDirection::Left, 4));
        assert_eq!(fall_direction(6), (FallDirection::Left, 5));
        assert_eq!(
            facing_after_fall(HexDirection::SouthWest, 4),
            HexDirection::NorthEast
        );
    }

    #[test]
    fn test_consciousness_thresholds() {
        assert_eq!(consciousness_target(0), None);
        assert_eq!(consciousness_target(1), Some(3));
        assert_eq!(consciousness_target(4), Some(10));
        assert_eq!(consciousness_target(5), Some(11));
        assert_eq!(consciousness_target(PILOT_DEATH_WOUNDS), None);
    }
}
