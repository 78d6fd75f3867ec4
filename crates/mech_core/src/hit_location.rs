//! Hit-location and cluster tables.

use serde::{Deserialize, Serialize};

use crate::dice::{DiceRoll, DiceRoller};
use crate::hex::Arc;
use crate::unit::Location;

/// Which hit-location table an attack or fall uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HitTable {
    /// Attacks from the front.
    Front,
    /// Attacks from behind; torso hits strike rear armor.
    Rear,
    /// Attacks from the left side.
    Left,
    /// Attacks from the right side.
    Right,
}

impl HitTable {
    /// Table for an attack arriving through `arc` of the target.
    ///
    /// Prone targets use the rear table from the rear arc and the front
    /// table from every other arc.
    #[must_use]
    pub const fn for_attack(arc: Arc, target_prone: bool) -> Self {
        match (arc, target_prone) {
            (Arc::Rear, _) => Self::Rear,
            (_, true) | (Arc::Front, false) => Self::Front,
            (Arc::Left, false) => Self::Left,
            (Arc::Right, false) => Self::Right,
        }
    }

    /// Whether torso hits from this table strike rear armor.
    #[must_use]
    pub const fn strikes_rear_armor(self) -> bool {
        matches!(self, Self::Rear)
    }
}

/// A resolved hit location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HitLocation {
    /// Location struck.
    pub location: Location,
    /// Rear armor struck.
    pub rear: bool,
    /// Roll of 2: possible through-armor critical.
    pub through_armor_critical: bool,
}

/// Look up a 2d6 total on a hit-location table.
#[must_use]
pub const fn hit_location(table: HitTable, roll: u8) -> HitLocation {
    use Location::{
        CenterTorso, Head, LeftArm, LeftLeg, LeftTorso, RightArm, RightLeg, RightTorso,
    };

    let location = match table {
        HitTable::Front | HitTable::Rear => match roll {
            2 | 7 => CenterTorso,
            3 | 4 => RightArm,
            5 => RightLeg,
            6 => RightTorso,
            8 => LeftTorso,
            9 => LeftLeg,
            10 | 11 => LeftArm,
            _ => Head,
        },
        HitTable::Left => match roll {
            2 | 7 => LeftTorso,
            3 | 6 => LeftLeg,
            4 | 5 => LeftArm,
            8 => CenterTorso,
            9 => RightTorso,
            10 => RightArm,
            11 => RightLeg,
            _ => Head,
        },
        HitTable::Right => match roll {
            2 | 7 => RightTorso,
            3 | 6 => RightLeg,
            4 | 5 => RightArm,
            8 => CenterTorso,
            9 => LeftTorso,
            10 => LeftArm,
            11 => LeftLeg,
            _ => Head,
        },
    };
    HitLocation {
        location,
        rear: table.strikes_rear_armor() && location.has_rear_armor(),
        through_armor_critical: roll == 2,
    }
}

/// Roll a hit location.
pub fn roll_hit_location<R: DiceRoller + ?Sized>(table: HitTable, dice: &mut R) -> (DiceRoll, HitLocation) {
    let roll = dice.roll_2d6();
    (roll, hit_location(table, roll.total))
}

/// Cluster hits table, rows for sizes 2 through 20, columns for rolls 2-12.
const CLUSTER_TABLE: [[u8; 11]; 19] = [
    [1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2],
    [1, 1, 1, 2, 2, 2, 2, 2, 3, 3, 3],
    [1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4],
    [1, 2, 2, 3, 3, 3, 3, 4, 4, 5, 5],
    [2, 2, 3, 3, 4, 4, 4, 5, 5, 6, 6],
    [2, 2, 3, 4, 4, 4, 4, 6, 6, 7, 7],
    [3, 3, 4, 4, 5, 5, 5, 6, 6, 8, 8],
    [3, 3, 4, 5, 5, 5, 5, 7, 7, 9, 9],
    [3, 3, 4, 6, 6, 6, 6, 8, 8, 10, 10],
    [4, 4, 5, 7, 7, 7, 7, 9, 9, 11, 11],
    [4, 4, 5, 8, 8, 8, 8, 10, 10, 12, 12],
    [4, 4, 5, 8, 8, 8, 8, 11, 11, 13, 13],
    [5, 5, 6, 9, 9, 9, 9, 11, 11, 14, 14],
    [5, 5, 6, 9, 9, 9, 9, 12, 12, 15, 15],
    [5, 5, 7, 10, 10, 10, 10, 13, 13, 16, 16],
    [5, 5, 7, 10, 10, 10, 10, 14, 14, 17, 17],
    [6, 6, 8, 11, 11, 11, 11, 14, 14, 18, 18],
    [6, 6, 8, 11, 11, 11, 11, 15, 15, 19, 19],
    [6, 6, 9, 12, 12, 12, 12, 16, 16, 20, 20],
];

/// Number of missiles that hit for a rack of `size` on a (modified) roll.
///
/// Rolls are clamped to 2-12. Racks larger than 20 use the 20 column and
/// scale the remainder.
#[must_use]
pub fn cluster_hits(size: u32, roll: i32) -> u32 {
    let column = (roll.clamp(2, 12) - 2) as usize;
    match size {
        0 => 0,
        1 => 1,
        2..=20 => u32::from(CLUSTER_TABLE[(size - 2) as usize][column]),
        _ => {
            let full = u32::from(CLUSTER_TABLE[18][column]);
            full * size / 20
        }
    }
}

/// Split `hits` missiles of `damage_per_missile` into location groups.
#[must_use]
pub fn cluster_groups(hits: u32, damage_per_missile: u32, group_size: u32) -> Vec<u32> {
    let group_size = group_size.max(1);
    let mut groups = Vec::new();
    let mut remaining = hits;
    while remaining > 0 {
        let missiles = remaining.min(group_size);
        groups.push(missiles * damage_per_missile);
        remaining -= missiles;
    }
    groups
}
