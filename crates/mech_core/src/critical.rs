//! Critical hit determination and slot selection.
//!
//! The determination roll is never modified by armor. Armor rules only touch
//! the resulting count, and never a blown-off limb or destroyed head.

use serde::{Deserialize, Serialize};

use crate::dice::{DiceRoll, DiceRoller};
use crate::state::UnitCombatState;
use crate::unit::{ArmorType, CriticalHitRule, Location, SlotContent};

/// Outcome of the determination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CritDetermination {
    /// Number of critical slots to hit.
    Criticals(u32),
    /// Roll of 12 on an arm or leg.
    LimbBlownOff,
    /// Roll of 12 on the head.
    HeadDestroyed,
}

/// Look up a determination roll for a location.
///
/// 2-7 none, 8-9 one, 10-11 two. A 12 is three on a torso, blows off an arm
/// or leg, and destroys the head.
#[must_use]
pub const fn determine_criticals(location: Location, roll: u8) -> CritDetermination {
    match roll {
        0..=7 => CritDetermination::Criticals(0),
        8 | 9 => CritDetermination::Criticals(1),
        10 | 11 => CritDetermination::Criticals(2),
        _ => match location {
            Location::Head => CritDetermination::HeadDestroyed,
            Location::LeftArm | Location::RightArm | Location::LeftLeg | Location::RightLeg => {
                CritDetermination::LimbBlownOff
            }
            Location::CenterTorso | Location::LeftTorso | Location::RightTorso => {
                CritDetermination::Criticals(3)
            }
        },
    }
}

/// Apply an armor's critical rule to a rolled count.
#[must_use]
pub const fn apply_armor_rule(count: u32, rule: CriticalHitRule) -> u32 {
    match rule {
        CriticalHitRule::Standard => count,
        CriticalHitRule::Halved => {
            if count == 0 {
                0
            } else if count / 2 == 0 {
                1
            } else {
                count / 2
            }
        }
    }
}

/// A critical slot that was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CriticalSlotHit {
    /// Slot index within the location.
    pub slot: usize,
    /// What the slot held.
    pub content: SlotContent,
}

/// Result of critical hit resolution at one location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CritResult {
    /// Determination roll, `None` when the count was forced.
    pub determination: Option<DiceRoll>,
    /// Count from the table (or forced).
    pub rolled: u32,
    /// Count after armor rules.
    pub applied: u32,
    /// Slots hit, in selection order.
    pub hits: Vec<CriticalSlotHit>,
    /// Arm or leg blown off.
    pub limb_blown_off: bool,
    /// Head destroyed.
    pub head_destroyed: bool,
}

impl CritResult {
    /// Nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty() && !self.limb_blown_off && !self.head_destroyed
    }
}

/// Resolve critical hits at a location.
///
/// `force_crits` skips the determination roll and every armor rule. Slots
/// are drawn uniformly among undamaged, occupied slots; once none are left
/// the remaining criticals are lost.
pub fn resolve_critical_hits<R: DiceRoller + ?Sized>(
    unit: &UnitCombatState,
    location: Location,
    armor_type: ArmorType,
    force_crits: Option<u32>,
    dice: &mut R,
) -> CritResult {
    let (determination, rolled, applied, limb_blown_off, head_destroyed) = match force_crits {
        Some(count) => (None, count, count, false, false),
        None => {
            let roll = dice.roll_2d6();
            match determine_criticals(location, roll.total) {
                CritDetermination::Criticals(count) => (
                    Some(roll),
                    count,
                    apply_armor_rule(count, armor_type.critical_hit_rule()),
                    false,
                    false,
                ),
                CritDetermination::LimbBlownOff => (Some(roll), 0, 0, true, false),
                CritDetermination::HeadDestroyed => (Some(roll), 0, 0, false, true),
            }
        }
    };

    let mut candidates: Vec<(usize, SlotContent)> = unit
        .definition
        .slots_at(location)
        .iter()
        .enumerate()
        .filter(|(index, content)| content.is_critable() && !unit.is_slot_damaged(location, *index))
        .map(|(index, content)| (index, *content))
        .collect();

    let mut hits = Vec::new();
    for _ in 0..applied {
        let Some(pick) = dice.roll_index(candidates.len()) else {
            break;
        };
        let (slot, content) = candidates.remove(pick);
        hits.push(CriticalSlotHit { slot, content });
    }

    tracing::debug!(
        unit = unit.id,
        location = location.abbreviation(),
        rolled,
        applied,
        hits = hits.len(),
        "critical hits resolved"
    );

    CritResult {
        determination,
        rolled,
        applied,
        hits,
        limb_blown_off,
        head_destroyed,
    }
}

/// Mark critical slot hits on a unit. Weapon slots destroy their weapon.
pub fn apply_slot_hits(unit: &mut UnitCombatState, location: Location, hits: &[CriticalSlotHit]) {
    let slot_count = unit.definition.slots_at(location).len();
    let flags = unit
        .damaged_slots
        .entry(location)
        .or_insert_with(|| vec![false; slot_count]);
    for hit in hits {
        if let Some(flag) = flags.get_mut(hit.slot) {
            *flag = true;
        }
    }
    for hit in hits {
        if let SlotContent::Weapon(weapon) = hit.content {
            if let Some(flag) = unit.weapons_destroyed.get_mut(weapon) {
                *flag = true;
            }
        }
    }
}
