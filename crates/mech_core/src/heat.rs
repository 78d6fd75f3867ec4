//! Heat scale.
//!
//! This module is the only place heat thresholds live. Movement, attack and
//! end-of-turn resolution all read effects through [`heat_effects`].

use serde::{Deserialize, Serialize};

use crate::movement::MovementType;

/// Outcome of a heat threshold lookup for a dice-driven check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThresholdCheck {
    /// Heat too low for the check.
    None,
    /// Roll 2d6 and meet or beat the target number to avoid the effect.
    Roll(u8),
    /// The effect happens without a roll.
    Automatic,
}

impl ThresholdCheck {
    /// Whether any check is needed.
    #[must_use]
    pub const fn is_required(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Every effect of a heat level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeatEffects {
    /// Added to every to-hit number.
    pub to_hit_modifier: i32,
    /// Subtracted from walking MP.
    pub movement_penalty: u32,
    /// Shutdown avoidance check.
    pub shutdown: ThresholdCheck,
    /// Ammunition explosion avoidance check.
    pub ammo_explosion: ThresholdCheck,
}

/// Heat at which shutdown checks begin.
pub const SHUTDOWN_THRESHOLD: u32 = 14;

/// Heat at which ammunition explosion checks begin.
pub const AMMO_EXPLOSION_THRESHOLD: u32 = 19;

/// Heat at which shutdown and ammunition explosion become automatic.
pub const AUTOMATIC_THRESHOLD: u32 = 30;

/// Heat generated by each engine critical per turn.
pub const ENGINE_HIT_HEAT: u32 = 5;

/// To-hit modifier from heat.
#[must_use]
pub const fn to_hit_modifier(heat: u32) -> i32 {
    match heat {
        0..=7 => 0,
        8..=12 => 1,
        13..=16 => 2,
        17..=23 => 3,
        _ => 4,
    }
}

/// Walking MP lost to heat: `floor(heat / 5)`.
#[must_use]
pub const fn movement_penalty(heat: u32) -> u32 {
    heat / 5
}

/// Shutdown check: `4 + floor((heat - 14) / 4) * 2` from 14, automatic at 30.
#[must_use]
pub const fn shutdown_check(heat: u32) -> ThresholdCheck {
    if heat >= AUTOMATIC_THRESHOLD {
        ThresholdCheck::Automatic
    } else if heat >= SHUTDOWN_THRESHOLD {
        ThresholdCheck::Roll((4 + ((heat - SHUTDOWN_THRESHOLD) / 4) * 2) as u8)
    } else {
        ThresholdCheck::None
    }
}

/// Ammunition explosion check: 4 at 19, 6 at 23, 8 at 28, automatic at 30.
#[must_use]
pub const fn ammo_explosion_check(heat: u32) -> ThresholdCheck {
    match heat {
        0..=18 => ThresholdCheck::None,
        19..=22 => ThresholdCheck::Roll(4),
        23..=27 => ThresholdCheck::Roll(6),
        28..=29 => ThresholdCheck::Roll(8),
        _ => ThresholdCheck::Automatic,
    }
}

/// Look up every effect of a heat level.
#[must_use]
pub const fn heat_effects(heat: u32) -> HeatEffects {
    HeatEffects {
        to_hit_modifier: to_hit_modifier(heat),
        movement_penalty: movement_penalty(heat),
        shutdown: shutdown_check(heat),
        ammo_explosion: ammo_explosion_check(heat),
    }
}

/// Heat generated by a movement mode.
///
/// Walking 1, running 2, jumping `max(3, hexes jumped)`.
#[must_use]
pub const fn movement_heat(movement: MovementType, hexes: u32) -> u32 {
    match movement {
        MovementType::Stationary => 0,
        MovementType::Walk => 1,
        MovementType::Run => 2,
        MovementType::Jump => {
            if hexes > 3 {
                hexes
            } else {
                3
            }
        }
    }
}

/// Heat removed by working heat sinks.
#[must_use]
pub const fn dissipation(working_sinks: u32, capacity: u32) -> u32 {
    working_sinks * capacity
}

/// Breakdown of one heat-phase update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeatUpdate {
    /// Heat before the update.
    pub previous: u32,
    /// Heat added this turn (movement, weapons, engine hits).
    pub generated: u32,
    /// Heat removed by sinks.
    pub dissipated: u32,
    /// Resulting heat, never negative.
    pub current: u32,
}

/// Apply a turn's heat: `max(0, previous + generated - dissipated)`.
#[must_use]
pub const fn apply_heat(previous: u32, generated: u32, dissipated: u32) -> HeatUpdate {
    HeatUpdate {
        previous,
        generated,
        dissipated,
        current: (previous + generated).saturating_sub(dissipated),
    }
}

/// Pilot damage from heat.
///
/// With damaged life support: 1 at 15-24, 2 at 25+. With intact life
/// support only extreme heat (30+) injures, for 2.
#[must_use]
pub const fn pilot_heat_damage(heat: u32, life_support_damaged: bool) -> u8 {
    if life_support_damaged {
        match heat {
            0..=14 => 0,
            15..=24 => 1,
            _ => 2,
        }
    } else if heat >= AUTOMATIC_THRESHOLD {
        2
    } else {
        0
    }
}
