//! Tunable rules thresholds.

use serde::{Deserialize, Serialize};

/// Rules options carried by a game setup.
///
/// Every field has a default so scenario files only list what they change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Heat at or above which running or jumping forces a piloting roll.
    pub high_heat_psr_threshold: u32,
    /// Damage in a single phase that forces a piloting roll.
    pub heavy_damage_psr_threshold: u32,
    /// Whether indirect fire with a spotter is allowed.
    pub indirect_fire: bool,
    /// Whether a hit-location roll of 2 can cause a through-armor critical.
    pub through_armor_criticals: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            high_heat_psr_threshold: 15,
            heavy_damage_psr_threshold: 20,
            indirect_fire: true,
            through_armor_criticals: true,
        }
    }
}
