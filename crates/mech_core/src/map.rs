//! Battle map: terrain, elevation, movement cost and line of sight.

use serde::{Deserialize, Serialize};

use crate::hex::{HexCoordinate, MapConfig};

/// Terrain type of a single hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Terrain {
    /// Open ground.
    #[default]
    Clear,
    /// Rubble and broken ground.
    Rough,
    /// Light woods.
    LightWoods,
    /// Heavy woods.
    HeavyWoods,
    /// Water of the given depth.
    Water(u8),
}

impl Terrain {
    /// MP cost to enter, before elevation changes.
    #[must_use]
    pub const fn entry_cost(self) -> u32 {
        match self {
            Self::Clear => 1,
            Self::Rough | Self::LightWoods => 2,
            Self::HeavyWoods => 3,
            Self::Water(0) => 1,
            Self::Water(1) => 2,
            Self::Water(_) => 4,
        }
    }

    /// To-hit modifier for woods, both intervening and in the target hex.
    #[must_use]
    pub const fn woods_modifier(self) -> u32 {
        match self {
            Self::LightWoods => 1,
            Self::HeavyWoods => 2,
            _ => 0,
        }
    }

    /// Whether this is water at least one level deep.
    #[must_use]
    pub const fn is_deep_water(self) -> bool {
        matches!(self, Self::Water(depth) if depth >= 1)
    }
}

/// Terrain and ground level of one hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TerrainHex {
    /// Terrain type.
    pub terrain: Terrain,
    /// Ground level.
    #[serde(default)]
    pub elevation: i32,
}

/// A non-default hex on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TerrainFeature {
    /// Location.
    pub hex: HexCoordinate,
    /// Terrain type.
    pub terrain: Terrain,
    /// Ground level.
    #[serde(default)]
    pub elevation: i32,
}

impl TerrainFeature {
    /// Terrain and level of this feature.
    #[must_use]
    pub const fn terrain_hex(&self) -> TerrainHex {
        TerrainHex {
            terrain: self.terrain,
            elevation: self.elevation,
        }
    }
}

/// Result of a line-of-sight trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineOfSight {
    /// Whether sight is blocked.
    pub blocked: bool,
    /// Cumulative woods modifier of intervening hexes.
    pub intervening_modifier: u32,
}

impl LineOfSight {
    /// Whether the target can be seen.
    #[must_use]
    pub const fn is_clear(&self) -> bool {
        !self.blocked
    }
}

/// Maximum elevation change a ground unit can climb in one step.
pub const MAX_ELEVATION_CHANGE: u32 = 2;

/// Woods total at which line of sight is blocked.
pub const WOODS_BLOCKING_THRESHOLD: u32 = 3;

/// The battlefield.
///
/// Unlisted hexes are clear ground at elevation 0. Features are kept sorted
/// so lookups are a binary search and serialization is canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BattleMap {
    /// Map dimensions.
    pub config: MapConfig,
    /// Non-clear hexes, sorted by coordinate.
    #[serde(default)]
    features: Vec<TerrainFeature>,
}

impl Default for BattleMap {
    fn default() -> Self {
        Self::open(MapConfig::new(16, 17))
    }
}

impl BattleMap {
    /// An all-clear map.
    #[must_use]
    pub const fn open(config: MapConfig) -> Self {
        Self {
            config,
            features: Vec::new(),
        }
    }

    /// Build a map from a list of features. Later duplicates win.
    #[must_use]
    pub fn with_features(config: MapConfig, features: impl IntoIterator<Item = TerrainFeature>) -> Self {
        let mut map = Self::open(config);
        for feature in features {
            map.set_terrain(feature.hex, feature.terrain_hex());
        }
        map
    }

    /// Set terrain at a hex.
    pub fn set_terrain(&mut self, hex: HexCoordinate, terrain: TerrainHex) {
        match self.features.binary_search_by_key(&hex, |f| f.hex) {
            Ok(index) => {
                self.features[index].terrain = terrain.terrain;
                self.features[index].elevation = terrain.elevation;
            }
            Err(index) => self.features.insert(
                index,
                TerrainFeature {
                    hex,
                    terrain: terrain.terrain,
                    elevation: terrain.elevation,
                },
            ),
        }
    }

    /// Terrain at a hex (clear if unlisted).
    #[must_use]
    pub fn terrain_at(&self, hex: HexCoordinate) -> TerrainHex {
        self.features
            .binary_search_by_key(&hex, |f| f.hex)
            .map_or_else(|_| TerrainHex::default(), |index| self.features[index].terrain_hex())
    }

    /// Listed features.
    #[must_use]
    pub fn features(&self) -> &[TerrainFeature] {
        &self.features
    }

    /// Whether `hex` lies on the map.
    #[must_use]
    pub const fn is_in_bounds(&self, hex: HexCoordinate) -> bool {
        self.config.is_in_bounds(hex)
    }

    /// Ground movement cost from `from` into the adjacent hex `to`.
    ///
    /// Returns `None` when the step is impossible: off the map, a climb of
    /// more than two levels, or deep water while running.
    #[must_use]
    pub fn movement_cost(&self, from: HexCoordinate, to: HexCoordinate, running: bool) -> Option<u32> {
        if !self.is_in_bounds(to) || from.distance(to) != 1 {
            return None;
        }
        let source = self.terrain_at(from);
        let destination = self.terrain_at(to);
        let climb = (destination.elevation - source.elevation).unsigned_abs();
        if climb > MAX_ELEVATION_CHANGE {
            return None;
        }
        if running && destination.terrain.is_deep_water() {
            return None;
        }
        Some(destination.terrain.entry_cost() + climb)
    }

    /// Total cost of a contiguous path starting at `start`.
    #[must_use]
    pub fn path_cost(&self, start: HexCoordinate, path: &[HexCoordinate], running: bool) -> Option<u32> {
        let mut current = start;
        let mut total = 0;
        for &step in path {
            total += self.movement_cost(current, step, running)?;
            current = step;
        }
        Some(total)
    }

    /// Trace line of sight between two hexes.
    ///
    /// `from_level` and `to_level` are the absolute heights of the firing
    /// and target units. Intervening hexes add their woods modifier; a total
    /// of three or more blocks, as does any intervening hex higher than both
    /// ends.
    #[must_use]
    pub fn line_of_sight(
        &self,
        from: HexCoordinate,
        from_level: i32,
        to: HexCoordinate,
        to_level: i32,
    ) -> LineOfSight {
        let line = from.line_to(to);
        let mut result = LineOfSight::default();
        if line.len() <= 2 {
            return result;
        }
        for &hex in &line[1..line.len() - 1] {
            let terrain = self.terrain_at(hex);
            if terrain.elevation > from_level && terrain.elevation > to_level {
                result.blocked = true;
            }
            result.intervening_modifier += terrain.terrain.woods_modifier();
        }
        if result.intervening_modifier >= WOODS_BLOCKING_THRESHOLD {
            result.blocked = true;
        }
        result
    }

    /// Woods modifier of the target's own hex.
    #[must_use]
    pub fn target_hex_modifier(&self, hex: HexCoordinate) -> u32 {
        self.terrain_at(hex).terrain.woods_modifier()
    }
}
