//! Scenario loading and configuration.
//!
//! Scenarios define the battlefield and the units each side fields. They
//! are RON files naming unit templates by id, turned into a
//! [`GameSetup`] against a [`TemplateRegistry`].

use std::path::Path;

use mech_core::config::RulesConfig;
use mech_core::hex::{HexCoordinate, HexDirection, MapConfig};
use mech_core::map::{BattleMap, Terrain, TerrainFeature};
use mech_core::state::{GameSetup, Side, UnitPosition, UnitSetup};
use mech_core::unit::PilotDefinition;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::unit_loader::{TemplateRegistry, UnitLoadError};

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// A placement names a template that cannot be built.
    #[error("Unit {index} in scenario: {source}")]
    Unit {
        /// Position in the placement list.
        index: usize,
        /// Why the template failed.
        source: UnitLoadError,
    },
    /// The resulting setup is not playable.
    #[error("Invalid scenario: {0}")]
    Invalid(String),
}

/// Map dimensions and non-clear hexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSpec {
    /// Columns.
    pub width: u32,
    /// Rows.
    pub height: u32,
    /// Terrain features; unlisted hexes are clear.
    #[serde(default)]
    pub features: Vec<TerrainFeature>,
}

impl MapSpec {
    /// An all-clear map.
    #[must_use]
    pub const fn open(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            features: Vec::new(),
        }
    }

    /// Build the battle map.
    #[must_use]
    pub fn build(&self) -> BattleMap {
        BattleMap::with_features(MapConfig::new(self.width, self.height), self.features.iter().copied())
    }
}

/// Placement of a unit at scenario start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Template id ("HBK-4G", ...).
    pub template: String,
    /// Owning side.
    pub side: Side,
    /// Pilot; defaults to a 4/5 MechWarrior.
    #[serde(default)]
    pub pilot: PilotDefinition,
    /// Axial coordinate (q, r).
    pub position: (i32, i32),
    /// Starting facing.
    #[serde(default)]
    pub facing: HexDirection,
}

impl UnitPlacement {
    /// Create a unit placement with a default pilot.
    #[must_use]
    pub fn new(template: impl Into<String>, side: Side, q: i32, r: i32, facing: HexDirection) -> Self {
        Self {
            template: template.into(),
            side,
            pilot: PilotDefinition::default(),
            position: (q, r),
            facing,
        }
    }
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Battlefield.
    pub map: MapSpec,
    /// Units, numbered from 1 in list order.
    pub units: Vec<UnitPlacement>,
    /// Rules options.
    #[serde(default)]
    pub rules: RulesConfig,
    /// Turn after which the game ends.
    #[serde(default)]
    pub turn_limit: Option<u32>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::duel()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Serialize to pretty RON.
    pub fn to_ron_string(&self) -> Result<String, ScenarioError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ScenarioError::Invalid(e.to_string()))
    }

    /// Two Hunchbacks closing across open ground.
    #[must_use]
    pub fn duel() -> Self {
        Self {
            name: "Hunchback Duel".to_string(),
            description: "Two HBK-4Gs eight hexes apart on open ground".to_string(),
            map: MapSpec::open(16, 16),
            units: vec![
                UnitPlacement::new("HBK-4G", Side::Player, 7, 12, HexDirection::North),
                UnitPlacement::new("HBK-4G", Side::Opponent, 7, 4, HexDirection::South),
            ],
            rules: RulesConfig::default(),
            turn_limit: Some(12),
        }
    }

    /// Two against two around a stand of woods.
    #[must_use]
    pub fn lance() -> Self {
        let feature = |q, r, terrain| TerrainFeature {
            hex: HexCoordinate::new(q, r),
            terrain,
            elevation: 0,
        };
        Self {
            name: "Woodland Skirmish".to_string(),
            description: "A striker pair against fire support around light and heavy woods".to_string(),
            map: MapSpec {
                width: 16,
                height: 16,
                features: vec![
                    feature(6, 5, Terrain::LightWoods),
                    feature(6, 6, Terrain::HeavyWoods),
                    feature(7, 5, Terrain::LightWoods),
                    feature(9, 3, Terrain::Rough),
                ],
            },
            units: vec![
                UnitPlacement::new("HBK-4G", Side::Player, 4, 12, HexDirection::North),
                UnitPlacement::new("LCT-1V", Side::Player, 8, 10, HexDirection::North),
                UnitPlacement::new("CPLT-C1", Side::Opponent, 4, 3, HexDirection::South),
                UnitPlacement::new("RVN-3L", Side::Opponent, 8, 1, HexDirection::South),
            ],
            rules: RulesConfig::default(),
            turn_limit: Some(10),
        }
    }

    /// Built-in scenario by name.
    #[must_use]
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "duel" => Some(Self::duel()),
            "lance" => Some(Self::lance()),
            _ => None,
        }
    }

    /// Names accepted by [`Scenario::builtin`].
    #[must_use]
    pub const fn builtin_names() -> [&'static str; 2] {
        ["duel", "lance"]
    }

    /// A built-in name, or else a path to a RON file.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match Self::builtin(name_or_path) {
            Some(scenario) => Ok(scenario),
            None => Self::load(name_or_path),
        }
    }

    /// Resolve templates and build a validated game setup.
    pub fn to_setup(&self, game_id: impl Into<String>, registry: &TemplateRegistry) -> Result<GameSetup, ScenarioError> {
        let units = self
            .units
            .iter()
            .enumerate()
            .map(|(index, placement)| {
                let definition = registry
                    .build(&placement.template)
                    .map_err(|source| ScenarioError::Unit { index, source })?;
                let (q, r) = placement.position;
                Ok(UnitSetup {
                    id: index as u32 + 1,
                    side: placement.side,
                    definition,
                    pilot: placement.pilot.clone(),
                    position: UnitPosition::new(HexCoordinate::new(q, r), placement.facing),
                })
            })
            .collect::<Result<Vec<_>, ScenarioError>>()?;

        let setup = GameSetup {
            game_id: game_id.into(),
            map: self.map.build(),
            units,
            rules: self.rules.clone(),
            turn_limit: self.turn_limit,
        };
        setup
            .validate()
            .map_err(|e| ScenarioError::Invalid(e.to_string()))?;
        Ok(setup)
    }
}
