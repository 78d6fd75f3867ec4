//! Test fixtures and helpers.
//!
//! Pre-built setups and sessions for consistent testing. Helpers here panic
//! on bad input; they are only ever called with the built-in templates.

use mech_core::dice::{ScriptedDiceRoller, SeededDiceRoller};
use mech_core::hex::{HexCoordinate, HexDirection, MapConfig};
use mech_core::map::{BattleMap, Terrain, TerrainFeature};
use mech_core::session::{GameSession, ManualClock};
use mech_core::state::{GameSetup, Side, UnitId, UnitPosition, UnitSetup};
use mech_core::unit::{PilotDefinition, UnitDefinition};
use mech_core::config::RulesConfig;
use mech_core::data::standard_template;

/// Session driven by scripted dice.
pub type ScriptedSession = GameSession<ScriptedDiceRoller, ManualClock>;

/// Session driven by seeded dice.
pub type SeededSession = GameSession<SeededDiceRoller, ManualClock>;

/// Build one of the standard units.
///
/// # Panics
///
/// Panics if `model` is not a standard template.
#[must_use]
pub fn template(model: &str) -> UnitDefinition {
    standard_template(model)
        .and_then(|t| t.build().ok())
        .unwrap_or_else(|| panic!("unknown standard template {model}"))
}

/// A unit with a default pilot.
#[must_use]
pub fn unit(id: UnitId, side: Side, model: &str, q: i32, r: i32, facing: HexDirection) -> UnitSetup {
    UnitSetup {
        id,
        side,
        definition: template(model),
        pilot: PilotDefinition::default(),
        position: UnitPosition::new(HexCoordinate::new(q, r), facing),
    }
}

/// An all-clear map.
#[must_use]
pub const fn open_map(width: u32, height: u32) -> BattleMap {
    BattleMap::open(MapConfig::new(width, height))
}

/// Two Hunchbacks eight hexes apart on open ground, facing each other.
#[must_use]
pub fn duel_setup() -> GameSetup {
    GameSetup {
        game_id: "duel".to_string(),
        map: open_map(16, 16),
        units: vec![
            unit(1, Side::Player, "HBK-4G", 7, 12, HexDirection::North),
            unit(2, Side::Opponent, "HBK-4G", 7, 4, HexDirection::South),
        ],
        rules: RulesConfig::default(),
        turn_limit: Some(12),
    }
}

/// Two against two with a stand of woods in the middle.
#[must_use]
pub fn lance_setup() -> GameSetup {
    let woods = |q, r, terrain| TerrainFeature {
        hex: HexCoordinate::new(q, r),
        terrain,
        elevation: 0,
    };
    GameSetup {
        game_id: "lance".to_string(),
        map: BattleMap::with_features(
            MapConfig::new(16, 16),
            [
                woods(6, 5, Terrain::LightWoods),
                woods(6, 6, Terrain::HeavyWoods),
                woods(7, 5, Terrain::LightWoods),
                woods(9, 3, Terrain::Rough),
            ],
        ),
        units: vec![
            unit(1, Side::Player, "HBK-4G", 4, 12, HexDirection::North),
            unit(2, Side::Player, "LCT-1V", 8, 10, HexDirection::North),
            unit(3, Side::Opponent, "CPLT-C1", 4, 3, HexDirection::South),
            unit(4, Side::Opponent, "RVN-3L", 8, 1, HexDirection::South),
        ],
        rules: RulesConfig::default(),
        turn_limit: Some(10),
    }
}

/// A session whose dice come from `faces` in order.
///
/// # Panics
///
/// Panics if the setup is invalid.
#[must_use]
pub fn scripted_session(setup: GameSetup, faces: impl Into<Vec<u8>>) -> ScriptedSession {
    GameSession::new(setup, ScriptedDiceRoller::new(faces), ManualClock::new(0, 1))
        .expect("fixture setup is valid")
}

/// A session with seeded dice and a manual clock, so the whole log is
/// reproducible.
///
/// # Panics
///
/// Panics if the setup is invalid.
#[must_use]
pub fn seeded_session(setup: GameSetup, seed: u64) -> SeededSession {
    GameSession::new(setup, SeededDiceRoller::new(seed), ManualClock::new(0, 1))
        .expect("fixture setup is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_setups_are_valid() {
        assert!(duel_setup().validate().is_ok());
        assert!(lance_setup().validate().is_ok());
    }

    #[test]
    fn test_sessions_start_at_initiative() {
        let session = seeded_session(lance_setup(), 3);
        assert_eq!(session.events().len(), 1);
        assert_eq!(session.state().units.len(), 4);
    }
}
