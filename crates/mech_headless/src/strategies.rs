//! Autopilot test drivers for headless games.
//!
//! These presets exist to push batch and CI games through every phase;
//! they are not tactical AI. A strategy only ever picks actions that the
//! legality checks accept: it asks the core for reachable hexes and legal
//! attacks and takes the first that fits a few fixed knobs. It never looks
//! at dice or hidden declarations.

use mech_core::events::{AttackDeclaration, GamePhase};
use mech_core::heat::SHUTDOWN_THRESHOLD;
use mech_core::legality::{legal_attacks, path_for, valid_destinations_for, validate_attack_set, validate_stand};
use mech_core::movement::{MovementDeclaration, MovementType};
use mech_core::session::Action;
use mech_core::state::{GameState, Side, UnitCombatState};
use serde::{Deserialize, Serialize};

/// Tunables for one side's autopilot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    /// Strategy name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Stop closing once the nearest enemy is this close.
    pub engage_distance: u32,
    /// Preferred way to close distance.
    pub movement: MovementType,
    /// Skip weapons that would push heat past this after dissipation.
    /// `None` fires everything.
    pub heat_ceiling: Option<u32>,
}

impl Default for Strategy {
    fn default() -> Self {
        Self::aggressive()
    }
}

impl Strategy {
    /// Walk in and fire everything.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            name: "Aggressive".to_string(),
            description: "Close to short range and alpha strike every turn".to_string(),
            engage_distance: 3,
            movement: MovementType::Walk,
            heat_ceiling: None,
        }
    }

    /// Run in fast; fire everything.
    #[must_use]
    pub fn brawler() -> Self {
        Self {
            name: "Brawler".to_string(),
            description: "Run to point-blank range regardless of heat".to_string(),
            engage_distance: 1,
            movement: MovementType::Run,
            heat_ceiling: None,
        }
    }

    /// Stay at medium range and keep heat below the shutdown scale.
    #[must_use]
    pub fn cautious() -> Self {
        Self {
            name: "Cautious".to_string(),
            description: "Hold medium range and never build shutdown heat".to_string(),
            engage_distance: 6,
            movement: MovementType::Walk,
            heat_ceiling: Some(SHUTDOWN_THRESHOLD - 1),
        }
    }

    /// Never move; fire everything in reach.
    #[must_use]
    pub fn turret() -> Self {
        Self {
            name: "Turret".to_string(),
            description: "Hold position and shoot whatever comes into range".to_string(),
            engage_distance: u32::MAX,
            movement: MovementType::Stationary,
            heat_ceiling: None,
        }
    }

    /// Look a preset up by name (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "aggressive" => Some(Self::aggressive()),
            "brawler" => Some(Self::brawler()),
            "cautious" => Some(Self::cautious()),
            "turret" => Some(Self::turret()),
            _ => None,
        }
    }

    /// Names of every preset.
    #[must_use]
    pub const fn preset_names() -> [&'static str; 4] {
        ["aggressive", "brawler", "cautious", "turret"]
    }

    /// The action this strategy takes for `side` right now, if `side` is
    /// the one expected to act.
    #[must_use]
    pub fn choose(&self, state: &GameState, side: Side) -> Option<Action> {
        if state.is_over() {
            return None;
        }
        match state.phase {
            GamePhase::Movement if state.active_side() == Some(side) => self.movement_action(state, side),
            GamePhase::WeaponAttack if !state.locked_attacks.contains_key(&side) => {
                Some(Action::LockAttacks {
                    side,
                    declarations: self.attacks(state, side),
                })
            }
            _ => None,
        }
    }

    fn movement_action(&self, state: &GameState, side: Side) -> Option<Action> {
        let id = *state.units_awaiting_movement(side).first()?;
        let unit = state.unit(id)?;
        let hold = Action::HoldPosition { side, unit: id };

        if unit.position.prone {
            return Some(if validate_stand(state, side, id).is_ok() {
                Action::StandUp { side, unit: id }
            } else {
                hold
            });
        }
        if self.movement == MovementType::Stationary {
            return Some(hold);
        }
        let Some(enemy) = nearest_enemy(state, unit) else {
            return Some(hold);
        };
        let target = enemy.position.hex;
        if unit.position.hex.distance(target) <= self.engage_distance {
            return Some(hold);
        }

        // Fall back to walking when the preferred mode is unavailable
        for movement in [self.movement, MovementType::Walk] {
            let destination = valid_destinations_for(state, id, movement)
                .into_iter()
                .min_by_key(|hex| (hex.distance(target).abs_diff(self.engage_distance), *hex));
            let Some(destination) = destination else {
                continue;
            };
            if let Some(path) = path_for(state, id, movement, destination) {
                return Some(Action::Move {
                    side,
                    declaration: MovementDeclaration {
                        unit: id,
                        movement,
                        path,
                        facing: destination.bearing_to(target).unwrap_or(unit.position.facing),
                    },
                });
            }
        }
        Some(hold)
    }

    /// Legal declarations for `side`, one per weapon, respecting the heat
    /// ceiling. Heaviest hitters are considered first.
    #[must_use]
    pub fn attacks(&self, state: &GameState, side: Side) -> Vec<AttackDeclaration> {
        let mut candidates = legal_attacks(state, side);
        candidates.sort_by_key(|declaration| {
            let damage = state
                .unit(declaration.attacker)
                .map_or(0, |unit| unit.definition.weapons[declaration.weapon].spec.damage);
            (
                declaration.attacker,
                std::cmp::Reverse(damage),
                declaration.weapon,
                declaration.indirect,
                declaration.target,
            )
        });

        let mut chosen: Vec<AttackDeclaration> = Vec::new();
        for candidate in candidates {
            if chosen
                .iter()
                .any(|d| d.attacker == candidate.attacker && d.weapon == candidate.weapon)
            {
                continue;
            }
            let Some(attacker) = state.unit(candidate.attacker) else {
                continue;
            };
            if let Some(ceiling) = self.heat_ceiling {
                let weapon_heat: u32 = chosen
                    .iter()
                    .chain(std::iter::once(&candidate))
                    .filter(|d| d.attacker == attacker.id)
                    .map(|d| attacker.definition.weapons[d.weapon].spec.heat)
                    .sum();
                let projected = (attacker.heat + attacker.activity.heat_generated + weapon_heat)
                    .saturating_sub(attacker.dissipation());
                if projected > ceiling {
                    continue;
                }
            }
            chosen.push(candidate);
            if validate_attack_set(state, side, &chosen).is_err() {
                chosen.pop();
            }
        }
        chosen
    }
}

fn nearest_enemy<'s>(state: &'s GameState, unit: &UnitCombatState) -> Option<&'s UnitCombatState> {
    state
        .units
        .values()
        .filter(|other| other.side != unit.side && !other.destroyed)
        .min_by_key(|other| (unit.position.hex.distance(other.position.hex), other.id))
}

/// Strategies for both sides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Autopilot {
    /// Player side.
    pub player: Strategy,
    /// Opponent side.
    pub opponent: Strategy,
}

impl Autopilot {
    /// Same strategy on both sides.
    #[must_use]
    pub fn mirrored(strategy: Strategy) -> Self {
        Self {
            player: strategy.clone(),
            opponent: strategy,
        }
    }

    /// Strategy for `side`.
    #[must_use]
    pub const fn strategy(&self, side: Side) -> &Strategy {
        match side {
            Side::Player => &self.player,
            Side::Opponent => &self.opponent,
        }
    }

    /// Whatever the game is waiting for, `None` once it is over.
    #[must_use]
    pub fn next_action(&self, state: &GameState) -> Option<Action> {
        if state.is_over() {
            return None;
        }
        if state.phase == GamePhase::Initiative {
            return Some(Action::RollInitiative);
        }
        Side::ALL
            .into_iter()
            .find_map(|side| self.strategy(side).choose(state, side))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mech_test_utils::fixtures::{duel_setup, seeded_session};

    #[test]
    fn test_presets_by_name() {
        for name in Strategy::preset_names() {
            let strategy = Strategy::from_name(name).expect("preset");
            assert_eq!(strategy.name.to_ascii_lowercase(), name);
        }
        assert!(Strategy::from_name("Turtle").is_none());
    }

    #[test]
    fn test_turret_never_moves() {
        let mut session = seeded_session(duel_setup(), 1);
        let autopilot = Autopilot::mirrored(Strategy::turret());
        session.submit(Action::RollInitiative).expect("initiative");
        let action = autopilot.next_action(session.state()).expect("someone moves");
        assert!(matches!(action, Action::HoldPosition { .. }));
    }

    #[test]
    fn test_cautious_fires_a_legal_subset() {
        let mut session = seeded_session(duel_setup(), 2);
        let autopilot = Autopilot::mirrored(Strategy::brawler());
        while session.state().phase != GamePhase::WeaponAttack && !session.is_over() {
            let action = autopilot.next_action(session.state()).expect("game running");
            session.submit(action).expect("legal");
        }
        let state = session.state();
        let cautious = Strategy::cautious().attacks(state, Side::Player);
        let greedy = Strategy::aggressive().attacks(state, Side::Player);
        assert!(cautious.len() <= greedy.len());
        assert!(validate_attack_set(state, Side::Player, &cautious).is_ok());
    }
}
