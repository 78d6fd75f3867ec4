//! Autoplay for tests.
//!
//! Picks a legal action for whoever is expected to act, with no tactics
//! beyond closing distance and firing every weapon that can. Good enough to
//! drive full games through every phase.

use mech_core::dice::DiceRoller;
use mech_core::error::ActionError;
use mech_core::events::{AttackDeclaration, GamePhase};
use mech_core::legality::{legal_attacks, path_for, valid_destinations_for, validate_attack_set, validate_stand};
use mech_core::movement::{MovementDeclaration, MovementType};
use mech_core::session::{Action, Clock, GameSession};
use mech_core::state::{GameState, Side, UnitCombatState};

/// Units stop closing at this distance.
pub const ENGAGE_DISTANCE: u32 = 3;

/// Every weapon fired once, at the first target it can reach.
#[must_use]
pub fn greedy_attacks(state: &GameState, side: Side) -> Vec<AttackDeclaration> {
    let mut chosen: Vec<AttackDeclaration> = Vec::new();
    for candidate in legal_attacks(state, side) {
        if chosen
            .iter()
            .any(|d| d.attacker == candidate.attacker && d.weapon == candidate.weapon)
        {
            continue;
        }
        chosen.push(candidate);
        if validate_attack_set(state, side, &chosen).is_err() {
            chosen.pop();
        }
    }
    chosen
}

fn nearest_enemy<'s>(state: &'s GameState, unit: &UnitCombatState) -> Option<&'s UnitCombatState> {
    state
        .units
        .values()
        .filter(|other| other.side != unit.side && !other.destroyed)
        .min_by_key(|other| (unit.position.hex.distance(other.position.hex), other.id))
}

fn movement_action(state: &GameState, side: Side) -> Option<Action> {
    let id = *state.units_awaiting_movement(side).first()?;
    let unit = state.unit(id)?;
    if unit.position.prone {
        return Some(if validate_stand(state, side, id).is_ok() {
            Action::StandUp { side, unit: id }
        } else {
            Action::HoldPosition { side, unit: id }
        });
    }

    let hold = Action::HoldPosition { side, unit: id };
    let Some(enemy) = nearest_enemy(state, unit) else {
        return Some(hold);
    };
    let target = enemy.position.hex;
    if unit.position.hex.distance(target) <= ENGAGE_DISTANCE {
        return Some(hold);
    }

    let Some(destination) = valid_destinations_for(state, id, MovementType::Walk)
        .into_iter()
        .min_by_key(|hex| (hex.distance(target), *hex))
    else {
        return Some(hold);
    };
    let Some(path) = path_for(state, id, MovementType::Walk, destination) else {
        return Some(hold);
    };
    Some(Action::Move {
        side,
        declaration: MovementDeclaration {
            unit: id,
            movement: MovementType::Walk,
            path,
            facing: destination.bearing_to(target).unwrap_or(unit.position.facing),
        },
    })
}

/// The next action the game is waiting for, `None` once it is over.
#[must_use]
pub fn next_action(state: &GameState) -> Option<Action> {
    if state.is_over() {
        return None;
    }
    match state.phase {
        GamePhase::Initiative => Some(Action::RollInitiative),
        GamePhase::Movement => movement_action(state, state.active_side()?),
        GamePhase::WeaponAttack => Side::ALL
            .into_iter()
            .find(|side| !state.locked_attacks.contains_key(side))
            .map(|side| Action::LockAttacks {
                side,
                declarations: greedy_attacks(state, side),
            }),
        GamePhase::Heat | GamePhase::End => None,
    }
}

/// Play up to `max_actions` actions, returning how many were submitted.
///
/// # Errors
///
/// The first rejection, which means the autoplay built an illegal action.
pub fn play<R: DiceRoller, C: Clock>(
    session: &mut GameSession<R, C>,
    max_actions: usize,
) -> Result<usize, ActionError> {
    let mut submitted = 0;
    while submitted < max_actions {
        let Some(action) = next_action(session.state()) else {
            break;
        };
        session.submit(action)?;
        submitted += 1;
    }
    tracing::debug!(submitted, events = session.events().len(), "autoplay stopped");
    Ok(submitted)
}

/// Play until the game ends or `max_actions` runs out.
///
/// # Errors
///
/// See [`play`].
pub fn play_to_end<R: DiceRoller, C: Clock>(session: &mut GameSession<R, C>) -> Result<usize, ActionError> {
    play(session, 10_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{duel_setup, lance_setup, seeded_session};

    #[test]
    fn test_duel_plays_to_an_ending() {
        let mut session = seeded_session(duel_setup(), 42);
        play_to_end(&mut session).expect("autoplay stays legal");
        assert!(session.is_over());
        assert!(session.state().check_invariants().is_ok());
    }

    #[test]
    fn test_units_close_distance() {
        let mut session = seeded_session(lance_setup(), 9);
        // Initiative, then four moves
        play(&mut session, 5).expect("autoplay stays legal");
        let state = session.state();
        let hbk = state.unit(1).expect("unit 1");
        assert_ne!(hbk.position.hex, mech_core::hex::HexCoordinate::new(4, 12));
    }

    #[test]
    fn test_greedy_attacks_never_reuse_a_weapon() {
        let mut session = seeded_session(duel_setup(), 5);
        while session.state().phase != GamePhase::WeaponAttack {
            let action = next_action(session.state()).expect("game in progress");
            session.submit(action).expect("legal");
        }
        let attacks = greedy_attacks(session.state(), Side::Player);
        assert!(validate_attack_set(session.state(), Side::Player, &attacks).is_ok());
    }
}
