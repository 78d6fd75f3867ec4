//! State derivation by folding the event log.
//!
//! `apply_event` is the only place game state changes. The match below is
//! exhaustive without a wildcard so a new event variant fails to compile
//! until it is handled here.

use crate::critical::apply_slot_hits;
use crate::damage::{apply_record, destroy_location};
use crate::events::{GameEvent, GameEventPayload, GamePhase};
use crate::heat::movement_heat;
use crate::movement::MovementType;
use crate::state::{GameState, GameStatus, TurnActivity, UnitCombatState, UnitId};

/// Fold one event into a state, returning the new state.
#[must_use]
pub fn apply_event(mut state: GameState, event: &GameEvent) -> GameState {
    apply_event_in_place(&mut state, event);
    state
}

/// Derive state from an ordered event sequence.
#[must_use]
pub fn derive_state(events: &[GameEvent]) -> GameState {
    events.iter().fold(GameState::default(), apply_event)
}

/// Fold more events into an existing state.
pub fn apply_events<'a>(state: &mut GameState, events: impl IntoIterator<Item = &'a GameEvent>) {
    for event in events {
        apply_event_in_place(state, event);
    }
}

fn unit_mut<'s>(state: &'s mut GameState, id: UnitId, event: &GameEvent) -> Option<&'s mut UnitCombatState> {
    let unit = state.units.get_mut(&id);
    if unit.is_none() {
        tracing::warn!(
            unit = id,
            event = event.id,
            kind = ?event.event_type(),
            "event refers to an unknown unit"
        );
    }
    unit
}

/// Fold one event into a state in place.
#[allow(clippy::too_many_lines)]
pub fn apply_event_in_place(state: &mut GameState, event: &GameEvent) {
    match &event.payload {
        GameEventPayload::GameCreated { setup } => {
            *state = GameState {
                game_id: setup.game_id.clone(),
                turn: 1,
                phase: GamePhase::Initiative,
                status: GameStatus::InProgress,
                map: setup.map.clone(),
                rules: setup.rules.clone(),
                turn_limit: setup.turn_limit,
                units: setup
                    .units
                    .iter()
                    .map(|entry| {
                        let mut position = entry.position;
                        position.elevation = setup.map.terrain_at(position.hex).elevation;
                        (
                            entry.id,
                            UnitCombatState::new(
                                entry.id,
                                entry.side,
                                entry.definition.clone(),
                                &entry.pilot,
                                position,
                            ),
                        )
                    })
                    .collect(),
                ..GameState::default()
            };
        }
        GameEventPayload::PhaseChanged { to, turn, .. } => {
            state.phase = *to;
            state.turn = *turn;
            for unit in state.units.values_mut() {
                unit.activity.damage_this_phase = 0;
            }
            match to {
                GamePhase::Initiative => {
                    state.initiative_winner = None;
                    state.last_mover = None;
                    for unit in state.units.values_mut() {
                        unit.activity = TurnActivity::default();
                        unit.pending_psrs.clear();
                    }
                }
                GamePhase::WeaponAttack => {
                    state.locked_attacks.clear();
                    state.declared_attacks.clear();
                }
                GamePhase::Movement | GamePhase::Heat | GamePhase::End => {}
            }
        }
        GameEventPayload::InitiativeRolled { winner, .. } => {
            state.initiative_winner = Some(*winner);
        }
        GameEventPayload::UnitMoved {
            unit,
            movement,
            to,
            facing,
            hexes_moved,
            heat,
            ..
        } => {
            let elevation = state.map.terrain_at(*to).elevation;
            if let Some(moved) = unit_mut(state, *unit, event) {
                moved.position.hex = *to;
                moved.position.facing = *facing;
                moved.position.elevation = elevation;
                moved.activity.moved = true;
                moved.activity.movement = *movement;
                moved.activity.hexes_moved = *hexes_moved;
                moved.activity.heat_generated += heat;
                let side = moved.side;
                state.last_mover = Some(side);
            }
        }
        GameEventPayload::UnitStoodUp { unit, facing, .. } => {
            if let Some(stood) = unit_mut(state, *unit, event) {
                stood.position.prone = false;
                stood.position.facing = *facing;
                mark_stand_attempt(stood);
                let side = stood.side;
                state.last_mover = Some(side);
            }
        }
        GameEventPayload::StandFailed { unit, .. } => {
            if let Some(fallen) = unit_mut(state, *unit, event) {
                mark_stand_attempt(fallen);
                let side = fallen.side;
                state.last_mover = Some(side);
            }
        }
        GameEventPayload::PilotingSkillRollRequired { unit, reason } => {
            if let Some(target) = unit_mut(state, *unit, event) {
                target.pending_psrs.push(*reason);
            }
        }
        GameEventPayload::PilotingSkillRollMade { unit, reason, .. } => {
            if let Some(target) = unit_mut(state, *unit, event) {
                if let Some(index) = target.pending_psrs.iter().position(|r| r == reason) {
                    target.pending_psrs.remove(index);
                }
            }
        }
        GameEventPayload::UnitFell {
            unit, facing, groups, ..
        } => {
            if let Some(fallen) = unit_mut(state, *unit, event) {
                fallen.position.prone = true;
                fallen.position.facing = *facing;
                for record in groups.iter().flat_map(|g| g.records.iter()) {
                    apply_record(fallen, record);
                }
            }
        }
        GameEventPayload::AttacksLocked { side, commitment, .. } => {
            state.locked_attacks.insert(*side, commitment.clone());
        }
        GameEventPayload::AttackDeclared { declaration } => {
            state.declared_attacks.push(declaration.clone());
        }
        GameEventPayload::AttackResolved {
            declaration,
            heat,
            ammo,
            groups,
            designated,
            ..
        } => {
            if let Some(attacker) = unit_mut(state, declaration.attacker, event) {
                attacker.activity.heat_generated += heat;
                if let Some(used) = ammo {
                    if let Some(shots) = attacker.ammo.get_mut(used.bin) {
                        *shots = used.remaining;
                    }
                }
            }
            if let Some(target) = unit_mut(state, declaration.target, event) {
                for record in groups.iter().flat_map(|g| g.records.iter()) {
                    apply_record(target, record);
                }
                if *designated {
                    target.activity.tagged = true;
                }
            }
        }
        GameEventPayload::AttackVoided {
            declaration, heat, ammo,
        } => {
            if let Some(attacker) = unit_mut(state, declaration.attacker, event) {
                attacker.activity.heat_generated += heat;
                if let Some(used) = ammo {
                    if let Some(shots) = attacker.ammo.get_mut(used.bin) {
                        *shots = used.remaining;
                    }
                }
            }
        }
        GameEventPayload::CriticalHitResolved {
            unit,
            location,
            hits,
            limb_blown_off,
            head_destroyed,
            ..
        } => {
            if let Some(target) = unit_mut(state, *unit, event) {
                apply_slot_hits(target, *location, hits);
                if *limb_blown_off || *head_destroyed {
                    destroy_location(target, *location);
                }
            }
        }
        GameEventPayload::AmmoExploded { unit, bin, records, .. } => {
            if let Some(target) = unit_mut(state, *unit, event) {
                if let Some(shots) = target.ammo.get_mut(*bin) {
                    *shots = 0;
                }
                for record in records {
                    apply_record(target, record);
                }
            }
        }
        GameEventPayload::HeatApplied { unit, current, .. } => {
            if let Some(target) = unit_mut(state, *unit, event) {
                target.heat = *current;
                target.activity.heat_generated = 0;
            }
        }
        GameEventPayload::UnitShutdown { unit, .. } => {
            if let Some(target) = unit_mut(state, *unit, event) {
                target.shutdown = true;
            }
        }
        GameEventPayload::UnitStartedUp { unit, .. } => {
            if let Some(target) = unit_mut(state, *unit, event) {
                target.shutdown = false;
            }
        }
        GameEventPayload::HeatCheckPassed { .. } | GameEventPayload::StartupFailed { .. } => {}
        GameEventPayload::PilotHit { unit, total, .. } => {
            if let Some(target) = unit_mut(state, *unit, event) {
                target.pilot.wounds = *total;
                if target.pilot.is_dead() {
                    target.pilot.conscious = false;
                }
            }
        }
        GameEventPayload::PilotConsciousnessRolled { unit, conscious, .. } => {
            if let Some(target) = unit_mut(state, *unit, event) {
                target.pilot.conscious = *conscious;
            }
        }
        GameEventPayload::UnitDestroyed { unit, .. } => {
            if let Some(target) = unit_mut(state, *unit, event) {
                target.destroyed = true;
                target.pending_psrs.clear();
            }
        }
        GameEventPayload::GameEnded { reason, winner } => {
            state.status = GameStatus::Ended {
                reason: *reason,
                winner: *winner,
            };
        }
    }
    state.events_applied += 1;

    #[cfg(feature = "debug-validation")]
    if let Err(violation) = state.check_invariants() {
        tracing::error!(event = event.id, %violation, "state invariant violated after fold");
    }
}

fn mark_stand_attempt(unit: &mut UnitCombatState) {
    unit.activity.moved = true;
    unit.activity.movement = MovementType::Walk;
    unit.activity.hexes_moved = 0;
    unit.activity.heat_generated += movement_heat(MovementType::Walk, 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::standard_template;
    use crate::events::{GameEndReason, GameEventPayload};
    use crate::hex::{HexCoordinate, HexDirection, MapConfig};
    use crate::map::BattleMap;
    use crate::state::{GameSetup, Side, UnitPosition, UnitSetup};
    use crate::unit::PilotDefinition;

    fn event(id: u64, payload: GameEventPayload) -> GameEvent {
        GameEvent {
            id,
            game_id: "reducer".to_string(),
            turn: 1,
            phase: GamePhase::Initiative,
            timestamp: 0,
            payload,
        }
    }

    fn created() -> GameEvent {
        let definition = standard_template("LCT-1V")
            .and_then(|t| t.build().ok())
            .expect("locust builds");
        let unit = |id, side, q| UnitSetup {
            id,
            side,
            definition: definition.clone(),
            pilot: PilotDefinition::default(),
            position: UnitPosition::new(HexCoordinate::new(q, 2), HexDirection::North),
        };
        event(
            0,
            GameEventPayload::GameCreated {
                setup: GameSetup {
                    game_id: "reducer".to_string(),
                    map: BattleMap::open(MapConfig::new(10, 10)),
                    units: vec![unit(1, Side::Player, 1), unit(2, Side::Opponent, 5)],
                    rules: crate::config::RulesConfig::default(),
                    turn_limit: Some(5),
                },
            },
        )
    }

    #[test]
    fn test_game_created_builds_units() {
        let state = derive_state(&[created()]);
        assert_eq!(state.turn, 1);
        assert_eq!(state.status, GameStatus::InProgress);
        assert_eq!(state.units.len(), 2);
        assert_eq!(state.events_applied, 1);
    }

    #[test]
    fn test_unit_moved_updates_position_and_mover() {
        let events = vec![
            created(),
            event(
                1,
                GameEventPayload::UnitMoved {
                    unit: 1,
                    movement: MovementType::Run,
                    from: HexCoordinate::new(1, 2),
                    to: HexCoordinate::new(1, 0),
                    facing: HexDirection::NorthEast,
                    path: vec![HexCoordinate::new(1, 1), HexCoordinate::new(1, 0)],
                    mp_spent: 2,
                    hexes_moved: 2,
                    heat: 2,
                },
            ),
        ];
        let state = derive_state(&events);
        let unit = state.unit(1).expect("unit");
        assert_eq!(unit.position.hex, HexCoordinate::new(1, 0));
        assert_eq!(unit.position.facing, HexDirection::NorthEast);
        assert_eq!(unit.activity.heat_generated, 2);
        assert_eq!(state.last_mover, Some(Side::Player));
    }

    #[test]
    fn test_new_turn_resets_activity() {
        let events = vec![
            created(),
            event(
                1,
                GameEventPayload::UnitMoved {
                    unit: 2,
                    movement: MovementType::Walk,
                    from: HexCoordinate::new(5, 2),
                    to: HexCoordinate::new(5, 1),
                    facing: HexDirection::North,
                    path: vec![HexCoordinate::new(5, 1)],
                    mp_spent: 1,
                    hexes_moved: 1,
                    heat: 1,
                },
            ),
            event(
                2,
                GameEventPayload::PhaseChanged {
                    from: GamePhase::End,
                    to: GamePhase::Initiative,
                    turn: 2,
                },
            ),
        ];
        let state = derive_state(&events);
        assert_eq!(state.turn, 2);
        assert!(!state.unit(2).expect("unit").activity.moved);
        assert_eq!(state.last_mover, None);
    }

    #[test]
    fn test_unknown_unit_is_skipped() {
        let events = vec![
            created(),
            event(1, GameEventPayload::UnitShutdown {
                unit: 99,
                heat: 30,
                roll: None,
                target: None,
            }),
        ];
        let state = derive_state(&events);
        assert_eq!(state.events_applied, 2);
        assert!(state.units.values().all(|u| !u.shutdown));
    }

    #[test]
    fn test_game_ended_is_terminal_status() {
        let events = vec![
            created(),
            event(
                1,
                GameEventPayload::GameEnded {
                    reason: GameEndReason::Concede,
                    winner: Some(Side::Opponent),
                },
            ),
        ];
        let state = derive_state(&events);
        assert!(state.is_over());
    }

    #[test]
    fn test_fold_is_repeatable() {
        let events = vec![created()];
        assert_eq!(derive_state(&events), derive_state(&events));
        assert_eq!(
            derive_state(&events).state_hash(),
            derive_state(&events).state_hash()
        );
    }
}
