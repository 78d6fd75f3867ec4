//! Action legality and legal-option enumeration.
//!
//! Every check here is read-only. The session calls the `validate_*`
//! functions before creating events; bots and UIs use the enumeration
//! helpers to offer only legal choices.

use std::collections::{BTreeMap, BTreeSet};

use crate::attack::{in_firing_arc, line_of_sight_between};
use crate::error::ActionError;
use crate::events::{AttackDeclaration, GamePhase};
use crate::hex::{range_bracket, HexCoordinate, RangeBracket};
use crate::movement::{
    find_path, validate_path, valid_destinations, MovementBudget, MovementContext, MovementDeclaration,
    MovementPlan, MovementType,
};
use crate::state::{GameState, Side, UnitCombatState, UnitId};

/// Reject actions once the game is over or outside `expected`.
///
/// # Errors
/// [`ActionError::GameOver`] or [`ActionError::WrongPhase`].
pub fn validate_phase(state: &GameState, expected: GamePhase) -> Result<(), ActionError> {
    if state.is_over() {
        return Err(ActionError::GameOver);
    }
    if state.phase != expected {
        return Err(ActionError::WrongPhase {
            expected,
            actual: state.phase,
        });
    }
    Ok(())
}

fn owned_unit(state: &GameState, side: Side, unit: UnitId) -> Result<&UnitCombatState, ActionError> {
    let found = state.unit(unit).ok_or(ActionError::UnitNotFound(unit))?;
    if found.side != side {
        return Err(ActionError::NotOwnUnit { unit, side });
    }
    if let Some(reason) = found.inactive_reason() {
        return Err(ActionError::UnitCannotAct {
            unit,
            reason: reason.to_string(),
        });
    }
    Ok(found)
}

/// Check that `side` may use `unit`'s movement now.
///
/// # Errors
/// Phase, turn order, ownership and activity rejections.
pub fn validate_unit_can_move(
    state: &GameState,
    side: Side,
    unit: UnitId,
) -> Result<&UnitCombatState, ActionError> {
    validate_phase(state, GamePhase::Movement)?;
    if state.active_side() != Some(side) {
        return Err(ActionError::NotYourTurn { side });
    }
    let mover = owned_unit(state, side, unit)?;
    if mover.activity.moved {
        return Err(ActionError::AlreadyMoved(unit));
    }
    Ok(mover)
}

/// Validate a declared move and work out what it costs.
///
/// # Errors
/// Any rejection from [`validate_unit_can_move`], plus prone units, an
/// unavailable mode or an illegal path.
pub fn validate_movement(
    state: &GameState,
    side: Side,
    declaration: &MovementDeclaration,
) -> Result<MovementPlan, ActionError> {
    let mover = validate_unit_can_move(state, side, declaration.unit)?;
    if mover.position.prone {
        return Err(ActionError::UnitIsProne(mover.id));
    }
    let unavailable = || ActionError::MovementModeUnavailable {
        unit: mover.id,
        mode: declaration.movement.name().to_string(),
    };
    if declaration.movement == MovementType::Stationary {
        return Err(unavailable());
    }
    let mp = MovementBudget::for_unit(mover)
        .mp_for(declaration.movement)
        .filter(|&mp| mp > 0)
        .ok_or_else(unavailable)?;
    let context = MovementContext::for_unit(&state.map, mover.id, state.units.values());
    validate_path(&context, mover.position.hex, declaration, mp)
}

/// Validate a stand-up attempt.
///
/// # Errors
/// Rejections from [`validate_unit_can_move`], a standing unit, or no
/// walking MP to spend.
pub fn validate_stand(state: &GameState, side: Side, unit: UnitId) -> Result<&UnitCombatState, ActionError> {
    let mover = validate_unit_can_move(state, side, unit)?;
    if !mover.position.prone {
        return Err(ActionError::UnitNotProne(unit));
    }
    if MovementBudget::for_unit(mover).walk == 0 {
        return Err(ActionError::MovementModeUnavailable {
            unit,
            mode: MovementType::Walk.name().to_string(),
        });
    }
    Ok(mover)
}

/// Validate a single attack declaration.
///
/// # Errors
/// Reference, ownership, weapon, target, range, arc and sight rejections.
pub fn validate_attack(
    state: &GameState,
    side: Side,
    declaration: &AttackDeclaration,
) -> Result<(), ActionError> {
    let attacker = owned_unit(state, side, declaration.attacker)?;
    let weapon = declaration.weapon;
    let mount = attacker
        .definition
        .weapons
        .get(weapon)
        .ok_or(ActionError::WeaponNotFound { unit: attacker.id, weapon })?;
    if !attacker.is_weapon_operational(weapon) {
        return Err(ActionError::WeaponDestroyed { unit: attacker.id, weapon });
    }
    if mount.spec.uses_ammo() && attacker.ammo_available(weapon) == 0 {
        return Err(ActionError::NoAmmo { unit: attacker.id, weapon });
    }

    let target = state
        .unit(declaration.target)
        .ok_or(ActionError::UnitNotFound(declaration.target))?;
    if target.id == attacker.id {
        return Err(ActionError::SelfTarget(attacker.id));
    }
    if target.destroyed {
        return Err(ActionError::TargetDestroyed(target.id));
    }
    let distance = attacker.position.hex.distance(target.position.hex);
    if distance == 0 {
        return Err(ActionError::ZeroRange);
    }
    if !in_firing_arc(mount, attacker, target) {
        return Err(ActionError::NotInFiringArc {
            weapon,
            target: target.id,
        });
    }
    if range_bracket(distance, &mount.spec.range) == RangeBracket::OutOfRange {
        return Err(ActionError::OutOfRange {
            distance,
            maximum: mount.spec.range.maximum,
        });
    }

    if declaration.indirect {
        return validate_indirect(state, attacker, target, declaration);
    }
    if declaration.spotter.is_some() {
        return Err(ActionError::InvalidIndirectFire(
            "a spotter is only used for indirect fire".to_string(),
        ));
    }
    if line_of_sight_between(&state.map, attacker, target).blocked {
        return Err(ActionError::NoLineOfSight {
            attacker: attacker.id,
            target: target.id,
        });
    }
    Ok(())
}

fn validate_indirect(
    state: &GameState,
    attacker: &UnitCombatState,
    target: &UnitCombatState,
    declaration: &AttackDeclaration,
) -> Result<(), ActionError> {
    let invalid = |message: &str| Err(ActionError::InvalidIndirectFire(message.to_string()));
    if !state.rules.indirect_fire {
        return invalid("indirect fire is disabled");
    }
    if !attacker.definition.weapons[declaration.weapon].spec.indirect_fire {
        return invalid("weapon cannot fire indirectly");
    }
    let Some(spotter_id) = declaration.spotter else {
        return invalid("no spotter named");
    };
    let Some(spotter) = state.unit(spotter_id) else {
        return Err(ActionError::UnitNotFound(spotter_id));
    };
    if spotter.id == attacker.id {
        return invalid("the attacker cannot spot for itself");
    }
    if spotter.side != attacker.side {
        return invalid("spotter is not friendly");
    }
    if !spotter.is_operational() {
        return invalid("spotter cannot act");
    }
    if matches!(spotter.activity.movement, MovementType::Run | MovementType::Jump) {
        return invalid("spotter ran or jumped this turn");
    }
    if line_of_sight_between(&state.map, spotter, target).blocked {
        return invalid("spotter has no line of sight to the target");
    }
    Ok(())
}

/// Validate a side's full set of attack declarations for one lock.
///
/// # Errors
/// The first rejection among the declarations, a weapon assigned twice,
/// more shots than ammunition, or a side that already locked.
pub fn validate_attack_set(
    state: &GameState,
    side: Side,
    declarations: &[AttackDeclaration],
) -> Result<(), ActionError> {
    validate_phase(state, GamePhase::WeaponAttack)?;
    if state.locked_attacks.contains_key(&side) {
        return Err(ActionError::AlreadyLocked(side));
    }
    let mut assigned = BTreeSet::new();
    let mut shots: BTreeMap<(UnitId, String), u32> = BTreeMap::new();
    for declaration in declarations {
        validate_attack(state, side, declaration)?;
        if !assigned.insert((declaration.attacker, declaration.weapon)) {
            return Err(ActionError::WeaponAlreadyAssigned {
                unit: declaration.attacker,
                weapon: declaration.weapon,
            });
        }
        let Some(attacker) = state.unit(declaration.attacker) else {
            continue;
        };
        let spec = &attacker.definition.weapons[declaration.weapon].spec;
        if spec.uses_ammo() {
            let needed = shots
                .entry((attacker.id, spec.name.clone()))
                .or_insert(0);
            *needed += 1;
            if *needed > attacker.ammo_available(declaration.weapon) {
                return Err(ActionError::NoAmmo {
                    unit: attacker.id,
                    weapon: declaration.weapon,
                });
            }
        }
    }
    Ok(())
}

/// Units `side` can still move, empty when it is not their turn.
#[must_use]
pub fn movable_units(state: &GameState, side: Side) -> Vec<UnitId> {
    if state.active_side() != Some(side) {
        return Vec::new();
    }
    state.units_awaiting_movement(side)
}

/// Every hex `unit` could legally end a move of type `movement` in.
#[must_use]
pub fn valid_destinations_for(
    state: &GameState,
    unit: UnitId,
    movement: MovementType,
) -> BTreeSet<HexCoordinate> {
    let Some(mover) = state.unit(unit) else {
        return BTreeSet::new();
    };
    if mover.position.prone || !mover.is_operational() {
        return BTreeSet::new();
    }
    let Some(mp) = MovementBudget::for_unit(mover).mp_for(movement) else {
        return BTreeSet::new();
    };
    let context = MovementContext::for_unit(&state.map, unit, state.units.values());
    valid_destinations(&context, mover.position.hex, movement, mp)
}

/// Cheapest legal path for `unit` to end a `movement` move at `goal`.
#[must_use]
pub fn path_for(
    state: &GameState,
    unit: UnitId,
    movement: MovementType,
    goal: HexCoordinate,
) -> Option<Vec<HexCoordinate>> {
    let mover = state.unit(unit)?;
    if mover.position.prone || !mover.is_operational() {
        return None;
    }
    let mp = MovementBudget::for_unit(mover).mp_for(movement)?;
    let context = MovementContext::for_unit(&state.map, unit, state.units.values());
    find_path(&context, mover.position.hex, goal, movement, mp)
}

/// Enemy units `weapon` on `attacker` can fire at directly.
#[must_use]
pub fn valid_targets(state: &GameState, attacker: UnitId, weapon: usize) -> Vec<UnitId> {
    let Some(unit) = state.unit(attacker) else {
        return Vec::new();
    };
    state
        .units
        .values()
        .filter(|target| target.side != unit.side)
        .filter(|target| {
            let declaration = AttackDeclaration {
                attacker,
                weapon,
                target: target.id,
                indirect: false,
                spotter: None,
            };
            validate_attack(state, unit.side, &declaration).is_ok()
        })
        .map(|target| target.id)
        .collect()
}

/// Friendly spotters that let `weapon` on `attacker` fire indirectly at
/// `target`, lowest id first.
#[must_use]
pub fn valid_spotters(state: &GameState, attacker: UnitId, weapon: usize, target: UnitId) -> Vec<UnitId> {
    let Some(unit) = state.unit(attacker) else {
        return Vec::new();
    };
    if !unit
        .definition
        .weapons
        .get(weapon)
        .is_some_and(|mount| mount.spec.indirect_fire)
    {
        return Vec::new();
    }
    state
        .units_of(unit.side)
        .filter(|spotter| spotter.id != attacker)
        .filter(|spotter| {
            let declaration = AttackDeclaration {
                attacker,
                weapon,
                target,
                indirect: true,
                spotter: Some(spotter.id),
            };
            validate_attack(state, unit.side, &declaration).is_ok()
        })
        .map(|spotter| spotter.id)
        .collect()
}

/// Every legal declaration for `side`, one per weapon and target.
///
/// Direct fire is listed first for each weapon. Targets out of direct
/// sight get one indirect declaration through the lowest-id spotter.
#[must_use]
pub fn legal_attacks(state: &GameState, side: Side) -> Vec<AttackDeclaration> {
    let mut attacks = Vec::new();
    for unit in state.units_of(side) {
        for weapon in 0..unit.definition.weapons.len() {
            let direct = valid_targets(state, unit.id, weapon);
            for &target in &direct {
                attacks.push(AttackDeclaration {
                    attacker: unit.id,
                    weapon,
                    target,
                    indirect: false,
                    spotter: None,
                });
            }
            let hidden = state
                .units
                .values()
                .filter(|target| target.side != side && !direct.contains(&target.id));
            for target in hidden {
                if let Some(&spotter) = valid_spotters(state, unit.id, weapon, target.id).first() {
                    attacks.push(AttackDeclaration {
                        attacker: unit.id,
                        weapon,
                        target: target.id,
                        indirect: true,
                        spotter: Some(spotter),
                    });
                }
            }
        }
    }
    attacks
}

/// Whether `side` has any legal attack at all, direct or indirect.
#[must_use]
pub fn can_attack(state: &GameState, side: Side) -> bool {
    !legal_attacks(state, side).is_empty()
}
