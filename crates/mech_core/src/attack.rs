//! Weapon attack resolution.
//!
//! [`compute_to_hit`] assembles the modifier stack, [`resolve_attack`] rolls
//! to hit, picks locations and works out damage on a scratch copy of the
//! target. Nothing here mutates game state; the outcome becomes an
//! `AttackResolved` event and the reducer applies it.

use std::collections::BTreeMap;

use crate::damage::apply_damage;
use crate::dice::{DiceRoll, DiceRoller};
use crate::error::ActionError;
use crate::events::{
    AmmoUse, AttackDeclaration, ClusterResult, DamageGroup, ModifierKind, ToHitBreakdown,
    ToHitModifier,
};
use crate::heat;
use crate::hex::{arc_of_target, range_bracket, Arc, RangeBracket};
use crate::hit_location::{cluster_groups, cluster_hits, roll_hit_location, HitTable};
use crate::map::{BattleMap, LineOfSight};
use crate::movement::{target_movement_modifier, MovementType};
use crate::state::{GameState, UnitCombatState, UnitId};
use crate::unit::{Location, SlotContent, WeaponMount};

/// Immobile targets are easier to hit.
pub const IMMOBILE_TARGET_MODIFIER: i32 = -4;

/// Cluster roll bonus for semi-guided missiles on a designated target.
pub const SEMI_GUIDED_CLUSTER_BONUS: i32 = 2;

/// Arcs a mounted weapon can fire into.
///
/// Rear mounts fire backwards only. Arm mounts also cover their own side.
#[must_use]
pub fn weapon_arcs(mount: &WeaponMount) -> Vec<Arc> {
    if mount.rear_mounted {
        return vec![Arc::Rear];
    }
    match mount.location {
        Location::LeftArm => vec![Arc::Front, Arc::Left],
        Location::RightArm => vec![Arc::Front, Arc::Right],
        _ => vec![Arc::Front],
    }
}

/// Whether `mount` on `attacker` can bear on `target`.
#[must_use]
pub fn in_firing_arc(mount: &WeaponMount, attacker: &UnitCombatState, target: &UnitCombatState) -> bool {
    let arc = arc_of_target(
        attacker.position.hex,
        attacker.position.facing,
        target.position.hex,
    );
    weapon_arcs(mount).contains(&arc)
}

/// Line of sight between two units at their current levels.
#[must_use]
pub fn line_of_sight_between(
    map: &BattleMap,
    from: &UnitCombatState,
    to: &UnitCombatState,
) -> LineOfSight {
    map.line_of_sight(
        from.position.hex,
        from.position.sight_level(),
        to.position.hex,
        to.position.sight_level(),
    )
}

/// First target each attacker declared; fire at anything else is secondary.
#[must_use]
pub fn primary_targets(declarations: &[AttackDeclaration]) -> BTreeMap<UnitId, UnitId> {
    let mut primary = BTreeMap::new();
    for declaration in declarations {
        primary
            .entry(declaration.attacker)
            .or_insert(declaration.target);
    }
    primary
}

fn lookup(state: &GameState, id: UnitId) -> Result<&UnitCombatState, ActionError> {
    state.unit(id).ok_or(ActionError::UnitNotFound(id))
}

fn mount<'a>(unit: &'a UnitCombatState, weapon: usize) -> Result<&'a WeaponMount, ActionError> {
    unit.definition
        .weapons
        .get(weapon)
        .ok_or(ActionError::WeaponNotFound { unit: unit.id, weapon })
}

/// Assemble the to-hit number for a declared attack.
///
/// # Errors
/// Returns [`ActionError::UnitNotFound`] or [`ActionError::WeaponNotFound`]
/// for dangling references. Legality is checked separately.
pub fn compute_to_hit(
    state: &GameState,
    declaration: &AttackDeclaration,
    secondary: bool,
) -> Result<ToHitBreakdown, ActionError> {
    let attacker = lookup(state, declaration.attacker)?;
    let target = lookup(state, declaration.target)?;
    let spec = &mount(attacker, declaration.weapon)?.spec;
    let location = mount(attacker, declaration.weapon)?.location;

    let distance = attacker.position.hex.distance(target.position.hex);
    let bracket = range_bracket(distance, &spec.range);
    let mut modifiers = Vec::new();
    let mut push = |kind: ModifierKind, value: i32| {
        if value != 0 {
            modifiers.push(ToHitModifier { kind, value });
        }
    };

    push(ModifierKind::PilotWounds, i32::from(attacker.pilot.wounds));
    push(ModifierKind::Range, bracket.modifier().unwrap_or(0));
    push(
        ModifierKind::MinimumRange,
        spec.range.minimum_range_penalty(distance) as i32,
    );
    push(
        ModifierKind::AttackerMovement,
        attacker.activity.movement.attacker_modifier(),
    );

    // Semi-guided fire at a designated target ignores target movement
    let guided = spec.semi_guided && target.activity.tagged;
    if target.is_immobile() {
        push(ModifierKind::ImmobileTarget, IMMOBILE_TARGET_MODIFIER);
    } else if !guided {
        push(
            ModifierKind::TargetMovement,
            target_movement_modifier(target.activity.movement, target.activity.hexes_moved),
        );
    }

    push(ModifierKind::Heat, heat::to_hit_modifier(attacker.heat));
    push(
        ModifierKind::TargetTerrain,
        state.map.target_hex_modifier(target.position.hex) as i32,
    );

    let sight_from = match (declaration.indirect, declaration.spotter) {
        (true, Some(spotter)) => lookup(state, spotter)?,
        _ => attacker,
    };
    push(
        ModifierKind::InterveningTerrain,
        line_of_sight_between(&state.map, sight_from, target).intervening_modifier as i32,
    );

    if attacker.position.prone {
        push(ModifierKind::AttackerProne, 2);
    }
    if target.position.prone {
        push(ModifierKind::TargetProne, if distance <= 1 { -2 } else { 1 });
    }
    if declaration.indirect {
        push(ModifierKind::IndirectFire, 1);
        if let Some(spotter) = declaration.spotter.and_then(|id| state.unit(id)) {
            if spotter.activity.movement == MovementType::Walk {
                push(ModifierKind::SpotterMoved, 1);
            }
        }
    }
    if secondary {
        push(ModifierKind::SecondaryTarget, 1);
    }
    push(ModifierKind::Weapon, spec.to_hit_modifier);
    push(
        ModifierKind::SensorDamage,
        attacker.count_damaged(|slot| slot == SlotContent::Sensors) as i32 * 2,
    );
    if location.is_arm() {
        let shoulder = attacker.count_damaged_at(location, |slot| slot == SlotContent::Shoulder);
        let actuators = attacker.count_damaged_at(location, |slot| {
            matches!(slot, SlotContent::UpperArm | SlotContent::LowerArm)
        });
        push(ModifierKind::ActuatorDamage, (shoulder * 4 + actuators) as i32);
    }

    let base = attacker.pilot.gunnery;
    let target_number = i32::from(base) + modifiers.iter().map(|m| m.value).sum::<i32>();
    Ok(ToHitBreakdown {
        base,
        modifiers,
        target: target_number,
        distance,
        bracket,
    })
}

/// Everything decided when an attack is rolled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackOutcome {
    /// Modifier stack.
    pub to_hit: ToHitBreakdown,
    /// To-hit roll.
    pub roll: DiceRoll,
    /// Hit or miss.
    pub hit: bool,
    /// Weapon heat.
    pub heat: u32,
    /// Ammunition drawn.
    pub ammo: Option<AmmoUse>,
    /// Cluster result.
    pub cluster: Option<ClusterResult>,
    /// Damage per location group.
    pub groups: Vec<DamageGroup>,
    /// TAG designation landed.
    pub designated: bool,
}

/// Ammunition a shot draws, without drawing it.
///
/// # Errors
/// Returns [`ActionError::NoAmmo`] when an ammo weapon has nothing left.
pub fn ammo_for_shot(attacker: &UnitCombatState, weapon: usize) -> Result<Option<AmmoUse>, ActionError> {
    let spec = &mount(attacker, weapon)?.spec;
    if !spec.uses_ammo() {
        return Ok(None);
    }
    let bin = attacker.next_ammo_bin(weapon).ok_or(ActionError::NoAmmo {
        unit: attacker.id,
        weapon,
    })?;
    let shots = attacker.ammo.get(bin).copied().unwrap_or(0);
    Ok(Some(AmmoUse {
        bin,
        remaining: shots.saturating_sub(1),
    }))
}

/// Hit-location table for an attack from `attacker` on `target`.
#[must_use]
pub fn hit_table_for(attacker: &UnitCombatState, target: &UnitCombatState) -> HitTable {
    let arc = arc_of_target(
        target.position.hex,
        target.position.facing,
        attacker.position.hex,
    );
    HitTable::for_attack(arc, target.position.prone)
}

/// Roll a declared attack.
///
/// # Errors
/// Returns an [`ActionError`] for dangling references or an empty ammo
/// supply. Range, arc and sight are assumed already checked.
pub fn resolve_attack<R: DiceRoller + ?Sized>(
    state: &GameState,
    declaration: &AttackDeclaration,
    secondary: bool,
    dice: &mut R,
) -> Result<AttackOutcome, ActionError> {
    let to_hit = compute_to_hit(state, declaration, secondary)?;
    let attacker = lookup(state, declaration.attacker)?;
    let target = lookup(state, declaration.target)?;
    let spec = &mount(attacker, declaration.weapon)?.spec;
    let ammo = ammo_for_shot(attacker, declaration.weapon)?;

    let roll = dice.roll_2d6();
    let hit = to_hit.bracket != RangeBracket::OutOfRange && i32::from(roll.total) >= to_hit.target;
    tracing::debug!(
        attacker = attacker.id,
        target = target.id,
        weapon = %spec.name,
        to_hit = to_hit.target,
        roll = roll.total,
        hit,
        "attack rolled"
    );

    let mut outcome = AttackOutcome {
        to_hit,
        roll,
        hit,
        heat: spec.heat,
        ammo,
        cluster: None,
        groups: Vec::new(),
        designated: false,
    };
    if !hit {
        return Ok(outcome);
    }
    if spec.tag {
        outcome.designated = true;
        return Ok(outcome);
    }

    // Semi-guided racks at a designated target roll the cluster table at
    // +2; their groups still land through the standard table for the arc.
    let damages = match spec.cluster {
        Some(profile) => {
            let modifier = if spec.semi_guided && target.activity.tagged {
                SEMI_GUIDED_CLUSTER_BONUS
            } else {
                0
            };
            let cluster_roll = dice.roll_2d6();
            let hits = cluster_hits(profile.size, i32::from(cluster_roll.total) + modifier);
            outcome.cluster = Some(ClusterResult {
                roll: cluster_roll,
                modifier,
                hits,
            });
            cluster_groups(hits, profile.damage_per_missile, profile.group_size)
        }
        None => vec![spec.damage],
    };

    let table = hit_table_for(attacker, target);
    let mut working = target.clone();
    for damage in damages {
        let (location_roll, location) = roll_hit_location(table, dice);
        let armor_type = working.definition.armor_at(location.location).armor_type;
        let adjusted = armor_type.adjust_damage(damage, spec.category);
        let records = apply_damage(&mut working, location.location, location.rear, adjusted);
        outcome.groups.push(DamageGroup {
            roll: location_roll,
            table,
            hit: location,
            damage: adjusted,
            records,
        });
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::standard_template;
    use crate::dice::ScriptedDiceRoller;
    use crate::hex::{HexCoordinate, HexDirection, MapConfig};
    use crate::map::{Terrain, TerrainHex};
    use crate::state::{Side, UnitPosition};
    use crate::unit::PilotDefinition;

    fn place(state: &mut GameState, id: UnitId, side: Side, model: &str, hex: HexCoordinate, facing: HexDirection) {
        let definition = standard_template(model)
            .and_then(|t| t.build().ok())
            .expect("template builds");
        state.units.insert(
            id,
            UnitCombatState::new(id, side, definition, &PilotDefinition::default(), UnitPosition::new(hex, facing)),
        );
    }

    fn duel() -> GameState {
        let mut state = GameState {
            map: BattleMap::open(MapConfig::new(12, 12)),
            ..GameState::default()
        };
        // Hunchback facing north, Atlas five hexes north facing south
        place(&mut state, 1, Side::Player, "HBK-4G", HexCoordinate::new(4, 8), HexDirection::North);
        place(&mut state, 2, Side::Opponent, "AS7-D", HexCoordinate::new(4, 3), HexDirection::South);
        state
    }

    fn shot(weapon: usize) -> AttackDeclaration {
        AttackDeclaration {
            attacker: 1,
            weapon,
            target: 2,
            indirect: false,
            spotter: None,
        }
    }

    #[test]
    fn test_to_hit_stack() {
        let mut state = duel();
        {
            let target = state.units.get_mut(&2).expect("target");
            target.activity.movement = MovementType::Run;
            target.activity.hexes_moved = 5;
        }
        state.units.get_mut(&1).expect("attacker").activity.movement = MovementType::Walk;
        state.units.get_mut(&1).expect("attacker").heat = 9;

        // Medium laser at 5 hexes: gunnery 4, medium +2, walked +1, TMM +2, heat +1
        let breakdown = compute_to_hit(&state, &shot(1), false).expect("computes");
        assert_eq!(breakdown.distance, 5);
        assert_eq!(breakdown.bracket, RangeBracket::Medium);
        assert_eq!(breakdown.modifier(ModifierKind::Range), 2);
        assert_eq!(breakdown.modifier(ModifierKind::TargetMovement), 2);
        assert_eq!(breakdown.target, 10);

        let secondary = compute_to_hit(&state, &shot(1), true).expect("computes");
        assert_eq!(secondary.target, 11);
    }

    #[test]
    fn test_prone_target_modifiers() {
        let mut state = duel();
        state.units.get_mut(&2).expect("target").position.prone = true;
        let far = compute_to_hit(&state, &shot(1), false).expect("computes");
        assert_eq!(far.modifier(ModifierKind::TargetProne), 1);

        state.units.get_mut(&2).expect("target").position.hex = HexCoordinate::new(4, 7);
        let adjacent = compute_to_hit(&state, &shot(1), false).expect("computes");
        assert_eq!(adjacent.modifier(ModifierKind::TargetProne), -2);
    }

    #[test]
    fn test_woods_modifiers() {
        let mut state = duel();
        state.map.set_terrain(
            HexCoordinate::new(4, 5),
            TerrainHex { terrain: Terrain::LightWoods, elevation: 0 },
        );
        state.map.set_terrain(
            HexCoordinate::new(4, 3),
            TerrainHex { terrain: Terrain::HeavyWoods, elevation: 0 },
        );
        let breakdown = compute_to_hit(&state, &shot(1), false).expect("computes");
        assert_eq!(breakdown.modifier(ModifierKind::InterveningTerrain), 1);
        assert_eq!(breakdown.modifier(ModifierKind::TargetTerrain), 2);
    }

    #[test]
    fn test_shutdown_target_is_immobile() {
        let mut state = duel();
        {
            let target = state.units.get_mut(&2).expect("target");
            target.shutdown = true;
            target.activity.movement = MovementType::Run;
            target.activity.hexes_moved = 8;
        }
        let breakdown = compute_to_hit(&state, &shot(1), false).expect("computes");
        assert_eq!(breakdown.modifier(ModifierKind::ImmobileTarget), -4);
        assert_eq!(breakdown.modifier(ModifierKind::TargetMovement), 0);
    }

    #[test]
    fn test_hit_applies_damage_to_front() {
        let state = duel();
        // To-hit 6 (4 + medium range), roll 3+3 hits, location 3+4 = CT
        let mut dice = ScriptedDiceRoller::new(vec![3, 3, 3, 4]);
        let outcome = resolve_attack(&state, &shot(1), false, &mut dice).expect("resolves");
        assert!(outcome.hit);
        assert_eq!(outcome.heat, 3);
        assert_eq!(outcome.groups.len(), 1);
        let group = &outcome.groups[0];
        assert_eq!(group.table, HitTable::Front);
        assert_eq!(group.hit.location, Location::CenterTorso);
        assert_eq!(group.records[0].armor_damage, 5);
        // The state itself is untouched
        assert_eq!(state.unit(2).expect("target").location(Location::CenterTorso).armor, 47);
    }

    #[test]
    fn test_miss_still_draws_ammo_and_heat() {
        let state = duel();
        let mut dice = ScriptedDiceRoller::new(vec![1, 1]);
        let outcome = resolve_attack(&state, &shot(0), false, &mut dice).expect("resolves");
        assert!(!outcome.hit);
        assert_eq!(outcome.heat, 7);
        assert_eq!(outcome.ammo, Some(AmmoUse { bin: 0, remaining: 4 }));
        assert!(outcome.groups.is_empty());
    }

    #[test]
    fn test_arm_weapons_cover_side_arc() {
        let state = duel();
        let hunchback = state.unit(1).expect("unit");
        let left_arm = &hunchback.definition.weapons[1];
        assert_eq!(weapon_arcs(left_arm), vec![Arc::Front, Arc::Left]);
        let rear = WeaponMount {
            rear_mounted: true,
            ..left_arm.clone()
        };
        assert_eq!(weapon_arcs(&rear), vec![Arc::Rear]);
    }

    #[test]
    fn test_rear_attack_uses_rear_table() {
        let mut state = duel();
        state.units.get_mut(&2).expect("target").position.facing = HexDirection::North;
        let table = hit_table_for(state.unit(1).expect("a"), state.unit(2).expect("t"));
        assert_eq!(table, HitTable::Rear);
    }

    #[test]
    fn test_semi_guided_at_tagged_target() {
        let mut state = duel();
        {
            let hunchback = state.units.get_mut(&1).expect("attacker");
            hunchback.definition.weapons[0].spec =
                crate::data::weapon_spec("Semi-Guided LRM-10").expect("catalogue");
            hunchback.definition.ammo[0].weapon = "Semi-Guided LRM-10".to_string();
        }
        {
            let target = state.units.get_mut(&2).expect("target");
            target.activity.movement = MovementType::Run;
            target.activity.hexes_moved = 5;
            target.activity.tagged = true;
        }

        // 4 + medium 2 + minimum range 2, no target movement
        let breakdown = compute_to_hit(&state, &shot(0), false).expect("computes");
        assert_eq!(breakdown.modifier(ModifierKind::TargetMovement), 0);
        assert_eq!(breakdown.target, 8);

        // Hit on 12, cluster 7 + 2 = 9 lands 8 missiles as 5 + 3 on the front table
        let mut dice = ScriptedDiceRoller::new(vec![6, 6, 3, 4, 3, 4, 3, 4]);
        let outcome = resolve_attack(&state, &shot(0), false, &mut dice).expect("resolves");
        let cluster = outcome.cluster.expect("cluster rolled");
        assert_eq!(cluster.modifier, SEMI_GUIDED_CLUSTER_BONUS);
        assert_eq!(cluster.hits, 8);
        let damage: Vec<u32> = outcome.groups.iter().map(|g| g.damage).collect();
        assert_eq!(damage, vec![5, 3]);
        assert!(outcome.groups.iter().all(|g| g.table == HitTable::Front));

        state.units.get_mut(&2).expect("target").activity.tagged = false;
        let untagged = compute_to_hit(&state, &shot(0), false).expect("computes");
        assert_eq!(untagged.modifier(ModifierKind::TargetMovement), 2);
    }

    #[test]
    fn test_primary_target_is_first_declared() {
        let declarations = vec![
            AttackDeclaration { target: 5, ..shot(0) },
            AttackDeclaration { target: 6, ..shot(1) },
        ];
        assert_eq!(primary_targets(&declarations).get(&1), Some(&5));
    }
}
