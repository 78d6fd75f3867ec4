//! Event-emitting rules resolution.
//!
//! A [`Resolver`] works on a scratch copy of the game state. Every roll it
//! makes is recorded in an event payload, and each event is folded into the
//! scratch state the moment it is emitted, so later steps see the effects of
//! earlier ones. Nothing reaches the caller until [`Resolver::finish`], which
//! keeps a resolution that is abandoned halfway invisible.
//!
//! The phase functions each end by moving the game on: weapon attacks hand
//! over to Heat, Heat to End, and End either ends the game or starts the
//! next turn's Initiative.

use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;

use crate::attack::{ammo_for_shot, primary_targets, resolve_attack};
use crate::critical::resolve_critical_hits;
use crate::damage::{apply_damage, apply_internal_damage, destruction_cause};
use crate::dice::{DiceRoll, DiceRoller};
use crate::events::{
    AmmoExplosionCause, AttackDeclaration, DamageGroup, GameEndReason, GameEvent,
    GameEventPayload, GamePhase, HeatCheckKind, InitiativeRoll, PilotDamageSource,
};
use crate::heat::{
    self, ammo_explosion_check, apply_heat, movement_heat, pilot_heat_damage, ThresholdCheck,
    AUTOMATIC_THRESHOLD, ENGINE_HIT_HEAT, SHUTDOWN_THRESHOLD,
};
use crate::hex::HexCoordinate;
use crate::hit_location::roll_hit_location;
use crate::movement::{MovementPlan, MovementType};
use crate::piloting::{
    consciousness_target, fall_clusters, fall_damage, fall_direction, psr_target, PsrReason,
    PILOT_DEATH_WOUNDS,
};
use crate::reducer::apply_event_in_place;
use crate::state::{GameSetup, GameState, Side, UnitCombatState, UnitId};
use crate::unit::{Location, SlotContent};

/// Consecutive initiative ties after which the player side takes initiative.
pub const MAX_INITIATIVE_ROLLS: usize = 32;

/// Produces events for one action and everything it sets off.
pub struct Resolver<'d, R: DiceRoller + ?Sized> {
    state: GameState,
    dice: &'d mut R,
    events: Vec<GameEvent>,
    next_id: u64,
    timestamp: u64,
}

impl<'d, R: DiceRoller + ?Sized> Resolver<'d, R> {
    /// Start from a copy of `state`. Events are numbered from `next_id` and
    /// stamped with `timestamp`.
    pub fn new(state: &GameState, next_id: u64, timestamp: u64, dice: &'d mut R) -> Self {
        Self {
            state: state.clone(),
            dice,
            events: Vec::new(),
            next_id,
            timestamp,
        }
    }

    /// Scratch state with every emitted event folded in.
    #[must_use]
    pub const fn state(&self) -> &GameState {
        &self.state
    }

    /// Events emitted so far.
    #[must_use]
    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Hand back the scratch state and the emitted events.
    #[must_use]
    pub fn finish(self) -> (GameState, Vec<GameEvent>) {
        (self.state, self.events)
    }

    /// Append an event and fold it into the scratch state.
    pub fn emit(&mut self, payload: GameEventPayload) {
        let game_id = match &payload {
            GameEventPayload::GameCreated { setup } => setup.game_id.clone(),
            _ => self.state.game_id.clone(),
        };
        let event = GameEvent {
            id: self.next_id,
            game_id,
            turn: self.state.turn,
            phase: self.state.phase,
            timestamp: self.timestamp,
            payload,
        };
        self.next_id += 1;
        apply_event_in_place(&mut self.state, &event);
        self.events.push(event);
    }

    /// Open a new game.
    pub fn create_game(&mut self, setup: GameSetup) {
        tracing::info!(game = %setup.game_id, units = setup.units.len(), "game created");
        self.emit(GameEventPayload::GameCreated { setup });
    }

    /// Move to `to`. Entering Initiative starts the next turn.
    pub fn change_phase(&mut self, to: GamePhase) {
        let from = self.state.phase;
        let turn = if to == GamePhase::Initiative {
            self.state.turn + 1
        } else {
            self.state.turn
        };
        tracing::info!(turn, ?from, ?to, "phase changed");
        self.emit(GameEventPayload::PhaseChanged { from, to, turn });
    }

    /// End the game.
    pub fn end_game(&mut self, reason: GameEndReason, winner: Option<Side>) {
        tracing::info!(?reason, ?winner, turn = self.state.turn, "game ended");
        self.emit(GameEventPayload::GameEnded { reason, winner });
    }

    /// Roll 2d6 per side until someone wins, then open Movement.
    ///
    /// The higher roll wins initiative. If the dice never separate the
    /// sides the player takes it.
    pub fn roll_initiative(&mut self) -> Side {
        let mut rolls = Vec::new();
        let mut winner = Side::Player;
        for _ in 0..MAX_INITIATIVE_ROLLS {
            let player = self.dice.roll_2d6();
            let opponent = self.dice.roll_2d6();
            rolls.push(InitiativeRoll { player, opponent });
            match player.total.cmp(&opponent.total) {
                Ordering::Greater => {
                    winner = Side::Player;
                    break;
                }
                Ordering::Less => {
                    winner = Side::Opponent;
                    break;
                }
                Ordering::Equal => {}
            }
        }
        tracing::debug!(?winner, rolls = rolls.len(), "initiative rolled");
        self.emit(GameEventPayload::InitiativeRolled { rolls, winner });
        self.change_phase(GamePhase::Movement);
        winner
    }

    /// Record a validated move and any piloting rolls it incurs.
    pub fn move_unit(
        &mut self,
        unit: UnitId,
        movement: MovementType,
        path: Vec<HexCoordinate>,
        plan: &MovementPlan,
    ) {
        let Some(mover) = self.state.unit(unit) else {
            return;
        };
        let running_hot = matches!(movement, MovementType::Run | MovementType::Jump)
            && mover.heat >= self.state.rules.high_heat_psr_threshold;
        let jumping_damaged = movement == MovementType::Jump && has_leg_or_gyro_damage(mover);
        let from = mover.position.hex;

        self.emit(GameEventPayload::UnitMoved {
            unit,
            movement,
            from,
            to: plan.destination,
            facing: plan.facing,
            path,
            mp_spent: plan.mp_spent,
            hexes_moved: plan.hexes_moved,
            heat: movement_heat(movement, plan.hexes_moved),
        });
        let owed = [
            (running_hot, PsrReason::HighHeatMovement),
            (jumping_damaged, PsrReason::JumpWithDamage),
        ];
        // Movement rolls are made as the move ends; a fall cancels the rest
        for (_, reason) in owed.into_iter().filter(|(due, _)| *due) {
            let standing = self
                .state
                .unit(unit)
                .is_some_and(|u| !u.destroyed && !u.position.prone);
            if !standing {
                break;
            }
            self.require_psr(unit, reason);
            self.roll_psr(unit, reason);
        }
    }

    /// Record a unit spending its movement standing still.
    pub fn hold_position(&mut self, unit: UnitId) {
        let Some(holder) = self.state.unit(unit) else {
            return;
        };
        let hex = holder.position.hex;
        let facing = holder.position.facing;
        self.emit(GameEventPayload::UnitMoved {
            unit,
            movement: MovementType::Stationary,
            from: hex,
            to: hex,
            facing,
            path: Vec::new(),
            mp_spent: 0,
            hexes_moved: 0,
            heat: 0,
        });
    }

    /// Roll for a prone unit to stand. Returns whether it got up.
    pub fn stand_up(&mut self, unit: UnitId) -> bool {
        let Some(prone) = self.state.unit(unit) else {
            return false;
        };
        let facing = prone.position.facing;
        match psr_target(prone, PsrReason::StandingUp) {
            Some(target) => {
                let roll = self.dice.roll_2d6();
                if roll.succeeds(target) {
                    self.emit(GameEventPayload::UnitStoodUp {
                        unit,
                        roll,
                        target,
                        facing,
                    });
                    true
                } else {
                    self.emit(GameEventPayload::StandFailed {
                        unit,
                        roll: Some(roll),
                        target: Some(target),
                    });
                    false
                }
            }
            None => {
                self.emit(GameEventPayload::StandFailed {
                    unit,
                    roll: None,
                    target: None,
                });
                false
            }
        }
    }

    /// Reveal both sides' declarations, resolve them, and move to Heat.
    ///
    /// TAG attacks go first; the rest follow by attacker and weapon index.
    /// An attack on a unit destroyed earlier in the phase is voided but its
    /// heat and ammunition are still spent.
    pub fn resolve_weapon_attacks(&mut self, declarations: &BTreeMap<Side, Vec<AttackDeclaration>>) {
        for side in Side::ALL {
            for declaration in declarations.get(&side).into_iter().flatten() {
                self.emit(GameEventPayload::AttackDeclared {
                    declaration: declaration.clone(),
                });
            }
        }

        let primary = primary_targets(&self.state.declared_attacks);
        let mut order = self.state.declared_attacks.clone();
        order.sort_by_key(|d| (!self.is_tag(d), d.attacker, d.weapon));
        for declaration in &order {
            let secondary = primary.get(&declaration.attacker) != Some(&declaration.target);
            self.resolve_declared_attack(declaration, secondary);
        }

        let threshold = self.state.rules.heavy_damage_psr_threshold;
        let shaken: Vec<UnitId> = self
            .state
            .units
            .values()
            .filter(|unit| !unit.destroyed && unit.activity.damage_this_phase >= threshold)
            .map(|unit| unit.id)
            .collect();
        for unit in shaken {
            self.require_psr(unit, PsrReason::HeavyDamage);
        }

        self.change_phase(GamePhase::Heat);
    }

    fn is_tag(&self, declaration: &AttackDeclaration) -> bool {
        self.state
            .unit(declaration.attacker)
            .and_then(|unit| unit.definition.weapons.get(declaration.weapon))
            .is_some_and(|mount| mount.spec.tag)
    }

    fn resolve_declared_attack(&mut self, declaration: &AttackDeclaration, secondary: bool) {
        let target_gone = self
            .state
            .unit(declaration.target)
            .map_or(true, |target| target.destroyed);
        if target_gone {
            let Some(attacker) = self.state.unit(declaration.attacker) else {
                return;
            };
            let heat = attacker
                .definition
                .weapons
                .get(declaration.weapon)
                .map_or(0, |mount| mount.spec.heat);
            let ammo = ammo_for_shot(attacker, declaration.weapon).ok().flatten();
            tracing::debug!(
                attacker = declaration.attacker,
                target = declaration.target,
                "attack voided, target already destroyed"
            );
            self.emit(GameEventPayload::AttackVoided {
                declaration: declaration.clone(),
                heat,
                ammo,
            });
            return;
        }

        let outcome = match resolve_attack(&self.state, declaration, secondary, &mut *self.dice) {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!(
                    attacker = declaration.attacker,
                    weapon = declaration.weapon,
                    %error,
                    "attack dropped during resolution"
                );
                return;
            }
        };
        let groups = outcome.groups.clone();
        self.emit(GameEventPayload::AttackResolved {
            declaration: declaration.clone(),
            to_hit: outcome.to_hit,
            roll: outcome.roll,
            hit: outcome.hit,
            heat: outcome.heat,
            ammo: outcome.ammo,
            cluster: outcome.cluster,
            groups: outcome.groups,
            designated: outcome.designated,
        });
        if !groups.is_empty() {
            self.damage_effects(declaration.target, &groups, Some(declaration.attacker), true);
        }
    }

    /// Follow up damage that has already been folded in: criticals,
    /// piloting rolls, head wounds and destruction.
    fn damage_effects(&mut self, unit: UnitId, groups: &[DamageGroup], by: Option<UnitId>, head_wounds: bool) {
        if self.check_destroyed(unit, by) {
            return;
        }
        for group in groups {
            for record in &group.records {
                if self.is_destroyed(unit) {
                    return;
                }
                if record.breaches_structure() {
                    self.roll_criticals(unit, record.location, by);
                }
                if record.destroyed && record.location.is_leg() {
                    self.require_psr(unit, PsrReason::LegDestroyed);
                }
            }
            let breached = group
                .records
                .iter()
                .any(|r| r.location == group.hit.location && r.structure_damage > 0);
            if group.hit.through_armor_critical && self.state.rules.through_armor_criticals && !breached {
                self.roll_criticals(unit, group.hit.location, by);
            }
            if head_wounds && group.hit.location == Location::Head && group.damage > 0 {
                self.wound_pilot(unit, 1, PilotDamageSource::HeadHit, by);
            }
        }
        self.check_destroyed(unit, by);
    }

    fn is_destroyed(&self, unit: UnitId) -> bool {
        self.state.unit(unit).map_or(true, |u| u.destroyed)
    }

    /// Emit `UnitDestroyed` the first time a unit's condition kills it.
    fn check_destroyed(&mut self, unit: UnitId, by: Option<UnitId>) -> bool {
        let Some(target) = self.state.unit(unit) else {
            return true;
        };
        if target.destroyed {
            return true;
        }
        let Some(cause) = destruction_cause(target) else {
            return false;
        };
        tracing::info!(unit, ?cause, ?by, "unit destroyed");
        self.emit(GameEventPayload::UnitDestroyed { unit, cause, by });
        true
    }

    fn roll_criticals(&mut self, unit: UnitId, location: Location, by: Option<UnitId>) {
        let Some(target) = self.state.unit(unit) else {
            return;
        };
        if target.destroyed || target.is_location_destroyed(location) {
            return;
        }
        let armor_type = target.definition.armor_at(location).armor_type;
        let result = resolve_critical_hits(target, location, armor_type, None, &mut *self.dice);
        let hits = result.hits.clone();
        self.emit(GameEventPayload::CriticalHitResolved {
            unit,
            location,
            determination: result.determination,
            rolled: result.rolled,
            applied: result.applied,
            hits: result.hits,
            limb_blown_off: result.limb_blown_off,
            head_destroyed: result.head_destroyed,
        });

        for hit in &hits {
            match hit.content {
                SlotContent::Ammo(bin) => self.explode_ammo(unit, bin, AmmoExplosionCause::CriticalHit, by),
                SlotContent::Gyro => self.require_psr(unit, PsrReason::GyroHit),
                SlotContent::Hip => self.require_psr(unit, PsrReason::HipHit),
                content if content.is_leg_actuator() => {
                    self.require_psr(unit, PsrReason::LegActuatorHit);
                }
                _ => {}
            }
        }
        if result.limb_blown_off && location.is_leg() {
            self.require_psr(unit, PsrReason::LegDestroyed);
        }
        self.check_destroyed(unit, by);
    }

    fn explode_ammo(&mut self, unit: UnitId, bin: usize, cause: AmmoExplosionCause, by: Option<UnitId>) {
        let Some(target) = self.state.unit(unit) else {
            return;
        };
        if target.destroyed {
            return;
        }
        let shots = target.ammo.get(bin).copied().unwrap_or(0);
        let Some(definition) = target.definition.ammo.get(bin) else {
            return;
        };
        if shots == 0 {
            return;
        }
        let damage = shots * definition.damage_per_shot;
        let mut working = target.clone();
        let records = apply_internal_damage(&mut working, definition.location, damage);
        tracing::info!(unit, bin, damage, ?cause, "ammunition exploded");
        self.emit(GameEventPayload::AmmoExploded {
            unit,
            bin,
            cause,
            damage,
            records: records.clone(),
        });
        if self.check_destroyed(unit, by) {
            return;
        }
        for record in &records {
            if record.breaches_structure() {
                self.roll_criticals(unit, record.location, by);
            }
            if record.destroyed && record.location.is_leg() {
                self.require_psr(unit, PsrReason::LegDestroyed);
            }
        }
        self.wound_pilot(unit, 2, PilotDamageSource::AmmoExplosion, by);
    }

    /// Wound a pilot, then roll to stay conscious.
    fn wound_pilot(&mut self, unit: UnitId, wounds: u8, source: PilotDamageSource, by: Option<UnitId>) {
        let Some(target) = self.state.unit(unit) else {
            return;
        };
        if target.destroyed {
            return;
        }
        let total = target.pilot.wounds.saturating_add(wounds).min(PILOT_DEATH_WOUNDS);
        self.emit(GameEventPayload::PilotHit {
            unit,
            source,
            wounds,
            total,
        });
        if self.check_destroyed(unit, by) {
            return;
        }
        let awake = self.state.unit(unit).is_some_and(|u| u.pilot.conscious);
        if let (true, Some(target)) = (awake, consciousness_target(total)) {
            let roll = self.dice.roll_2d6();
            self.emit(GameEventPayload::PilotConsciousnessRolled {
                unit,
                roll,
                target,
                conscious: roll.succeeds(target),
            });
        }
    }

    fn require_psr(&mut self, unit: UnitId, reason: PsrReason) {
        if self.is_destroyed(unit) {
            return;
        }
        self.emit(GameEventPayload::PilotingSkillRollRequired { unit, reason });
    }

    /// Knock a unit over from `height` levels up.
    fn fall(&mut self, unit: UnitId, height: u32) {
        let Some(target) = self.state.unit(unit) else {
            return;
        };
        if target.destroyed {
            return;
        }
        let direction_roll = self.dice.roll_d6();
        let (direction, rotation) = fall_direction(direction_roll);
        let facing = target.position.facing.rotate(rotation);
        let damage = fall_damage(target.definition.tonnage, height);
        let table = direction.hit_table();

        let mut working = target.clone();
        let mut groups = Vec::new();
        for cluster in fall_clusters(damage) {
            let (roll, hit) = roll_hit_location(table, &mut *self.dice);
            let records = apply_damage(&mut working, hit.location, hit.rear, cluster);
            groups.push(DamageGroup {
                roll,
                table,
                hit,
                damage: cluster,
                records,
            });
        }
        tracing::debug!(unit, ?direction, damage, "unit fell");
        self.emit(GameEventPayload::UnitFell {
            unit,
            direction_roll,
            direction,
            facing,
            height,
            damage,
            groups: groups.clone(),
        });
        self.damage_effects(unit, &groups, None, false);
        self.wound_pilot(unit, 1, PilotDamageSource::Fall, None);
    }

    /// Settle heat for every unit, run the heat checks, and move to End.
    pub fn resolve_heat_phase(&mut self) {
        let ids: Vec<UnitId> = self.state.units.keys().copied().collect();
        for unit in ids {
            self.settle_heat(unit);
        }
        self.change_phase(GamePhase::End);
    }

    fn settle_heat(&mut self, unit: UnitId) {
        let Some(current) = self.state.unit(unit) else {
            return;
        };
        if current.destroyed {
            return;
        }
        let generated = current.activity.heat_generated + current.engine_hits() * ENGINE_HIT_HEAT;
        let update = apply_heat(current.heat, generated, current.dissipation());
        let was_shutdown = current.shutdown;
        self.emit(GameEventPayload::HeatApplied {
            unit,
            previous: update.previous,
            generated: update.generated,
            dissipated: update.dissipated,
            current: update.current,
        });

        let heat = update.current;
        if was_shutdown {
            self.attempt_startup(unit, heat);
        } else {
            self.check_shutdown(unit, heat);
        }
        self.check_ammo_heat(unit, heat);

        let life_support_damaged = self
            .state
            .unit(unit)
            .is_some_and(UnitCombatState::life_support_damaged);
        let wounds = pilot_heat_damage(heat, life_support_damaged);
        if wounds > 0 {
            self.wound_pilot(unit, wounds, PilotDamageSource::Heat, None);
        }
    }

    fn check_shutdown(&mut self, unit: UnitId, heat: u32) {
        match heat::shutdown_check(heat) {
            ThresholdCheck::None => {}
            ThresholdCheck::Roll(target) => {
                let roll = self.dice.roll_2d6();
                if roll.succeeds(target) {
                    self.emit(GameEventPayload::HeatCheckPassed {
                        unit,
                        kind: HeatCheckKind::Shutdown,
                        roll,
                        target,
                    });
                } else {
                    self.shut_down(unit, heat, Some(roll), Some(target));
                }
            }
            ThresholdCheck::Automatic => self.shut_down(unit, heat, None, None),
        }
    }

    fn shut_down(&mut self, unit: UnitId, heat: u32, roll: Option<DiceRoll>, target: Option<u8>) {
        tracing::info!(unit, heat, "unit shut down");
        self.emit(GameEventPayload::UnitShutdown {
            unit,
            heat,
            roll,
            target,
        });
        let standing = self.state.unit(unit).is_some_and(|u| !u.position.prone);
        if standing {
            self.fall(unit, 0);
        }
    }

    fn attempt_startup(&mut self, unit: UnitId, heat: u32) {
        if heat < SHUTDOWN_THRESHOLD {
            self.emit(GameEventPayload::UnitStartedUp {
                unit,
                roll: None,
                target: None,
            });
            return;
        }
        if heat >= AUTOMATIC_THRESHOLD {
            return;
        }
        if let ThresholdCheck::Roll(target) = heat::shutdown_check(heat) {
            let roll = self.dice.roll_2d6();
            if roll.succeeds(target) {
                self.emit(GameEventPayload::UnitStartedUp {
                    unit,
                    roll: Some(roll),
                    target: Some(target),
                });
            } else {
                self.emit(GameEventPayload::StartupFailed { unit, roll, target });
            }
        }
    }

    fn check_ammo_heat(&mut self, unit: UnitId, heat: u32) {
        let Some(bin) = self.state.unit(unit).and_then(most_dangerous_bin) else {
            return;
        };
        match ammo_explosion_check(heat) {
            ThresholdCheck::None => {}
            ThresholdCheck::Roll(target) => {
                let roll = self.dice.roll_2d6();
                if roll.succeeds(target) {
                    self.emit(GameEventPayload::HeatCheckPassed {
                        unit,
                        kind: HeatCheckKind::AmmoExplosion,
                        roll,
                        target,
                    });
                } else {
                    self.explode_ammo(unit, bin, AmmoExplosionCause::Heat, None);
                }
            }
            ThresholdCheck::Automatic => self.explode_ammo(unit, bin, AmmoExplosionCause::Heat, None),
        }
    }

    /// Wake pilots, roll owed piloting rolls, then end the game or start
    /// the next turn.
    pub fn resolve_end_phase(&mut self) {
        let ids: Vec<UnitId> = self.state.units.keys().copied().collect();
        for &unit in &ids {
            self.wake_pilot(unit);
            self.roll_pending_psrs(unit);
        }
        self.finish_turn();
    }

    fn wake_pilot(&mut self, unit: UnitId) {
        let Some(current) = self.state.unit(unit) else {
            return;
        };
        if current.destroyed || current.pilot.conscious || current.pilot.is_dead() {
            return;
        }
        if let Some(target) = consciousness_target(current.pilot.wounds) {
            let roll = self.dice.roll_2d6();
            self.emit(GameEventPayload::PilotConsciousnessRolled {
                unit,
                roll,
                target,
                conscious: roll.succeeds(target),
            });
        }
    }

    /// Roll every owed piloting roll until one fails. A unit already on
    /// the ground has nothing left to lose; its rolls lapse at turn end.
    fn roll_pending_psrs(&mut self, unit: UnitId) {
        loop {
            let Some(current) = self.state.unit(unit) else {
                return;
            };
            if current.destroyed || current.position.prone {
                return;
            }
            let Some(&reason) = current.pending_psrs.first() else {
                return;
            };
            self.roll_psr(unit, reason);
        }
    }

    /// Roll one owed piloting roll; a failure knocks the unit down.
    fn roll_psr(&mut self, unit: UnitId, reason: PsrReason) -> bool {
        let Some(current) = self.state.unit(unit) else {
            return false;
        };
        let target = psr_target(current, reason);
        let roll = target.map(|_| self.dice.roll_2d6());
        let success = matches!((roll, target), (Some(roll), Some(target)) if roll.succeeds(target));
        tracing::debug!(unit, ?reason, ?target, success, "piloting roll");
        self.emit(GameEventPayload::PilotingSkillRollMade {
            unit,
            reason,
            roll,
            target,
            success,
        });
        if !success {
            self.fall(unit, 0);
        }
        success
    }

    fn finish_turn(&mut self) {
        let player = self.state.has_surviving_units(Side::Player);
        let opponent = self.state.has_surviving_units(Side::Opponent);
        if !player || !opponent {
            let winner = match (player, opponent) {
                (true, false) => Some(Side::Player),
                (false, true) => Some(Side::Opponent),
                _ => None,
            };
            self.end_game(GameEndReason::Destruction, winner);
            return;
        }
        if let Some(limit) = self.state.turn_limit {
            if self.state.turn >= limit {
                let survivors = |side| self.state.units_of(side).filter(|u| !u.destroyed).count();
                let winner = match survivors(Side::Player).cmp(&survivors(Side::Opponent)) {
                    Ordering::Greater => Some(Side::Player),
                    Ordering::Less => Some(Side::Opponent),
                    Ordering::Equal => None,
                };
                self.end_game(GameEndReason::TurnLimit, winner);
                return;
            }
        }
        self.change_phase(GamePhase::Initiative);
    }
}

fn has_leg_or_gyro_damage(unit: &UnitCombatState) -> bool {
    unit.destroyed_legs() > 0
        || unit.count_damaged(|slot| {
            slot.is_leg_actuator() || matches!(slot, SlotContent::Hip | SlotContent::Gyro)
        }) > 0
}

/// Bin that would do the most damage if it went up; the lowest index wins
/// ties.
#[must_use]
pub fn most_dangerous_bin(unit: &UnitCombatState) -> Option<usize> {
    unit.definition
        .ammo
        .iter()
        .enumerate()
        .map(|(index, bin)| (index, unit.ammo.get(index).copied().unwrap_or(0) * bin.damage_per_shot))
        .filter(|&(_, damage)| damage > 0)
        .max_by_key(|&(index, damage)| (damage, Reverse(index)))
        .map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::standard_template;
    use crate::dice::ScriptedDiceRoller;
    use crate::events::{DestructionCause, GameEventType};
    use crate::hex::{HexDirection, MapConfig};
    use crate::map::BattleMap;
    use crate::reducer::derive_state;
    use crate::state::{GameStatus, UnitPosition, UnitSetup};
    use crate::unit::PilotDefinition;

    fn setup(turn_limit: Option<u32>) -> GameSetup {
        let hunchback = standard_template("HBK-4G")
            .and_then(|t| t.build().ok())
            .expect("hunchback builds");
        let unit = |id, side, q, r, facing| UnitSetup {
            id,
            side,
            definition: hunchback.clone(),
            pilot: PilotDefinition::default(),
            position: UnitPosition::new(HexCoordinate::new(q, r), facing),
        };
        GameSetup {
            game_id: "resolver".to_string(),
            map: BattleMap::open(MapConfig::new(12, 12)),
            units: vec![
                unit(1, Side::Player, 4, 5, HexDirection::North),
                unit(2, Side::Opponent, 4, 2, HexDirection::South),
            ],
            rules: crate::config::RulesConfig::default(),
            turn_limit,
        }
    }

    fn game(turn_limit: Option<u32>) -> GameState {
        let mut dice = ScriptedDiceRoller::new(vec![1]);
        let mut resolver = Resolver::new(&GameState::default(), 0, 0, &mut dice);
        resolver.create_game(setup(turn_limit));
        let (state, events) = resolver.finish();
        assert_eq!(derive_state(&events), state);
        state
    }

    fn types(events: &[GameEvent]) -> Vec<GameEventType> {
        events.iter().map(GameEvent::event_type).collect()
    }

    #[test]
    fn test_initiative_ties_are_rerolled() {
        let state = game(None);
        let mut dice = ScriptedDiceRoller::new(vec![3, 3, 3, 3, 5, 5, 2, 2]);
        let mut resolver = Resolver::new(&state, 1, 0, &mut dice);
        assert_eq!(resolver.roll_initiative(), Side::Player);
        let (state, events) = resolver.finish();
        match &events[0].payload {
            GameEventPayload::InitiativeRolled { rolls, winner } => {
                assert_eq!(rolls.len(), 2);
                assert_eq!(*winner, Side::Player);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(state.phase, GamePhase::Movement);
        // The loser moves first
        assert_eq!(state.active_side(), Some(Side::Opponent));
    }

    fn run_hot(faces: Vec<u8>) -> (GameState, Vec<GameEvent>) {
        let mut state = game(None);
        state.phase = GamePhase::Movement;
        state.units.get_mut(&1).expect("unit").heat = 16;
        let plan = MovementPlan {
            destination: HexCoordinate::new(4, 4),
            facing: HexDirection::North,
            mp_spent: 1,
            hexes_moved: 1,
        };
        let mut dice = ScriptedDiceRoller::new(faces);
        let mut resolver = Resolver::new(&state, 1, 0, &mut dice);
        resolver.move_unit(1, MovementType::Run, vec![HexCoordinate::new(4, 4)], &plan);
        resolver.finish()
    }

    #[test]
    fn test_running_hot_rolls_as_the_move_ends() {
        let (state, events) = run_hot(vec![6]);
        assert_eq!(
            types(&events),
            vec![
                GameEventType::UnitMoved,
                GameEventType::PilotingSkillRollRequired,
                GameEventType::PilotingSkillRollMade,
            ]
        );
        let mover = state.unit(1).expect("unit");
        assert!(mover.pending_psrs.is_empty());
        assert!(!mover.position.prone);
        assert_eq!(mover.activity.heat_generated, 2);
    }

    #[test]
    fn test_running_hot_failure_falls_during_movement() {
        let (state, events) = run_hot(vec![1]);
        assert_eq!(
            types(&events)[..4],
            [
                GameEventType::UnitMoved,
                GameEventType::PilotingSkillRollRequired,
                GameEventType::PilotingSkillRollMade,
                GameEventType::UnitFell,
            ]
        );
        let mover = state.unit(1).expect("unit");
        assert!(mover.position.prone);
        assert!(mover.pending_psrs.is_empty());
    }

    #[test]
    fn test_head_kill_voids_later_attacks() {
        let mut state = game(None);
        state.phase = GamePhase::WeaponAttack;
        let declarations = BTreeMap::from([(
            Side::Player,
            vec![
                AttackDeclaration {
                    attacker: 1,
                    weapon: 0,
                    target: 2,
                    indirect: false,
                    spotter: None,
                },
                AttackDeclaration {
                    attacker: 1,
                    weapon: 1,
                    target: 2,
                    indirect: false,
                    spotter: None,
                },
            ],
        )]);
        // AC/20 hits on 12, location 12 is the head
        let mut dice = ScriptedDiceRoller::new(vec![6, 6, 6, 6]);
        let mut resolver = Resolver::new(&state, 1, 0, &mut dice);
        resolver.resolve_weapon_attacks(&declarations);
        let (state, events) = resolver.finish();

        let destroyed = events.iter().find_map(|e| match &e.payload {
            GameEventPayload::UnitDestroyed { unit, cause, by } => Some((*unit, *cause, *by)),
            _ => None,
        });
        assert_eq!(destroyed, Some((2, DestructionCause::HeadDestroyed, Some(1))));
        assert!(types(&events).contains(&GameEventType::AttackVoided));
        // AC/20 (7) and the voided medium laser (3)
        assert_eq!(state.unit(1).expect("attacker").activity.heat_generated, 10);
        assert_eq!(state.unit(1).expect("attacker").ammo[0], 4);
        assert_eq!(state.phase, GamePhase::Heat);
    }

    #[test]
    fn test_overheated_unit_shuts_down_and_falls() {
        let mut state = game(None);
        state.phase = GamePhase::Heat;
        state.units.get_mut(&1).expect("unit").heat = 45;
        // Fall d6, fall hit location, consciousness roll
        let mut dice = ScriptedDiceRoller::new(vec![1, 3, 4, 2, 2]);
        let mut resolver = Resolver::new(&state, 1, 0, &mut dice);
        resolver.resolve_heat_phase();
        let (state, events) = resolver.finish();

        let kinds = types(&events);
        let position = |kind| kinds.iter().position(|k| *k == kind).expect("event present");
        assert!(position(GameEventType::UnitShutdown) < position(GameEventType::UnitFell));
        assert!(position(GameEventType::UnitFell) < position(GameEventType::AmmoExploded));
        assert!(position(GameEventType::AmmoExploded) < position(GameEventType::UnitDestroyed));

        let unit = state.unit(1).expect("unit");
        assert!(unit.destroyed);
        assert!(unit.position.prone);
        assert!(unit.shutdown);
        assert_eq!(state.phase, GamePhase::End);
        assert!(!state.unit(2).expect("other").shutdown);
    }

    #[test]
    fn test_shutdown_unit_restarts_when_cool() {
        let mut state = game(None);
        state.phase = GamePhase::Heat;
        let unit = state.units.get_mut(&1).expect("unit");
        unit.shutdown = true;
        unit.heat = 20;
        let mut dice = ScriptedDiceRoller::new(vec![1]);
        let mut resolver = Resolver::new(&state, 1, 0, &mut dice);
        resolver.resolve_heat_phase();
        let (state, events) = resolver.finish();
        assert!(events.iter().any(|e| matches!(
            e.payload,
            GameEventPayload::UnitStartedUp { unit: 1, roll: None, .. }
        )));
        assert!(!state.unit(1).expect("unit").shutdown);
        assert_eq!(state.unit(1).expect("unit").heat, 7);
    }

    #[test]
    fn test_failed_psr_knocks_unit_down() {
        let mut state = game(None);
        state.phase = GamePhase::End;
        state
            .units
            .get_mut(&1)
            .expect("unit")
            .pending_psrs
            .push(PsrReason::HeavyDamage);
        // PSR 2, fall to the front, center torso, consciousness 4
        let mut dice = ScriptedDiceRoller::new(vec![1, 1, 1, 3, 4, 2, 2]);
        let mut resolver = Resolver::new(&state, 1, 0, &mut dice);
        resolver.resolve_end_phase();
        let (state, _) = resolver.finish();

        let unit = state.unit(1).expect("unit");
        assert!(unit.position.prone);
        assert_eq!(unit.position.facing, HexDirection::North);
        assert_eq!(unit.pilot.wounds, 1);
        assert!(unit.pilot.conscious);
        assert_eq!(unit.location(Location::CenterTorso).armor, 21);
        assert_eq!(state.phase, GamePhase::Initiative);
        assert_eq!(state.turn, 2);
        assert!(unit.pending_psrs.is_empty());
    }

    #[test]
    fn test_last_side_standing_wins() {
        let mut state = game(None);
        state.phase = GamePhase::End;
        state.units.get_mut(&2).expect("unit").destroyed = true;
        let mut dice = ScriptedDiceRoller::new(vec![1]);
        let mut resolver = Resolver::new(&state, 1, 0, &mut dice);
        resolver.resolve_end_phase();
        let (state, _) = resolver.finish();
        assert_eq!(
            state.status,
            GameStatus::Ended {
                reason: GameEndReason::Destruction,
                winner: Some(Side::Player),
            }
        );
    }

    #[test]
    fn test_turn_limit_ends_in_draw() {
        let mut state = game(Some(1));
        state.phase = GamePhase::End;
        let mut dice = ScriptedDiceRoller::new(vec![1]);
        let mut resolver = Resolver::new(&state, 1, 0, &mut dice);
        resolver.resolve_end_phase();
        let (state, _) = resolver.finish();
        assert_eq!(
            state.status,
            GameStatus::Ended {
                reason: GameEndReason::TurnLimit,
                winner: None,
            }
        );
    }

    #[test]
    fn test_most_dangerous_bin_prefers_lowest_index_on_ties() {
        let state = game(None);
        let unit = state.unit(1).expect("unit");
        assert_eq!(most_dangerous_bin(unit), Some(0));
        let mut drained = unit.clone();
        drained.ammo[0] = 1;
        assert_eq!(most_dangerous_bin(&drained), Some(1));
        drained.ammo = vec![0, 0];
        assert_eq!(most_dangerous_bin(&drained), None);
    }
}
