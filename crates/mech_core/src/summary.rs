//! Post-battle summary folded from the event log.
//!
//! Campaign bookkeeping (salvage, awards, repair bills) reads this instead
//! of poking at game state. Everything here is derivable from events alone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::events::{DestructionCause, GameEndReason, GameEvent, GameEventPayload};
use crate::state::{Side, UnitId};

/// Per-unit tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSummary {
    /// Owning side.
    pub side: Side,
    /// Chassis name.
    pub name: String,
    /// Pilot name.
    pub pilot: String,
    /// Attacks resolved.
    pub shots: u32,
    /// Attacks that hit.
    pub hits: u32,
    /// Armor and structure removed from enemies and friends.
    pub damage_dealt: u32,
    /// Armor and structure lost from every source.
    pub damage_received: u32,
    /// Units this one destroyed.
    pub kills: Vec<UnitId>,
    /// How the unit was lost, if it was.
    pub destroyed: Option<DestructionCause>,
    /// Pilot wounds at the end.
    pub pilot_wounds: u8,
    /// Falls taken.
    pub falls: u32,
    /// Ammo explosions suffered.
    pub ammo_explosions: u32,
}

/// Outcome of one game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleSummary {
    /// Game identifier.
    pub game_id: String,
    /// Last turn reached.
    pub turns: u32,
    /// Why the game ended, if it has.
    pub end_reason: Option<GameEndReason>,
    /// Winner, `None` for a draw or an unfinished game.
    pub winner: Option<Side>,
    /// Per-unit tallies by id.
    pub units: BTreeMap<UnitId, UnitSummary>,
}

impl BattleSummary {
    /// Fold a summary out of `events`.
    #[must_use]
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a GameEvent>) -> Self {
        let mut summary = Self::default();
        for event in events {
            summary.turns = summary.turns.max(event.turn);
            summary.record(&event.payload);
        }
        summary
    }

    /// Apply `update` to a unit named in the setup; unknown ids are ignored.
    fn with_unit(&mut self, id: UnitId, update: impl FnOnce(&mut UnitSummary)) {
        if let Some(unit) = self.units.get_mut(&id) {
            update(unit);
        }
    }

    fn record(&mut self, payload: &GameEventPayload) {
        match payload {
            GameEventPayload::GameCreated { setup } => {
                self.game_id = setup.game_id.clone();
                self.units = setup
                    .units
                    .iter()
                    .map(|entry| {
                        let summary = UnitSummary {
                            side: entry.side,
                            name: entry.definition.name.clone(),
                            pilot: entry.pilot.name.clone(),
                            shots: 0,
                            hits: 0,
                            damage_dealt: 0,
                            damage_received: 0,
                            kills: Vec::new(),
                            destroyed: None,
                            pilot_wounds: entry.pilot.wounds,
                            falls: 0,
                            ammo_explosions: 0,
                        };
                        (entry.id, summary)
                    })
                    .collect();
            }
            GameEventPayload::AttackResolved {
                declaration, hit, groups, ..
            } => {
                let damage: u32 = groups.iter().map(|group| group.total_damage()).sum();
                self.with_unit(declaration.attacker, |attacker| {
                    attacker.shots += 1;
                    attacker.hits += u32::from(*hit);
                    attacker.damage_dealt += damage;
                });
                self.with_unit(declaration.target, |target| target.damage_received += damage);
            }
            GameEventPayload::UnitFell { unit, groups, .. } => {
                let damage: u32 = groups.iter().map(|group| group.total_damage()).sum();
                self.with_unit(*unit, |summary| {
                    summary.falls += 1;
                    summary.damage_received += damage;
                });
            }
            GameEventPayload::AmmoExploded { unit, records, .. } => {
                let damage: u32 = records
                    .iter()
                    .map(|record| record.armor_damage + record.structure_damage)
                    .sum();
                self.with_unit(*unit, |summary| {
                    summary.ammo_explosions += 1;
                    summary.damage_received += damage;
                });
            }
            GameEventPayload::PilotHit { unit, total, .. } => {
                self.with_unit(*unit, |summary| summary.pilot_wounds = *total);
            }
            GameEventPayload::UnitDestroyed { unit, cause, by } => {
                self.with_unit(*unit, |summary| summary.destroyed = Some(*cause));
                if let Some(killer) = by {
                    self.with_unit(*killer, |summary| summary.kills.push(*unit));
                }
            }
            GameEventPayload::GameEnded { reason, winner } => {
                self.end_reason = Some(*reason);
                self.winner = *winner;
            }
            _ => {}
        }
    }

    /// Units lost by `side`.
    #[must_use]
    pub fn losses(&self, side: Side) -> Vec<UnitId> {
        self.units
            .iter()
            .filter(|(_, unit)| unit.side == side && unit.destroyed.is_some())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Damage dealt by every unit of `side`.
    #[must_use]
    pub fn damage_dealt_by(&self, side: Side) -> u32 {
        self.units
            .values()
            .filter(|unit| unit.side == side)
            .map(|unit| unit.damage_dealt)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::damage::DamageRecord;
    use crate::data::standard_template;
    use crate::dice::DiceRoll;
    use crate::events::{AmmoExplosionCause, DamageGroup, GamePhase, PilotDamageSource};
    use crate::hex::{HexCoordinate, HexDirection, MapConfig};
    use crate::hit_location::{HitLocation, HitTable};
    use crate::map::BattleMap;
    use crate::piloting::FallDirection;
    use crate::state::{GameSetup, UnitPosition, UnitSetup};
    use crate::unit::{Location, PilotDefinition};

    fn event(id: u64, turn: u32, payload: GameEventPayload) -> GameEvent {
        GameEvent {
            id,
            game_id: "summary".to_string(),
            turn,
            phase: GamePhase::WeaponAttack,
            timestamp: 0,
            payload,
        }
    }

    fn record(location: Location, armor: u32, structure: u32) -> DamageRecord {
        DamageRecord {
            location,
            rear: false,
            armor_damage: armor,
            structure_damage: structure,
            armor_after: 0,
            structure_after: 0,
            destroyed: false,
        }
    }

    fn created() -> GameEvent {
        let raven = standard_template("RVN-3L")
            .and_then(|t| t.build().ok())
            .expect("raven builds");
        let unit = |id, side, r| UnitSetup {
            id,
            side,
            definition: raven.clone(),
            pilot: PilotDefinition::default(),
            position: UnitPosition::new(HexCoordinate::new(2, r), HexDirection::North),
        };
        event(
            0,
            1,
            GameEventPayload::GameCreated {
                setup: GameSetup {
                    game_id: "summary".to_string(),
                    map: BattleMap::open(MapConfig::new(6, 6)),
                    units: vec![unit(1, Side::Player, 4), unit(2, Side::Opponent, 1)],
                    rules: crate::config::RulesConfig::default(),
                    turn_limit: None,
                },
            },
        )
    }

    #[test]
    fn test_empty_log_is_blank() {
        let summary = BattleSummary::from_events(&Vec::<GameEvent>::new());
        assert_eq!(summary, BattleSummary::default());
    }

    #[test]
    fn test_setup_seeds_every_unit() {
        let summary = BattleSummary::from_events(&[created()]);
        assert_eq!(summary.game_id, "summary");
        assert_eq!(summary.units.len(), 2);
        assert_eq!(summary.units[&1].side, Side::Player);
        assert_eq!(summary.units[&2].pilot, "MechWarrior");
        assert_eq!(summary.winner, None);
    }

    #[test]
    fn test_explosion_kill_and_ending() {
        let events = vec![
            created(),
            event(
                1,
                2,
                GameEventPayload::AmmoExploded {
                    unit: 2,
                    bin: 0,
                    cause: AmmoExplosionCause::Heat,
                    damage: 30,
                    records: vec![record(Location::RightTorso, 0, 12), record(Location::CenterTorso, 10, 8)],
                },
            ),
            event(
                2,
                2,
                GameEventPayload::PilotHit {
                    unit: 2,
                    source: PilotDamageSource::AmmoExplosion,
                    wounds: 2,
                    total: 3,
                },
            ),
            event(
                3,
                3,
                GameEventPayload::UnitDestroyed {
                    unit: 2,
                    cause: DestructionCause::CenterTorsoDestroyed,
                    by: Some(1),
                },
            ),
            event(
                4,
                3,
                GameEventPayload::GameEnded {
                    reason: GameEndReason::Destruction,
                    winner: Some(Side::Player),
                },
            ),
        ];
        let summary = BattleSummary::from_events(&events);
        let victim = &summary.units[&2];
        assert_eq!(victim.damage_received, 30);
        assert_eq!(victim.ammo_explosions, 1);
        assert_eq!(victim.pilot_wounds, 3);
        assert_eq!(victim.destroyed, Some(DestructionCause::CenterTorsoDestroyed));
        assert_eq!(summary.units[&1].kills, vec![2]);
        assert_eq!(summary.turns, 3);
        assert_eq!(summary.end_reason, Some(GameEndReason::Destruction));
        assert_eq!(summary.winner, Some(Side::Player));
        assert_eq!(summary.losses(Side::Opponent), vec![2]);
    }

    #[test]
    fn test_fall_damage_counts_as_received() {
        let events = vec![
            created(),
            event(
                1,
                1,
                GameEventPayload::UnitFell {
                    unit: 1,
                    direction_roll: 1,
                    direction: FallDirection::Front,
                    facing: HexDirection::North,
                    height: 0,
                    damage: 5,
                    groups: vec![DamageGroup {
                        roll: DiceRoll::new(3, 4),
                        table: HitTable::Front,
                        hit: HitLocation {
                            location: Location::LeftLeg,
                            rear: false,
                            through_armor_critical: false,
                        },
                        damage: 5,
                        records: vec![record(Location::LeftLeg, 5, 0)],
                    }],
                },
            ),
        ];
        let summary = BattleSummary::from_events(&events);
        assert_eq!(summary.units[&1].falls, 1);
        assert_eq!(summary.units[&1].damage_received, 5);
        assert_eq!(summary.damage_dealt_by(Side::Opponent), 0);
        assert!(summary.losses(Side::Player).is_empty());
    }
}
