//! Authoritative game session.
//!
//! A [`GameSession`] owns the event log, the derived state and the only dice
//! roller for a game. Actions are validated against the current state first;
//! a rejected action returns an [`ActionError`] and leaves the log and the
//! roller untouched. Accepted actions are resolved into events, and phases
//! that need no input (an empty movement round, sides with nothing to shoot
//! at, Heat and End) are run straight through.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::dice::{DiceRoller, SeededDiceRoller};
use crate::error::{ActionError, Result};
use crate::event_log::EventLog;
use crate::events::{AttackDeclaration, GameEndReason, GameEvent, GameEventPayload, GamePhase};
use crate::legality::{
    can_attack, legal_attacks, validate_attack_set, validate_movement, validate_phase, validate_stand,
    validate_unit_can_move,
};
use crate::movement::{MovementDeclaration, MovementPlan};
use crate::resolver::Resolver;
use crate::state::{GameSetup, GameState, Side, UnitId};

/// Source of event timestamps.
///
/// Timestamps are informational only; nothing in the rules reads them.
pub trait Clock {
    /// Milliseconds since the Unix epoch (or any fixed origin).
    fn now_millis(&mut self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&mut self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64)
    }
}

/// Clock that advances by a fixed step on every read.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualClock {
    now: u64,
    step: u64,
}

impl ManualClock {
    /// Start at `start`, advancing `step` per read.
    #[must_use]
    pub const fn new(start: u64, step: u64) -> Self {
        Self { now: start, step }
    }
}

impl Clock for ManualClock {
    fn now_millis(&mut self) -> u64 {
        let now = self.now;
        self.now += self.step;
        now
    }
}

/// Something a side (or the host) asks the game to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Roll initiative for the turn.
    RollInitiative,
    /// Move a unit.
    Move {
        /// Submitting side.
        side: Side,
        /// Requested move.
        declaration: MovementDeclaration,
    },
    /// Spend a unit's movement standing still.
    HoldPosition {
        /// Submitting side.
        side: Side,
        /// Unit.
        unit: UnitId,
    },
    /// Try to stand a prone unit up.
    StandUp {
        /// Submitting side.
        side: Side,
        /// Unit.
        unit: UnitId,
    },
    /// Lock a side's weapon attacks for the turn.
    LockAttacks {
        /// Submitting side.
        side: Side,
        /// Every attack the side makes this turn; may be empty.
        declarations: Vec<AttackDeclaration>,
    },
    /// Give up.
    Concede {
        /// Conceding side.
        side: Side,
    },
    /// End the game from outside the rules (objective met, timeout).
    EndGame {
        /// Objective, forfeit or abandoned.
        reason: GameEndReason,
        /// Winner, if any.
        winner: Option<Side>,
    },
}

/// An action that passed validation, carrying what resolution needs.
enum Prepared {
    Initiative,
    Move(MovementDeclaration, MovementPlan),
    Hold(UnitId),
    Stand(UnitId),
    Lock(Side, Vec<AttackDeclaration>),
    End(GameEndReason, Option<Side>),
}

/// SHA-256 over the canonical JSON of a declaration list, hex encoded.
#[must_use]
pub fn attack_commitment(declarations: &[AttackDeclaration]) -> String {
    let canonical = serde_json::to_vec(declarations).unwrap_or_default();
    ::hex::encode(Sha256::digest(&canonical))
}

/// Whether `declarations` are the ones behind `commitment`.
#[must_use]
pub fn verify_commitment(commitment: &str, declarations: &[AttackDeclaration]) -> bool {
    attack_commitment(declarations) == commitment
}

/// A running game.
#[derive(Debug)]
pub struct GameSession<R: DiceRoller = SeededDiceRoller, C: Clock = SystemClock> {
    log: EventLog,
    state: GameState,
    dice: R,
    clock: C,
    /// Locked declarations not yet revealed.
    sealed: BTreeMap<Side, Vec<AttackDeclaration>>,
}

impl<R: DiceRoller, C: Clock> GameSession<R, C> {
    /// Create a game from a setup.
    ///
    /// # Errors
    /// Returns [`crate::error::GameError::InvalidSetup`] or a definition error if the
    /// setup is unusable.
    pub fn new(setup: GameSetup, mut dice: R, mut clock: C) -> Result<Self> {
        setup.validate()?;
        let timestamp = clock.now_millis();
        let mut resolver = Resolver::new(&GameState::default(), 0, timestamp, &mut dice);
        resolver.create_game(setup);
        let (state, events) = resolver.finish();
        let mut log = EventLog::new();
        log.extend_trusted(events);
        Ok(Self {
            log,
            state,
            dice,
            clock,
            sealed: BTreeMap::new(),
        })
    }

    /// Pick a game back up from its log.
    ///
    /// The roller must already be positioned where the original session's
    /// roller stopped. Declarations locked but not yet revealed are not in
    /// the log; hand them back with [`GameSession::restore_sealed_attacks`].
    ///
    /// # Errors
    /// Returns an error if the log is malformed.
    pub fn resume(events: Vec<GameEvent>, dice: R, clock: C) -> Result<Self> {
        let log = EventLog::from_events(events)?;
        let state = log.derive_state();
        tracing::info!(
            game = %state.game_id,
            events = log.len(),
            turn = state.turn,
            phase = ?state.phase,
            "session resumed"
        );
        Ok(Self {
            log,
            state,
            dice,
            clock,
            sealed: BTreeMap::new(),
        })
    }

    /// Return a side's locked declarations after a resume.
    ///
    /// # Errors
    /// [`ActionError::CommitmentMismatch`] if they do not match the lock.
    pub fn restore_sealed_attacks(
        &mut self,
        side: Side,
        declarations: Vec<AttackDeclaration>,
    ) -> std::result::Result<(), ActionError> {
        match self.state.locked_attacks.get(&side) {
            Some(commitment) if verify_commitment(commitment, &declarations) => {
                self.sealed.insert(side, declarations);
                Ok(())
            }
            _ => Err(ActionError::CommitmentMismatch(side)),
        }
    }

    /// Current derived state.
    #[must_use]
    pub const fn state(&self) -> &GameState {
        &self.state
    }

    /// The event log.
    #[must_use]
    pub const fn log(&self) -> &EventLog {
        &self.log
    }

    /// Every event so far.
    #[must_use]
    pub fn events(&self) -> &[GameEvent] {
        self.log.events()
    }

    /// The session's roller.
    #[must_use]
    pub const fn dice(&self) -> &R {
        &self.dice
    }

    /// Consume the session, keeping its log.
    #[must_use]
    pub fn into_log(self) -> EventLog {
        self.log
    }

    /// Whether the game has ended.
    #[must_use]
    pub const fn is_over(&self) -> bool {
        self.state.is_over()
    }

    /// Whether `side` has locked its attacks this phase.
    #[must_use]
    pub fn has_locked(&self, side: Side) -> bool {
        self.state.locked_attacks.contains_key(&side)
    }

    /// Every legal direct-fire declaration for `side` right now.
    #[must_use]
    pub fn legal_attacks(&self, side: Side) -> Vec<AttackDeclaration> {
        legal_attacks(&self.state, side)
    }

    /// Validate and resolve an action, returning the events it produced.
    ///
    /// # Errors
    /// The [`ActionError`] explaining why the action is illegal. Nothing is
    /// appended and no dice are rolled in that case.
    pub fn submit(&mut self, action: Action) -> std::result::Result<Vec<GameEvent>, ActionError> {
        let prepared = match self.prepare(action) {
            Ok(prepared) => prepared,
            Err(error) => {
                tracing::warn!(%error, phase = ?self.state.phase, "action rejected");
                return Err(error);
            }
        };

        let timestamp = self.clock.now_millis();
        let mut resolver = Resolver::new(&self.state, self.log.next_id(), timestamp, &mut self.dice);
        match prepared {
            Prepared::Initiative => {
                resolver.roll_initiative();
            }
            Prepared::Move(declaration, plan) => {
                resolver.move_unit(declaration.unit, declaration.movement, declaration.path, &plan);
            }
            Prepared::Hold(unit) => resolver.hold_position(unit),
            Prepared::Stand(unit) => {
                resolver.stand_up(unit);
            }
            Prepared::Lock(side, declarations) => lock(&mut resolver, &mut self.sealed, side, declarations),
            Prepared::End(reason, winner) => resolver.end_game(reason, winner),
        }
        advance(&mut resolver, &mut self.sealed);

        let (state, events) = resolver.finish();
        self.log.extend_trusted(events.iter().cloned());
        self.state = state;

        #[cfg(debug_assertions)]
        {
            let hash = self.state.state_hash();
            tracing::debug!(events = self.log.len(), state_hash = hash, "Session state hash");
        }

        Ok(events)
    }

    fn prepare(&self, action: Action) -> std::result::Result<Prepared, ActionError> {
        let state = &self.state;
        match action {
            Action::RollInitiative => {
                validate_phase(state, GamePhase::Initiative)?;
                if state.initiative_winner.is_some() {
                    return Err(ActionError::InitiativeAlreadyRolled { turn: state.turn });
                }
                Ok(Prepared::Initiative)
            }
            Action::Move { side, declaration } => {
                let plan = validate_movement(state, side, &declaration)?;
                Ok(Prepared::Move(declaration, plan))
            }
            Action::HoldPosition { side, unit } => {
                validate_unit_can_move(state, side, unit)?;
                Ok(Prepared::Hold(unit))
            }
            Action::StandUp { side, unit } => {
                validate_stand(state, side, unit)?;
                Ok(Prepared::Stand(unit))
            }
            Action::LockAttacks { side, declarations } => {
                validate_attack_set(state, side, &declarations)?;
                Ok(Prepared::Lock(side, declarations))
            }
            Action::Concede { side } => {
                if state.is_over() {
                    return Err(ActionError::GameOver);
                }
                Ok(Prepared::End(GameEndReason::Concede, Some(side.opposite())))
            }
            Action::EndGame { reason, winner } => {
                if state.is_over() {
                    return Err(ActionError::GameOver);
                }
                match reason {
                    GameEndReason::Objective | GameEndReason::Forfeit | GameEndReason::Abandoned => {
                        Ok(Prepared::End(reason, winner))
                    }
                    _ => Err(ActionError::EndReasonNotAllowed(reason)),
                }
            }
        }
    }
}

fn lock<R: DiceRoller + ?Sized>(
    resolver: &mut Resolver<'_, R>,
    sealed: &mut BTreeMap<Side, Vec<AttackDeclaration>>,
    side: Side,
    declarations: Vec<AttackDeclaration>,
) {
    resolver.emit(GameEventPayload::AttacksLocked {
        side,
        commitment: attack_commitment(&declarations),
        declaration_count: declarations.len() as u32,
    });
    sealed.insert(side, declarations);
}

/// Run every step that needs no further input.
fn advance<R: DiceRoller + ?Sized>(
    resolver: &mut Resolver<'_, R>,
    sealed: &mut BTreeMap<Side, Vec<AttackDeclaration>>,
) {
    loop {
        let state = resolver.state();
        if state.is_over() {
            sealed.clear();
            return;
        }
        match state.phase {
            GamePhase::Initiative => return,
            GamePhase::Movement => {
                if state.active_side().is_some() {
                    return;
                }
                resolver.change_phase(GamePhase::WeaponAttack);
            }
            GamePhase::WeaponAttack => {
                let idle: Vec<Side> = Side::ALL
                    .into_iter()
                    .filter(|side| !state.locked_attacks.contains_key(side) && !can_attack(state, *side))
                    .collect();
                for side in idle {
                    lock(resolver, sealed, side, Vec::new());
                }
                let all_locked = Side::ALL
                    .iter()
                    .all(|side| resolver.state().locked_attacks.contains_key(side));
                if !all_locked {
                    return;
                }
                let declarations = std::mem::take(sealed);
                resolver.resolve_weapon_attacks(&declarations);
            }
            GamePhase::Heat => resolver.resolve_heat_phase(),
            GamePhase::End => resolver.resolve_end_phase(),
        }
    }
}

/// Build a session from a setup with wall-clock timestamps and a seeded
/// roller.
///
/// # Errors
/// Any setup validation failure.
pub fn seeded_session(setup: GameSetup, seed: u64) -> Result<GameSession<SeededDiceRoller, SystemClock>> {
    GameSession::new(setup, SeededDiceRoller::new(seed), SystemClock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::standard_template;
    use crate::dice::ScriptedDiceRoller;
    use crate::events::GameEventType;
    use crate::hex::{HexCoordinate, HexDirection, MapConfig};
    use crate::map::{BattleMap, Terrain, TerrainFeature};
    use crate::movement::MovementType;
    use crate::state::{GameStatus, UnitPosition, UnitSetup};
    use crate::unit::PilotDefinition;

    fn setup(width: u32, player: (i32, i32), opponent: (i32, i32)) -> GameSetup {
        let hunchback = standard_template("HBK-4G")
            .and_then(|t| t.build().ok())
            .expect("hunchback builds");
        let unit = |id, side, (q, r), facing| UnitSetup {
            id,
            side,
            definition: hunchback.clone(),
            pilot: PilotDefinition::default(),
            position: UnitPosition::new(HexCoordinate::new(q, r), facing),
        };
        GameSetup {
            game_id: "session".to_string(),
            map: BattleMap::open(MapConfig::new(width, 12)),
            units: vec![
                unit(1, Side::Player, player, HexDirection::North),
                unit(2, Side::Opponent, opponent, HexDirection::South),
            ],
            rules: crate::config::RulesConfig::default(),
            turn_limit: None,
        }
    }

    fn session(setup: GameSetup, faces: Vec<u8>) -> GameSession<ScriptedDiceRoller, ManualClock> {
        GameSession::new(setup, ScriptedDiceRoller::new(faces), ManualClock::new(1_000, 10))
            .expect("valid setup")
    }

    #[test]
    fn test_new_session_starts_at_initiative() {
        let game = session(setup(12, (4, 8), (4, 2)), vec![1]);
        assert_eq!(game.events().len(), 1);
        assert_eq!(game.events()[0].event_type(), GameEventType::GameCreated);
        assert_eq!(game.events()[0].timestamp, 1_000);
        assert_eq!(game.state().phase, GamePhase::Initiative);
        assert_eq!(game.state().turn, 1);
    }

    #[test]
    fn test_rejected_action_changes_nothing() {
        let mut game = session(setup(12, (4, 8), (4, 2)), vec![6, 6, 1, 1]);
        let hash = game.state().state_hash();
        let error = game
            .submit(Action::HoldPosition {
                side: Side::Player,
                unit: 1,
            })
            .expect_err("movement before initiative");
        assert!(matches!(error, ActionError::WrongPhase { .. }));
        assert_eq!(game.events().len(), 1);
        assert_eq!(game.state().state_hash(), hash);
        assert_eq!(game.dice().consumed(), 0);
    }

    #[test]
    fn test_loser_moves_first_and_sides_alternate() {
        let mut game = session(setup(12, (4, 8), (4, 2)), vec![6, 6, 1, 1]);
        game.submit(Action::RollInitiative).expect("initiative");
        assert_eq!(game.state().initiative_winner, Some(Side::Player));

        let early = game.submit(Action::HoldPosition {
            side: Side::Player,
            unit: 1,
        });
        assert_eq!(early, Err(ActionError::NotYourTurn { side: Side::Player }));

        game.submit(Action::HoldPosition {
            side: Side::Opponent,
            unit: 2,
        })
        .expect("opponent holds");
        let moved = game
            .submit(Action::Move {
                side: Side::Player,
                declaration: MovementDeclaration {
                    unit: 1,
                    movement: MovementType::Walk,
                    path: vec![HexCoordinate::new(4, 7)],
                    facing: HexDirection::North,
                },
            })
            .expect("player walks");
        assert_eq!(moved[0].event_type(), GameEventType::UnitMoved);
        assert_eq!(game.state().phase, GamePhase::WeaponAttack);
    }

    #[test]
    fn test_out_of_range_turn_runs_to_next_initiative() {
        let mut game = session(setup(30, (1, 5), (25, -8)), vec![6, 6, 1, 1]);
        game.submit(Action::RollInitiative).expect("initiative");
        game.submit(Action::HoldPosition {
            side: Side::Opponent,
            unit: 2,
        })
        .expect("opponent holds");
        let events = game
            .submit(Action::HoldPosition {
                side: Side::Player,
                unit: 1,
            })
            .expect("player holds");

        let locks = events
            .iter()
            .filter(|e| {
                matches!(
                    e.payload,
                    GameEventPayload::AttacksLocked {
                        declaration_count: 0,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(locks, 2);
        assert_eq!(game.state().phase, GamePhase::Initiative);
        assert_eq!(game.state().turn, 2);
        assert_eq!(game.log().derive_state(), *game.state());
    }

    #[test]
    fn test_lock_waits_for_the_other_side() {
        let mut game = session(setup(12, (4, 8), (4, 2)), vec![6, 6, 1, 1]);
        game.submit(Action::RollInitiative).expect("initiative");
        for (side, unit) in [(Side::Opponent, 2), (Side::Player, 1)] {
            game.submit(Action::HoldPosition { side, unit }).expect("hold");
        }
        assert_eq!(game.state().phase, GamePhase::WeaponAttack);

        let declarations = vec![AttackDeclaration {
            attacker: 1,
            weapon: 1,
            target: 2,
            indirect: false,
            spotter: None,
        }];
        let events = game
            .submit(Action::LockAttacks {
                side: Side::Player,
                declarations: declarations.clone(),
            })
            .expect("lock");
        assert_eq!(events.len(), 1);
        match &events[0].payload {
            GameEventPayload::AttacksLocked { commitment, .. } => {
                assert!(verify_commitment(commitment, &declarations));
                assert!(!verify_commitment(commitment, &[]));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(game.has_locked(Side::Player));
        assert_eq!(
            game.submit(Action::LockAttacks {
                side: Side::Player,
                declarations: Vec::new(),
            }),
            Err(ActionError::AlreadyLocked(Side::Player))
        );
    }

    #[test]
    fn test_side_with_only_indirect_fire_is_not_locked_early() {
        let build = |model: &str| {
            standard_template(model)
                .and_then(|t| t.build().ok())
                .expect("template builds")
        };
        let unit = |id, side, model: &str, r| UnitSetup {
            id,
            side,
            definition: build(model),
            pilot: PilotDefinition::default(),
            position: UnitPosition::new(HexCoordinate::new(0, r), HexDirection::North),
        };
        let woods = [9, 10].map(|r| TerrainFeature {
            hex: HexCoordinate::new(0, r),
            terrain: Terrain::HeavyWoods,
            elevation: 0,
        });
        let setup = GameSetup {
            game_id: "indirect".to_string(),
            map: BattleMap::with_features(MapConfig::new(16, 16), woods),
            units: vec![
                unit(1, Side::Player, "CPLT-C1", 14),
                unit(2, Side::Player, "LCT-1V", 4),
                unit(3, Side::Opponent, "HBK-4G", 6),
            ],
            rules: crate::config::RulesConfig::default(),
            turn_limit: None,
        };
        let mut game = session(setup, vec![6, 6, 1, 1]);
        game.submit(Action::RollInitiative).expect("initiative");
        for (side, unit) in [(Side::Opponent, 3), (Side::Player, 1), (Side::Player, 2)] {
            game.submit(Action::HoldPosition { side, unit }).expect("hold");
        }
        assert_eq!(game.state().phase, GamePhase::WeaponAttack);
        assert!(!game.has_locked(Side::Player));

        let declarations = vec![AttackDeclaration {
            attacker: 1,
            weapon: 0,
            target: 3,
            indirect: true,
            spotter: Some(2),
        }];
        assert!(game.legal_attacks(Side::Player).contains(&declarations[0]));
        let events = game
            .submit(Action::LockAttacks {
                side: Side::Player,
                declarations,
            })
            .expect("indirect lock accepted");
        assert!(matches!(
            events[0].payload,
            GameEventPayload::AttacksLocked {
                side: Side::Player,
                declaration_count: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_concede_ends_game() {
        let mut game = session(setup(12, (4, 8), (4, 2)), vec![1]);
        game.submit(Action::Concede { side: Side::Opponent })
            .expect("concede");
        assert_eq!(
            game.state().status,
            GameStatus::Ended {
                reason: GameEndReason::Concede,
                winner: Some(Side::Player),
            }
        );
        assert_eq!(
            game.submit(Action::RollInitiative),
            Err(ActionError::GameOver)
        );
    }

    #[test]
    fn test_rules_endings_cannot_be_forced() {
        let mut game = session(setup(12, (4, 8), (4, 2)), vec![1]);
        assert_eq!(
            game.submit(Action::EndGame {
                reason: GameEndReason::Destruction,
                winner: None,
            }),
            Err(ActionError::EndReasonNotAllowed(GameEndReason::Destruction))
        );
        game.submit(Action::EndGame {
            reason: GameEndReason::Abandoned,
            winner: None,
        })
        .expect("abandon");
        assert!(game.is_over());
    }

    #[test]
    fn test_resume_matches_original() {
        let mut game = session(setup(12, (4, 8), (4, 2)), vec![6, 6, 1, 1]);
        game.submit(Action::RollInitiative).expect("initiative");
        let events = game.events().to_vec();
        let resumed = GameSession::resume(events, ScriptedDiceRoller::new(vec![1]), ManualClock::default())
            .expect("resume");
        assert_eq!(resumed.state(), game.state());
    }

    #[test]
    fn test_action_json_shape() {
        let action = Action::HoldPosition {
            side: Side::Player,
            unit: 3,
        };
        let json = serde_json::to_string(&action).expect("serialize");
        assert!(json.contains("\"action\":\"hold_position\""));
        let back: Action = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, action);
    }
}
