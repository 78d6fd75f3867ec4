//! Illegal actions are rejected with a reason and leave no trace.

use mech_core::error::ActionError;
use mech_core::events::{AttackDeclaration, GameEndReason};
use mech_core::hex::{HexCoordinate, HexDirection};
use mech_core::movement::{MovementDeclaration, MovementType};
use mech_core::session::Action;
use mech_core::state::Side;
use mech_test_utils::fixtures::{duel_setup, scripted_session, ScriptedSession};

/// Duel with initiative rolled: the player wins, so the opponent moves first.
fn after_initiative() -> ScriptedSession {
    let mut session = scripted_session(duel_setup(), vec![6, 6, 1, 1]);
    session.submit(Action::RollInitiative).expect("initiative");
    session
}

fn assert_untouched(session: &ScriptedSession, events: usize, hash: u64, rolls: usize) {
    assert_eq!(session.events().len(), events);
    assert_eq!(session.state().state_hash(), hash);
    assert_eq!(session.dice().consumed(), rolls);
}

#[test]
fn move_beyond_walking_mp_is_rejected() {
    let mut session = after_initiative();
    let events = session.events().len();
    let hash = session.state().state_hash();
    let rolls = session.dice().consumed();

    let path: Vec<HexCoordinate> = (5..=9).map(|r| HexCoordinate::new(7, r)).collect();
    let error = session
        .submit(Action::Move {
            side: Side::Opponent,
            declaration: MovementDeclaration {
                unit: 2,
                movement: MovementType::Walk,
                path,
                facing: HexDirection::South,
            },
        })
        .expect_err("five hexes on four MP");

    assert_eq!(
        error,
        ActionError::InsufficientMovementPoints {
            required: 5,
            available: 4
        }
    );
    assert_eq!(error.reason(), "movement requires 5 MP but only 4 available");
    assert_untouched(&session, events, hash, rolls);
}

#[test]
fn out_of_turn_and_out_of_phase_actions_are_rejected() {
    let mut session = after_initiative();
    let events = session.events().len();
    let hash = session.state().state_hash();
    let rolls = session.dice().consumed();

    assert_eq!(
        session.submit(Action::HoldPosition {
            side: Side::Player,
            unit: 1
        }),
        Err(ActionError::NotYourTurn { side: Side::Player })
    );
    assert!(matches!(
        session.submit(Action::LockAttacks {
            side: Side::Player,
            declarations: vec![AttackDeclaration {
                attacker: 1,
                weapon: 0,
                target: 2,
                indirect: false,
                spotter: None,
            }],
        }),
        Err(ActionError::WrongPhase { .. })
    ));
    assert_eq!(
        session.submit(Action::StandUp {
            side: Side::Opponent,
            unit: 2
        }),
        Err(ActionError::UnitNotProne(2))
    );
    assert_eq!(
        session.submit(Action::HoldPosition {
            side: Side::Opponent,
            unit: 1
        }),
        Err(ActionError::NotOwnUnit {
            unit: 1,
            side: Side::Opponent
        })
    );
    assert_untouched(&session, events, hash, rolls);
}

#[test]
fn rules_endings_cannot_be_forced_and_finished_games_stay_finished() {
    let mut session = after_initiative();
    assert_eq!(
        session.submit(Action::EndGame {
            reason: GameEndReason::Destruction,
            winner: Some(Side::Player),
        }),
        Err(ActionError::EndReasonNotAllowed(GameEndReason::Destruction))
    );

    session
        .submit(Action::Concede { side: Side::Opponent })
        .expect("concede");
    assert!(session.is_over());

    let events = session.events().len();
    let hash = session.state().state_hash();
    let rolls = session.dice().consumed();
    assert_eq!(
        session.submit(Action::RollInitiative),
        Err(ActionError::GameOver)
    );
    assert_eq!(
        session.submit(Action::Concede { side: Side::Player }),
        Err(ActionError::GameOver)
    );
    assert_untouched(&session, events, hash, rolls);
}

#[test]
fn rejection_reasons_serialize_for_the_wire() {
    let error = ActionError::OutOfRange {
        distance: 12,
        maximum: 9,
    };
    let json = serde_json::to_string(&error).expect("serialize");
    let back: ActionError = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, error);
    assert_eq!(back.reason(), "target at range 12 is beyond maximum range 9");
}
