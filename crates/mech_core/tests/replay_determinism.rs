//! Full-game determinism tests.
//!
//! Games are played by the shared autoplay with seeded dice; the event logs
//! they produce must replay to exactly the same states.

use mech_core::event_log::EventLog;
use mech_core::events::{AttackDeclaration, GameEventPayload, GamePhase};
use mech_core::reducer::derive_state;
use mech_core::replay::{Replay, ReplayPlayer};
use mech_core::session::Action;
use mech_core::state::Side;
use mech_core::summary::BattleSummary;
use mech_core::unit::{Location, SlotContent};
use mech_test_utils::determinism::{find_first_divergence, play_seeded_game, verify_game_determinism};
use mech_test_utils::fixtures::{duel_setup, lance_setup, scripted_session};

// =============================================================================
// Log folding
// =============================================================================

#[test]
fn full_game_folds_to_session_state() {
    let mut session = mech_test_utils::fixtures::seeded_session(lance_setup(), 77);
    mech_test_utils::autoplay::play_to_end(&mut session).expect("autoplay stays legal");

    let derived = session.log().derive_state();
    assert_eq!(&derived, session.state());
    assert!(derived.check_invariants().is_ok());
}

#[test]
fn every_prefix_folds_consistently() {
    let log = play_seeded_game(&duel_setup(), 3);
    let hashes = log.prefix_hashes();
    assert_eq!(hashes.len(), log.len());
    for len in [1, log.len() / 2, log.len()] {
        assert_eq!(log.derive_prefix(len).state_hash(), hashes[len - 1]);
    }
}

#[test]
fn same_seed_same_log() {
    verify_game_determinism(&lance_setup(), 1234, 2).assert_deterministic();
    let a = play_seeded_game(&duel_setup(), 99);
    let b = play_seeded_game(&duel_setup(), 99);
    assert_eq!(find_first_divergence(a.events(), b.events()), None);
    assert_eq!(a, b);
}

// =============================================================================
// Persistence and playback
// =============================================================================

#[test]
fn json_lines_log_survives_disk() {
    let log = play_seeded_game(&duel_setup(), 5);
    let dir = std::env::temp_dir().join(format!("mech_core_log_{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join("duel.jsonl");

    log.save(&path).expect("save");
    let loaded = EventLog::load(&path).expect("load");
    assert_eq!(loaded, log);
    assert_eq!(loaded.derive_state().state_hash(), log.derive_state().state_hash());

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn replay_player_reaches_final_state() {
    let log = play_seeded_game(&lance_setup(), 6);
    let replay = Replay::from_log(&log, Some(6));
    let mut player = ReplayPlayer::new(replay);
    assert!(player.verify().expect("valid log"));
    assert!(player.is_finished());
    assert_eq!(player.state(), &log.derive_state());

    player.seek(1);
    assert_eq!(player.state(), &log.derive_prefix(1));
}

#[test]
fn summary_matches_final_state() {
    let log = play_seeded_game(&lance_setup(), 8);
    let state = log.derive_state();
    let summary = BattleSummary::from_events(&log);

    assert_eq!(summary.units.len(), state.units.len());
    for (id, unit) in &state.units {
        assert_eq!(summary.units[id].destroyed.is_some(), unit.destroyed, "unit {id}");
        assert_eq!(summary.units[id].pilot_wounds, unit.pilot.wounds, "unit {id}");
    }
    assert!(summary.end_reason.is_some());
}

// =============================================================================
// Scripted turn
// =============================================================================

#[test]
fn scripted_turn_replays_to_identical_state() {
    // Initiative 12 vs 2; medium laser hits (12) on a 2, a through-armor
    // critical; determination 9 gives one critical on the first CT slot.
    let faces = vec![6, 6, 1, 1, 6, 6, 1, 1, 5, 4, 1];
    let mut session = scripted_session(duel_setup(), faces);

    session.submit(Action::RollInitiative).expect("initiative");
    for (side, unit) in [(Side::Opponent, 2), (Side::Player, 1)] {
        session.submit(Action::HoldPosition { side, unit }).expect("hold");
    }
    assert_eq!(session.state().phase, GamePhase::WeaponAttack);
    session
        .submit(Action::LockAttacks {
            side: Side::Player,
            declarations: vec![AttackDeclaration {
                attacker: 1,
                weapon: 1,
                target: 2,
                indirect: false,
                spotter: None,
            }],
        })
        .expect("player locks");
    session
        .submit(Action::LockAttacks {
            side: Side::Opponent,
            declarations: Vec::new(),
        })
        .expect("opponent locks");

    // Heat and End run without input; the next turn waits for initiative
    assert_eq!(session.state().phase, GamePhase::Initiative);
    assert_eq!(session.state().turn, 2);
    assert_eq!(session.dice().consumed(), 11);

    let events = session.events();
    assert!(events
        .iter()
        .any(|e| matches!(e.payload, GameEventPayload::AttackResolved { hit: true, .. })));
    let crit = events.iter().find_map(|e| match &e.payload {
        GameEventPayload::CriticalHitResolved {
            unit: 2,
            location,
            applied,
            hits,
            ..
        } => Some((*location, *applied, hits.clone())),
        _ => None,
    });
    let (location, applied, hits) = crit.expect("critical resolved");
    assert_eq!(location, Location::CenterTorso);
    assert_eq!(applied, 1);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].content, SlotContent::Engine);
    assert!(events
        .iter()
        .any(|e| matches!(e.payload, GameEventPayload::HeatApplied { unit: 2, .. })));

    let live = session.state();
    let replayed = derive_state(events);
    let target = &replayed.units[&2];
    assert_eq!(target.location(Location::CenterTorso).armor, 21);
    assert_eq!(target.engine_hits(), 1);
    for (id, unit) in &live.units {
        let derived = &replayed.units[id];
        assert_eq!(derived.locations, unit.locations, "unit {id}");
        assert_eq!(derived.heat, unit.heat, "unit {id}");
        assert_eq!(derived.damaged_slots, unit.damaged_slots, "unit {id}");
        assert_eq!(derived.weapons_destroyed, unit.weapons_destroyed, "unit {id}");
    }
    assert_eq!(replayed.state_hash(), live.state_hash());
    assert_eq!(&replayed, live);
}
