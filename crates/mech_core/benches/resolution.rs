//! Combat resolution benchmarks for mech_core.
//!
//! Run with: `cargo bench -p mech_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mech_core::attack::resolve_attack;
use mech_core::dice::SeededDiceRoller;
use mech_core::events::GamePhase;
use mech_core::legality::legal_attacks;
use mech_core::state::{GameState, Side};
use mech_test_utils::autoplay::next_action;
use mech_test_utils::determinism::play_seeded_game;
use mech_test_utils::fixtures::{duel_setup, lance_setup, seeded_session};

/// First state of the lance game that is waiting for attack locks.
fn attack_phase_state() -> GameState {
    let mut session = seeded_session(lance_setup(), 17);
    while session.state().phase != GamePhase::WeaponAttack || session.legal_attacks(Side::Player).is_empty() {
        let Some(action) = next_action(session.state()) else {
            break;
        };
        session.submit(action).expect("autoplay stays legal");
    }
    session.state().clone()
}

/// Attack resolution, legality enumeration and log folding.
pub fn resolution_benchmark(c: &mut Criterion) {
    let state = attack_phase_state();
    let attacks = legal_attacks(&state, Side::Player);

    c.bench_function("legal_attacks", |b| {
        b.iter(|| legal_attacks(black_box(&state), Side::Player))
    });

    if let Some(declaration) = attacks.first() {
        let mut dice = SeededDiceRoller::new(1);
        c.bench_function("resolve_attack", |b| {
            b.iter(|| resolve_attack(black_box(&state), black_box(declaration), false, &mut dice))
        });
    }

    let log = play_seeded_game(&duel_setup(), 3);
    c.bench_function("derive_state_full_duel", |b| {
        b.iter(|| black_box(&log).derive_state())
    });
    c.bench_function("state_hash", |b| b.iter(|| black_box(&state).state_hash()));
}

criterion_group!(benches, resolution_benchmark);
criterion_main!(benches);
