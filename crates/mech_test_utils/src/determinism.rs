//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a game produces identical logs and
//! identical derived states given identical inputs.
//!
//! # Testing Strategy
//!
//! Clients and servers fold the same events, so any divergence is a bug.
//! Sources of non-determinism include:
//!
//! - **Floating-point math**: hex interpolation uses fixed-point
//!   (`fixed::types::I32F32`) throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Game state keeps units and locations in `BTreeMap`s.
//!
//! - **Dice**: every roll goes through an injected, seeded roller.
//!
//! - **Wall-clock time**: timestamps are recorded but never read by rules.
//!   Harness sessions use a manual clock so whole logs compare equal.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual resolution steps with scripted dice
//! 2. **Property tests**: random seeds still replay to the same hash
//! 3. **Integration tests**: full games are reproducible
//! 4. **Parallel tests**: running N sessions on threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use mech_core::event_log::EventLog;
use mech_core::events::GameEvent;
use mech_core::reducer::derive_state;
use mech_core::state::{GameSetup, GameState};

use crate::autoplay::play_to_end;
use crate::fixtures::seeded_session;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Final state hash from each run.
    pub hashes: Vec<u64>,
    /// Number of events in the first run's log.
    pub events: usize,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic game).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the game was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Game is non-deterministic!\n\
                 Runs: {}\n\
                 Events: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.events,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Play a whole game from `setup` with seeded dice and return its log.
///
/// # Panics
///
/// Panics if the setup is invalid or autoplay produces an illegal action.
#[must_use]
pub fn play_seeded_game(setup: &GameSetup, seed: u64) -> EventLog {
    let mut session = seeded_session(setup.clone(), seed);
    play_to_end(&mut session).expect("autoplay stays legal");
    session.into_log()
}

/// Play the same seeded game `runs` times and compare the final states.
///
/// # Example
///
/// ```ignore
/// use mech_test_utils::determinism::verify_game_determinism;
/// use mech_test_utils::fixtures::duel_setup;
///
/// verify_game_determinism(&duel_setup(), 7, 3).assert_deterministic();
/// ```
#[must_use]
pub fn verify_game_determinism(setup: &GameSetup, seed: u64, runs: usize) -> DeterminismResult {
    let logs: Vec<EventLog> = (0..runs).map(|_| play_seeded_game(setup, seed)).collect();
    let hashes: Vec<u64> = logs.iter().map(|log| log.derive_state().state_hash()).collect();
    let is_deterministic =
        hashes.windows(2).all(|w| w[0] == w[1]) && logs.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        events: logs.first().map_or(0, EventLog::len),
    }
}

/// Play `num_games` copies of a seeded game on scoped threads and collect
/// the final hashes.
///
/// Catches anything that depends on thread scheduling or memory layout.
#[must_use]
pub fn run_parallel_games(setup: &GameSetup, seed: u64, num_games: usize) -> DeterminismResult {
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_games)
            .map(|_| s.spawn(|| play_seeded_game(setup, seed).derive_state().state_hash()))
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("game thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        events: 0,
    }
}

/// Compare two logs event by event, finding the first prefix whose folded
/// states differ.
///
/// # Returns
///
/// `None` if every shared prefix folds to the same state and the logs have
/// the same length, otherwise the length of the first differing prefix.
#[must_use]
pub fn find_first_divergence(a: &[GameEvent], b: &[GameEvent]) -> Option<usize> {
    let mut left = GameState::default();
    let mut right = GameState::default();
    for (index, (x, y)) in a.iter().zip(b).enumerate() {
        left = mech_core::reducer::apply_event(left, x);
        right = mech_core::reducer::apply_event(right, y);
        if left.state_hash() != right.state_hash() {
            tracing::warn!(prefix = index + 1, event = ?x.event_type(), "states diverge");
            return Some(index + 1);
        }
    }
    (a.len() != b.len()).then(|| a.len().min(b.len()) + 1)
}

/// Verify that a bincode snapshot round-trip preserves the derived state.
///
/// This is what a server does before shipping a snapshot to a late joiner.
#[must_use]
pub fn verify_serialization_determinism(events: &[GameEvent]) -> bool {
    let state = derive_state(events);
    let hash_before = state.state_hash();

    let Ok(bytes) = state.serialize() else {
        return false;
    };
    let Ok(restored) = GameState::deserialize(&bytes) else {
        return false;
    };

    hash_before == restored.state_hash() && restored == state
}

/// Verify that a JSON-lines round-trip of the log folds to the same state.
#[must_use]
pub fn verify_log_round_trip(log: &EventLog) -> bool {
    let Ok(text) = log.to_json_lines() else {
        return false;
    };
    EventLog::from_json_lines(&text)
        .map(|restored| restored.derive_state().state_hash() == log.derive_state().state_hash())
        .unwrap_or(false)
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of the combat core.
pub mod strategies {
    use mech_core::hex::{HexCoordinate, HexDirection};
    use proptest::prelude::*;

    /// Any axial coordinate within a typical map.
    pub fn arb_hex() -> impl Strategy<Value = HexCoordinate> {
        (-20i32..20i32, -20i32..20i32).prop_map(|(q, r)| HexCoordinate::new(q, r))
    }

    /// Any of the six directions.
    pub fn arb_direction() -> impl Strategy<Value = HexDirection> {
        (0i32..6).prop_map(HexDirection::from_index)
    }

    /// Heat values across the whole scale.
    pub fn arb_heat() -> impl Strategy<Value = u32> {
        0u32..60u32
    }

    /// Dice seeds.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }

    /// Scripted die faces.
    pub fn arb_faces(len: usize) -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(1u8..=6, len)
    }
}
