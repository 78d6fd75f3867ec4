//! Property tests for geometry, heat and replay.

use mech_core::heat::{self, ThresholdCheck};
use mech_core::hex::{Arc, HexCoordinate, HexDirection};
use mech_core::reducer::derive_state;
use mech_test_utils::determinism::play_seeded_game;
use mech_test_utils::determinism::strategies::{arb_direction, arb_heat, arb_hex};
use mech_test_utils::fixtures::duel_setup;
use proptest::prelude::*;

fn check_rank(check: ThresholdCheck) -> u8 {
    match check {
        ThresholdCheck::None => 0,
        // Higher targets are harder to avoid
        ThresholdCheck::Roll(target) => target,
        ThresholdCheck::Automatic => u8::MAX,
    }
}

proptest! {
    #[test]
    fn distance_is_a_metric(a in arb_hex(), b in arb_hex(), c in arb_hex()) {
        prop_assert_eq!(a.distance(b), b.distance(a));
        prop_assert_eq!(a.distance(a), 0);
        prop_assert!(a.distance(c) <= a.distance(b) + b.distance(c));
    }

    #[test]
    fn neighbors_are_one_step_away(a in arb_hex()) {
        for n in a.neighbors() {
            prop_assert_eq!(a.distance(n), 1);
        }
    }

    #[test]
    fn line_has_distance_plus_one_hexes(a in arb_hex(), b in arb_hex()) {
        let line = a.line_to(b);
        prop_assert_eq!(line.len() as u32, a.distance(b) + 1);
        prop_assert_eq!(line.first(), Some(&a));
        prop_assert_eq!(line.last(), Some(&b));
    }

    #[test]
    fn arcs_partition_directions(facing in arb_direction()) {
        let mut seen: Vec<HexDirection> = [Arc::Front, Arc::Left, Arc::Right, Arc::Rear]
            .into_iter()
            .flat_map(|arc| arc.directions(facing))
            .collect();
        prop_assert_eq!(seen.len(), 6);
        seen.sort();
        seen.dedup();
        prop_assert_eq!(seen.len(), 6);
        prop_assert_eq!(Arc::Front.directions(facing).len(), 3);
        prop_assert_eq!(Arc::of_direction(facing, facing), Arc::Front);
        prop_assert_eq!(Arc::of_direction(facing, facing.opposite()), Arc::Rear);
    }

    #[test]
    fn heat_effects_never_ease_as_heat_rises(h in arb_heat()) {
        prop_assert!(heat::to_hit_modifier(h) <= heat::to_hit_modifier(h + 1));
        prop_assert!(heat::movement_penalty(h) <= heat::movement_penalty(h + 1));
        prop_assert!(check_rank(heat::shutdown_check(h)) <= check_rank(heat::shutdown_check(h + 1)));
        prop_assert!(
            check_rank(heat::ammo_explosion_check(h)) <= check_rank(heat::ammo_explosion_check(h + 1))
        );
        prop_assert!(heat::pilot_heat_damage(h, false) <= heat::pilot_heat_damage(h + 1, false));
        prop_assert!(heat::pilot_heat_damage(h, true) <= heat::pilot_heat_damage(h + 1, true));
    }

    #[test]
    fn heat_never_goes_negative(previous in arb_heat(), generated in 0u32..40, dissipated in 0u32..40) {
        let update = heat::apply_heat(previous, generated, dissipated);
        prop_assert_eq!(update.current, (previous + generated).saturating_sub(dissipated));
        prop_assert!(update.current <= previous + generated);
    }

    #[test]
    fn bearing_of_a_neighbor_is_its_direction(a in arb_hex(), facing in arb_direction()) {
        let neighbor = a.neighbor(facing);
        prop_assert_eq!(a.bearing_to(neighbor), Some(facing));
        prop_assert_eq!(a.direction_to_neighbor(neighbor), Some(facing));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn seeded_games_replay_identically(seed in any::<u64>()) {
        let log = play_seeded_game(&duel_setup(), seed);
        let again = play_seeded_game(&duel_setup(), seed);
        prop_assert_eq!(&log, &again);

        let folded = derive_state(log.events());
        prop_assert_eq!(folded.state_hash(), again.derive_state().state_hash());
        prop_assert!(folded.check_invariants().is_ok());
        prop_assert!(folded.is_over());
    }
}

#[test]
fn unit_coordinates_match_their_axes() {
    let origin = HexCoordinate::new(0, 0);
    assert_eq!(origin.neighbor(HexDirection::North), HexCoordinate::new(0, -1));
}
