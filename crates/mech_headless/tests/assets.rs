//! Shipped data files load, build and play.

use std::path::PathBuf;

use mech_headless::{play_game, Autopilot, Scenario, TemplateRegistry};

fn assets() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets")
}

fn registry() -> TemplateRegistry {
    let mut registry = TemplateRegistry::standard();
    let (loaded, failed) = registry
        .load_from_directory(&assets().join("units"))
        .expect("units directory exists");
    assert!(failed.is_empty(), "bad unit files: {failed:?}");
    assert!(loaded.len() >= 3);
    registry
}

// ============================================================================
// Data Validity
// ============================================================================

#[test]
fn test_every_unit_file_builds() {
    let registry = registry();
    for id in ["COM-2D", "WVR-6R", "RVN-3L-R"] {
        assert!(registry.build(id).is_ok(), "{id} does not build");
    }
}

#[test]
fn test_every_scenario_file_builds() {
    let registry = registry();
    let mut paths: Vec<PathBuf> = std::fs::read_dir(assets().join("scenarios"))
        .expect("scenarios directory exists")
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map_or(false, |e| e == "ron"))
        .collect();
    paths.sort();
    assert!(!paths.is_empty());

    for path in paths {
        let scenario = Scenario::load(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()));
        scenario
            .to_setup("asset-check", &registry)
            .unwrap_or_else(|e| panic!("{}: {e}", path.display()));
    }
}

#[test]
fn test_duel_file_matches_builtin() {
    let from_file = Scenario::load(assets().join("scenarios").join("duel.ron")).expect("duel.ron");
    assert_eq!(from_file, Scenario::duel());
}

// ============================================================================
// Playability
// ============================================================================

#[test]
fn test_ridge_plays_to_an_ending() {
    let registry = registry();
    let setup = Scenario::load(assets().join("scenarios").join("ridge.ron"))
        .expect("ridge.ron")
        .to_setup("ridge", &registry)
        .expect("valid");

    let session = play_game(setup, &Autopilot::default(), 77, 5_000).expect("autopilot stays legal");
    assert!(session.is_over());
    assert!(session.state().check_invariants().is_ok());
}

#[test]
fn test_tag_team_is_reproducible() {
    let registry = registry();
    let setup = Scenario::load(assets().join("scenarios").join("tag_team.ron"))
        .expect("tag_team.ron")
        .to_setup("tag", &registry)
        .expect("valid");

    let a = play_game(setup.clone(), &Autopilot::default(), 3, 5_000).expect("legal");
    let b = play_game(setup, &Autopilot::default(), 3, 5_000).expect("legal");
    assert_eq!(a.events(), b.events());
}
