use rstest::rstest;
use spine_config::{Methodology, PersistedState, load_state, save_state};
use std::fs;
use tempfile::tempdir;

#[test]
fn missing_file_loads_as_none() {
    let dir = tempdir().unwrap();
    let loaded = load_state(&dir.path().join("absent.toml")).expect("missing is ok");
    assert!(loaded.is_none());
}

#[test]
fn save_then_load_preserves_fields() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.toml");
    let state = PersistedState {
        methodology: Methodology::AlternateSpineAt26,
        arrow_length_sixteenths: 448,
        scale_factors: [412.5, 398.25],
    };
    save_state(&path, &state).expect("save");
    let loaded = load_state(&path).expect("load").expect("present");
    assert_eq!(loaded, state);
    assert!(!dir.path().join("state.toml.tmp").exists());
}

#[test]
fn partial_file_fills_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.toml");
    fs::write(&path, "methodology = \"force_units\"\n").unwrap();
    let loaded = load_state(&path).expect("load").expect("present");
    assert_eq!(loaded.methodology, Methodology::ForceUnits);
    assert_eq!(loaded.arrow_length_sixteenths, 464);
    assert_eq!(loaded.scale_factors, [1.0, 1.0]);
}

#[rstest]
#[case("methodology = \"sideways\"\n", "parse state file")]
#[case("arrow_length_sixteenths = 0\n", "arrow_length_sixteenths")]
#[case("scale_factors = [1.0, -2.0]\n", "scale_factors[1]")]
fn invalid_files_are_rejected(#[case] body: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.toml");
    fs::write(&path, body).unwrap();
    let err = load_state(&path).expect_err("invalid state");
    assert!(
        format!("{err}").contains(needle),
        "error {err} should mention {needle}"
    );
}

#[test]
fn save_refuses_invalid_state() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.toml");
    let state = PersistedState {
        scale_factors: [f32::NAN, 1.0],
        ..PersistedState::default()
    };
    assert!(save_state(&path, &state).is_err());
    assert!(!path.exists());
}
