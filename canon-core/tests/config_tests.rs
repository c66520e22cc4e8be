//! Config error-message and atomic-write-safety tests.

use assert_fs::prelude::*;
use canon_core::{config, Config, ConfigError};
use predicates::prelude::predicate;
use rstest::rstest;
use std::fs;

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".canon/config.yaml")
        .write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"), "must contain file path");
}

#[rstest]
#[case::list("- not a mapping\n")]
#[case::wrong_type("backup: maybe\n")]
#[case::negative_limit("history_limit: -3\n")]
fn malformed_values_return_parse_error(#[case] yaml: &str) {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".canon/config.yaml").write_str(yaml).expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

#[rstest]
#[case::empty("")]
#[case::whitespace("\n\n  \n")]
fn blank_file_loads_defaults(#[case] yaml: &str) {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".canon/config.yaml").write_str(yaml).expect("write");

    assert_eq!(config::load_at(home.path()).expect("load"), Config::default());
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn save_cleans_up_tmp_file() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    config::save_at(home.path(), &Config::default()).expect("save");

    home.child(".canon/config.yaml").assert(predicate::path::exists());
    home.child(".canon/config.yaml.tmp")
        .assert(predicate::path::missing());
}

#[test]
fn save_overwrites_previous_config() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut cfg = Config::default();
    config::save_at(home.path(), &cfg).expect("first save");

    cfg.deployed_by = Some("ci".to_string());
    config::save_at(home.path(), &cfg).expect("second save");

    let raw = fs::read_to_string(config::config_path_at(home.path())).expect("read");
    assert!(raw.contains("deployed_by: ci"), "got: {raw}");
}
