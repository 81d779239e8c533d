//! Integration tests for layered Settings loading.
//!
//! These tests pass explicit global config paths and local directories
//! (temp directories only), so the user's real config never leaks in.

use std::fs;

use tempfile::TempDir;

use orchard::application::ApplicationError;
use orchard::config::{local_config_path, Settings};

#[test]
fn given_global_and_local_config_when_load_from_then_local_wins_per_field() {
    // Arrange
    let global_dir = TempDir::new().unwrap();
    let global_path = global_dir.path().join("orchard.toml");
    fs::write(
        &global_path,
        r#"
root_name = "Global Grove"
base_resource = "seeds"
max_members = 50
"#,
    )
    .unwrap();

    let local_dir = TempDir::new().unwrap();
    fs::write(
        local_config_path(local_dir.path()),
        r#"
root_name = "Local Grove"
monthly_fruit_basis = 60
"#,
    )
    .unwrap();

    // Act
    let settings =
        Settings::load_from(Some(&global_path), Some(local_dir.path())).expect("load settings");

    // Assert
    assert_eq!(settings.root_name, "Local Grove", "local overrides global");
    assert_eq!(settings.base_resource, "seeds", "global survives where local is silent");
    assert_eq!(settings.max_members, 50);
    assert_eq!(settings.monthly_fruit_basis, 60);
    assert_eq!(settings.root_resource, Settings::default().root_resource);
}

#[test]
fn given_missing_files_when_load_from_then_defaults() {
    let dir = TempDir::new().unwrap();

    let settings = Settings::load_from(Some(&dir.path().join("absent.toml")), Some(dir.path()))
        .expect("load settings");

    assert_eq!(settings.base_resource, "fruit");
    assert_eq!(settings.max_members, 1000);
}

#[test]
fn given_state_file_with_tilde_when_load_from_then_expanded() {
    let dir = TempDir::new().unwrap();
    fs::write(
        local_config_path(dir.path()),
        "state_file = \"~/orchard-test/state.json\"\n",
    )
    .unwrap();

    let settings = Settings::load_from(None, Some(dir.path())).expect("load settings");

    assert!(!settings.state_file.to_string_lossy().contains('~'));
    assert!(settings.state_file.ends_with("orchard-test/state.json"));
}

#[test]
fn given_malformed_toml_when_load_from_then_config_error() {
    let dir = TempDir::new().unwrap();
    fs::write(local_config_path(dir.path()), "max_members = [oops").unwrap();

    let result = Settings::load_from(None, Some(dir.path()));

    assert!(matches!(result, Err(ApplicationError::Config { .. })));
}

#[test]
fn given_negative_basis_when_load_from_then_config_error() {
    let dir = TempDir::new().unwrap();
    fs::write(
        local_config_path(dir.path()),
        "monthly_fruit_basis = -1\n",
    )
    .unwrap();

    let result = Settings::load_from(None, Some(dir.path()));

    assert!(matches!(result, Err(ApplicationError::Config { .. })));
}

#[test]
fn given_template_when_parsed_then_all_defaults_are_kept() {
    let dir = TempDir::new().unwrap();
    fs::write(local_config_path(dir.path()), Settings::template()).unwrap();

    let settings = Settings::load_from(None, Some(dir.path())).expect("load template");

    assert_eq!(settings.root_name, Settings::default().root_name);
    assert!(settings.to_toml().unwrap().contains("max_members = 1000"));
}
