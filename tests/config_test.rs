//! Integration tests for Settings loading with layered precedence.
//!
//! Precedence (lowest to highest):
//! - Compiled defaults
//! - Global config file: `$XDG_CONFIG_HOME/formtree/formtree.toml`
//! - `FORMTREE_*` environment variables (explicit user override)
//!
//! Note: the global layer is not exercised here; writing into the real home
//! directory from tests is off the table. Its merge logic is covered by the
//! unit tests next to `Settings`.

use std::env;
use std::path::PathBuf;

use formtree::config::{global_config_path, Settings};

/// Env vars are process-global state, so every case touching them lives in
/// this one test to avoid races with parallel test threads.
#[test]
fn given_formtree_env_vars_when_loading_then_they_override_lower_layers() {
    // Arrange
    env::set_var("FORMTREE_NAMESPACE", "crm");
    env::set_var("FORMTREE_SCHEMA_PATH", "/tmp/profile.toml");

    // Act
    let settings = Settings::load().expect("load settings");

    // Assert
    assert_eq!(settings.namespace.as_deref(), Some("crm"));
    assert_eq!(
        settings.schema_path,
        Some(PathBuf::from("/tmp/profile.toml"))
    );

    env::remove_var("FORMTREE_NAMESPACE");
    env::remove_var("FORMTREE_SCHEMA_PATH");
}

#[test]
fn given_no_configuration_when_defaulting_then_nothing_is_set() {
    let settings = Settings::default();

    assert_eq!(settings.namespace, None);
    assert_eq!(settings.schema_path, None);
}

#[test]
fn given_global_config_path_when_resolving_then_it_names_the_crate_file() {
    let path = global_config_path().expect("platform config directory");

    assert!(path.ends_with("formtree.toml"), "got: {}", path.display());
}

#[test]
fn given_template_when_rendering_then_it_documents_every_setting() {
    let template = Settings::template();

    assert!(template.contains("namespace"));
    assert!(template.contains("schema_path"));
    // All defaults are commented out, so the template parses as-is
    let parsed: Result<Settings, _> = toml::from_str(&template);
    assert!(parsed.is_ok());
}
