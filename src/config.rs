//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/formtree/formtree.toml`
//! 3. Environment variables: `FORMTREE_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config error: {message}")]
    Message { message: String },
}

/// Unified configuration for formtree.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Registry namespace tried before bare type names resolve
    pub namespace: Option<String>,
    /// Schema file used when a command gets no schema argument
    pub schema_path: Option<PathBuf>,
}

/// Raw settings for intermediate parsing; `None` means "not specified,
/// keep the lower layer".
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub namespace: Option<String>,
    pub schema_path: Option<PathBuf>,
}

/// XDG config directory for formtree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "formtree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("formtree.toml"))
}

fn load_raw_settings(path: &Path) -> Result<RawSettings, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Message {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::Message {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Overlay wins per field if specified, otherwise the base is kept.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            namespace: overlay.namespace.clone().or_else(|| self.namespace.clone()),
            schema_path: overlay
                .schema_path
                .clone()
                .or_else(|| self.schema_path.clone()),
        }
    }

    /// Expand shell variables and tilde in path-like fields.
    ///
    /// Handles `~`, `$VAR`, and `${VAR}` syntax.
    fn expand_paths(&mut self) {
        if let Some(path) = &self.schema_path {
            let expanded = expand_env_vars(path.to_string_lossy().as_ref());
            self.schema_path = Some(PathBuf::from(expanded));
        }
    }

    /// Load settings with layered precedence: compiled defaults, then the
    /// global config file, then `FORMTREE_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        Ok(current)
    }

    /// Apply FORMTREE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ConfigError> {
        // The prefix joins with a single underscore (FORMTREE_NAMESPACE);
        // "__" only separates nested keys.
        let builder = Config::builder().add_source(
            Environment::with_prefix("FORMTREE")
                .prefix_separator("_")
                .separator("__"),
        );
        let config = builder.build().map_err(|e| ConfigError::Message {
            message: e.to_string(),
        })?;

        if let Ok(val) = config.get_string("namespace") {
            settings.namespace = Some(val);
        }
        if let Ok(val) = config.get_string("schema_path") {
            settings.schema_path = Some(PathBuf::from(val));
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Message {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# formtree configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/formtree/formtree.toml
#   Env:    FORMTREE_* environment variables (explicit overrides)

# Registry namespace tried before bare type names
# (a declared type "Password" resolves as "myapp::Password" first)
# namespace = "myapp"

# Schema file used when a command gets no schema argument
# schema_path = "~/forms/profile.toml"
"#
        .to_string()
    }
}

/// Expand environment variables and tilde in a path string. Unresolvable
/// variables leave the path unchanged.
fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}
