//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/orchard/orchard.toml`
//! 3. Local config: `<dir>/.orchard.toml` (usually the working directory)
//! 4. Environment variables: `ORCHARD_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::Genesis;

pub const LOCAL_CONFIG_NAME: &str = ".orchard.toml";

/// Unified configuration for orchard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// JSON file holding the orchard state
    pub state_file: PathBuf,
    /// Name of the root node planted by `init`
    pub root_name: String,
    /// Global base currency
    pub base_resource: String,
    /// The root node's own resource
    pub root_resource: String,
    /// Monthly yield of a new member's production capacity
    pub monthly_fruit_basis: i64,
    /// Member limit per node
    pub max_members: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            root_name: "New Circle Movement".to_string(),
            base_resource: "fruit".to_string(),
            root_resource: "circle fruit".to_string(),
            monthly_fruit_basis: 100,
            max_members: 1000,
        }
    }
}

/// Raw settings for intermediate parsing: `None` means "not specified".
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub state_file: Option<PathBuf>,
    pub root_name: Option<String>,
    pub base_resource: Option<String>,
    pub root_resource: Option<String>,
    pub monthly_fruit_basis: Option<i64>,
    pub max_members: Option<usize>,
}

fn default_state_file() -> PathBuf {
    ProjectDirs::from("", "", "orchard")
        .map(|dirs| dirs.data_dir().join("orchard.json"))
        .unwrap_or_else(|| PathBuf::from("orchard.json"))
}

/// Get the XDG config directory for orchard.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "orchard").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("orchard.toml"))
}

/// Get the path to the local config file in `dir`.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(LOCAL_CONFIG_NAME)
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

/// Expand `~`, `$VAR` and `${VAR}`; unknown variables are left as written.
fn expand(input: &str) -> String {
    shellexpand::full(input)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| shellexpand::tilde(input).into_owned())
}

impl Settings {
    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        let expanded = expand(self.state_file.to_string_lossy().as_ref());
        self.state_file = PathBuf::from(expanded);
    }

    /// Overlay wins where it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            state_file: overlay
                .state_file
                .clone()
                .unwrap_or_else(|| self.state_file.clone()),
            root_name: overlay
                .root_name
                .clone()
                .unwrap_or_else(|| self.root_name.clone()),
            base_resource: overlay
                .base_resource
                .clone()
                .unwrap_or_else(|| self.base_resource.clone()),
            root_resource: overlay
                .root_resource
                .clone()
                .unwrap_or_else(|| self.root_resource.clone()),
            monthly_fruit_basis: overlay
                .monthly_fruit_basis
                .unwrap_or(self.monthly_fruit_basis),
            max_members: overlay.max_members.unwrap_or(self.max_members),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_dir` - Optional directory holding a `.orchard.toml`
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        Self::load_from(global_config_path().as_deref(), local_dir)
    }

    /// Load settings from an explicit global config file.
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. `global` config file, if it exists
    /// 3. `<local_dir>/.orchard.toml`, if it exists
    /// 4. Environment variables: `ORCHARD_*` prefix
    pub fn load_from(global: Option<&Path>, local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global {
            if global_path.exists() {
                let raw = load_raw_settings(global_path)?;
                current = current.merge_with(&raw);
            }
        }

        if let Some(dir) = local_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        current.validate()?;

        Ok(current)
    }

    /// Apply ORCHARD_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("ORCHARD").separator("__"))
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("state_file") {
            settings.state_file = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("root_name") {
            settings.root_name = val;
        }
        if let Ok(val) = config.get_string("base_resource") {
            settings.base_resource = val;
        }
        if let Ok(val) = config.get_string("root_resource") {
            settings.root_resource = val;
        }
        match config.get_int("monthly_fruit_basis") {
            Ok(val) => settings.monthly_fruit_basis = val,
            Err(ConfigError::NotFound(_)) => {}
            Err(e) => return Err(config_err(e)),
        }
        match config.get_int("max_members") {
            Ok(val) => {
                settings.max_members = usize::try_from(val).map_err(|_| ApplicationError::Config {
                    message: format!("max_members must not be negative: {}", val),
                })?
            }
            Err(ConfigError::NotFound(_)) => {}
            Err(e) => return Err(config_err(e)),
        }

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        if self.monthly_fruit_basis < 0 {
            return Err(ApplicationError::Config {
                message: format!(
                    "monthly_fruit_basis must not be negative: {}",
                    self.monthly_fruit_basis
                ),
            });
        }
        if self.max_members == 0 {
            return Err(ApplicationError::Config {
                message: "max_members must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Settings for planting a new orchard.
    pub fn genesis(&self) -> Genesis {
        Genesis {
            root_name: self.root_name.clone(),
            base_resource: self.base_resource.clone(),
            root_resource: self.root_resource.clone(),
            monthly_fruit_basis: self.monthly_fruit_basis,
            max_members: self.max_members,
        }
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# orchard configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/orchard/orchard.toml
#   Local:  ./.orchard.toml
#   Env:    ORCHARD_* environment variables

# Where the orchard state is stored
# state_file = "~/.local/share/orchard/orchard.json"

# Root node and currencies planted by `orchard init`
# root_name = "New Circle Movement"
# base_resource = "fruit"
# root_resource = "circle fruit"

# Defaults for new nodes
# monthly_fruit_basis = 100
# max_members = 1000
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
