//! Platform-specific directory management
//!
//! Locates the configuration directory. `SKA_BUILDER_CONFIG_DIR` overrides
//! the platform default (`$XDG_CONFIG_HOME/ska-builder` on Linux,
//! `~/Library/Application Support/ska-builder` on macOS).

use std::env;
use std::path::PathBuf;

/// Environment variable overriding the config directory
pub const ENV_CONFIG_DIR: &str = "SKA_BUILDER_CONFIG_DIR";

/// Application name used in directory paths
const APP_NAME: &str = "ska-builder";

const CONFIG_FILENAME: &str = "config.toml";

/// Directory provider for ska-builder
#[derive(Debug, Clone)]
pub struct BuilderDirs {
    config_dir: PathBuf,
}

impl BuilderDirs {
    /// Resolve directories from the environment or platform defaults
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_dir: Self::resolve_config_dir(),
        }
    }

    /// Use an explicit config directory
    #[must_use]
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    /// Path of `config.toml` in the config directory
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILENAME)
    }

    fn resolve_config_dir() -> PathBuf {
        if let Ok(path) = env::var(ENV_CONFIG_DIR) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|h| h.join(".config").join(APP_NAME))
                    .unwrap_or_else(|| PathBuf::from(".").join(".config").join(APP_NAME))
            })
    }
}

impl Default for BuilderDirs {
    fn default() -> Self {
        Self::new()
    }
}
