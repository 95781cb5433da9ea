//! Configuration file management
//!
//! Reads `config.toml` from the config directory. Every setting is
//! optional; command-line flags override file values, which override the
//! built-in defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::defaults::{
    DEFAULT_BUILD_ROOT, DEFAULT_NUMPY_VERSION, DEFAULT_PERL_VERSION, DEFAULT_PYTHON,
    DEFAULT_PYTHON_VERSION, DEFAULT_SRC_DIR,
};
use crate::error::ConfigError;
use crate::infra::dirs::BuilderDirs;

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Build tool settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Source checkout settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Package filters
    #[serde(default)]
    pub filter: FilterConfig,
}

/// `[build]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Path to the conda executable
    pub conda: Option<PathBuf>,

    /// Python version pin
    pub python: Option<String>,

    /// Numpy version pin
    pub numpy: Option<String>,

    /// Perl version pin
    pub perl: Option<String>,

    /// Channels searched for dependencies
    pub channels: Option<Vec<String>>,

    /// Search only the configured channels
    pub override_channels: Option<bool>,

    /// Build output root
    pub build_root: Option<PathBuf>,

    /// Arguments appended to every build command
    pub extra_args: Option<Vec<String>>,
}

/// `[source]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Root under which sources are checked out
    pub src_dir: Option<PathBuf>,

    /// Clone GitHub repositories over https instead of ssh
    pub github_https: Option<bool>,

    /// Interpreter used to derive versions from checkouts
    pub python: Option<PathBuf>,
}

/// `[filter]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Glob patterns of packages never built
    pub exclude: Option<Vec<String>>,

    /// Build only architecture-specific packages
    pub arch_specific: Option<bool>,
}

impl BuilderConfig {
    /// Load `config.toml` from the config directory
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` if the file exists but is not valid TOML.
    pub fn load(dirs: &BuilderDirs) -> Result<Self, ConfigError> {
        Self::load_from_path(&dirs.config_path())
    }

    /// Load a config file; a missing file yields the defaults
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    #[must_use]
    pub fn python_version(&self) -> &str {
        self.build.python.as_deref().unwrap_or(DEFAULT_PYTHON_VERSION)
    }

    #[must_use]
    pub fn numpy_version(&self) -> &str {
        self.build.numpy.as_deref().unwrap_or(DEFAULT_NUMPY_VERSION)
    }

    #[must_use]
    pub fn perl_version(&self) -> &str {
        self.build.perl.as_deref().unwrap_or(DEFAULT_PERL_VERSION)
    }

    #[must_use]
    pub fn build_root(&self) -> PathBuf {
        self.build
            .build_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BUILD_ROOT))
    }

    #[must_use]
    pub fn src_dir(&self) -> PathBuf {
        self.source
            .src_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SRC_DIR))
    }

    /// Interpreter used for version derivation
    #[must_use]
    pub fn source_python(&self) -> PathBuf {
        self.source
            .python
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PYTHON))
    }

    #[must_use]
    pub fn github_https(&self) -> bool {
        self.source.github_https.unwrap_or(false)
    }

    #[must_use]
    pub fn channels(&self) -> &[String] {
        self.build.channels.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn override_channels(&self) -> bool {
        self.build.override_channels.unwrap_or(false)
    }

    #[must_use]
    pub fn extra_args(&self) -> &[String] {
        self.build.extra_args.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn exclude(&self) -> &[String] {
        self.filter.exclude.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn arch_specific(&self) -> bool {
        self.filter.arch_specific.unwrap_or(false)
    }
}
