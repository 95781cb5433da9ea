//! Version derivation from a source checkout
//!
//! Runs `python -m setuptools_scm` inside the checkout; the version is the
//! last token of the last non-empty output line.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::defaults::DEFAULT_PYTHON;
use crate::core::orchestrator::VersionDeriver;
use crate::error::VersionDeriveError;

/// Module run with `python -m` to print the version of a checkout
const SCM_VERSION_MODULE: &str = "setuptools_scm";

/// `python -m setuptools_scm` runner
#[derive(Debug, Clone)]
pub struct SetuptoolsScmVersion {
    python: PathBuf,
}

impl Default for SetuptoolsScmVersion {
    fn default() -> Self {
        Self::new(DEFAULT_PYTHON)
    }
}

impl SetuptoolsScmVersion {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }
}

impl VersionDeriver for SetuptoolsScmVersion {
    fn derive_version(&self, source_dir: &Path) -> Result<String, VersionDeriveError> {
        let output = Command::new(&self.python)
            .args(["-m", SCM_VERSION_MODULE])
            .current_dir(source_dir)
            .output()
            .map_err(|e| VersionDeriveError::Spawn {
                program: self.python.display().to_string(),
                dir: source_dir.to_path_buf(),
                error: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(VersionDeriveError::Failed {
                dir: source_dir.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_version_output(&stdout)
            .map(str::to_string)
            .ok_or_else(|| VersionDeriveError::NoVersion {
                dir: source_dir.to_path_buf(),
            })
    }
}

/// Trailing token of the final non-empty line
///
/// Build helpers may print warnings before the version, so only the last
/// line counts.
pub fn parse_version_output(output: &str) -> Option<&str> {
    output
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| line.split_whitespace().last())
}
