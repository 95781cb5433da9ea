//! Error types for ska-builder
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::orchestrator::OrchestrationReport;
use crate::core::source::SourceError;

/// Metadata description errors
///
/// Any of these makes a single package unbuildable; index construction
/// records them as diagnostics and moves on.
#[derive(Error, Debug)]
pub enum MetadataError {
    /// Description file could not be read
    #[error("Failed to read '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Template expansion failed
    #[error("Failed to expand template in '{path}': {error}")]
    Template { path: PathBuf, error: String },

    /// Expanded text is not valid YAML
    #[error("Failed to parse '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// No `package.name` declared
    #[error("'{path}' does not declare package.name")]
    MissingName { path: PathBuf },

    /// `source.path` declared without `about.home`
    #[error("'{path}' declares source.path but no about.home to fetch it from")]
    SourcePathWithoutHome { path: PathBuf },

    /// Version marker present without a fetchable source
    #[error("'{path}' references {marker} but does not declare both source.path and about.home")]
    VersionMarkerWithoutSource { path: PathBuf, marker: String },
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },

    /// Failed to copy a file or directory
    #[error("Failed to copy '{from}' to '{to}': {error}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        error: String,
    },
}

/// Build tool invocation errors
#[derive(Error, Debug)]
pub enum BuildToolError {
    /// Executable not found in PATH
    #[error("Build tool '{program}' not found in PATH")]
    NotFound { program: String },

    /// Process could not be started
    #[error("Failed to run '{program}': {error}")]
    Spawn { program: String, error: String },

    /// Process exited unsuccessfully
    #[error("Build of '{package}' exited with {}", code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}")))]
    Failed { package: String, code: Option<i32> },

    /// Cached artifact of a forced rebuild could not be removed
    #[error("Failed to remove cached artifact '{path}': {error}")]
    Purge { path: PathBuf, error: String },
}

/// Version derivation errors
#[derive(Error, Debug)]
pub enum VersionDeriveError {
    /// Process could not be started
    #[error("Failed to run '{program}' in '{dir}': {error}")]
    Spawn {
        program: String,
        dir: PathBuf,
        error: String,
    },

    /// Process exited unsuccessfully
    #[error("Version derivation in '{dir}' failed: {stderr}")]
    Failed { dir: PathBuf, stderr: String },

    /// Output did not contain a version token
    #[error("Version derivation in '{dir}' produced no output")]
    NoVersion { dir: PathBuf },
}

/// Errors raised while building one package
///
/// Recorded in the report and the run continues, unless stop-on-error
/// is set.
#[derive(Error, Debug)]
pub enum PackageBuildError {
    /// Staging the description copy failed
    #[error("Failed to stage package: {0}")]
    Stage(FilesystemError),

    /// Version overwrite failed
    #[error("Failed to overwrite version: {0}")]
    Rewrite(FilesystemError),

    /// Source checkout failed
    #[error("Source checkout failed")]
    Source(#[from] SourceError),

    /// Version derivation failed
    #[error(transparent)]
    Version(#[from] VersionDeriveError),

    /// Build tool failed
    #[error(transparent)]
    BuildTool(#[from] BuildToolError),
}

/// Run-level orchestration errors
#[derive(Error, Debug)]
pub enum OrchestrationError {
    /// Package definitions root does not exist
    #[error("Package definitions directory not found: {path}")]
    MissingScanRoot { path: PathBuf },

    /// Identifier not present in the package index
    #[error("Package '{identifier}' not found in the package index")]
    UnknownPackage { identifier: String },

    /// Run-owned staging area could not be created
    #[error("Failed to create staging area: {0}")]
    Staging(FilesystemError),

    /// Stop-on-error abort; carries the triggering error and the
    /// outcomes recorded before it
    #[error("Build of '{package}' failed, stopping")]
    Aborted {
        package: String,
        #[source]
        source: PackageBuildError,
        report: Box<OrchestrationReport>,
    },

    /// One or more packages failed during a full pass
    #[error("{} package(s) failed to build: {}", failed.len(), failed.join(", "))]
    Failed {
        failed: Vec<String>,
        report: Box<OrchestrationReport>,
    },
}

impl OrchestrationError {
    /// Outcomes recorded before the run ended, if it got that far
    pub fn report(&self) -> Option<&OrchestrationReport> {
        match self {
            Self::Aborted { report, .. } | Self::Failed { report, .. } => Some(&**report),
            Self::MissingScanRoot { .. } | Self::UnknownPackage { .. } | Self::Staging(_) => None,
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// Overwrite directive is not `OLD:NEW`
    #[error("Invalid version overwrite '{value}': expected OLD:NEW")]
    InvalidOverwrite { value: String },

    /// Exclude pattern is not a valid glob
    #[error("Invalid exclude pattern '{pattern}': {error}")]
    InvalidExcludePattern { pattern: String, error: String },

    /// Build-order file could not be read
    #[error("Failed to read build order '{path}': {error}")]
    BuildOrder { path: PathBuf, error: String },
}
