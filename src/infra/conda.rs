//! Conda build tool
//!
//! Runs `conda build` as a child process for one package directory.

use globset::GlobBuilder;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

use crate::config::defaults::DEFAULT_CONDA;
use crate::core::orchestrator::{BuildRequest, BuildTool};
use crate::error::BuildToolError;

/// `conda build` invoker
#[derive(Debug, Clone)]
pub struct CondaBuild {
    program: PathBuf,
}

impl CondaBuild {
    /// Use `program` as the conda executable without looking it up
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Find the conda executable, either the configured one or `conda` in PATH
    pub fn locate(configured: Option<&Path>) -> Result<Self, BuildToolError> {
        let wanted = configured.unwrap_or_else(|| Path::new(DEFAULT_CONDA));
        let program = which::which(wanted).map_err(|_| BuildToolError::NotFound {
            program: wanted.display().to_string(),
        })?;
        tracing::debug!("Using conda at {}", program.display());
        Ok(Self { program })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Command-line arguments for one build
    pub fn build_args(request: &BuildRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["build".into(), request.recipe_dir.clone().into()];
        args.push("--croot".into());
        args.push(request.output_root.clone().into());
        args.push("--old-build-string".into());
        args.push("--no-anaconda-upload".into());

        if let Some(python) = &request.python {
            args.push("--python".into());
            args.push(python.into());
        }
        if let Some(numpy) = &request.numpy {
            args.push("--numpy".into());
            args.push(numpy.into());
        }
        if let Some(perl) = &request.perl {
            args.push("--perl".into());
            args.push(perl.into());
        }
        if !request.run_tests {
            args.push("--no-test".into());
        }
        if request.skip_existing {
            args.push("--skip-existing".into());
        }
        for channel in &request.channels {
            args.push("-c".into());
            args.push(channel.into());
        }
        if request.override_channels {
            args.push("--override-channels".into());
        }
        args.extend(request.extra_args.iter().map(OsString::from));
        args
    }
}

/// Remove cached build artifacts of `package` under `output_root`
///
/// Matches files at `<output_root>/*/.cache/*/<package>-*`, which conda
/// would otherwise reuse for a forced rebuild. Returns the removed paths.
pub fn purge_cached_artifacts(
    output_root: &Path,
    package: &str,
) -> Result<Vec<PathBuf>, BuildToolError> {
    let pattern = format!("*/.cache/*/{}-*", globset::escape(package));
    let matcher = GlobBuilder::new(&pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| BuildToolError::Purge {
            path: output_root.join(&pattern),
            error: e.to_string(),
        })?
        .compile_matcher();

    let mut removed = Vec::new();
    if !output_root.is_dir() {
        return Ok(removed);
    }
    for entry in WalkDir::new(output_root)
        .min_depth(4)
        .max_depth(4)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Skipping unreadable cache entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(output_root) else {
            continue;
        };
        if !matcher.is_match(relative) {
            continue;
        }
        tracing::info!("Removing {}", entry.path().display());
        std::fs::remove_file(entry.path()).map_err(|e| BuildToolError::Purge {
            path: entry.path().to_path_buf(),
            error: e.to_string(),
        })?;
        removed.push(entry.into_path());
    }
    Ok(removed)
}

impl BuildTool for CondaBuild {
    fn build(&self, request: &BuildRequest) -> Result<(), BuildToolError> {
        if !request.skip_existing {
            let name = request
                .recipe_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| request.package.clone());
            purge_cached_artifacts(&request.output_root, &name)?;
        }

        let args = Self::build_args(request);
        tracing::debug!(
            "Running {} {}",
            self.program.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let status = Command::new(&self.program)
            .args(&args)
            .envs(&request.env)
            .status()
            .map_err(|e| BuildToolError::Spawn {
                program: self.program.display().to_string(),
                error: e.to_string(),
            })?;

        if !status.success() {
            return Err(BuildToolError::Failed {
                package: request.package.clone(),
                code: status.code(),
            });
        }
        Ok(())
    }
}
