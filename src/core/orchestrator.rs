//! Build orchestration logic
//!
//! Drives an ordered list of package identifiers through resolution,
//! filtering, optional version overwrite, source materialization and the
//! build tool, one package at a time.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::config::defaults::{DEFAULT_SRC_DIR, PKG_VERSION_ENV, SRC_DIR_PARAM};
use crate::core::metadata::{PackageMetadata, TemplateParams};
use crate::core::resolver::{IndexCache, PackageResolver};
use crate::core::rewrite::{is_meta_package, VersionOverwrite, VersionRewriter};
use crate::core::source::{self, SourceControl, SourceRequest};
use crate::error::{
    BuildToolError, ConfigError, FilesystemError, OrchestrationError, PackageBuildError,
    VersionDeriveError,
};
use crate::infra::filesystem;

/// One build-tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Identifier the package was requested under
    pub package: String,
    /// Directory holding the (possibly staged) description
    pub recipe_dir: PathBuf,
    pub output_root: PathBuf,
    pub python: Option<String>,
    pub numpy: Option<String>,
    pub perl: Option<String>,
    pub run_tests: bool,
    pub skip_existing: bool,
    pub channels: Vec<String>,
    pub override_channels: bool,
    pub extra_args: Vec<String>,
    /// Variables set in the build tool's environment only
    pub env: BTreeMap<String, String>,
}

/// External package build tool
pub trait BuildTool {
    fn build(&self, request: &BuildRequest) -> Result<(), BuildToolError>;
}

/// Derives a package version from its source checkout
pub trait VersionDeriver {
    fn derive_version(&self, source_dir: &Path) -> Result<String, VersionDeriveError>;
}

/// External collaborators used by a run
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub build_tool: &'a dyn BuildTool,
    pub source_control: &'a dyn SourceControl,
    pub version_scm: &'a dyn VersionDeriver,
}

/// Options passed through to every build-tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSettings {
    pub output_root: PathBuf,
    pub python: Option<String>,
    pub numpy: Option<String>,
    pub perl: Option<String>,
    pub run_tests: bool,
    /// Rebuild packages already present in the output
    pub force: bool,
    pub channels: Vec<String>,
    pub override_channels: bool,
    pub extra_args: Vec<String>,
}

/// Orchestration options
#[derive(Debug, Clone, Default)]
pub struct OrchestratorOptions {
    /// Package definitions root to scan
    pub pkg_defs: PathBuf,
    pub template_params: TemplateParams,
    /// Source checkout root; a directory inside the staging area when `None`
    pub src_dir: Option<PathBuf>,
    /// Skip noarch packages
    pub arch_specific_only: bool,
    /// Glob patterns of identifiers to skip
    pub exclude: Vec<String>,
    /// Version overwrite applied to meta-packages
    pub overwrite: Option<VersionOverwrite>,
    /// Reference to check out instead of the latest tag
    pub git_ref: Option<String>,
    /// Clone from this URL instead of the home URL, merging the home's tags
    pub repo_url: Option<String>,
    pub github_https: bool,
    pub stop_on_error: bool,
    pub build: BuildSettings,
}

/// Per-package status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Succeeded,
    /// Noarch package skipped in arch-specific mode
    SkippedArchSpecific,
    /// Matched an exclude pattern
    SkippedExcluded,
    Failed,
}

/// Outcome of one identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOutcome {
    pub identifier: String,
    pub status: BuildStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildOutcome {
    fn new(identifier: &str, status: BuildStatus) -> Self {
        Self {
            identifier: identifier.to_string(),
            status,
            error: None,
        }
    }

    fn failed(identifier: &str, error: &PackageBuildError) -> Self {
        Self {
            identifier: identifier.to_string(),
            status: BuildStatus::Failed,
            error: Some(error_chain(error)),
        }
    }
}

/// Ordered outcomes of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrchestrationReport {
    outcomes: Vec<BuildOutcome>,
}

impl OrchestrationReport {
    pub fn outcomes(&self) -> &[BuildOutcome] {
        &self.outcomes
    }

    pub fn failed(&self) -> impl Iterator<Item = &BuildOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == BuildStatus::Failed)
    }

    pub fn failed_identifiers(&self) -> Vec<String> {
        self.failed().map(|o| o.identifier.clone()).collect()
    }

    pub fn count(&self, status: BuildStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    fn push(&mut self, outcome: BuildOutcome) {
        self.outcomes.push(outcome);
    }
}

/// Build orchestrator
pub struct BuildOrchestrator<'a> {
    options: OrchestratorOptions,
    exclude: GlobSet,
    resolver: PackageResolver,
    rewriter: VersionRewriter,
    tools: Collaborators<'a>,
}

impl<'a> BuildOrchestrator<'a> {
    /// Create an orchestrator; fails on invalid exclude patterns
    pub fn new(
        options: OrchestratorOptions,
        tools: Collaborators<'a>,
    ) -> Result<Self, ConfigError> {
        let exclude = compile_excludes(&options.exclude)?;
        Ok(Self {
            options,
            exclude,
            resolver: PackageResolver::new(),
            rewriter: VersionRewriter::new(),
            tools,
        })
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Build `identifiers` in order
    ///
    /// Every identifier is resolved before the first build starts. Package
    /// failures are collected and reported together at the end, unless
    /// stop-on-error is set, in which case the first one aborts the run.
    pub fn run(&self, identifiers: &[String]) -> Result<OrchestrationReport, OrchestrationError> {
        let mut staging = None;
        let params = self.template_params(&mut staging)?;

        let mut cache = IndexCache::new();
        let mut resolved = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            let scan = cache.get_or_scan(&self.resolver, &self.options.pkg_defs, &params)?;
            let metadata = scan.index.get(identifier).cloned().ok_or_else(|| {
                OrchestrationError::UnknownPackage {
                    identifier: identifier.clone(),
                }
            })?;
            resolved.push((identifier.as_str(), metadata));
        }

        let mut report = OrchestrationReport::default();
        for (position, (identifier, metadata)) in resolved.into_iter().enumerate() {
            tracing::info!(
                "[{}/{}] {identifier} ({})",
                position + 1,
                identifiers.len(),
                metadata.package_dir().display()
            );

            if self.options.arch_specific_only && metadata.is_noarch() {
                tracing::info!("Skipping noarch package {identifier}");
                report.push(BuildOutcome::new(identifier, BuildStatus::SkippedArchSpecific));
                continue;
            }

            if self.exclude.is_match(identifier) {
                tracing::info!("Skipping excluded package {identifier}");
                report.push(BuildOutcome::new(identifier, BuildStatus::SkippedExcluded));
                continue;
            }

            match self.build_package(identifier, &metadata, &params, &mut staging) {
                Ok(()) => {
                    tracing::info!("Built {identifier}");
                    report.push(BuildOutcome::new(identifier, BuildStatus::Succeeded));
                }
                Err(source) if self.options.stop_on_error => {
                    return Err(OrchestrationError::Aborted {
                        package: identifier.to_string(),
                        source,
                        report: Box::new(report),
                    });
                }
                Err(error) => {
                    tracing::error!("Failed to build {identifier}: {}", error_chain(&error));
                    report.push(BuildOutcome::failed(identifier, &error));
                }
            }
        }

        let failed = report.failed_identifiers();
        if failed.is_empty() {
            Ok(report)
        } else {
            Err(OrchestrationError::Failed {
                failed,
                report: Box::new(report),
            })
        }
    }

    /// Template parameters with the source checkout root filled in
    fn template_params(
        &self,
        staging: &mut Option<TempDir>,
    ) -> Result<TemplateParams, OrchestrationError> {
        let src_dir = match &self.options.src_dir {
            Some(dir) => dir.clone(),
            None => staging_dir(staging)
                .map_err(OrchestrationError::Staging)?
                .join(DEFAULT_SRC_DIR),
        };
        tracing::debug!("Checking out sources under {}", src_dir.display());

        let mut params = self.options.template_params.clone();
        params.insert(SRC_DIR_PARAM.to_string(), src_dir.display().to_string());
        Ok(params)
    }

    fn build_package(
        &self,
        identifier: &str,
        metadata: &Arc<PackageMetadata>,
        params: &TemplateParams,
        staging: &mut Option<TempDir>,
    ) -> Result<(), PackageBuildError> {
        let mut recipe_dir = metadata.package_dir().to_path_buf();

        if let Some(overwrite) = &self.options.overwrite {
            if is_meta_package(identifier) {
                recipe_dir = self.stage_with_overwrite(metadata, overwrite, staging)?;
            }
        }

        let mut env = params.clone();

        let source_dir = match (metadata.source_path(), metadata.home()) {
            (Some(source_path), Some(home)) => {
                let scratch = staging_dir(staging)
                    .map_err(PackageBuildError::Stage)?
                    .join("scm");
                let dest = resolve_source_path(metadata.package_dir(), source_path);
                let (clone_url, upstream) = match &self.options.repo_url {
                    Some(repo_url) => (repo_url.clone(), Some(home)),
                    None => (source::clone_url(home, self.options.github_https)?, None),
                };
                let checkout = source::materialize(
                    self.tools.source_control,
                    &SourceRequest {
                        home,
                        clone_url: &clone_url,
                        upstream,
                        dest: &dest,
                        reference: self.options.git_ref.as_deref(),
                        scratch: &scratch,
                    },
                )?;
                Some(checkout.path)
            }
            _ => None,
        };

        if metadata.requires_scm_version() {
            if let Some(dir) = &source_dir {
                let version = self.tools.version_scm.derive_version(dir)?;
                tracing::info!("{identifier} version from source: {version}");
                env.insert(PKG_VERSION_ENV.to_string(), version);
            }
        }

        let settings = &self.options.build;
        let request = BuildRequest {
            package: identifier.to_string(),
            recipe_dir,
            output_root: settings.output_root.clone(),
            python: settings.python.clone(),
            numpy: settings.numpy.clone(),
            perl: settings.perl.clone(),
            run_tests: settings.run_tests,
            skip_existing: !settings.force,
            channels: settings.channels.clone(),
            override_channels: settings.override_channels,
            extra_args: settings.extra_args.clone(),
            env,
        };
        self.tools.build_tool.build(&request)?;
        Ok(())
    }

    /// Copy the package into the staging area and overwrite its version there
    fn stage_with_overwrite(
        &self,
        metadata: &PackageMetadata,
        overwrite: &VersionOverwrite,
        staging: &mut Option<TempDir>,
    ) -> Result<PathBuf, PackageBuildError> {
        let dir_name = metadata.dir_name().unwrap_or(metadata.name());
        let staged = staging_dir(staging)
            .map_err(PackageBuildError::Stage)?
            .join("recipes")
            .join(dir_name);
        filesystem::copy_dir_all(metadata.package_dir(), &staged)
            .map_err(PackageBuildError::Stage)?;

        let description = match metadata.path().file_name() {
            Some(file_name) => staged.join(file_name),
            None => staged.clone(),
        };
        let changed = self
            .rewriter
            .rewrite(&description, &overwrite.old, &overwrite.new)
            .map_err(PackageBuildError::Rewrite)?;
        tracing::info!(
            "Overwrote {changed} version line(s) of {} ({} -> {})",
            metadata.name(),
            overwrite.old,
            overwrite.new
        );
        Ok(staged)
    }
}

fn compile_excludes(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidExcludePattern {
            pattern: pattern.clone(),
            error: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ConfigError::InvalidExcludePattern {
            pattern: patterns.join(", "),
            error: e.to_string(),
        })
}

/// Run-owned staging directory, created on first use
fn staging_dir(staging: &mut Option<TempDir>) -> Result<PathBuf, FilesystemError> {
    if let Some(dir) = staging {
        return Ok(dir.path().to_path_buf());
    }
    let dir = tempfile::Builder::new()
        .prefix("ska-builder-")
        .tempdir()
        .map_err(|e| FilesystemError::CreateDir {
            path: std::env::temp_dir(),
            error: e.to_string(),
        })?;
    let path = dir.path().to_path_buf();
    *staging = Some(dir);
    Ok(path)
}

/// Relative source paths are relative to the package directory
fn resolve_source_path(package_dir: &Path, source_path: &str) -> PathBuf {
    let path = Path::new(source_path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        package_dir.join(path)
    }
}

/// Error message including its source chain
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
