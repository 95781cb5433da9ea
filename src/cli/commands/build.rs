//! Build command implementation
//!
//! Implements `ska-builder build`: merges command-line flags with the
//! configuration file and runs the orchestrator on a blocking thread.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::{BuildArgs, CommandContext};
use crate::cli::output::{self, OutputConfig};
use crate::config::defaults::BUILD_ORDER_FILENAME;
use crate::core::build_order;
use crate::core::orchestrator::{
    BuildOrchestrator, BuildSettings, Collaborators, OrchestrationReport, OrchestratorOptions,
};
use crate::error::OrchestrationError;
use crate::infra::conda::CondaBuild;
use crate::infra::git::GitOperations;
use crate::infra::version_scm::SetuptoolsScmVersion;

/// Execute the build command
pub async fn execute(context: &CommandContext, args: BuildArgs) -> Result<()> {
    let pkg_defs = context.absolute(&args.location.pkg_defs);
    let identifiers = identifiers(context, &args, &pkg_defs)?;
    if identifiers.is_empty() {
        tracing::warn!("No packages to build");
        return Ok(());
    }

    let conda = args.conda.clone().or_else(|| context.config.build.conda.clone());
    let python = context.config.source_python();
    let options = options(context, args, pkg_defs);

    tracing::info!("Building {} package(s)", identifiers.len());
    let result = tokio::task::spawn_blocking(move || -> Result<_> {
        let build_tool = CondaBuild::locate(conda.as_deref())?;
        let source_control = GitOperations::new();
        let version_scm = SetuptoolsScmVersion::new(python);
        let orchestrator = BuildOrchestrator::new(
            options,
            Collaborators {
                build_tool: &build_tool,
                source_control: &source_control,
                version_scm: &version_scm,
            },
        )?;
        Ok(orchestrator.run(&identifiers))
    })
    .await
    .context("Build task panicked")??;

    let report = match &result {
        Ok(report) => Some(report),
        Err(error) => error.report(),
    };
    if let Some(report) = report {
        show_report(context, report)?;
    }

    result.map(|_| ()).map_err(|e| match e {
        OrchestrationError::Aborted { .. } => anyhow::Error::new(e),
        _ => anyhow::Error::new(e).context("Build failed"),
    })
}

/// Explicit packages, else a build-order file, else every package directory
fn identifiers(context: &CommandContext, args: &BuildArgs, pkg_defs: &Path) -> Result<Vec<String>> {
    if !args.packages.is_empty() {
        return Ok(args.packages.clone());
    }
    if let Some(build_list) = &args.build_list {
        return Ok(build_order::read(&context.absolute(build_list))?);
    }
    if !pkg_defs.is_dir() {
        return Err(OrchestrationError::MissingScanRoot {
            path: pkg_defs.to_path_buf(),
        }
        .into());
    }

    let order_file = pkg_defs.join(BUILD_ORDER_FILENAME);
    if order_file.is_file() {
        return Ok(build_order::read(&order_file)?);
    }
    tracing::debug!("No {BUILD_ORDER_FILENAME}, building every package directory");
    Ok(build_order::package_dirs(pkg_defs)?)
}

/// Command-line flags over config file values over defaults
fn options(context: &CommandContext, args: BuildArgs, pkg_defs: PathBuf) -> OrchestratorOptions {
    let config = &context.config;

    let src_dir = args
        .location
        .src_dir
        .or_else(|| config.source.src_dir.clone())
        .map(|dir| context.absolute(&dir));

    let mut channels = config.channels().to_vec();
    channels.extend(args.channels);

    let mut extra_args = config.extra_args().to_vec();
    extra_args.extend(args.extra_args);

    let mut exclude = config.exclude().to_vec();
    exclude.extend(args.exclude);

    OrchestratorOptions {
        pkg_defs,
        template_params: Default::default(),
        src_dir,
        arch_specific_only: args.arch_specific || config.arch_specific(),
        exclude,
        overwrite: args.overwrite_version,
        git_ref: args.git_ref,
        repo_url: args.repo_url,
        github_https: args.github_https || config.github_https(),
        stop_on_error: args.stop_on_error,
        build: BuildSettings {
            output_root: context.absolute(&args.build_root.unwrap_or_else(|| config.build_root())),
            python: Some(args.python.unwrap_or_else(|| config.python_version().to_string())),
            numpy: Some(args.numpy.unwrap_or_else(|| config.numpy_version().to_string())),
            perl: Some(args.perl.unwrap_or_else(|| config.perl_version().to_string())),
            run_tests: args.test,
            force: args.force,
            channels,
            override_channels: args.override_channels || config.override_channels(),
            extra_args,
        },
    }
}

fn show_report(context: &CommandContext, report: &OrchestrationReport) -> Result<()> {
    if context.json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else if OutputConfig::current().show_messages() {
        output::print_report(report);
    }
    Ok(())
}
