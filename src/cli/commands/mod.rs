//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod list;
pub mod set_version;

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::config::defaults::DEFAULT_PKG_DEFS_DIR;
use crate::core::rewrite::VersionOverwrite;
use crate::core::settings::BuilderConfig;

/// State shared by all commands
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: BuilderConfig,
    pub json: bool,
    pub current_dir: PathBuf,
}

impl CommandContext {
    /// Resolve `path` against the working directory
    pub fn absolute(&self, path: &std::path::Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir.join(path)
        }
    }
}

/// Where package descriptions and sources live
#[derive(Args, Debug, Clone)]
pub struct PackageArgs {
    /// Root directory of the package definitions
    #[arg(long, value_name = "DIR", default_value = DEFAULT_PKG_DEFS_DIR)]
    pub pkg_defs: PathBuf,

    /// Root under which sources are checked out
    #[arg(long, value_name = "DIR")]
    pub src_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build packages in order
    Build(BuildArgs),

    /// List the package index
    List {
        #[command(flatten)]
        packages: PackageArgs,
    },

    /// Overwrite a version in one description file in place
    SetVersion {
        /// Description file to rewrite
        file: PathBuf,

        /// Version to replace
        old: String,

        /// Replacement version
        new: String,
    },
}

/// Arguments of `ska-builder build`
#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Packages to build, in order (default: the build-order file, else
    /// every package directory)
    pub packages: Vec<String>,

    #[command(flatten)]
    pub location: PackageArgs,

    /// Read the package order from this file
    #[arg(long, value_name = "FILE", conflicts_with = "packages")]
    pub build_list: Option<PathBuf>,

    /// Build output root
    #[arg(long, value_name = "DIR")]
    pub build_root: Option<PathBuf>,

    /// Conda executable
    #[arg(long, value_name = "PATH")]
    pub conda: Option<PathBuf>,

    /// Python version to build for
    #[arg(long)]
    pub python: Option<String>,

    /// Numpy version to build against
    #[arg(long)]
    pub numpy: Option<String>,

    /// Perl version to build against
    #[arg(long)]
    pub perl: Option<String>,

    /// Additional channel (repeatable)
    #[arg(short = 'c', long = "channel", value_name = "CHANNEL")]
    pub channels: Vec<String>,

    /// Search only the given channels
    #[arg(long)]
    pub override_channels: bool,

    /// Rebuild packages already present in the output
    #[arg(long)]
    pub force: bool,

    /// Run the package tests after building
    #[arg(long)]
    pub test: bool,

    /// Build only architecture-specific packages
    #[arg(long)]
    pub arch_specific: bool,

    /// Skip packages matching this glob (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Replace version OLD with NEW in meta-packages before building; a
    /// single pre-release NEW such as 2024.1rc2 implies OLD 2024.1
    #[arg(long, value_name = "[OLD:]NEW")]
    pub overwrite_version: Option<VersionOverwrite>,

    /// Check out this tag, branch or commit instead of the latest tag
    #[arg(long = "ref", value_name = "REF")]
    pub git_ref: Option<String>,

    /// Clone from this URL instead of the package's home, which still
    /// supplies the tags
    #[arg(long, value_name = "URL")]
    pub repo_url: Option<String>,

    /// Clone GitHub repositories over https
    #[arg(long)]
    pub github_https: bool,

    /// Stop at the first failing package
    #[arg(long)]
    pub stop_on_error: bool,

    /// Extra arguments passed to conda build
    #[arg(last = true, value_name = "CONDA_ARGS")]
    pub extra_args: Vec<String>,
}

impl Commands {
    /// Execute the command
    pub async fn run(self, context: &CommandContext) -> Result<()> {
        match self {
            Self::Build(args) => build::execute(context, args).await,
            Self::List { packages } => list::execute(context, &packages).await,
            Self::SetVersion { file, old, new } => {
                set_version::execute(context, &file, &old, &new).await
            }
        }
    }
}
