//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::core::settings::BuilderConfig;
use crate::infra::dirs::BuilderDirs;
use commands::{CommandContext, Commands};

/// ska-builder - build interdependent conda packages in order
///
/// Resolves package names to their meta.yaml descriptions, checks out
/// upstream sources and runs conda build for each package.
#[derive(Parser, Debug)]
#[command(name = "ska-builder")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (default: <config dir>/ska-builder/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        let Some(command) = self.command else {
            use clap::CommandFactory;
            let mut cmd = Self::command();
            cmd.print_help()?;
            return Ok(());
        };

        let config = match &self.config {
            Some(path) if !path.is_file() => {
                bail!("Config file not found: {}", path.display());
            }
            Some(path) => BuilderConfig::load_from_path(path),
            None => BuilderConfig::load(&BuilderDirs::new()),
        }
        .context("Failed to load configuration")?;

        let context = CommandContext {
            config,
            json: self.json,
            current_dir: std::env::current_dir()?,
        };
        command.run(&context).await
    }
}
