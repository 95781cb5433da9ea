//! Output formatting and progress indicators
//!
//! This module provides the output mode shared by all commands, logging
//! setup, spinners, and formatted messages to the user.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::core::orchestrator::{BuildStatus, OrchestrationReport};

static OUTPUT: OnceLock<OutputConfig> = OnceLock::new();

/// Output mode selected on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    pub quiet: bool,
    pub json: bool,
    pub verbose: u8,
}

impl OutputConfig {
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self {
            quiet,
            json,
            verbose,
        }
    }

    /// Make this the process-wide output mode; the first call wins
    pub fn apply_global(self) {
        let _ = OUTPUT.set(self);
    }

    /// Process-wide output mode, default if never applied
    pub fn current() -> Self {
        OUTPUT.get().copied().unwrap_or_default()
    }

    /// Default log level for this mode
    pub fn log_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }

    /// Human-readable messages are printed
    pub fn show_messages(&self) -> bool {
        !self.quiet && !self.json
    }

    /// Initialize the tracing subscriber; `RUST_LOG` takes precedence
    pub fn init_tracing(&self) {
        let filter = EnvFilter::builder()
            .with_default_directive(self.log_level().into())
            .from_env_lossy();
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(self.verbose > 1)
            .init();
    }
}

/// Print an error and its causes to stderr
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} Error: {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}

/// Create a spinner for operations with unknown duration
///
/// Hidden unless messages are shown and stderr is a terminal.
pub fn create_spinner(message: &str) -> ProgressBar {
    if !OutputConfig::current().show_messages() || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.blue} {msg}")
            .expect("Invalid spinner template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Print one line per outcome followed by totals
pub fn print_report(report: &OrchestrationReport) {
    for outcome in report.outcomes() {
        let id = &outcome.identifier;
        match outcome.status {
            BuildStatus::Succeeded => println!("{} {id}", status::SUCCESS),
            BuildStatus::SkippedArchSpecific => {
                println!("{} {id} (skipped: noarch)", status::INFO);
            }
            BuildStatus::SkippedExcluded => println!("{} {id} (skipped: excluded)", status::INFO),
            BuildStatus::Failed => match &outcome.error {
                Some(error) => println!("{} {id}: {error}", status::ERROR),
                None => println!("{} {id}", status::ERROR),
            },
        }
    }
    println!(
        "\n{} succeeded, {} failed, {} skipped",
        report.count(BuildStatus::Succeeded),
        report.count(BuildStatus::Failed),
        report.count(BuildStatus::SkippedArchSpecific) + report.count(BuildStatus::SkippedExcluded)
    );
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}
