//! ska-builder CLI
//!
//! Entry point for the ska-builder command-line application.

use anyhow::Result;
use clap::Parser;

use ska_builder::cli::output::{display_error, OutputConfig};
use ska_builder::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Apply output configuration globally
    let output_config = OutputConfig::new(cli.quiet, cli.json, cli.verbose);
    output_config.init_tracing();
    output_config.apply_global();

    match cli.run().await {
        Ok(()) => Ok(()),
        Err(e) => {
            display_error(&e);
            std::process::exit(1);
        }
    }
}
