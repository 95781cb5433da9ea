//! Set-version command implementation
//!
//! Implements `ska-builder set-version <file> <old> <new>`, rewriting one
//! description file in place.

use anyhow::{bail, Context, Result};
use serde_json::json;
use std::path::Path;

use super::CommandContext;
use crate::cli::output::{status, OutputConfig};
use crate::core::rewrite::VersionRewriter;

/// Execute the set-version command
pub async fn execute(context: &CommandContext, file: &Path, old: &str, new: &str) -> Result<()> {
    let path = context.absolute(file);
    if !path.is_file() {
        bail!("Description file not found: {}", path.display());
    }

    let changed = VersionRewriter::new()
        .rewrite(&path, old, new)
        .with_context(|| format!("Failed to set version in {}", path.display()))?;

    if context.json {
        println!(
            "{}",
            json!({ "file": path, "old": old, "new": new, "changed_lines": changed })
        );
    } else if OutputConfig::current().show_messages() {
        if changed == 0 {
            println!("{} No lines with version {old} in {}", status::INFO, path.display());
        } else {
            println!(
                "{} Updated {changed} line(s) in {}: {old} -> {new}",
                status::SUCCESS,
                path.display()
            );
        }
    }
    Ok(())
}
