//! List command implementation
//!
//! Implements `ska-builder list`: scans the package definitions and prints
//! every alias with the directory it resolves to, followed by load
//! diagnostics and alias collisions.

use anyhow::{Context, Result};
use serde_json::json;

use super::{CommandContext, PackageArgs};
use crate::cli::output::{create_spinner, status, OutputConfig};
use crate::config::defaults::SRC_DIR_PARAM;
use crate::core::metadata::TemplateParams;
use crate::core::resolver::{IndexScan, PackageResolver};

/// Execute the list command
pub async fn execute(context: &CommandContext, args: &PackageArgs) -> Result<()> {
    let pkg_defs = context.absolute(&args.pkg_defs);
    let src_dir = context.absolute(
        &args
            .src_dir
            .clone()
            .unwrap_or_else(|| context.config.src_dir()),
    );
    let mut params = TemplateParams::new();
    params.insert(SRC_DIR_PARAM.to_string(), src_dir.display().to_string());

    let spinner = create_spinner(&format!("Scanning {}", pkg_defs.display()));
    let scan = tokio::task::spawn_blocking(move || {
        PackageResolver::new().build_index(&pkg_defs, &params)
    })
    .await
    .context("Scan task panicked")?;
    spinner.finish_and_clear();
    let scan = scan?;

    if context.json {
        println!("{}", serde_json::to_string_pretty(&scan_json(&scan))?);
        return Ok(());
    }

    for (alias, metadata) in scan.index.iter() {
        println!("{alias} -> {}", metadata.package_dir().display());
    }

    if OutputConfig::current().show_messages() {
        for diagnostic in &scan.diagnostics {
            println!("{} {}", status::WARNING, diagnostic.error);
        }
        for collision in &scan.collisions {
            println!(
                "{} '{}' is claimed by {} and {}; using {}",
                status::WARNING,
                collision.alias,
                collision.previous.display(),
                collision.winner.display(),
                collision.winner.display()
            );
        }
    }
    Ok(())
}

fn scan_json(scan: &IndexScan) -> serde_json::Value {
    let packages: Vec<_> = scan
        .index
        .iter()
        .map(|(alias, metadata)| {
            json!({
                "alias": alias,
                "name": metadata.name(),
                "path": metadata.path(),
                "noarch": metadata.is_noarch(),
            })
        })
        .collect();
    let diagnostics: Vec<_> = scan
        .diagnostics
        .iter()
        .map(|d| json!({ "path": d.path, "error": d.error.to_string() }))
        .collect();
    let collisions: Vec<_> = scan
        .collisions
        .iter()
        .map(|c| json!({ "alias": c.alias, "previous": c.previous, "winner": c.winner }))
        .collect();

    json!({
        "packages": packages,
        "diagnostics": diagnostics,
        "collisions": collisions,
    })
}
