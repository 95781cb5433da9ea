//! Build-order file handling
//!
//! A build-order file lists one package identifier per line. Blank lines
//! and lines whose first non-blank character is `#` are ignored. Without
//! one, every package directory is built in name order.

use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// Identifiers listed in build-order text, in file order
pub fn parse(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect()
}

/// Read and parse a build-order file
pub fn read(path: &Path) -> Result<Vec<String>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::BuildOrder {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    let identifiers = parse(&text);
    tracing::debug!("Read {} identifiers from {}", identifiers.len(), path.display());
    Ok(identifiers)
}

/// Names of the sub-directories of `root`, sorted
pub fn package_dirs(root: &Path) -> Result<Vec<String>, ConfigError> {
    let read_error = |error: std::io::Error| ConfigError::BuildOrder {
        path: root.to_path_buf(),
        error: error.to_string(),
    };
    let mut names = Vec::new();
    for entry in fs::read_dir(root).map_err(read_error)? {
        let entry = entry.map_err(read_error)?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
