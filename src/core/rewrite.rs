//! Pre-release version overwrite
//!
//! Line-oriented substitution of one version string for another in a
//! metadata description. Only two line shapes are touched:
//!
//! - `version: <current>`
//! - `<meta-package> ==<current>` (optionally as a YAML list item)
//!
//! Both shapes are searched for anywhere in the line, so list items such
//! as `- version: <current>` match too. This is a text transform, not a
//! YAML rewrite: a `version:` key whose value sits on the next line is
//! left alone.

use regex::Regex;
use std::path::Path;
use std::str::FromStr;

use crate::config::defaults::META_PACKAGE_PATTERN;
use crate::error::{ConfigError, FilesystemError};
use crate::infra::filesystem;

/// Pre-release version: release segment, `aN`/`bN`/`rcN`, optional `+label`
const PRE_RELEASE_PATTERN: &str = r"^(?P<release>\S+)(?:a|b|rc)[0-9]+(?:\+(?P<label>\S+))?$";

/// `[OLD:]NEW` version overwrite directive
///
/// A lone `NEW` must be a pre-release; `OLD` is then `NEW` without its
/// pre-release segment, keeping any label (`2024.1rc2+lbl` replaces
/// `2024.1+lbl`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionOverwrite {
    pub old: String,
    pub new: String,
}

impl VersionOverwrite {
    fn from_pre_release(value: &str) -> Option<Self> {
        let pattern = Regex::new(PRE_RELEASE_PATTERN).expect("Invalid pre-release pattern");
        let caps = pattern.captures(value)?;
        let old = match caps.name("label") {
            Some(label) => format!("{}+{}", &caps["release"], label.as_str()),
            None => caps["release"].to_string(),
        };
        Some(Self {
            old,
            new: value.to_string(),
        })
    }
}

impl FromStr for VersionOverwrite {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidOverwrite {
            value: value.to_string(),
        };
        let Some((old, new)) = value.split_once(':') else {
            return Self::from_pre_release(value.trim()).ok_or_else(invalid);
        };
        let (old, new) = (old.trim(), new.trim());
        if old.is_empty() || new.is_empty() || new.contains(':') {
            return Err(invalid());
        }
        Ok(Self {
            old: old.to_string(),
            new: new.to_string(),
        })
    }
}

/// Rewrites version strings in description files
#[derive(Debug, Clone)]
pub struct VersionRewriter {
    version_line: Regex,
    pinned_line: Regex,
    meta_package: Regex,
}

impl Default for VersionRewriter {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionRewriter {
    pub fn new() -> Self {
        Self {
            version_line: Regex::new(r"version\s*:\s*(\S+)").expect("Invalid version pattern"),
            pinned_line: Regex::new(r"(\S+?)\s*==\s*(\S+)")
                .expect("Invalid pinned dependency pattern"),
            meta_package: meta_package_regex(),
        }
    }

    /// Rewrite one line; `None` when the line is left as-is
    pub fn rewrite_line(&self, line: &str, current: &str, new: &str) -> Option<String> {
        let declares_version = self
            .version_line
            .captures(line)
            .is_some_and(|caps| &caps[1] == current);

        let pins_meta_package = self.pinned_line.captures(line).is_some_and(|caps| {
            self.meta_package.is_match(&caps[1]) && &caps[2] == current
        });

        if declares_version || pins_meta_package {
            Some(line.replace(current, new))
        } else {
            None
        }
    }

    /// Rewrite a whole text, keeping line endings; returns the new text and
    /// the number of changed lines
    pub fn rewrite_text(&self, text: &str, current: &str, new: &str) -> (String, usize) {
        let mut out = String::with_capacity(text.len());
        let mut changed = 0;
        for line in text.split_inclusive('\n') {
            let (body, ending) = split_line_ending(line);
            match self.rewrite_line(body, current, new) {
                Some(rewritten) if rewritten != body => {
                    changed += 1;
                    out.push_str(&rewritten);
                }
                _ => out.push_str(body),
            }
            out.push_str(ending);
        }
        (out, changed)
    }

    /// Rewrite a file in place
    ///
    /// The new content is written to a sibling temporary file which then
    /// replaces the original, so readers never observe a partial file.
    /// Returns the number of changed lines; the file is not touched when
    /// nothing matched.
    pub fn rewrite(&self, path: &Path, current: &str, new: &str) -> Result<usize, FilesystemError> {
        let text = filesystem::read_file(path)?;
        let (rewritten, changed) = self.rewrite_text(&text, current, new);
        if changed > 0 {
            filesystem::write_file_atomic(path, &rewritten)?;
            tracing::debug!(
                "Rewrote {changed} line(s) of {} from {current} to {new}",
                path.display()
            );
        }
        Ok(changed)
    }
}

/// Whether an identifier follows the meta-package naming convention
pub fn is_meta_package(identifier: &str) -> bool {
    meta_package_regex().is_match(identifier)
}

fn meta_package_regex() -> Regex {
    Regex::new(META_PACKAGE_PATTERN).expect("Invalid meta-package pattern")
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}
