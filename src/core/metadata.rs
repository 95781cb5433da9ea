//! Package metadata loading
//!
//! Reads one `meta.yaml` description, expands its Jinja directives with the
//! caller's template parameters, parses the result as YAML and derives the
//! flags the orchestrator needs.

use minijinja::Environment;
use regex::Regex;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::defaults::VERSION_MARKERS;
use crate::error::MetadataError;

/// Template parameter names mapped to their values
pub type TemplateParams = BTreeMap<String, String>;

/// One package's build description
#[derive(Debug, Clone, PartialEq)]
pub struct PackageMetadata {
    path: PathBuf,
    name: String,
    document: Value,
    has_home: bool,
    has_source_path: bool,
    requires_scm_version: bool,
}

impl PackageMetadata {
    /// Path of the description file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the description file
    pub fn package_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Name of the directory containing the description file
    pub fn dir_name(&self) -> Option<&str> {
        self.package_dir().file_name().and_then(|n| n.to_str())
    }

    /// Declared `package.name`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parsed (post-expansion) document
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Declared `about.home`, if any
    pub fn home(&self) -> Option<&str> {
        lookup(&self.document, &["about", "home"]).and_then(non_empty_str)
    }

    /// Declared local source checkout path, if any
    pub fn source_path(&self) -> Option<&str> {
        declared_source_path(&self.document)
    }

    pub fn has_home(&self) -> bool {
        self.has_home
    }

    pub fn has_source_path(&self) -> bool {
        self.has_source_path
    }

    pub fn requires_scm_version(&self) -> bool {
        self.requires_scm_version
    }

    /// Whether the description marks its output as architecture independent
    pub fn is_noarch(&self) -> bool {
        match lookup(&self.document, &["build", "noarch"]) {
            None | Some(Value::Null | Value::Bool(false)) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }
}

/// Loads and validates metadata description files
#[derive(Debug)]
pub struct MetadataLoader {
    env: Environment<'static>,
    markers: Regex,
}

impl Default for MetadataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataLoader {
    /// Create a loader with the no-op `compiler()` directive registered
    pub fn new() -> Self {
        let mut env = Environment::new();
        // Recipes use `{{ compiler('c') }}` to select a toolchain; it has no
        // meaning for resolution and must expand to nothing.
        env.add_function("compiler", |_language: String| String::new());

        let alternatives: Vec<String> = VERSION_MARKERS.iter().map(|m| regex::escape(m)).collect();
        let markers = Regex::new(&alternatives.join("|")).expect("Invalid version marker pattern");

        Self { env, markers }
    }

    /// Load one description file
    pub fn load(
        &self,
        path: &Path,
        params: &TemplateParams,
    ) -> Result<PackageMetadata, MetadataError> {
        let raw = fs::read_to_string(path).map_err(|e| MetadataError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        self.load_str(path, &raw, params)
    }

    /// Load a description from already-read text
    pub fn load_str(
        &self,
        path: &Path,
        raw: &str,
        params: &TemplateParams,
    ) -> Result<PackageMetadata, MetadataError> {
        let expanded = self
            .env
            .render_str(raw, params)
            .map_err(|e| MetadataError::Template {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        let document: Value = if expanded.trim().is_empty() {
            Value::Null
        } else {
            serde_yaml::from_str(&expanded).map_err(|e| MetadataError::Parse {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?
        };

        let name = lookup(&document, &["package", "name"])
            .and_then(scalar_string)
            .ok_or_else(|| MetadataError::MissingName {
                path: path.to_path_buf(),
            })?;

        let has_home = lookup(&document, &["about", "home"])
            .and_then(non_empty_str)
            .is_some();
        let has_source_path = declared_source_path(&document).is_some();

        if has_source_path && !has_home {
            return Err(MetadataError::SourcePathWithoutHome {
                path: path.to_path_buf(),
            });
        }

        // Markers are looked for in the raw text: expansion may erase them.
        let marker = self.markers.find(raw).map(|m| m.as_str().to_string());
        if let Some(marker) = &marker {
            if !(has_source_path && has_home) {
                return Err(MetadataError::VersionMarkerWithoutSource {
                    path: path.to_path_buf(),
                    marker: marker.clone(),
                });
            }
        }

        Ok(PackageMetadata {
            path: path.to_path_buf(),
            name,
            document,
            has_home,
            has_source_path,
            requires_scm_version: marker.is_some(),
        })
    }
}

fn lookup<'a>(doc: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().try_fold(doc, |node, key| node.get(*key))
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `source` may be a single mapping or a list of them
fn declared_source_path(doc: &Value) -> Option<&str> {
    match doc.get("source")? {
        Value::Sequence(sources) => sources
            .iter()
            .find_map(|s| s.get("path").and_then(non_empty_str)),
        source => source.get("path").and_then(non_empty_str),
    }
}
