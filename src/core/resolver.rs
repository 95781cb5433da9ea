//! Package resolution
//!
//! Scans a package definitions tree and maps every alias of a package
//! (directory name, declared name, `org/repo` home slug) to its metadata.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;
use walkdir::WalkDir;

use crate::config::defaults::METADATA_FILENAMES;
use crate::core::metadata::{MetadataLoader, PackageMetadata, TemplateParams};
use crate::error::{MetadataError, OrchestrationError};

/// Alias → metadata lookup
#[derive(Debug, Default)]
pub struct PackageIndex {
    entries: BTreeMap<String, Arc<PackageMetadata>>,
}

impl PackageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a package by any of its aliases
    pub fn get(&self, alias: &str) -> Option<&Arc<PackageMetadata>> {
        self.entries.get(alias)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    /// Number of aliases (not packages)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Aliases in sorted order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<PackageMetadata>)> {
        self.entries.iter().map(|(alias, meta)| (alias.as_str(), meta))
    }

    /// Insert an alias, returning the entry it replaced
    pub fn insert(
        &mut self,
        alias: String,
        metadata: Arc<PackageMetadata>,
    ) -> Option<Arc<PackageMetadata>> {
        self.entries.insert(alias, metadata)
    }
}

/// A description file that could not be loaded
#[derive(Debug)]
pub struct LoadDiagnostic {
    pub path: PathBuf,
    pub error: MetadataError,
}

/// An alias claimed by two different description files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasCollision {
    pub alias: String,
    /// Description that held the alias before
    pub previous: PathBuf,
    /// Description that now holds it (last scanned wins)
    pub winner: PathBuf,
}

/// Result of one scan of a package definitions tree
#[derive(Debug, Default)]
pub struct IndexScan {
    pub index: PackageIndex,
    pub diagnostics: Vec<LoadDiagnostic>,
    pub collisions: Vec<AliasCollision>,
}

/// Builds package indexes
#[derive(Debug, Default)]
pub struct PackageResolver {
    loader: MetadataLoader,
}

impl PackageResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loader(loader: MetadataLoader) -> Self {
        Self { loader }
    }

    /// Scan `root` and index every loadable description
    ///
    /// Descriptions that fail to load are reported in
    /// [`IndexScan::diagnostics`] and left out of the index.
    pub fn build_index(
        &self,
        root: &Path,
        params: &TemplateParams,
    ) -> Result<IndexScan, OrchestrationError> {
        if !root.is_dir() {
            return Err(OrchestrationError::MissingScanRoot {
                path: root.to_path_buf(),
            });
        }

        let (paths, unreadable) = discover_descriptions(root);
        let mut scan = IndexScan {
            diagnostics: unreadable,
            ..IndexScan::default()
        };
        for path in paths {
            match self.loader.load(&path, params) {
                Ok(metadata) => add_package(&mut scan, Arc::new(metadata)),
                Err(error) => {
                    tracing::warn!("Skipping {}: {error}", path.display());
                    scan.diagnostics.push(LoadDiagnostic { path, error });
                }
            }
        }

        tracing::debug!(
            "Indexed {} aliases under {} ({} skipped)",
            scan.index.len(),
            root.display(),
            scan.diagnostics.len()
        );
        Ok(scan)
    }
}

/// Every description file under `root`, in lexicographic path order
///
/// Entries the walk cannot read are returned as diagnostics instead.
pub fn discover_descriptions(root: &Path) -> (Vec<PathBuf>, Vec<LoadDiagnostic>) {
    let mut found = Vec::new();
    let mut unreadable = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                tracing::warn!("Cannot read {}: {e}", path.display());
                unreadable.push(LoadDiagnostic {
                    error: MetadataError::Read {
                        path: path.clone(),
                        error: e.to_string(),
                    },
                    path,
                });
                continue;
            }
        };
        let is_description = entry
            .file_name()
            .to_str()
            .is_some_and(|name| METADATA_FILENAMES.contains(&name));
        if entry.file_type().is_file() && is_description {
            found.push(entry.into_path());
        }
    }
    (found, unreadable)
}

/// Aliases a package is reachable under
pub fn aliases(metadata: &PackageMetadata) -> Vec<String> {
    let mut aliases = Vec::with_capacity(3);
    if let Some(dir_name) = metadata.dir_name() {
        aliases.push(dir_name.to_string());
    }
    aliases.push(metadata.name().to_string());
    if let Some(slug) = metadata.home().and_then(home_slug) {
        aliases.push(slug);
    }
    aliases.dedup();
    aliases
}

/// `org/repo` from a home URL such as `https://github.com/org/repo`
pub fn home_slug(home: &str) -> Option<String> {
    let url = Url::parse(home).ok()?;
    let segments: Vec<&str> = url
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .collect();
    match segments.as_slice() {
        [.., org, repo] => {
            let repo = repo.strip_suffix(".git").unwrap_or(*repo);
            Some(format!("{org}/{repo}"))
        }
        _ => None,
    }
}

fn add_package(scan: &mut IndexScan, metadata: Arc<PackageMetadata>) {
    for alias in aliases(&metadata) {
        if let Some(previous) = scan.index.insert(alias.clone(), Arc::clone(&metadata)) {
            if !Arc::ptr_eq(&previous, &metadata) {
                tracing::warn!(
                    "Alias '{alias}' of {} is replaced by {}",
                    previous.path().display(),
                    metadata.path().display()
                );
                scan.collisions.push(AliasCollision {
                    alias,
                    previous: previous.path().to_path_buf(),
                    winner: metadata.path().to_path_buf(),
                });
            }
        }
    }
}

/// Memoized scans, keyed by root and template parameters
///
/// Owned by one orchestration run and dropped with it.
#[derive(Debug, Default)]
pub struct IndexCache {
    scans: HashMap<(PathBuf, TemplateParams), Arc<IndexScan>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached scan for these inputs, scanning on first use
    pub fn get_or_scan(
        &mut self,
        resolver: &PackageResolver,
        root: &Path,
        params: &TemplateParams,
    ) -> Result<Arc<IndexScan>, OrchestrationError> {
        let key = (root.to_path_buf(), params.clone());
        if let Some(scan) = self.scans.get(&key) {
            return Ok(Arc::clone(scan));
        }
        let scan = Arc::new(resolver.build_index(root, params)?);
        self.scans.insert(key, Arc::clone(&scan));
        Ok(scan)
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }
}
