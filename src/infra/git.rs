//! Git operations
//!
//! Fetches upstream repositories, lists their tags and checks out
//! references using the gix crate.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::source::{SourceControl, TagInfo};

/// Git operation errors
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to clone repository
    #[error("Failed to clone '{url}': {error}")]
    CloneFailed { url: String, error: String },

    /// Failed to checkout ref
    #[error("Failed to checkout ref '{reference}' in '{repo}': {error}")]
    CheckoutFailed {
        repo: String,
        reference: String,
        error: String,
    },

    /// Failed to resolve ref to SHA
    #[error("Failed to resolve ref '{reference}' to SHA: {error}")]
    ResolveFailed { reference: String, error: String },

    /// IO error
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },

    /// Invalid repository
    #[error("Invalid repository at '{path}': {error}")]
    InvalidRepository { path: PathBuf, error: String },

    /// Checkout destination already holds files
    #[error("Checkout destination '{path}' already exists and is not empty")]
    DestinationNotEmpty { path: PathBuf },

    /// Failed to fetch tags from an additional remote
    #[error("Failed to fetch tags from '{url}': {error}")]
    FetchTagsFailed { url: String, error: String },
}

/// Branch created in the scratch mirror to pin the commit being checked out
const CHECKOUT_BRANCH: &str = "ska-builder-checkout";

/// Git repository operations
#[derive(Debug, Default, Clone, Copy)]
pub struct GitOperations;

impl GitOperations {
    /// Create a new git operations handler
    pub fn new() -> Self {
        Self
    }

    fn open(repo_path: &Path) -> Result<gix::Repository, GitError> {
        gix::open(repo_path).map_err(|e| GitError::InvalidRepository {
            path: repo_path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Remove a scratch mirror left over from an earlier fetch
    fn clear(path: &Path) -> Result<(), GitError> {
        if path.exists() {
            std::fs::remove_dir_all(path).map_err(|e| GitError::IoError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Refuse destinations holding files and create missing parents
    ///
    /// Existing content is never removed.
    fn prepare_destination(dest: &Path) -> Result<(), GitError> {
        let io_error = |error: std::io::Error| GitError::IoError {
            path: dest.to_path_buf(),
            error: error.to_string(),
        };
        if dest.exists() {
            let mut entries = std::fs::read_dir(dest).map_err(io_error)?;
            if entries.next().is_some() {
                return Err(GitError::DestinationNotEmpty {
                    path: dest.to_path_buf(),
                });
            }
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GitError::IoError {
                path: parent.to_path_buf(),
                error: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Resolve a tag, branch or commit id to a commit of `repo`
    ///
    /// Branches of a bare mirror live under `origin/`, so that prefix is
    /// tried when the plain name does not resolve.
    fn resolve_commit(
        repo: &gix::Repository,
        reference: &str,
    ) -> Result<gix::ObjectId, GitError> {
        let resolve_error = |error: String| GitError::ResolveFailed {
            reference: reference.to_string(),
            error,
        };
        let id = match repo.rev_parse_single(reference) {
            Ok(id) => id,
            Err(first) => repo
                .rev_parse_single(format!("origin/{reference}").as_str())
                .map_err(|_| resolve_error(first.to_string()))?,
        };
        let commit = id
            .object()
            .map_err(|e| resolve_error(e.to_string()))?
            .peel_to_commit()
            .map_err(|e| resolve_error(e.to_string()))?;
        Ok(commit.id)
    }

    /// Resolve a ref name to its commit SHA, if the ref exists
    fn peel_to_sha(
        repo: &gix::Repository,
        reference_name: &str,
    ) -> Result<Option<String>, GitError> {
        let Ok(mut reference) = repo.find_reference(reference_name) else {
            return Ok(None);
        };
        let commit = reference.peel_to_commit().map_err(|e| GitError::ResolveFailed {
            reference: reference_name.to_string(),
            error: e.to_string(),
        })?;
        Ok(Some(commit.id().to_hex().to_string()))
    }
}

impl SourceControl for GitOperations {
    /// Bare clone of the full history into `scratch`
    fn fetch(&self, url: &str, scratch: &Path) -> Result<PathBuf, GitError> {
        let dest = scratch.join(mirror_dir_name(url));
        Self::clear(&dest)?;
        std::fs::create_dir_all(scratch).map_err(|e| GitError::IoError {
            path: scratch.to_path_buf(),
            error: e.to_string(),
        })?;

        let clone_error = |error: String| GitError::CloneFailed {
            url: url.to_string(),
            error,
        };

        let mut prepare =
            gix::prepare_clone_bare(url, &dest).map_err(|e| clone_error(e.to_string()))?;
        let (_repo, _outcome) = prepare
            .fetch_only(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
            .map_err(|e| clone_error(e.to_string()))?;

        tracing::debug!("Fetched {url} into {}", dest.display());
        Ok(dest)
    }

    fn list_tags(&self, repo_path: &Path) -> Result<Vec<TagInfo>, GitError> {
        let repo = Self::open(repo_path)?;
        let invalid = |error: String| GitError::InvalidRepository {
            path: repo_path.to_path_buf(),
            error,
        };

        let references = repo.references().map_err(|e| invalid(e.to_string()))?;
        let tags = references.tags().map_err(|e| invalid(e.to_string()))?;

        let mut found = Vec::new();
        for reference in tags {
            let mut reference = reference.map_err(|e| invalid(e.to_string()))?;
            let name = reference.name().shorten().to_string();
            let resolve_error = |error: String| GitError::ResolveFailed {
                reference: name.clone(),
                error,
            };

            let commit = reference
                .peel_to_commit()
                .map_err(|e| resolve_error(e.to_string()))?;
            let time = commit.time().map_err(|e| resolve_error(e.to_string()))?;

            found.push(TagInfo {
                commit: commit.id().to_hex().to_string(),
                timestamp: time.seconds,
                name,
            });
        }
        Ok(found)
    }

    fn branch_head(&self, repo_path: &Path, branch: &str) -> Result<Option<String>, GitError> {
        let repo = Self::open(repo_path)?;

        // Try remote branch first (origin/<branch>)
        if let Some(sha) = Self::peel_to_sha(&repo, &format!("refs/remotes/origin/{branch}"))? {
            return Ok(Some(sha));
        }
        Self::peel_to_sha(&repo, &format!("refs/heads/{branch}"))
    }

    fn fetch_tags(&self, repo_path: &Path, url: &str) -> Result<(), GitError> {
        let repo = Self::open(repo_path)?;
        let fetch_error = |error: String| GitError::FetchTagsFailed {
            url: url.to_string(),
            error,
        };

        let remote = repo
            .remote_at(url)
            .map_err(|e| fetch_error(e.to_string()))?
            .with_refspecs(Some("+refs/tags/*:refs/tags/*"), gix::remote::Direction::Fetch)
            .map_err(|e| fetch_error(e.to_string()))?;
        let connection = remote
            .connect(gix::remote::Direction::Fetch)
            .map_err(|e| fetch_error(e.to_string()))?;
        connection
            .prepare_fetch(gix::progress::Discard, Default::default())
            .map_err(|e| fetch_error(e.to_string()))?
            .receive(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
            .map_err(|e| fetch_error(e.to_string()))?;

        tracing::debug!("Fetched tags of {url} into {}", repo_path.display());
        Ok(())
    }

    /// Clone the fetched repository into `dest` with `reference` checked out
    ///
    /// `reference` may be a tag, a branch or a commit id. It is resolved in
    /// the scratch mirror and pinned to a local branch, which is what the
    /// clone checks out.
    fn checkout(&self, repo: &Path, reference: &str, dest: &Path) -> Result<PathBuf, GitError> {
        Self::prepare_destination(dest)?;

        let checkout_error = |error: String| GitError::CheckoutFailed {
            repo: repo.display().to_string(),
            reference: reference.to_string(),
            error,
        };

        let mirror = Self::open(repo)?;
        let commit = Self::resolve_commit(&mirror, reference)?;
        mirror
            .reference(
                format!("refs/heads/{CHECKOUT_BRANCH}").as_str(),
                commit,
                gix::refs::transaction::PreviousValue::Any,
                format!("checkout {reference}"),
            )
            .map_err(|e| checkout_error(e.to_string()))?;
        tracing::debug!("Resolved {reference} to {commit}");

        let source = repo.to_string_lossy().into_owned();
        let prepare = gix::prepare_clone(source.as_str(), dest)
            .map_err(|e| checkout_error(e.to_string()))?;
        let mut prepare = prepare
            .with_ref_name(Some(CHECKOUT_BRANCH))
            .map_err(|e| checkout_error(e.to_string()))?;

        let (mut checkout, _outcome) = prepare
            .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
            .map_err(|e| checkout_error(e.to_string()))?;
        let (_repo, _outcome) = checkout
            .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
            .map_err(|e| checkout_error(e.to_string()))?;

        Ok(dest.to_path_buf())
    }
}

/// Directory name for the scratch clone of `url`
fn mirror_dir_name(url: &str) -> String {
    let last = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("repo");
    let stem = last.strip_suffix(".git").unwrap_or(last);
    format!("{stem}.git")
}
