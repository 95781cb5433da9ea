//! Source materialization
//!
//! Decides which upstream reference of a package to check out and drives
//! a [`SourceControl`] implementation to do it.

use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::config::defaults::{GITHUB_HOST, PRIMARY_BRANCHES};
use crate::core::resolver::home_slug;
use crate::infra::git::GitError;

/// Source checkout errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// Underlying git operation failed
    #[error(transparent)]
    Git(#[from] GitError),

    /// No reference requested and the repository has no tags
    #[error("Repository '{url}' has no tags to check out")]
    NoTags { url: String },

    /// Home URL cannot be turned into a clone URL
    #[error("Cannot derive a clone URL from home '{home}'")]
    InvalidHome { home: String },
}

/// A tag and the commit it points to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInfo {
    pub name: String,
    pub commit: String,
    /// Commit time, seconds since the epoch
    pub timestamp: i64,
}

/// Source-control operations needed to materialize a package source
pub trait SourceControl {
    /// Fetch the full history of `url` into a scratch repository under `scratch`
    fn fetch(&self, url: &str, scratch: &Path) -> Result<PathBuf, GitError>;

    /// All tags of a fetched repository, in discovery order
    fn list_tags(&self, repo: &Path) -> Result<Vec<TagInfo>, GitError>;

    /// Head commit of `branch`, or `None` if the branch does not exist
    fn branch_head(&self, repo: &Path, branch: &str) -> Result<Option<String>, GitError>;

    /// Fetch the tags of another remote into a fetched repository
    fn fetch_tags(&self, repo: &Path, url: &str) -> Result<(), GitError>;

    /// Check out `reference` from a fetched repository into `dest`
    fn checkout(&self, repo: &Path, reference: &str, dest: &Path) -> Result<PathBuf, GitError>;
}

/// What to materialize and where
#[derive(Debug, Clone)]
pub struct SourceRequest<'a> {
    pub home: &'a str,
    pub clone_url: &'a str,
    /// Remote whose tags are merged in when cloning from a fork
    pub upstream: Option<&'a str>,
    pub dest: &'a Path,
    /// Explicit reference; latest tag when `None`
    pub reference: Option<&'a str>,
    pub scratch: &'a Path,
}

/// A materialized source checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCheckout {
    pub path: PathBuf,
    pub reference: String,
    /// `Some(false)` when the chosen tag is behind the primary branch
    pub at_branch_tip: Option<bool>,
}

/// Latest tag by commit time; on ties the last discovered wins
pub fn select_latest_tag(tags: &[TagInfo]) -> Option<&TagInfo> {
    tags.iter().max_by_key(|tag| tag.timestamp)
}

/// Clone URL for a home URL
///
/// GitHub homes are cloned over ssh unless `https` is requested.
pub fn clone_url(home: &str, https: bool) -> Result<String, SourceError> {
    let invalid = || SourceError::InvalidHome {
        home: home.to_string(),
    };
    let url = Url::parse(home).map_err(|_| invalid())?;
    if https || url.host_str() != Some(GITHUB_HOST) {
        return Ok(home.to_string());
    }
    let slug = home_slug(home).ok_or_else(invalid)?;
    Ok(format!("git@{GITHUB_HOST}:{slug}.git"))
}

/// Fetch a package's upstream and check out the requested or latest tag
pub fn materialize(
    scm: &dyn SourceControl,
    request: &SourceRequest<'_>,
) -> Result<SourceCheckout, SourceError> {
    tracing::info!("Fetching {} from {}", request.home, request.clone_url);
    let repo = scm.fetch(request.clone_url, request.scratch)?;
    if let Some(upstream) = request.upstream {
        tracing::info!("Fetching tags of {upstream}");
        scm.fetch_tags(&repo, upstream)?;
    }

    let (reference, at_branch_tip) = if let Some(reference) = request.reference {
        (reference.to_string(), None)
    } else {
        let tags = scm.list_tags(&repo)?;
        let latest = select_latest_tag(&tags).ok_or_else(|| SourceError::NoTags {
            url: request.clone_url.to_string(),
        })?;
        let at_tip = primary_branch_head(scm, &repo).map(|(branch, head)| {
            let at_tip = head == latest.commit;
            if !at_tip {
                tracing::info!(
                    "Tag {} of {} is not at the tip of {branch}",
                    latest.name,
                    request.home
                );
            }
            at_tip
        });
        (latest.name.clone(), at_tip)
    };

    tracing::info!("Checking out {reference} into {}", request.dest.display());
    let path = scm.checkout(&repo, &reference, request.dest)?;
    Ok(SourceCheckout {
        path,
        reference,
        at_branch_tip,
    })
}

/// First existing primary branch and its head; lookup failures only mean
/// the note is skipped
fn primary_branch_head(scm: &dyn SourceControl, repo: &Path) -> Option<(&'static str, String)> {
    PRIMARY_BRANCHES.iter().find_map(|branch| {
        match scm.branch_head(repo, branch) {
            Ok(head) => head.map(|head| (*branch, head)),
            Err(e) => {
                tracing::debug!("Could not resolve {branch}: {e}");
                None
            }
        }
    })
}
