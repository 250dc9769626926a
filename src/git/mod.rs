//! Git operations wrapper for docweave
//!
//! Remote repositories are accessed through the system `git` binary rather
//! than an embedded library, so existing git configuration, proxies and
//! credential helpers keep working. Commands are built with
//! [`command_builder::GitCommand`].
//!
//! The [`GitClient`] trait is the seam the repository cache talks to.
//! [`CliGit`] implements it with real git commands; tests substitute a
//! scripted client to observe exactly which operations run.
//!
//! # Authentication
//!
//! A token, when configured for a host, is sent as an HTTP authorization
//! header through git's environment configuration. It is never embedded in
//! the remote URL, written to `.git/config` or logged.

pub mod command_builder;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::core::DocweaveError;
use command_builder::GitCommand;

/// Stderr fragments git prints when the remote repository does not exist.
const REMOTE_NOT_FOUND_MARKERS: &[&str] = &[
    "repository not found",
    "does not appear to be a git repository",
    "the requested url returned error: 404",
];

/// A reference the working copy can be checked out at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutReference {
    /// `refs/remotes/origin/<name>`
    Branch(String),
    /// `refs/tags/<name>`
    Tag(String),
}

impl CheckoutReference {
    /// Fully qualified reference name.
    #[must_use]
    pub fn ref_name(&self) -> String {
        match self {
            Self::Branch(name) => format!("refs/remotes/origin/{name}"),
            Self::Tag(name) => format!("refs/tags/{name}"),
        }
    }
}

/// Author and date of the last commit touching a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    pub sha: String,
    pub author: String,
    pub email: String,
    pub date: String,
}

/// Git operations needed to maintain a local working copy.
#[async_trait]
pub trait GitClient: Send + Sync + Debug {
    /// Whether `path` holds a git working copy.
    async fn is_repository(&self, path: &Path) -> bool;

    /// Clones `url` into `path`. A missing remote is reported as
    /// [`DocweaveError::ResourceNotFound`].
    async fn clone_repository(&self, url: &str, path: &Path, auth: Option<&str>) -> Result<()>;

    /// Fetches branches and tags from `origin`. A missing remote is reported
    /// as [`DocweaveError::ResourceNotFound`].
    async fn fetch(&self, path: &Path, auth: Option<&str>) -> Result<()>;

    /// Whether `reference` resolves in the working copy.
    async fn has_reference(&self, path: &Path, reference: &CheckoutReference) -> bool;

    /// Forces the working copy to `reference`, discarding local changes.
    async fn checkout(&self, path: &Path, reference: &CheckoutReference) -> Result<()>;

    /// Last commit touching `file`, relative to the working copy root.
    async fn last_commit(&self, path: &Path, file: &str) -> Result<Option<CommitInfo>>;
}

/// A handle on a local working copy.
#[derive(Debug)]
pub struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn is_git_repo(&self) -> bool {
        self.path.join(".git").exists()
    }

    /// Clones `url` into `target` without checking anything out.
    pub async fn clone(url: &str, target: impl AsRef<Path>, auth: Option<&str>) -> Result<Self> {
        let target = target.as_ref();
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                anyhow::Error::from(e).context(format!("Failed to create {}", parent.display()))
            })?;
        }

        GitCommand::clone(url, target)
            .with_auth(auth)
            .with_context(format!("Cloning {url}"))
            .execute_success()
            .await
            .map_err(|e| map_remote_not_found(e, url))?;
        Ok(Self::new(target))
    }

    pub async fn fetch(&self, auth: Option<&str>) -> Result<()> {
        let url = self.remote_url().await.unwrap_or_else(|_| self.path.display().to_string());
        GitCommand::fetch()
            .current_dir(&self.path)
            .with_auth(auth)
            .execute_success()
            .await
            .map_err(|e| map_remote_not_found(e, &url))
    }

    pub async fn remote_url(&self) -> Result<String> {
        GitCommand::new()
            .args(["remote", "get-url", "origin"])
            .current_dir(&self.path)
            .execute_stdout()
            .await
    }

    pub async fn verify_ref(&self, ref_name: &str) -> bool {
        GitCommand::verify_ref(ref_name).current_dir(&self.path).execute_success().await.is_ok()
    }

    pub async fn checkout(&self, reference: &CheckoutReference) -> Result<()> {
        let command = match reference {
            CheckoutReference::Branch(name) => {
                GitCommand::checkout_branch(name, &reference.ref_name())
            }
            CheckoutReference::Tag(_) => GitCommand::checkout_detached(&reference.ref_name()),
        };
        command.current_dir(&self.path).execute_success().await
    }

    pub async fn last_commit(&self, file: &str) -> Result<Option<CommitInfo>> {
        let output =
            GitCommand::last_commit(file).current_dir(&self.path).execute_stdout().await?;
        Ok(parse_commit_info(&output))
    }
}

fn parse_commit_info(output: &str) -> Option<CommitInfo> {
    let mut fields = output.trim().split('\0');
    let sha = fields.next().filter(|s| !s.is_empty())?;
    Some(CommitInfo {
        sha: sha.to_string(),
        author: fields.next().unwrap_or_default().to_string(),
        email: fields.next().unwrap_or_default().to_string(),
        date: fields.next().unwrap_or_default().to_string(),
    })
}

/// Whether git's error output says the remote repository does not exist.
#[must_use]
pub fn is_remote_not_found(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    REMOTE_NOT_FOUND_MARKERS.iter().any(|marker| lower.contains(marker))
        || lower.lines().any(|line| {
            let line = line.trim();
            line.starts_with("fatal: repository '") && line.ends_with("' not found")
        })
}

fn map_remote_not_found(error: anyhow::Error, url: &str) -> anyhow::Error {
    let stderr = match error.downcast_ref::<DocweaveError>() {
        Some(DocweaveError::GitCloneFailed {
            reason,
            ..
        }) => reason,
        Some(DocweaveError::GitCommandError {
            stderr,
            ..
        }) => stderr,
        _ => return error,
    };
    if is_remote_not_found(stderr) {
        tracing::debug!(target: "git", "Remote {} not found: {}", url, stderr.trim());
        DocweaveError::ResourceNotFound {
            uri: url.to_string(),
        }
        .into()
    } else {
        error
    }
}

/// [`GitClient`] backed by the system git binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct CliGit;

#[async_trait]
impl GitClient for CliGit {
    async fn is_repository(&self, path: &Path) -> bool {
        GitRepo::new(path).is_git_repo()
    }

    async fn clone_repository(&self, url: &str, path: &Path, auth: Option<&str>) -> Result<()> {
        GitRepo::clone(url, path, auth).await.map(|_| ())
    }

    async fn fetch(&self, path: &Path, auth: Option<&str>) -> Result<()> {
        GitRepo::new(path).fetch(auth).await
    }

    async fn has_reference(&self, path: &Path, reference: &CheckoutReference) -> bool {
        GitRepo::new(path).verify_ref(&reference.ref_name()).await
    }

    async fn checkout(&self, path: &Path, reference: &CheckoutReference) -> Result<()> {
        GitRepo::new(path).checkout(reference).await
    }

    async fn last_commit(&self, path: &Path, file: &str) -> Result<Option<CommitInfo>> {
        GitRepo::new(path).last_commit(file).await
    }
}
