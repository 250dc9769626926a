use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crate::core::DocweaveError;
use crate::git::{CheckoutReference, CommitInfo, GitClient};

/// How a scripted git operation fails.
#[derive(Debug, Clone)]
pub enum GitFailure {
    /// The remote does not exist.
    NotFound,
    /// The command fails with the given stderr.
    Command(String),
}

impl GitFailure {
    fn to_error(&self, operation: &str, url: &str) -> anyhow::Error {
        match self {
            Self::NotFound => DocweaveError::ResourceNotFound {
                uri: url.to_string(),
            }
            .into(),
            Self::Command(stderr) => DocweaveError::GitCommandError {
                operation: operation.to_string(),
                stderr: stderr.clone(),
            }
            .into(),
        }
    }
}

/// A [`GitClient`] that records operations instead of running git.
///
/// Cloning writes the scripted files into the target directory, so readers
/// of the working copy see real files.
#[derive(Debug, Default)]
pub struct ScriptedGit {
    existing: bool,
    branches: Vec<String>,
    tags: Vec<String>,
    files: Vec<(String, Vec<u8>)>,
    clone_failure: Option<GitFailure>,
    fetch_failure: Option<GitFailure>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report every path as an existing working copy.
    #[must_use]
    pub fn existing(mut self) -> Self {
        self.existing = true;
        self
    }

    #[must_use]
    pub fn with_branch(mut self, name: impl Into<String>) -> Self {
        self.branches.push(name.into());
        self
    }

    #[must_use]
    pub fn with_tag(mut self, name: impl Into<String>) -> Self {
        self.tags.push(name.into());
        self
    }

    /// A file materialized by clone, relative to the working copy root.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.files.push((path.into(), content.into()));
        self
    }

    #[must_use]
    pub fn failing_clone(mut self, failure: GitFailure) -> Self {
        self.clone_failure = Some(failure);
        self
    }

    #[must_use]
    pub fn failing_fetch(mut self, failure: GitFailure) -> Self {
        self.fetch_failure = Some(failure);
        self
    }

    /// Clone and fetch take `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Operations run so far, e.g. `clone`, `fetch` or `checkout refs/tags/v1`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of recorded operations starting with `operation`.
    #[must_use]
    pub fn count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(operation)).count()
    }

    fn record(&self, call: impl Into<String>) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.into());
        }
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl GitClient for ScriptedGit {
    async fn is_repository(&self, _path: &Path) -> bool {
        self.existing
    }

    async fn clone_repository(&self, url: &str, path: &Path, _auth: Option<&str>) -> Result<()> {
        self.record("clone");
        self.pause().await;
        if let Some(failure) = &self.clone_failure {
            return Err(failure.to_error("clone", url));
        }
        for (relative, content) in &self.files {
            let target = path.join(relative);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, content).await?;
        }
        Ok(())
    }

    async fn fetch(&self, path: &Path, _auth: Option<&str>) -> Result<()> {
        self.record("fetch");
        self.pause().await;
        match &self.fetch_failure {
            Some(failure) => Err(failure.to_error("fetch", &path.display().to_string())),
            None => Ok(()),
        }
    }

    async fn has_reference(&self, _path: &Path, reference: &CheckoutReference) -> bool {
        match reference {
            CheckoutReference::Branch(name) => self.branches.contains(name),
            CheckoutReference::Tag(name) => self.tags.contains(name),
        }
    }

    async fn checkout(&self, _path: &Path, reference: &CheckoutReference) -> Result<()> {
        self.record(format!("checkout {}", reference.ref_name()));
        Ok(())
    }

    async fn last_commit(&self, _path: &Path, file: &str) -> Result<Option<CommitInfo>> {
        self.record(format!("log {file}"));
        Ok(Some(CommitInfo {
            sha: "0123456789abcdef".to_string(),
            author: "Docs Bot".to_string(),
            email: "docs@example.com".to_string(),
            date: "2024-01-02T03:04:05+00:00".to_string(),
        }))
    }
}
