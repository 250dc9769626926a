//! Cached working copy of one remote repository.
//!
//! A [`Repository`] is shared by every task that reads from the same remote
//! during a run. Preparation (clone or fetch, then checkout) happens under
//! an async mutex and at most once:
//!
//! ```text
//! Unprepared --prepare ok--> Prepared   (later prepare calls: no-op)
//!     |
//!     +------prepare err---> Failed     (later prepare calls: same error)
//! ```
//!
//! Preparation is not version aware: once prepared, requests for any
//! version are served from the checked-out one.

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::core::{DocweaveError, is_resource_not_found};
use crate::git::{CheckoutReference, GitClient};

/// Observable preparation state of a [`Repository`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryState {
    Unprepared,
    Prepared,
    Failed,
}

/// Error remembered by a failed repository and returned to every later caller.
#[derive(Debug, Clone)]
pub struct PreparationError(Arc<anyhow::Error>);

impl fmt::Display for PreparationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "repository preparation failed")
    }
}

impl std::error::Error for PreparationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&**self.0)
    }
}

enum State {
    Unprepared,
    Prepared,
    Failed(PreparationError),
}

pub struct Repository {
    remote_url: String,
    local_path: PathBuf,
    auth: Option<String>,
    git: Arc<dyn GitClient>,
    state: Mutex<State>,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("remote_url", &self.remote_url)
            .field("local_path", &self.local_path)
            .field("auth", &self.auth.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl Repository {
    pub fn new(
        remote_url: impl Into<String>,
        local_path: impl Into<PathBuf>,
        auth: Option<String>,
        git: Arc<dyn GitClient>,
    ) -> Self {
        Self {
            remote_url: remote_url.into(),
            local_path: local_path.into(),
            auth,
            git,
            state: Mutex::new(State::Unprepared),
        }
    }

    #[must_use]
    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    #[must_use]
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub async fn state(&self) -> RepositoryState {
        match *self.state.lock().await {
            State::Unprepared => RepositoryState::Unprepared,
            State::Prepared => RepositoryState::Prepared,
            State::Failed(_) => RepositoryState::Failed,
        }
    }

    /// Makes the working copy available at `version`.
    ///
    /// Concurrent callers wait for the first preparation and observe its
    /// outcome.
    pub async fn prepare(&self, version: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        match &*state {
            State::Prepared => return Ok(()),
            State::Failed(error) => return Err(error.clone().into()),
            State::Unprepared => {}
        }

        match self.prepare_working_copy(version).await {
            Ok(()) => {
                tracing::debug!(
                    target: "git",
                    "Prepared {} at {} in {}",
                    self.remote_url,
                    version,
                    self.local_path.display()
                );
                *state = State::Prepared;
                Ok(())
            }
            Err(e) => {
                let error = PreparationError(Arc::new(e));
                *state = State::Failed(error.clone());
                Err(error.into())
            }
        }
    }

    async fn prepare_working_copy(&self, version: &str) -> Result<()> {
        let auth = self.auth.as_deref();
        if self.git.is_repository(&self.local_path).await {
            self.git.fetch(&self.local_path, auth).await.map_err(|e| self.wrap(e))?;
        } else {
            self.git
                .clone_repository(&self.remote_url, &self.local_path, auth)
                .await
                .map_err(|e| self.wrap(e))?;
        }

        let reference = self.checkout_reference(version).await?;
        self.git.checkout(&self.local_path, &reference).await.with_context(|| {
            format!(
                "Failed to checkout {} of {} in {}",
                reference.ref_name(),
                self.remote_url,
                self.local_path.display()
            )
        })
    }

    /// Picks the remote branch named `version`, falling back to the tag.
    async fn checkout_reference(&self, version: &str) -> Result<CheckoutReference> {
        let branch = CheckoutReference::Branch(version.to_string());
        if self.git.has_reference(&self.local_path, &branch).await {
            return Ok(branch);
        }
        let tag = CheckoutReference::Tag(version.to_string());
        if self.git.has_reference(&self.local_path, &tag).await {
            return Ok(tag);
        }
        Err(DocweaveError::GitCheckoutFailed {
            reference: version.to_string(),
            reason: format!("no branch or tag named '{version}' in {}", self.remote_url),
        }
        .into())
    }

    fn wrap(&self, error: anyhow::Error) -> anyhow::Error {
        if is_resource_not_found(&error) {
            return error;
        }
        error.context(format!(
            "Failed to prepare repository {} in {}",
            self.remote_url,
            self.local_path.display()
        ))
    }
}
