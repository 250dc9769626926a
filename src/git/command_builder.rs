//! Type-safe Git command builder for consistent command execution
//!
//! This module provides a fluent API for building and executing git commands
//! so every invocation shares the same timeout handling, logging and error
//! mapping.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::{GIT_CLONE_TIMEOUT, GIT_DEFAULT_TIMEOUT, GIT_FETCH_TIMEOUT};
use crate::core::DocweaveError;

const GIT_EXECUTABLE: &str = "git";

/// Builder for constructing and executing git commands.
///
/// Child processes are killed when the future driving them is dropped, so a
/// cancelled run does not leave git processes behind.
///
/// # Examples
///
/// ```rust,ignore
/// use docweave::git::command_builder::GitCommand;
///
/// # async fn example() -> anyhow::Result<()> {
/// let head = GitCommand::new()
///     .args(["rev-parse", "HEAD"])
///     .current_dir("/path/to/repo")
///     .execute_stdout()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct GitCommand {
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env_vars: Vec<(String, String)>,
    timeout_duration: Option<Duration>,
    context: Option<String>,
    clone_url: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            env_vars: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
            timeout_duration: Some(GIT_DEFAULT_TIMEOUT),
            context: None,
            clone_url: None,
        }
    }
}

impl GitCommand {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Sends `token` as a bearer authorization header on every HTTP request.
    ///
    /// The header travels through git's environment configuration so it
    /// never appears in the argument list or in logs.
    #[must_use]
    pub fn with_auth(self, token: Option<&str>) -> Self {
        match token {
            Some(token) if !token.is_empty() => self
                .env("GIT_CONFIG_COUNT", "1")
                .env("GIT_CONFIG_KEY_0", "http.extraHeader")
                .env("GIT_CONFIG_VALUE_0", format!("Authorization: Bearer {token}")),
            _ => self,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Runs the command, mapping a non-zero exit status to a typed error:
    /// [`DocweaveError::GitCloneFailed`] for clones,
    /// [`DocweaveError::GitCheckoutFailed`] for checkouts and
    /// [`DocweaveError::GitCommandError`] otherwise.
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let start = std::time::Instant::now();
        let mut cmd = Command::new(GIT_EXECUTABLE);

        let mut full_args = Vec::new();
        if let Some(ref dir) = self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());
        let operation = self.args.first().cloned().unwrap_or_else(|| "unknown".to_string());

        cmd.args(&full_args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        match self.context {
            Some(ref ctx) => tracing::debug!(
                target: "git",
                "({}) Executing command: git {}",
                ctx,
                full_args.join(" ")
            ),
            None => tracing::debug!(target: "git", "Executing command: git {}", full_args.join(" ")),
        }

        for (key, value) in &self.env_vars {
            tracing::trace!(target: "git", "Setting env var: {}", key);
            cmd.env(key, value);
        }

        let output_future = cmd.output();
        let output = if let Some(duration) = self.timeout_duration {
            if let Ok(result) = timeout(duration, output_future).await {
                result.map_err(|e| map_spawn_error(e, &full_args))?
            } else {
                tracing::warn!(
                    target: "git",
                    "Command timed out after {} seconds: git {}",
                    duration.as_secs(),
                    full_args.join(" ")
                );
                return Err(DocweaveError::GitCommandError {
                    operation,
                    stderr: format!(
                        "Git command timed out after {} seconds. Check network connectivity and repository access",
                        duration.as_secs()
                    ),
                }
                .into());
            }
        } else {
            output_future.await.map_err(|e| map_spawn_error(e, &full_args))?
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "git",
                "Command failed with exit code: {:?}",
                output.status.code()
            );
            if !stderr.is_empty() {
                tracing::debug!(target: "git", "Error: {}", stderr.trim());
            }

            let error = match operation.as_str() {
                "clone" => DocweaveError::GitCloneFailed {
                    url: self.clone_url.unwrap_or_else(|| "unknown".to_string()),
                    reason: stderr,
                },
                "checkout" => DocweaveError::GitCheckoutFailed {
                    reference: self.args.last().cloned().unwrap_or_default(),
                    reason: stderr,
                },
                _ => DocweaveError::GitCommandError {
                    operation,
                    stderr: if stderr.is_empty() { stdout } else { stderr },
                },
            };
            return Err(error.into());
        }

        if !stdout.is_empty() {
            tracing::trace!(target: "git", "{}", stdout.trim());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(target: "git::perf", "Git {} took {:.2}s", operation, elapsed.as_secs_f64());
        } else if elapsed.as_millis() > 100 {
            tracing::debug!(target: "git::perf", "Git {} took {}ms", operation, elapsed.as_millis());
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Execute the command and return only stdout as a trimmed string
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Execute the command and check for success
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

fn map_spawn_error(error: std::io::Error, args: &[String]) -> anyhow::Error {
    if error.kind() == std::io::ErrorKind::NotFound {
        DocweaveError::GitNotFound.into()
    } else {
        anyhow::Error::from(error).context(format!("Failed to execute git {}", args.join(" ")))
    }
}

/// Output from a git command
#[derive(Debug)]
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
}

// Convenience builders for the operations docweave needs

impl GitCommand {
    /// Create a clone command. The URL must not carry credentials.
    #[must_use]
    pub fn clone(url: &str, target: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new()
            .args(["clone", "--no-checkout"])
            .arg(url)
            .arg(target.as_ref().display().to_string())
            .with_timeout(Some(GIT_CLONE_TIMEOUT));
        cmd.clone_url = Some(url.to_string());
        cmd
    }

    /// Create a fetch command updating remote branches and tags
    #[must_use]
    pub fn fetch() -> Self {
        Self::new()
            .args(["fetch", "origin", "--tags", "--force", "--prune"])
            .with_timeout(Some(GIT_FETCH_TIMEOUT))
    }

    /// Create a forced checkout of a remote branch, resetting the local branch
    #[must_use]
    pub fn checkout_branch(branch_name: &str, remote_ref: &str) -> Self {
        Self::new().args(["checkout", "--force", "-B", branch_name, remote_ref])
    }

    /// Create a forced, detached checkout of a reference
    #[must_use]
    pub fn checkout_detached(reference: &str) -> Self {
        Self::new().args(["checkout", "--force", "--detach", reference])
    }

    /// Create a command to verify a reference exists
    #[must_use]
    pub fn verify_ref(ref_name: &str) -> Self {
        Self::new().args(["rev-parse", "--verify", "--quiet", ref_name])
    }

    /// Create a command describing the last commit touching `path`
    #[must_use]
    pub fn last_commit(path: &str) -> Self {
        Self::new().args(["log", "-1", "--format=%H%x00%an%x00%ae%x00%aI", "--", path])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_builder_records_url() {
        let cmd = GitCommand::clone("https://github.com/acme/app.git", "/tmp/app");
        assert_eq!(cmd.clone_url.as_deref(), Some("https://github.com/acme/app.git"));
        assert_eq!(cmd.args[0], "clone");
        assert_eq!(cmd.args.last().map(String::as_str), Some("/tmp/app"));
        assert_eq!(cmd.timeout_duration, Some(GIT_CLONE_TIMEOUT));
    }

    #[test]
    fn test_auth_travels_in_environment() {
        let cmd = GitCommand::fetch().with_auth(Some("s3cr3t"));
        assert!(!cmd.args.iter().any(|a| a.contains("s3cr3t")));
        assert!(cmd.env_vars.iter().any(|(k, v)| k == "GIT_CONFIG_VALUE_0" && v.ends_with("s3cr3t")));

        let anonymous = GitCommand::fetch().with_auth(None);
        assert!(!anonymous.env_vars.iter().any(|(k, _)| k == "GIT_CONFIG_COUNT"));
    }

    #[test]
    fn test_checkout_builders_force() {
        let branch = GitCommand::checkout_branch("main", "refs/remotes/origin/main");
        assert_eq!(branch.args, vec!["checkout", "--force", "-B", "main", "refs/remotes/origin/main"]);
        let tag = GitCommand::checkout_detached("refs/tags/v1.0.0");
        assert_eq!(tag.args, vec!["checkout", "--force", "--detach", "refs/tags/v1.0.0"]);
    }

    #[tokio::test]
    async fn test_failed_command_maps_to_typed_error() {
        let temp = tempfile::tempdir().unwrap();
        let result = GitCommand::verify_ref("refs/heads/none").current_dir(temp.path()).execute().await;

        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DocweaveError>(),
            Some(DocweaveError::GitCommandError { .. } | DocweaveError::GitNotFound)
        ));
    }
}
