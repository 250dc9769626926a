//! Error handling for docweave
//!
//! This module provides the typed error taxonomy of the crate and the
//! user-facing rendering used by the CLI. The error system follows two rules:
//! 1. **Strongly-typed errors** so callers can branch on a failure mode
//!    (e.g. soft-skip a [`DocweaveError::ResourceNotFound`])
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Architecture
//!
//! - [`DocweaveError`] - Enumerated error types for every failure case
//! - [`TaskError`] - Per-document wrapper produced by the reactor
//! - [`ErrorContext`] - Wrapper that adds suggestions and details for display
//!
//! Functions across the crate return [`anyhow::Result`] and attach context
//! with `.with_context(...)`. Typed errors survive that wrapping and can be
//! recovered with [`find_docweave_error`] or [`is_resource_not_found`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use docweave::core::{DocweaveError, user_friendly_error};
//!
//! let error = anyhow::Error::from(DocweaveError::NoResourceHandler {
//!     uri: "ftp://example.com/a.md".to_string(),
//! });
//! user_friendly_error(error).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::core::MultiError;
use crate::manifest::collision::{Collision, format_collisions};

/// The main error type for docweave operations.
///
/// # Error Categories
///
/// ## Manifest
/// - [`ManifestParseError`] - Variable substitution or YAML decoding failed
/// - [`ManifestValidationError`] - Aggregate of structural problems
/// - [`NodeCollision`] - Sibling nodes resolve to the same output name
///
/// ## Resources
/// - [`ResourceNotFound`] - A provider could not find the addressed resource
/// - [`NoResourceHandler`] - No registered provider accepts a URI
///
/// ## Git and file system
/// - [`GitNotFound`], [`GitCommandError`], [`GitCloneFailed`], [`GitCheckoutFailed`]
/// - [`FileSystemError`], [`IoError`]
///
/// ## Run control
/// - [`TasksFailed`] - Aggregate of document task failures
/// - [`Cancelled`] - Work abandoned because the run was cancelled
///
/// [`ManifestParseError`]: DocweaveError::ManifestParseError
/// [`ManifestValidationError`]: DocweaveError::ManifestValidationError
/// [`NodeCollision`]: DocweaveError::NodeCollision
/// [`ResourceNotFound`]: DocweaveError::ResourceNotFound
/// [`NoResourceHandler`]: DocweaveError::NoResourceHandler
/// [`GitNotFound`]: DocweaveError::GitNotFound
/// [`GitCommandError`]: DocweaveError::GitCommandError
/// [`GitCloneFailed`]: DocweaveError::GitCloneFailed
/// [`GitCheckoutFailed`]: DocweaveError::GitCheckoutFailed
/// [`FileSystemError`]: DocweaveError::FileSystemError
/// [`IoError`]: DocweaveError::IoError
/// [`TasksFailed`]: DocweaveError::TasksFailed
/// [`Cancelled`]: DocweaveError::Cancelled
#[derive(Error, Debug)]
pub enum DocweaveError {
    /// Git executable not found in PATH
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// Git command execution failed
    #[error("Git operation failed: {operation}: {}", .stderr.trim())]
    GitCommandError {
        operation: String,
        stderr: String,
    },

    /// Repository cloning failed
    #[error("Failed to clone repository: {url}")]
    GitCloneFailed {
        url: String,
        reason: String,
    },

    /// Neither a branch nor a tag could be checked out
    #[error("Failed to checkout reference '{reference}': {reason}")]
    GitCheckoutFailed {
        reference: String,
        reason: String,
    },

    /// The manifest could not be rendered or decoded
    #[error("Invalid manifest: {reason}")]
    ManifestParseError {
        reason: String,
    },

    /// One or more structural problems were found in the manifest
    #[error("Manifest validation failed: {errors}")]
    ManifestValidationError {
        errors: MultiError,
    },

    /// Sibling nodes produce the same output name
    #[error("{}", format_collisions(.collisions))]
    NodeCollision {
        collisions: Vec<Collision>,
    },

    /// The addressed resource does not exist at its provider
    #[error("Resource not found: {uri}")]
    ResourceNotFound {
        uri: String,
    },

    /// No registered resource handler accepts the URI
    #[error("No resource handler accepts '{uri}'")]
    NoResourceHandler {
        uri: String,
    },

    /// File system operation failed
    #[error("File system error: {operation} on {path}")]
    FileSystemError {
        operation: String,
        path: String,
    },

    /// Configuration file could not be read or decoded
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
    },

    /// One or more document tasks failed
    #[error("{errors}")]
    TasksFailed {
        errors: MultiError,
    },

    /// The run was cancelled before the work completed
    #[error("Operation cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failure of one document task, naming the document it was producing.
#[derive(Debug)]
pub struct TaskError {
    /// Output path of the document, relative to the destination.
    pub path: String,
    /// Underlying failure.
    pub source: anyhow::Error,
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to process document {}", self.path)
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Finds the first [`DocweaveError`] anywhere in the error chain.
#[must_use]
pub fn find_docweave_error(error: &anyhow::Error) -> Option<&DocweaveError> {
    error.chain().find_map(|cause| cause.downcast_ref::<DocweaveError>())
}

/// Whether the failure ultimately comes from a missing resource.
#[must_use]
pub fn is_resource_not_found(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        matches!(cause.downcast_ref::<DocweaveError>(), Some(DocweaveError::ResourceNotFound { .. }))
    })
}

/// Whether the failure is only a consequence of run cancellation.
#[must_use]
pub fn is_cancelled(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| matches!(cause.downcast_ref::<DocweaveError>(), Some(DocweaveError::Cancelled)))
}

/// Error wrapper that adds a suggestion and details for the terminal.
#[derive(Debug)]
pub struct ErrorContext {
    /// The rendered underlying error
    pub message: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Prints the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Converts any error into an [`ErrorContext`] with a suggestion matching
/// the most specific typed error found in its chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let message = format!("{error:#}");

    let Some(typed) = find_docweave_error(&error) else {
        if let Some(io_error) = error.chain().find_map(|c| c.downcast_ref::<std::io::Error>())
            && io_error.kind() == std::io::ErrorKind::PermissionDenied
        {
            return ErrorContext::new(message)
                .with_suggestion("Check the permissions of the destination directory");
        }
        return ErrorContext::new(message);
    };

    match typed {
        DocweaveError::GitNotFound => ErrorContext::new(message)
            .with_suggestion("Install git from https://git-scm.com/ or your package manager")
            .with_details("Remote sources are cloned with the git executable found in PATH"),
        DocweaveError::GitCloneFailed {
            ..
        } => ErrorContext::new(message)
            .with_suggestion("Check the repository URL and your network connection. Private repositories need a token in ~/.docweave/config.toml"),
        DocweaveError::GitCheckoutFailed {
            ..
        } => ErrorContext::new(message).with_suggestion(
            "Verify the branch or tag exists. Use 'git branch -r' or 'git tag -l' to list references",
        ),
        DocweaveError::GitCommandError {
            ..
        } => ErrorContext::new(message)
            .with_suggestion("Try running the git command manually for more details"),
        DocweaveError::ManifestParseError {
            ..
        } => ErrorContext::new(message).with_suggestion(
            "Check the YAML syntax and that every {{ }} placeholder has a matching --var",
        ),
        DocweaveError::ManifestValidationError {
            ..
        }
        | DocweaveError::NodeCollision {
            ..
        } => ErrorContext::new(message)
            .with_suggestion("Give colliding or anonymous nodes explicit, unique names"),
        DocweaveError::ResourceNotFound {
            ..
        } => ErrorContext::new(message)
            .with_suggestion("Check that the source path, version and repository exist"),
        DocweaveError::NoResourceHandler {
            ..
        } => ErrorContext::new(message).with_suggestion(
            "Use a local path or a URL on a configured git host (see git_hosts in the config file)",
        ),
        DocweaveError::ConfigError {
            ..
        } => ErrorContext::new(message)
            .with_suggestion("Fix or remove ~/.docweave/config.toml (or the file named by DOCWEAVE_CONFIG)"),
        _ => ErrorContext::new(message),
    }
}
