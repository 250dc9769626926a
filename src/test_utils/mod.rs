//! Test utilities for docweave
//!
//! Scripted collaborators that let the reactor, registry and repository
//! cache run without network access or a git binary:
//!
//! - [`ScriptedHandler`] - a [`ResourceHandler`](crate::resource::ResourceHandler)
//!   serving canned content, selectors and manifests
//! - [`ScriptedGit`] - a [`GitClient`](crate::git::GitClient) recording every
//!   operation it is asked to run
//! - [`MemoryWriter`] - a [`Writer`](crate::writers::Writer) keeping output
//!   in memory
//!
//! # Example
//!
//! ```rust,ignore
//! use docweave::test_utils::{MemoryWriter, ScriptedHandler};
//!
//! let handler = ScriptedHandler::new("docs")
//!     .accepting("docs/")
//!     .with_content("docs/a.md", "# A");
//! let writer = MemoryWriter::new();
//! ```

mod git;
mod handler;
mod writer;

pub use git::{GitFailure, ScriptedGit};
pub use handler::ScriptedHandler;
pub use writer::MemoryWriter;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Installs the tracing subscriber once per process. Uses `level` when given,
/// otherwise `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=docweave=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
