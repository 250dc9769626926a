//! Output sinks for documents, downloaded resources and metadata.
//!
//! A run uses up to three independently rooted [`Writer`]s: one for
//! documents, one for downloaded resources and an optional one for
//! provenance metadata.

mod fs;

pub use fs::{FsWriter, atomic_write};

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;

use crate::manifest::Node;

/// Destination for produced bytes.
#[async_trait]
pub trait Writer: Send + Sync {
    /// Stores `content` as `name` under the `/` separated directory `path`.
    ///
    /// `node` is the manifest node the content was produced for, or `None`
    /// for downloaded resources.
    async fn write(&self, name: &str, path: &str, content: &[u8], node: Option<&Node>)
    -> Result<()>;
}

/// Joins a writer `path` and `name` into one relative `/` separated path.
#[must_use]
pub fn join_output_path(path: &str, name: &str) -> String {
    let path = path.trim_matches('/');
    if path.is_empty() { name.to_string() } else { format!("{path}/{name}") }
}

/// Writer that only records what would have been written.
#[derive(Debug, Default)]
pub struct DryRunWriter {
    label: String,
    written: Mutex<Vec<String>>,
}

impl DryRunWriter {
    /// A dry-run writer whose log lines are prefixed with `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            written: Mutex::new(Vec::new()),
        }
    }

    /// Paths recorded so far, in write order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.written.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Writer for DryRunWriter {
    async fn write(
        &self,
        name: &str,
        path: &str,
        content: &[u8],
        _node: Option<&Node>,
    ) -> Result<()> {
        let output = join_output_path(path, name);
        tracing::info!("[dry-run] {} {} ({} bytes)", self.label, output, content.len());
        if let Ok(mut written) = self.written.lock() {
            written.push(output);
        }
        Ok(())
    }
}
