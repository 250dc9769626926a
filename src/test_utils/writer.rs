use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use crate::manifest::Node;
use crate::writers::{Writer, join_output_path};

/// A [`Writer`] keeping everything it is given in memory.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    failing: HashSet<String>,
}

impl MemoryWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes to the relative output `path` fail.
    #[must_use]
    pub fn failing_on(mut self, path: impl Into<String>) -> Self {
        self.failing.insert(path.into());
        self
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().ok()?.get(path).cloned()
    }

    #[must_use]
    pub fn get_string(&self, path: &str) -> Option<String> {
        self.get(path).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Written paths in sorted order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.files.lock().map(|f| f.keys().cloned().collect()).unwrap_or_default()
    }
}

#[async_trait]
impl Writer for MemoryWriter {
    async fn write(
        &self,
        name: &str,
        path: &str,
        content: &[u8],
        _node: Option<&Node>,
    ) -> Result<()> {
        let output = join_output_path(path, name);
        if self.failing.contains(&output) {
            bail!("disk full while writing {output}");
        }
        if let Ok(mut files) = self.files.lock() {
            files.insert(output, content.to_vec());
        }
        Ok(())
    }
}
