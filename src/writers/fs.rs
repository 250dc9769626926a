use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Component, Path, PathBuf};

use super::{Writer, join_output_path};
use crate::core::DocweaveError;
use crate::manifest::Node;

/// Writes files below a root directory, creating directories as needed.
#[derive(Debug, Clone)]
pub struct FsWriter {
    root: PathBuf,
}

impl FsWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves the output location, which must stay below the root.
    fn target(&self, path: &str, name: &str) -> Result<PathBuf> {
        let relative = join_output_path(path, name);
        let escapes = Path::new(&relative).components().any(|component| {
            matches!(component, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        });
        if escapes || relative.split('/').any(|segment| segment == "..") {
            return Err(DocweaveError::FileSystemError {
                operation: "write".to_string(),
                path: relative,
            })
            .context("Output path escapes the destination directory");
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Writer for FsWriter {
    async fn write(
        &self,
        name: &str,
        path: &str,
        content: &[u8],
        node: Option<&Node>,
    ) -> Result<()> {
        // Containers carry no content of their own.
        if node.is_some_and(Node::is_container) && content.is_empty() {
            return Ok(());
        }
        let target = self.target(path, name)?;
        let content = content.to_vec();
        tracing::debug!("Writing {}", target.display());
        tokio::task::spawn_blocking(move || atomic_write(&target, &content))
            .await
            .context("Write task panicked")?
    }
}

/// Writes `content` to `path` through a temporary sibling and a rename, so
/// readers never observe a partially written file.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    let result = write_and_rename(&temp_path, path, content);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_and_rename(temp_path: &Path, path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    {
        let mut file = fs::File::create(temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;
        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;
        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    fs::rename(temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))
}
