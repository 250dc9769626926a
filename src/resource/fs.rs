//! Resource handler for the local filesystem.
//!
//! Accepts plain paths and `file://` URLs whether or not they exist; a path
//! missing on disk is reported as a not-found resource when it is read.
//! Relative links found in a local document resolve against the document's
//! directory.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::core::DocweaveError;
use crate::manifest::helpers::has_scheme;
use crate::manifest::{Documentation, NodeSelector, NodeSpec, ParseOptions, parser};
use crate::resource::selector::expand_directory;
use crate::resource::{
    ContentReader, LinkControl, NodeResolver, ResourceHandler, UriValidator, clean_path,
    split_resource_name,
};

const FILE_SCHEME: &str = "file://";

#[derive(Debug, Clone, Default)]
pub struct FsHandler {
    target_branch: String,
}

impl FsHandler {
    /// A handler that parses nested manifests with `versions` set to
    /// `target_branch`.
    #[must_use]
    pub fn new(target_branch: impl Into<String>) -> Self {
        Self {
            target_branch: target_branch.into(),
        }
    }

    fn local_path(uri: &str) -> PathBuf {
        PathBuf::from(uri.strip_prefix(FILE_SCHEME).unwrap_or(uri))
    }
}

impl UriValidator for FsHandler {
    fn accept(&self, uri: &str) -> bool {
        !uri.trim().is_empty() && (!has_scheme(uri) || uri.starts_with(FILE_SCHEME))
    }
}

#[async_trait]
impl NodeResolver for FsHandler {
    async fn resolve_node_selector(&self, selector: &NodeSelector) -> Result<Vec<NodeSpec>> {
        let root = Self::local_path(&selector.path);
        let selector = selector.clone();
        tokio::task::spawn_blocking(move || {
            let base = root.clone();
            expand_directory(&root, &selector, move |relative| {
                base.join(relative).to_string_lossy().into_owned()
            })
        })
        .await
        .context("Directory walk panicked")?
    }

    async fn resolve_documentation(
        &self,
        uri: &str,
        options: &ParseOptions,
    ) -> Result<Documentation> {
        let content = self.read(uri).await?;
        let raw = String::from_utf8(content)
            .with_context(|| format!("Manifest {uri} is not valid UTF-8"))?;
        parser::parse_with_metadata(&raw, &self.target_branch, &options.variables, options.hugo)
            .with_context(|| format!("Failed to parse manifest {uri}"))
    }
}

impl LinkControl for FsHandler {
    fn resource_name(&self, link: &str) -> (String, String) {
        split_resource_name(link)
    }

    fn build_abs_link(&self, source: &str, link: &str) -> Result<String> {
        if has_scheme(link) || link.starts_with('#') || link.starts_with('/') {
            return Ok(link.to_string());
        }
        let source = source.strip_prefix(FILE_SCHEME).unwrap_or(source);
        let dir = Path::new(source).parent().map(|p| p.to_string_lossy().into_owned());
        let joined = match dir {
            Some(dir) if !dir.is_empty() => format!("{dir}/{link}"),
            _ => link.to_string(),
        };
        Ok(clean_path(&joined))
    }

    fn raw_format_link(&self, abs_link: &str) -> Result<String> {
        Ok(abs_link.to_string())
    }

    fn set_version(&self, abs_link: &str, _version: &str) -> Result<String> {
        Ok(abs_link.to_string())
    }
}

#[async_trait]
impl ContentReader for FsHandler {
    async fn read(&self, uri: &str) -> Result<Vec<u8>> {
        let path = Self::local_path(uri);
        match tokio::fs::read(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DocweaveError::ResourceNotFound {
                    uri: uri.to_string(),
                }
                .into())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    async fn read_git_info(&self, _uri: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

impl ResourceHandler for FsHandler {
    fn name(&self) -> &str {
        "fs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::is_resource_not_found;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_accepts_local_paths() -> Result<()> {
        let temp = tempdir()?;
        let file = temp.path().join("a.md");
        std::fs::write(&file, "# A")?;
        let handler = FsHandler::new("master");

        assert!(handler.accept(&file.to_string_lossy()));
        assert!(handler.accept(&format!("file://{}", file.display())));
        assert!(handler.accept(&temp.path().join("missing.md").to_string_lossy()));
        assert!(handler.accept("docs/relative.md"));
        assert!(!handler.accept(""));
        assert!(!handler.accept("https://github.com/acme/app/blob/main/a.md"));
        Ok(())
    }

    #[tokio::test]
    async fn test_registry_routes_missing_paths_to_fs() -> Result<()> {
        let temp = tempdir()?;
        let missing = temp.path().join("missing.md").to_string_lossy().into_owned();
        let registry = crate::resource::Registry::new([
            std::sync::Arc::new(FsHandler::new("master")) as std::sync::Arc<dyn ResourceHandler>
        ]);

        let handler = registry.require(&missing)?;
        assert_eq!(handler.name(), "fs");
        let err = handler.read(&missing).await.unwrap_err();
        assert!(is_resource_not_found(&err));
        Ok(())
    }

    #[test]
    fn test_build_abs_link() -> Result<()> {
        let handler = FsHandler::default();
        assert_eq!(handler.build_abs_link("/docs/guides/a.md", "../img/x.png")?, "/docs/img/x.png");
        assert_eq!(handler.build_abs_link("docs/a.md", "b.md")?, "docs/b.md");
        assert_eq!(handler.build_abs_link("a.md", "./b.md")?, "b.md");
        assert_eq!(
            handler.build_abs_link("docs/a.md", "https://example.com/x")?,
            "https://example.com/x"
        );
        assert_eq!(handler.build_abs_link("docs/a.md", "#anchor")?, "#anchor");
        Ok(())
    }

    #[tokio::test]
    async fn test_read_missing_file_is_not_found() {
        let temp = tempdir().unwrap();
        let err = FsHandler::default()
            .read(&temp.path().join("missing.md").to_string_lossy())
            .await
            .unwrap_err();
        assert!(is_resource_not_found(&err));
    }

    #[tokio::test]
    async fn test_resolve_documentation_injects_versions() -> Result<()> {
        let temp = tempdir()?;
        let manifest = temp.path().join("manifest.yaml");
        std::fs::write(&manifest, "structure:\n  - source: docs/{{ versions }}.md\n")?;

        let docs = FsHandler::new("release")
            .resolve_documentation(&manifest.to_string_lossy(), &ParseOptions::new(HashMap::new(), false))
            .await?;
        assert_eq!(docs.node(docs.structure[0]).source, "docs/release.md");
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_node_selector_uses_absolute_sources() -> Result<()> {
        let temp = tempdir()?;
        std::fs::create_dir_all(temp.path().join("guides"))?;
        std::fs::write(temp.path().join("guides/setup.md"), "# Setup")?;

        let selector = NodeSelector {
            path: temp.path().to_string_lossy().into_owned(),
            ..NodeSelector::default()
        };
        let nodes = FsHandler::default().resolve_node_selector(&selector).await?;

        let expected = temp.path().join("guides").join("setup.md");
        assert_eq!(nodes[0].nodes[0].source, vec![expected.to_string_lossy().into_owned()]);
        Ok(())
    }
}
