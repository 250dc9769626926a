//! Resource handler for plain git repositories on configured hosts.
//!
//! Resources are addressed with repository browser URLs:
//!
//! ```text
//! https://<host>/<owner>/<repo>/(blob|tree|raw)/<version>/<path>
//! ```
//!
//! Content is read from a local working copy kept under the cache directory
//! (`<cache>/<host>/<owner>/<repo>`). Working copies are managed by
//! [`Repository`], one instance per remote, shared by every reader.

pub mod repository;
mod url;


pub use repository::{Repository, RepositoryState};
pub use url::{GitUrl, UrlKind};

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::constants::EMBEDDABLE_EXTENSIONS;
use crate::core::DocweaveError;
use crate::git::GitClient;
use crate::manifest::helpers::has_scheme;
use crate::manifest::{Documentation, NodeSelector, NodeSpec, ParseOptions, parser};
use crate::resource::selector::expand_directory;
use crate::resource::{
    ContentReader, LinkControl, NodeResolver, ResourceHandler, UriValidator, clean_path,
    split_resource_name,
};

#[derive(Debug)]
pub struct GitHandler {
    hosts: Vec<String>,
    cache_dir: PathBuf,
    tokens: HashMap<String, String>,
    git: Arc<dyn GitClient>,
    repositories: DashMap<String, Arc<Repository>>,
}

impl GitHandler {
    /// A handler serving `hosts`, with working copies under `cache_dir`.
    pub fn new(
        hosts: impl IntoIterator<Item = impl Into<String>>,
        cache_dir: impl Into<PathBuf>,
        git: Arc<dyn GitClient>,
    ) -> Self {
        Self {
            hosts: hosts.into_iter().map(|h| h.into().to_lowercase()).collect(),
            cache_dir: cache_dir.into(),
            tokens: HashMap::new(),
            git,
            repositories: DashMap::new(),
        }
    }

    /// Access tokens per host, sent when cloning or fetching from that host.
    #[must_use]
    pub fn with_tokens(mut self, tokens: HashMap<String, String>) -> Self {
        self.tokens = tokens.into_iter().map(|(host, token)| (host.to_lowercase(), token)).collect();
        self
    }

    /// The shared working copy for the repository `url` points into.
    pub fn repository(&self, url: &GitUrl) -> Arc<Repository> {
        let key = url.repository_key();
        self.repositories
            .entry(key)
            .or_insert_with(|| {
                tracing::debug!(target: "git", "Tracking repository {}", url.remote_url());
                Arc::new(Repository::new(
                    url.remote_url(),
                    self.cache_dir.join(&url.host).join(&url.owner).join(&url.repo),
                    self.tokens.get(&url.host).cloned(),
                    Arc::clone(&self.git),
                ))
            })
            .clone()
    }

    /// Parses `uri`, requiring one of the configured hosts.
    fn parse(&self, uri: &str) -> Result<GitUrl> {
        let url = GitUrl::parse(uri)?;
        if !self.hosts.contains(&url.host) {
            anyhow::bail!("host {} is not a configured git host", url.host);
        }
        Ok(url)
    }

    async fn prepared(&self, url: &GitUrl) -> Result<Arc<Repository>> {
        let repository = self.repository(url);
        repository.prepare(&url.version).await?;
        Ok(repository)
    }
}

impl UriValidator for GitHandler {
    fn accept(&self, uri: &str) -> bool {
        self.parse(uri).is_ok()
    }
}

#[async_trait]
impl NodeResolver for GitHandler {
    async fn resolve_node_selector(&self, selector: &NodeSelector) -> Result<Vec<NodeSpec>> {
        let url = self.parse(&selector.path)?;
        let repository = self.prepared(&url).await?;
        let root = repository.local_path().join(&url.path);

        let selector = selector.clone();
        tokio::task::spawn_blocking(move || {
            expand_directory(&root, &selector, |relative| {
                url.with_kind(UrlKind::Blob).join(relative).to_string()
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
        let url = self.parse(uri)?;
        let content = self.read(uri).await?;
        let raw = String::from_utf8(content)
            .with_context(|| format!("Manifest {uri} is not valid UTF-8"))?;
        parser::parse_with_metadata(&raw, &url.version, &options.variables, options.hugo)
            .with_context(|| format!("Failed to parse manifest {uri}"))
    }
}

impl LinkControl for GitHandler {
    fn resource_name(&self, link: &str) -> (String, String) {
        split_resource_name(link)
    }

    fn build_abs_link(&self, source: &str, link: &str) -> Result<String> {
        if has_scheme(link) || link.starts_with('#') {
            return Ok(link.to_string());
        }
        let base = self.parse(source)?;
        let (path, suffix) = match link.find(['?', '#']) {
            Some(idx) => link.split_at(idx),
            None => (link, ""),
        };

        let joined = if let Some(from_root) = path.strip_prefix('/') {
            from_root.to_string()
        } else {
            let dir = base.path.rsplit_once('/').map_or("", |(dir, _)| dir);
            if dir.is_empty() { path.to_string() } else { format!("{dir}/{path}") }
        };

        let (_, ext) = split_resource_name(path);
        let kind = if ext.is_empty() { UrlKind::Tree } else { UrlKind::Blob };
        let mut target = base.with_kind(kind);
        target.path = clean_path(&joined);
        Ok(format!("{target}{suffix}"))
    }

    fn raw_format_link(&self, abs_link: &str) -> Result<String> {
        let Ok(url) = self.parse(abs_link) else {
            return Ok(abs_link.to_string());
        };
        let (_, ext) = split_resource_name(&url.path);
        if url.kind == UrlKind::Blob && EMBEDDABLE_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            return Ok(url.with_kind(UrlKind::Raw).to_string());
        }
        Ok(abs_link.to_string())
    }

    fn set_version(&self, abs_link: &str, version: &str) -> Result<String> {
        let mut url = self.parse(abs_link)?;
        url.version = version.to_string();
        Ok(url.to_string())
    }
}

#[async_trait]
impl ContentReader for GitHandler {
    async fn read(&self, uri: &str) -> Result<Vec<u8>> {
        let url = self.parse(uri)?;
        let repository = self.prepared(&url).await?;
        let path = repository.local_path().join(&url.path);
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

    async fn read_git_info(&self, uri: &str) -> Result<Option<Vec<u8>>> {
        let url = self.parse(uri)?;
        let repository = self.prepared(&url).await?;
        let Some(commit) = self.git.last_commit(repository.local_path(), &url.path).await? else {
            return Ok(None);
        };

        let info = serde_json::json!({
            "source": uri,
            "path": url.path,
            "version": url.version,
            "lastCommit": commit,
        });
        Ok(Some(serde_json::to_vec_pretty(&info)?))
    }
}

impl ResourceHandler for GitHandler {
    fn name(&self) -> &str {
        "git"
    }
}
