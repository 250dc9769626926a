use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::core::DocweaveError;
use crate::manifest::helpers::has_scheme;
use crate::manifest::{Documentation, NodeSelector, NodeSpec, ParseOptions, parser};
use crate::resource::{
    ContentReader, LinkControl, NodeResolver, ResourceHandler, UriValidator, clean_path,
    split_resource_name,
};

/// A resource handler answering from canned data.
///
/// Unknown URIs read as [`DocweaveError::ResourceNotFound`]. Every read is
/// recorded and available through [`ScriptedHandler::reads`].
#[derive(Debug, Default)]
pub struct ScriptedHandler {
    name: String,
    prefixes: Vec<String>,
    contents: HashMap<String, Vec<u8>>,
    failures: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    selectors: HashMap<String, Vec<NodeSpec>>,
    manifests: HashMap<String, String>,
    git_info: HashMap<String, Vec<u8>>,
    reads: Mutex<Vec<String>>,
}

impl ScriptedHandler {
    /// A handler accepting every URI until [`accepting`](Self::accepting) narrows it.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Accept URIs starting with `prefix`.
    #[must_use]
    pub fn accepting(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    #[must_use]
    pub fn with_content(mut self, uri: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.contents.insert(uri.into(), content.into());
        self
    }

    /// Reading `uri` fails with `message`.
    #[must_use]
    pub fn failing(mut self, uri: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.insert(uri.into(), message.into());
        self
    }

    /// Reading `uri` takes `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, uri: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(uri.into(), delay);
        self
    }

    /// Selectors with path `path` expand to `nodes`.
    #[must_use]
    pub fn with_selector(mut self, path: impl Into<String>, nodes: Vec<NodeSpec>) -> Self {
        self.selectors.insert(path.into(), nodes);
        self
    }

    #[must_use]
    pub fn with_manifest(mut self, uri: impl Into<String>, raw: impl Into<String>) -> Self {
        self.manifests.insert(uri.into(), raw.into());
        self
    }

    #[must_use]
    pub fn with_git_info(mut self, uri: impl Into<String>, info: impl Into<Vec<u8>>) -> Self {
        self.git_info.insert(uri.into(), info.into());
        self
    }

    /// URIs read so far, in call order.
    #[must_use]
    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn not_found(uri: &str) -> anyhow::Error {
        DocweaveError::ResourceNotFound {
            uri: uri.to_string(),
        }
        .into()
    }
}

impl UriValidator for ScriptedHandler {
    fn accept(&self, uri: &str) -> bool {
        self.prefixes.is_empty() || self.prefixes.iter().any(|p| uri.starts_with(p.as_str()))
    }
}

#[async_trait]
impl NodeResolver for ScriptedHandler {
    async fn resolve_node_selector(&self, selector: &NodeSelector) -> Result<Vec<NodeSpec>> {
        self.selectors.get(&selector.path).cloned().ok_or_else(|| Self::not_found(&selector.path))
    }

    async fn resolve_documentation(
        &self,
        uri: &str,
        options: &ParseOptions,
    ) -> Result<Documentation> {
        let Some(raw) = self.manifests.get(uri) else {
            return Err(Self::not_found(uri));
        };
        parser::parse_with_metadata(raw, "master", &options.variables, options.hugo)
    }
}

impl LinkControl for ScriptedHandler {
    fn resource_name(&self, link: &str) -> (String, String) {
        split_resource_name(link)
    }

    fn build_abs_link(&self, source: &str, link: &str) -> Result<String> {
        if has_scheme(link) || link.starts_with('#') || link.starts_with('/') {
            return Ok(link.to_string());
        }
        let dir = source.rsplit_once('/').map_or("", |(dir, _)| dir);
        Ok(clean_path(&format!("{dir}/{link}")))
    }

    fn raw_format_link(&self, abs_link: &str) -> Result<String> {
        Ok(abs_link.to_string())
    }

    /// Appends `@<version>`, replacing an earlier version suffix.
    fn set_version(&self, abs_link: &str, version: &str) -> Result<String> {
        let base = abs_link.rsplit_once('@').map_or(abs_link, |(base, _)| base);
        Ok(format!("{base}@{version}"))
    }
}

#[async_trait]
impl ContentReader for ScriptedHandler {
    async fn read(&self, uri: &str) -> Result<Vec<u8>> {
        if let Ok(mut reads) = self.reads.lock() {
            reads.push(uri.to_string());
        }
        if let Some(delay) = self.delays.get(uri) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(message) = self.failures.get(uri) {
            bail!("{message}");
        }
        self.contents.get(uri).cloned().ok_or_else(|| Self::not_found(uri))
    }

    async fn read_git_info(&self, uri: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.git_info.get(uri).cloned())
    }
}

impl ResourceHandler for ScriptedHandler {
    fn name(&self) -> &str {
        &self.name
    }
}
