//! Resource handlers: the pluggable I/O seam of docweave.
//!
//! Every read, selector expansion and link computation goes through a
//! [`ResourceHandler`] picked from a [`Registry`] by URI. A handler combines
//! four capabilities, each its own trait so callers can depend on just what
//! they use:
//!
//! - [`UriValidator`] - whether the handler owns a URI
//! - [`NodeResolver`] - expand node selectors and load nested manifests
//! - [`LinkControl`] - link algebra for the handler's URI scheme
//! - [`ContentReader`] - fetch bytes and provenance metadata
//!
//! Two handlers ship with the crate: [`fs::FsHandler`] for local paths and
//! [`git::GitHandler`] for repositories on configured git hosts. Other
//! providers (for example one backed by a hosting API) plug in by
//! implementing the same traits.

pub mod fs;
pub mod git;
pub mod registry;
pub(crate) mod selector;

pub use fs::FsHandler;
pub use git::GitHandler;
pub use registry::Registry;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

use crate::manifest::{Documentation, NodeSelector, NodeSpec, ParseOptions};

/// Membership test for URIs.
pub trait UriValidator: Send + Sync {
    /// Whether this handler can serve `uri`.
    fn accept(&self, uri: &str) -> bool;
}

/// Expansion of dynamic parts of a manifest.
#[async_trait]
pub trait NodeResolver: Send + Sync {
    /// Expands `selector` into the subtree of nodes it selects.
    ///
    /// Directories become named containers and markdown files become
    /// documents; directories without selected documents are pruned.
    async fn resolve_node_selector(&self, selector: &NodeSelector) -> Result<Vec<NodeSpec>>;

    /// Loads and parses the manifest stored at `uri`.
    async fn resolve_documentation(&self, uri: &str, options: &ParseOptions)
    -> Result<Documentation>;
}

/// Link algebra for the handler's URIs.
pub trait LinkControl: Send + Sync {
    /// Name and extension (without the dot) of the resource a link points to.
    fn resource_name(&self, link: &str) -> (String, String);

    /// Resolves `link`, found in the document at `source`, to an absolute link.
    fn build_abs_link(&self, source: &str, link: &str) -> Result<String>;

    /// The link under which the raw bytes of `abs_link` are served.
    fn raw_format_link(&self, abs_link: &str) -> Result<String>;

    /// Re-targets `abs_link` to `version`.
    fn set_version(&self, abs_link: &str, version: &str) -> Result<String>;
}

/// Content access.
#[async_trait]
pub trait ContentReader: Send + Sync {
    /// Reads the bytes addressed by `uri`.
    ///
    /// Missing resources are reported as
    /// [`DocweaveError::ResourceNotFound`](crate::core::DocweaveError::ResourceNotFound).
    async fn read(&self, uri: &str) -> Result<Vec<u8>>;

    /// Provenance information about `uri` as JSON, when the handler has any.
    async fn read_git_info(&self, uri: &str) -> Result<Option<Vec<u8>>>;
}

/// A complete resource provider.
pub trait ResourceHandler:
    UriValidator + NodeResolver + LinkControl + ContentReader + Debug
{
    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Splits a file name into name and extension without the dot.
pub(crate) fn split_resource_name(link: &str) -> (String, String) {
    let path = link.split(['?', '#']).next().unwrap_or_default().trim_end_matches('/');
    let file_name = path.rsplit('/').next().unwrap_or_default();
    let (stem, ext) = crate::manifest::helpers::split_extension(file_name);
    (stem.to_string(), ext.trim_start_matches('.').to_string())
}

/// Normalizes a `/` separated path, resolving `.` and `..` segments.
///
/// Leading `..` segments that would escape the root are dropped.
pub(crate) fn clean_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute { format!("/{joined}") } else { joined }
}
