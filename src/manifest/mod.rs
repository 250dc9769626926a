//! Manifest model for docweave documentation bundles.
//!
//! A manifest is a YAML document describing a tree of nodes. Document nodes
//! embed content fetched from a `source` (or the concatenation of a
//! `multiSource` list); container nodes group children, either listed
//! explicitly under `nodes` or expanded at run time from a `nodesSelector`
//! evaluated against a repository.
//!
//! # Manifest Format
//!
//! ```yaml
//! structure:
//!   - name: guides
//!     nodes:
//!       - source: https://github.com/acme/app/blob/{{ version }}/docs/intro.md
//!       - name: $name-copy$ext
//!         source: ./docs/setup.md
//!         properties:
//!           index: true
//!   - name: reference
//!     nodesSelector:
//!       path: https://github.com/acme/app/tree/master/docs/reference
//!       excludePaths: ["internal/**"]
//!       depth: 2
//! links:
//!   rewrites:
//!     "github.com/acme/app":
//!       version: master
//!   downloads:
//!     scope: ["github.com/acme/.*"]
//! ```
//!
//! # In-memory model
//!
//! Nodes live in an arena owned by [`Documentation`] and are addressed by
//! [`NodeId`]. Each node keeps the id of its parent so paths can be computed
//! without reference cycles. The YAML shape is handled by the plain
//! [`NodeSpec`] and [`DocumentationSpec`] trees, and `Documentation`
//! serializes through them.
//!
//! Parsing, validation and collision detection live in the submodules:
//! - [`parser`] - variable substitution and YAML decoding
//! - [`validation`] - structural rules, section files and the legacy hoist
//! - [`collision`] - effective output names and sibling collision reports

pub mod collision;
pub mod helpers;
pub mod parser;
pub mod validation;

#[cfg(test)]
mod manifest_tests;

pub use collision::{Collision, check_for_collisions, node_name, node_parent_path};
pub use parser::{ParseOptions, parse, parse_with_metadata, parse_with_options, serialize};
pub use validation::{
    ValidationOptions, hoist_nameless_selector, validate_documentation, validate_resolved,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Open set of per-node properties, e.g. `index: true`.
pub type Properties = BTreeMap<String, serde_yaml::Value>;

/// Index of a node inside its [`Documentation`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Rule describing how a container's children are discovered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSelector {
    /// Directory (or repository tree URL) to expand.
    #[serde(default)]
    pub path: String,
    /// Glob patterns, relative to `path`, that are skipped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_paths: Vec<String>,
    /// Front matter entries a document must carry to be selected.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub front_matter: Properties,
    /// Front matter entries that exclude a document when any of them match.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub exclude_front_matter: Properties,
    /// Maximum directory depth below `path`; zero means unbounded.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub depth: u32,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(depth: &u32) -> bool {
    *depth == 0
}

/// Rewrite applied to absolute links matching a regular expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRewriteRule {
    /// Re-target the link to this version through the provider's link algebra.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Replace the link outright. An empty destination drops the link and
    /// keeps its text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

/// Which embedded resources are downloaded and under which names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Downloads {
    /// Download names keyed by regular expression, checked in declaration order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub renames: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope: Vec<String>,
}

/// Global link configuration of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    /// Rewrite rules keyed by regular expression, checked in declaration order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub rewrites: IndexMap<String, LinkRewriteRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<Downloads>,
}

/// Serialized shape of a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// A single source. A YAML list with several entries is accepted too and
    /// becomes `multi_source`.
    #[serde(
        default,
        deserialize_with = "deserialize_source",
        serialize_with = "serialize_source",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub source: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub multi_source: Vec<String>,
    #[serde(
        default,
        rename = "nodesSelector",
        alias = "nodeSelector",
        skip_serializing_if = "Option::is_none"
    )]
    pub node_selector: Option<NodeSelector>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
}

impl NodeSpec {
    /// A document node reading `source`.
    #[must_use]
    pub fn document(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: vec![source.into()],
            ..Self::default()
        }
    }

    /// A container node holding `nodes`.
    #[must_use]
    pub fn container(name: impl Into<String>, nodes: Vec<Self>) -> Self {
        Self {
            name: name.into(),
            nodes,
            ..Self::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn deserialize_source<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(source)) if source.is_empty() => Vec::new(),
        Some(OneOrMany::One(source)) => vec![source],
        Some(OneOrMany::Many(sources)) => sources,
    })
}

fn serialize_source<S>(sources: &[String], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match sources {
        [single] => serializer.serialize_str(single),
        many => many.serialize(serializer),
    }
}

/// Serialized shape of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentationSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structure: Vec<NodeSpec>,
    #[serde(
        default,
        rename = "nodesSelector",
        alias = "nodeSelector",
        skip_serializing_if = "Option::is_none"
    )]
    pub node_selector: Option<NodeSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}

/// A node of the documentation tree.
///
/// A node is either a document (`source` or `multi_source` set) or a
/// container (`nodes` or `node_selector` set). Validation rejects nodes that
/// are both or neither.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub name: String,
    pub source: String,
    pub multi_source: Vec<String>,
    pub node_selector: Option<NodeSelector>,
    pub nodes: Vec<NodeId>,
    pub properties: Properties,
    parent: Option<NodeId>,
}

impl Node {
    #[must_use]
    pub fn is_document(&self) -> bool {
        !self.source.is_empty() || !self.multi_source.is_empty()
    }

    #[must_use]
    pub fn is_container(&self) -> bool {
        !self.nodes.is_empty() || self.node_selector.is_some()
    }

    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Sources in read order: `source` first, then `multi_source`.
    #[must_use]
    pub fn sources(&self) -> Vec<&str> {
        std::iter::once(self.source.as_str())
            .filter(|s| !s.is_empty())
            .chain(self.multi_source.iter().map(String::as_str))
            .collect()
    }

    /// Whether `properties.index` is the boolean `true`.
    #[must_use]
    pub fn is_index(&self) -> bool {
        matches!(self.properties.get("index"), Some(serde_yaml::Value::Bool(true)))
    }
}

/// Root of a parsed manifest: the node arena plus top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "DocumentationSpec", into = "DocumentationSpec")]
pub struct Documentation {
    arena: Vec<Node>,
    pub structure: Vec<NodeId>,
    pub node_selector: Option<NodeSelector>,
    pub links: Option<Links>,
}

impl Documentation {
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.arena[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.arena[id.0]
    }

    /// Inserts `spec` and its descendants, returning the id of the new node.
    ///
    /// The node is attached to `parent`'s child list when a parent is given;
    /// top-level nodes must be pushed to `structure` by the caller.
    pub fn add_node(&mut self, spec: NodeSpec, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.arena.len());
        let NodeSpec {
            name,
            mut source,
            mut multi_source,
            node_selector,
            nodes,
            properties,
        } = spec;

        if source.len() > 1 {
            source.append(&mut multi_source);
            multi_source = source;
            source = Vec::new();
        }

        self.arena.push(Node {
            name,
            source: source.pop().unwrap_or_default(),
            multi_source,
            node_selector,
            nodes: Vec::new(),
            properties,
            parent,
        });
        if let Some(parent) = parent {
            self.arena[parent.0].nodes.push(id);
        }
        for child in nodes {
            self.add_node(child, Some(id));
        }
        id
    }

    /// Iterates `ids` and all their descendants, depth first, in declaration
    /// order.
    #[must_use]
    pub fn descendants(&self, ids: &[NodeId]) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = ids.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).nodes.iter().rev().copied());
        }
        out
    }

    /// Ancestors of `id`, outermost first.
    #[must_use]
    pub fn parents(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.node(parent).parent;
        }
        chain.reverse();
        chain
    }

    /// Names of the ancestors of `id` and `id` itself joined by `separator`.
    #[must_use]
    pub fn full_name(&self, id: NodeId, separator: &str) -> String {
        let mut names: Vec<&str> =
            self.parents(id).into_iter().map(|p| self.node(p).name.as_str()).collect();
        names.push(self.node(id).name.as_str());
        names.join(separator)
    }

    /// Path of the directory a node is written to: the names of its
    /// ancestors joined by `/`.
    #[must_use]
    pub fn parent_path(&self, id: NodeId) -> String {
        self.parents(id)
            .into_iter()
            .map(|p| self.node(p).name.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn to_node_spec(&self, id: NodeId) -> NodeSpec {
        let node = self.node(id);
        NodeSpec {
            name: node.name.clone(),
            source: if node.source.is_empty() {
                Vec::new()
            } else {
                vec![node.source.clone()]
            },
            multi_source: node.multi_source.clone(),
            node_selector: node.node_selector.clone(),
            nodes: node.nodes.iter().map(|child| self.to_node_spec(*child)).collect(),
            properties: node.properties.clone(),
        }
    }
}

impl From<DocumentationSpec> for Documentation {
    fn from(spec: DocumentationSpec) -> Self {
        let mut docs = Self {
            arena: Vec::new(),
            structure: Vec::new(),
            node_selector: spec.node_selector,
            links: spec.links,
        };
        for node in spec.structure {
            let id = docs.add_node(node, None);
            docs.structure.push(id);
        }
        docs
    }
}

impl From<Documentation> for DocumentationSpec {
    fn from(docs: Documentation) -> Self {
        Self {
            structure: docs.structure.iter().map(|id| docs.to_node_spec(*id)).collect(),
            node_selector: docs.node_selector.clone(),
            links: docs.links.clone(),
        }
    }
}
