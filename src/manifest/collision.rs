//! Effective output names and sibling collision detection.
//!
//! Every document is written under its parent's path with an *effective
//! name* derived from its `name` template and source. Two siblings producing
//! the same effective name would overwrite each other, so the whole tree is
//! checked before any work starts.

use anyhow::{Result, bail};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use crate::constants::{MARKDOWN_EXTENSION, ROOT_PARENT_PATH, SECTION_FILE_NAME};
use crate::core::DocweaveError;
use crate::manifest::helpers::resource_info;
use crate::manifest::{Documentation, NodeId};

/// Siblings of one container that resolve to the same output name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    /// Dotted path of the container, `root` for top-level nodes.
    pub node_parent_path: String,
    /// Colliding name mapped to the sources producing it, in declaration order.
    pub collided_nodes: BTreeMap<String, Vec<String>>,
}

/// Renders collisions as a single human-readable report.
#[must_use]
pub fn format_collisions(collisions: &[Collision]) -> String {
    let mut report = String::from("Node collisions detected.");
    for collision in collisions {
        report.push_str("\nIn ");
        report.push_str(&collision.node_parent_path);
        report.push_str(" container node.");
        for (name, sources) in &collision.collided_nodes {
            report.push_str(&format!(
                " Node with name {name} appears {} times for sources: {}.",
                sources.len(),
                sources.join(", ")
            ));
        }
    }
    report
}

/// Computes the name a node is written under.
///
/// Document names are templates: `$name` expands to the source file stem,
/// `$ext` to its extension and `$uuid` to a fresh UUID. An empty name means
/// `$name$ext`. In Hugo mode a node with `properties.index: true` becomes the
/// section file. A computed name without the markdown extension falls back
/// to the declared `name` followed by `.md`.
///
/// Container nodes must be named and keep their name unchanged.
pub fn node_name(docs: &Documentation, id: NodeId, hugo: bool) -> Result<String> {
    let node = docs.node(id);
    if !node.is_document() {
        if node.name.is_empty() {
            bail!("container node {} should have a name", docs.full_name(id, "/"));
        }
        return Ok(node.name.clone());
    }

    if !node.source.is_empty() && !node.multi_source.is_empty() {
        bail!(
            "document node {} has a source and multisource property defined at the same time",
            docs.full_name(id, "/")
        );
    }
    if node.name.is_empty() && !node.multi_source.is_empty() {
        bail!(
            "document node {} can't have a missing name and a defined multisource",
            docs.full_name(id, "/")
        );
    }

    let mut name = if node.name.is_empty() {
        "$name$ext".to_string()
    } else {
        node.name.clone()
    };

    if name.contains('$') {
        let info = resource_info(&node.source)?;
        name = name
            .replace("$name", &info.stem)
            .replace("$uuid", &Uuid::new_v4().to_string())
            .replace("$ext", &info.ext);
    }

    if hugo && node.is_index() {
        name = SECTION_FILE_NAME.to_string();
    }

    if !name.ends_with(MARKDOWN_EXTENSION) {
        name = format!("{}{MARKDOWN_EXTENSION}", node.name);
    }
    Ok(name)
}

/// Dotted path of a container used in collision reports.
#[must_use]
pub fn node_parent_path(docs: &Documentation, parent: Option<NodeId>) -> String {
    parent.map_or_else(|| ROOT_PARENT_PATH.to_string(), |id| docs.full_name(id, "."))
}

/// Checks `nodes` and every container below them for sibling collisions.
///
/// Returns [`DocweaveError::NodeCollision`] listing every collision found,
/// or the first failure to compute a node name.
pub fn check_for_collisions(docs: &Documentation, nodes: &[NodeId], hugo: bool) -> Result<()> {
    let mut collisions = Vec::new();
    deep_check(docs, nodes, None, hugo, &mut collisions)?;
    if collisions.is_empty() {
        return Ok(());
    }
    Err(DocweaveError::NodeCollision {
        collisions,
    }
    .into())
}

fn deep_check(
    docs: &Documentation,
    nodes: &[NodeId],
    parent: Option<NodeId>,
    hugo: bool,
    collisions: &mut Vec<Collision>,
) -> Result<()> {
    if let Some(collision) = check_nodes_for_collision(docs, nodes, parent, hugo)? {
        collisions.push(collision);
    }
    for id in nodes {
        let children = &docs.node(*id).nodes;
        if !children.is_empty() {
            deep_check(docs, children, Some(*id), hugo, collisions)?;
        }
    }
    Ok(())
}

/// Checks one set of siblings, returning the collision among them if any.
pub fn check_nodes_for_collision(
    docs: &Documentation,
    nodes: &[NodeId],
    parent: Option<NodeId>,
    hugo: bool,
) -> Result<Option<Collision>> {
    if nodes.len() < 2 {
        return Ok(None);
    }

    let names = nodes
        .iter()
        .map(|id| node_name(docs, *id, hugo))
        .collect::<Result<Vec<_>>>()?;

    let mut seen = HashSet::with_capacity(names.len());
    let colliding: HashSet<&String> = names.iter().filter(|name| !seen.insert(*name)).collect();
    if colliding.is_empty() {
        return Ok(None);
    }

    let mut collided_nodes: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (id, name) in nodes.iter().zip(&names) {
        if colliding.contains(name) {
            let node = docs.node(*id);
            let source = if node.source.is_empty() {
                docs.full_name(*id, "/")
            } else {
                node.source.clone()
            };
            collided_nodes.entry(name.clone()).or_default().push(source);
        }
    }

    Ok(Some(Collision {
        node_parent_path: node_parent_path(docs, parent),
        collided_nodes,
    }))
}
