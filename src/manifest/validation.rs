//! Structural validation of a parsed manifest.
//!
//! Validation never stops at the first problem: every rule is checked over
//! the whole tree and all violations come back as one
//! [`DocweaveError::ManifestValidationError`]. A collision report, when
//! present, leads the list.

use anyhow::{Result, anyhow};

use crate::constants::{SECTION_FILE_NAME, SECTION_FILE_STEM};
use crate::core::{DocweaveError, MultiError};
use crate::manifest::collision::check_for_collisions;
use crate::manifest::{Documentation, NodeId, NodeSelector};

/// Switches that change how a manifest is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Whether names are computed for Hugo (section files from `index: true`).
    pub hugo: bool,
    /// Whether anonymous selector-only nodes hand their selector to their parent.
    pub legacy_selector_hoist: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            hugo: false,
            legacy_selector_hoist: true,
        }
    }
}

/// Validates `docs`, applying the legacy selector hoist when enabled.
pub fn validate_documentation(docs: &mut Documentation, options: &ValidationOptions) -> Result<()> {
    let mut errors = MultiError::new();
    if docs.structure.is_empty() && docs.node_selector.is_none() {
        errors.push(anyhow!(
            "the document structure must contains at least one of these properties: structure, nodesSelector"
        ));
    }

    errors.append(validate_tree(docs, options, false));
    errors.push_result(validate_node_selector(docs.node_selector.as_ref(), "/"));
    into_validation_error(errors)
}

/// Validates a tree whose selectors have been expanded.
///
/// Nodes returned by selectors get the same per-node and sibling checks as
/// declared ones. Nothing is hoisted, and a container left empty by a
/// selector that matched nothing is accepted.
pub fn validate_resolved(docs: &mut Documentation, hugo: bool) -> Result<()> {
    let options = ValidationOptions {
        hugo,
        legacy_selector_hoist: false,
    };
    into_validation_error(validate_tree(docs, &options, true))
}

fn validate_tree(docs: &mut Documentation, options: &ValidationOptions, resolved: bool) -> MultiError {
    let mut errors = MultiError::new();
    let structure = docs.structure.clone();
    errors.append(validate_section_file(docs, &structure));
    for id in structure {
        errors.append(validate_node(docs, id, options, resolved));
    }

    if let Err(collision) = check_for_collisions(docs, &docs.structure, options.hugo) {
        errors.push_front(collision);
    }
    errors
}

fn into_validation_error(errors: MultiError) -> Result<()> {
    errors.into_result().map_err(|errors| {
        DocweaveError::ManifestValidationError {
            errors,
        }
        .into()
    })
}

fn validate_node_selector(selector: Option<&NodeSelector>, owner: &str) -> Result<()> {
    match selector {
        Some(selector) if selector.path.is_empty() => {
            Err(anyhow!("nodesSelector under {owner} must contains a path property"))
        }
        _ => Ok(()),
    }
}

fn validate_node(
    docs: &mut Documentation,
    id: NodeId,
    options: &ValidationOptions,
    resolved: bool,
) -> MultiError {
    let mut errors = MultiError::new();
    let full_name = docs.full_name(id, "/");
    let node = docs.node(id);

    if node.is_document() && node.source.is_empty() && node.name.is_empty() {
        errors.push(anyhow!(
            "node {full_name} must contains at least one of these properties: source, name"
        ));
    }
    if !resolved
        && node.source.is_empty()
        && node.node_selector.is_none()
        && node.multi_source.is_empty()
        && node.nodes.is_empty()
    {
        errors.push(anyhow!(
            "node {full_name} must contains at least one of these properties: source, nodesSelector, multiSource, nodes"
        ));
    }
    if node.is_document() && node.is_container() {
        errors.push(anyhow!(
            "node {full_name} must be categorized as a document or a container, please specify only one of the following groups of properties: (source/multiSource),(nodes,nodesSelector)"
        ));
    }
    errors.push_result(validate_node_selector(node.node_selector.as_ref(), &full_name));
    for (position, source) in node.multi_source.iter().enumerate() {
        if source.is_empty() {
            errors.push(anyhow!(
                "node {full_name} contains empty multiSource value at position {position}"
            ));
        }
    }

    let children = node.nodes.clone();
    if !children.is_empty() {
        errors.append(validate_section_file(docs, &children));
        for child in children {
            errors.append(validate_node(docs, child, options, resolved));
        }
    }

    if options.legacy_selector_hoist {
        hoist_nameless_selector(docs, id);
    }
    errors
}

/// Moves the selector of an anonymous selector-only node onto its parent.
///
/// Applies only when the node has no name, is not a document, owns a
/// selector but no children, and its parent has no selector yet. The node is
/// detached from its parent; it stays in the arena but is no longer reachable
/// from the tree. Returns whether the hoist happened.
pub fn hoist_nameless_selector(docs: &mut Documentation, id: NodeId) -> bool {
    let node = docs.node(id);
    let Some(parent) = node.parent() else {
        return false;
    };
    if !node.name.is_empty()
        || node.is_document()
        || node.node_selector.is_none()
        || !node.nodes.is_empty()
        || docs.node(parent).node_selector.is_some()
    {
        return false;
    }

    let selector = docs.node_mut(id).node_selector.take();
    let parent_node = docs.node_mut(parent);
    parent_node.node_selector = selector;
    parent_node.nodes.retain(|child| *child != id);
    true
}

/// Checks that at most one sibling is a section file.
fn validate_section_file(docs: &Documentation, nodes: &[NodeId]) -> MultiError {
    let mut errors = MultiError::new();
    let mut indexed = Vec::new();
    let mut named = Vec::new();

    for id in nodes {
        let node = docs.node(*id);
        if !node.is_document() {
            continue;
        }
        if node.is_index() {
            indexed.push(docs.full_name(*id, "/"));
        } else if node.name == SECTION_FILE_NAME || node.name == SECTION_FILE_STEM {
            named.push(docs.full_name(*id, "/"));
        }
    }

    if indexed.len() > 1 {
        errors.push(anyhow!(
            "property index: true defined for multiple peer nodes: {}",
            indexed.join(",")
        ));
    }
    if named.len() > 1 {
        errors.push(anyhow!("_index.md defined for multiple peer nodes: {}", named.join(",")));
    }
    if indexed.len() == 1 && !named.is_empty() {
        errors.push(anyhow!(
            "index node {} collides with peer nodes: {}",
            indexed[0],
            named.join(",")
        ));
    }
    errors
}
