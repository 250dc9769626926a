//! Selector expansion and derivation of the flat work list.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::cancellable;
use crate::manifest::{Documentation, NodeId, NodeSelector, NodeSpec, node_name, validate_resolved};
use crate::resource::Registry;

/// One document to fetch, transform and write.
#[derive(Debug, Clone)]
pub struct DocumentWorkTask {
    pub id: NodeId,
    pub docs: Arc<Documentation>,
    /// Effective output file name.
    pub name: String,
    /// Output directory, `/` separated, empty for top-level documents.
    pub path: String,
}

impl DocumentWorkTask {
    #[must_use]
    pub fn node(&self) -> &crate::manifest::Node {
        self.docs.node(self.id)
    }

    /// Output path relative to the writer root.
    #[must_use]
    pub fn output_path(&self) -> String {
        crate::writers::join_output_path(&self.path, &self.name)
    }
}

/// Returns a copy of `docs` with every node selector replaced by the nodes it
/// selects.
///
/// The root selector contributes additional top-level nodes after the
/// declared structure. Expanded nodes are walked in turn, so selectors
/// returned by a provider are expanded as well.
pub async fn resolve_documentation(
    registry: &Registry,
    docs: &Documentation,
    hugo: bool,
    cancel: &CancellationToken,
) -> Result<Documentation> {
    let mut resolved = docs.clone();

    if let Some(selector) = resolved.node_selector.take() {
        for spec in expand(registry, &selector, cancel).await? {
            let id = resolved.add_node(spec, None);
            resolved.structure.push(id);
        }
    }

    let mut pending: Vec<NodeId> = resolved.structure.iter().rev().copied().collect();
    while let Some(id) = pending.pop() {
        if let Some(selector) = resolved.node_mut(id).node_selector.take() {
            let specs = expand(registry, &selector, cancel)
                .await
                .with_context(|| format!("Failed to resolve node {}", resolved.full_name(id, ".")))?;
            for spec in specs {
                resolved.add_node(spec, Some(id));
            }
        }
        pending.extend(resolved.node(id).nodes.iter().rev().copied());
    }

    validate_resolved(&mut resolved, hugo)?;
    tracing::debug!(
        target: "docweave::reactor",
        "Resolved {} nodes",
        resolved.descendants(&resolved.structure).len()
    );
    Ok(resolved)
}

async fn expand(
    registry: &Registry,
    selector: &NodeSelector,
    cancel: &CancellationToken,
) -> Result<Vec<NodeSpec>> {
    let handler = registry.require(&selector.path)?;
    tracing::debug!(
        target: "docweave::reactor",
        "Expanding node selector {} with {}",
        selector.path,
        handler.name()
    );
    cancellable(cancel, handler.resolve_node_selector(selector))
        .await
        .with_context(|| format!("Failed to resolve node selector {}", selector.path))
}

/// One task per document node of a resolved tree, in declaration order.
pub fn derive_tasks(docs: &Arc<Documentation>, hugo: bool) -> Result<Vec<DocumentWorkTask>> {
    docs.descendants(&docs.structure)
        .into_iter()
        .filter(|id| docs.node(*id).is_document())
        .map(|id| {
            Ok(DocumentWorkTask {
                id,
                docs: Arc::clone(docs),
                name: node_name(docs, id, hugo)?,
                path: docs.parent_path(id),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::parse;
    use crate::test_utils::ScriptedHandler;
    use std::collections::HashMap;

    fn registry(handler: ScriptedHandler) -> Registry {
        Registry::new([Arc::new(handler) as Arc<dyn crate::resource::ResourceHandler>])
    }

    #[tokio::test]
    async fn test_expands_nested_and_root_selectors() -> Result<()> {
        let docs = parse(
            r"
structure:
  - name: intro.md
    source: docs/intro.md
  - name: guides
    nodesSelector:
      path: docs/guides
nodesSelector:
  path: docs/extra
",
            &HashMap::new(),
            false,
        )?;
        let registry = registry(
            ScriptedHandler::new("docs")
                .with_selector("docs/guides", vec![NodeSpec::document("setup.md", "docs/guides/setup.md")])
                .with_selector(
                    "docs/extra",
                    vec![NodeSpec::container(
                        "api",
                        vec![NodeSpec::document("ref.md", "docs/extra/api/ref.md")],
                    )],
                ),
        );

        let resolved = resolve_documentation(&registry, &docs, false, &CancellationToken::new()).await?;
        assert!(resolved.node_selector.is_none());

        let tasks = derive_tasks(&Arc::new(resolved), false)?;
        let outputs: Vec<String> = tasks.iter().map(DocumentWorkTask::output_path).collect();
        assert_eq!(outputs, vec!["intro.md", "guides/setup.md", "api/ref.md"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_expansion_collision_is_reported() -> Result<()> {
        let docs = parse(
            r"
structure:
  - name: guides
    nodes:
      - name: setup.md
        source: docs/setup.md
    nodesSelector:
      path: docs/guides
",
            &HashMap::new(),
            false,
        );
        // A node with both nodes and a selector is a valid container.
        let docs = docs?;
        let registry = registry(
            ScriptedHandler::new("docs")
                .with_selector("docs/guides", vec![NodeSpec::document("setup.md", "docs/guides/setup.md")]),
        );

        let err = resolve_documentation(&registry, &docs, false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Node with name setup.md appears 2 times"));
        Ok(())
    }

    #[tokio::test]
    async fn test_selected_nodes_are_validated() -> Result<()> {
        let docs = parse(
            "structure:\n  - name: guides\n    nodesSelector:\n      path: docs/guides\n",
            &HashMap::new(),
            false,
        )?;
        let ambiguous = NodeSpec {
            nodes: vec![NodeSpec::document("child.md", "docs/guides/child.md")],
            ..NodeSpec::document("both.md", "docs/guides/both.md")
        };
        let empty_part = NodeSpec {
            multi_source: vec!["docs/guides/a.md".to_string(), String::new()],
            ..NodeSpec::default()
        };
        let registry = registry(
            ScriptedHandler::new("docs").with_selector("docs/guides", vec![ambiguous, empty_part]),
        );

        let err = resolve_documentation(&registry, &docs, false, &CancellationToken::new())
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("node guides/both.md must be categorized as a document or a container"));
        assert!(message.contains("contains empty multiSource value at position 1"));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_selection_is_accepted() -> Result<()> {
        let docs = parse(
            "structure:\n  - name: guides\n    nodesSelector:\n      path: docs/guides\n",
            &HashMap::new(),
            false,
        )?;
        let registry = registry(ScriptedHandler::new("docs").with_selector("docs/guides", Vec::new()));

        let resolved = resolve_documentation(&registry, &docs, false, &CancellationToken::new()).await?;
        assert!(resolved.node(resolved.structure[0]).nodes.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_unhandled_selector_fails() -> Result<()> {
        let docs = parse(
            "structure:\n  - name: guides\n    nodesSelector:\n      path: ftp://host/docs\n",
            &HashMap::new(),
            false,
        )?;
        let registry = registry(ScriptedHandler::new("docs").accepting("docs/"));
        let err = resolve_documentation(&registry, &docs, false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("ftp://host/docs"));
        Ok(())
    }

    #[test]
    fn test_containers_yield_no_tasks() -> Result<()> {
        let docs = parse(
            r"
structure:
  - name: a
    nodes:
      - name: b
        nodes:
          - source: docs/x.md
  - source: [docs/p1.md, docs/p2.md]
    name: joined.md
",
            &HashMap::new(),
            false,
        )?;
        let tasks = derive_tasks(&Arc::new(docs), false)?;
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].output_path(), "a/b/x.md");
        assert_eq!(tasks[1].node().multi_source, vec!["docs/p1.md", "docs/p2.md"]);
        Ok(())
    }
}
