//! Tests for manifest decoding, templating and serialization.

use crate::core::DocweaveError;
use crate::manifest::{
    Documentation, DocumentationSpec, NodeSpec, parse, parse_with_metadata, serialize,
};
use anyhow::Result;
use std::collections::HashMap;

fn no_vars() -> HashMap<String, String> {
    HashMap::new()
}

#[test]
fn test_parse_sets_parents_top_down() -> Result<()> {
    let raw = r"
structure:
  - name: guides
    nodes:
      - name: setup
        nodes:
          - source: docs/install.md
";
    let docs = parse(raw, &no_vars(), false)?;

    let guides = docs.structure[0];
    let setup = docs.node(guides).nodes[0];
    let install = docs.node(setup).nodes[0];

    assert_eq!(docs.node(install).parent(), Some(setup));
    assert_eq!(docs.node(setup).parent(), Some(guides));
    assert_eq!(docs.node(guides).parent(), None);
    assert_eq!(docs.parent_path(install), "guides/setup");
    assert_eq!(docs.full_name(setup, "."), "guides.setup");
    Ok(())
}

#[test]
fn test_source_list_maps_to_source_or_multi_source() -> Result<()> {
    let raw = r"
structure:
  - name: single.md
    source: [docs/a.md]
  - name: combined.md
    source:
      - docs/b.md
      - docs/c.md
";
    let docs = parse(raw, &no_vars(), false)?;

    let single = docs.node(docs.structure[0]);
    assert_eq!(single.source, "docs/a.md");
    assert!(single.multi_source.is_empty());

    let combined = docs.node(docs.structure[1]);
    assert!(combined.source.is_empty());
    assert_eq!(combined.multi_source, vec!["docs/b.md", "docs/c.md"]);
    assert_eq!(combined.sources(), vec!["docs/b.md", "docs/c.md"]);
    Ok(())
}

#[test]
fn test_node_selector_alias_and_fields() -> Result<()> {
    let raw = r#"
nodeSelector:
  path: docs
structure:
  - name: reference
    nodesSelector:
      path: docs/reference
      excludePaths: ["internal/**"]
      frontMatter:
        draft: false
      excludeFrontMatter:
        hidden: true
      depth: 2
"#;
    let docs = parse(raw, &no_vars(), false)?;

    assert_eq!(docs.node_selector.as_ref().map(|s| s.path.as_str()), Some("docs"));
    let selector = docs.node(docs.structure[0]).node_selector.clone().unwrap();
    assert_eq!(selector.path, "docs/reference");
    assert_eq!(selector.exclude_paths, vec!["internal/**"]);
    assert_eq!(selector.front_matter.get("draft"), Some(&serde_yaml::Value::Bool(false)));
    assert_eq!(selector.exclude_front_matter.get("hidden"), Some(&serde_yaml::Value::Bool(true)));
    assert_eq!(selector.depth, 2);
    Ok(())
}

#[test]
fn test_links_section() -> Result<()> {
    let raw = r#"
structure:
  - source: docs/a.md
links:
  rewrites:
    "github.com/acme/app":
      version: main
    "example.com/gone":
      destination: ""
  downloads:
    renames:
      "logo\\.png": brand.png
    scope: ["github.com/acme/.*"]
"#;
    let docs = parse(raw, &no_vars(), false)?;
    let links = docs.links.clone().unwrap();

    assert_eq!(links.rewrites["github.com/acme/app"].version.as_deref(), Some("main"));
    assert_eq!(links.rewrites["example.com/gone"].destination.as_deref(), Some(""));
    let downloads = links.downloads.unwrap();
    assert_eq!(downloads.renames["logo\\.png"], "brand.png");
    assert_eq!(downloads.scope, vec!["github.com/acme/.*"]);
    Ok(())
}

#[test]
fn test_variables_are_substituted() -> Result<()> {
    let raw = "structure:\n  - source: https://github.com/acme/app/blob/{{ version }}/README.md\n";
    let vars = HashMap::from([("version".to_string(), "v1.2.0".to_string())]);
    let docs = parse(raw, &vars, false)?;

    assert_eq!(
        docs.node(docs.structure[0]).source,
        "https://github.com/acme/app/blob/v1.2.0/README.md"
    );
    Ok(())
}

#[test]
fn test_split_and_add_functions() -> Result<()> {
    let raw = r#"{% set parts = Split(s=path, sep="/") %}
structure:
  - name: part-{{ Add(a=1, b=2) }}.md
    source: docs/{{ parts | last }}.md
"#;
    let vars = HashMap::from([("path".to_string(), "guides/intro".to_string())]);
    let docs = parse(raw, &vars, false)?;

    let node = docs.node(docs.structure[0]);
    assert_eq!(node.name, "part-3.md");
    assert_eq!(node.source, "docs/intro.md");
    Ok(())
}

#[test]
fn test_undefined_variable_is_parse_error() {
    let raw = "structure:\n  - source: docs/{{ missing }}.md\n";
    let err = parse(raw, &no_vars(), false).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DocweaveError>(),
        Some(DocweaveError::ManifestParseError { .. })
    ));
}

#[test]
fn test_invalid_yaml_is_parse_error() {
    let raw = "structure:\n  - source: [unterminated\n";
    let err = parse(raw, &no_vars(), false).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DocweaveError>(),
        Some(DocweaveError::ManifestParseError { .. })
    ));
}

#[test]
fn test_parse_with_metadata_injects_versions() -> Result<()> {
    let raw = "structure:\n  - source: https://github.com/acme/app/blob/{{ versions }}/README.md\n";
    let mut vars = HashMap::new();
    vars.insert("unused".to_string(), "x".to_string());
    let docs = parse_with_metadata(raw, "main", &vars, false)?;

    assert_eq!(
        docs.node(docs.structure[0]).source,
        "https://github.com/acme/app/blob/main/README.md"
    );
    assert!(!vars.contains_key("versions"));
    Ok(())
}

#[test]
fn test_serialize_round_trips_structure() -> Result<()> {
    let raw = r"
nodesSelector:
  path: docs/extra
structure:
  - name: guides
    properties:
      weight: 10
    nodes:
      - source: docs/intro.md
      - name: all.md
        multiSource:
          - docs/a.md
          - docs/b.md
  - name: reference
    nodesSelector:
      path: docs/reference
      depth: 1
links:
  rewrites:
    acme:
      version: main
";
    let docs = parse(raw, &no_vars(), false)?;
    let yaml = serialize(&docs)?;
    let reparsed = parse(&yaml, &no_vars(), false)?;

    assert_eq!(DocumentationSpec::from(docs), DocumentationSpec::from(reparsed));
    assert!(yaml.contains("nodesSelector"));
    assert!(yaml.contains("multiSource"));
    Ok(())
}

#[test]
fn test_add_node_attaches_to_parent() {
    let mut docs = Documentation::from(DocumentationSpec {
        structure: vec![NodeSpec::container("guides", vec![NodeSpec::document("", "a.md")])],
        ..DocumentationSpec::default()
    });
    let guides = docs.structure[0];
    let added = docs.add_node(
        NodeSpec::container("more", vec![NodeSpec::document("", "b.md")]),
        Some(guides),
    );

    assert_eq!(docs.node(guides).nodes.len(), 2);
    assert_eq!(docs.node(added).parent(), Some(guides));
    assert_eq!(docs.descendants(&docs.structure).len(), 4);
}
