//! Reactor runs against scripted handlers and in-memory writers.

use anyhow::Result;
use docweave::core::DocweaveError;
use docweave::manifest::{Node, NodeSpec, parse};
use docweave::processors::ProcessorChain;
use docweave::reactor::{Reactor, ReactorOptions, download_name};
use docweave::resource::{Registry, ResourceHandler};
use docweave::test_utils::{MemoryWriter, ScriptedHandler};
use std::collections::HashMap;
use std::sync::Arc;

const THREE_DOCUMENTS: &str = r"
structure:
  - name: a.md
    source: repo/a.md
  - name: b.md
    source: repo/b.md
  - name: c.md
    source: repo/c.md
";

struct Harness {
    handler: Arc<ScriptedHandler>,
    documents: Arc<MemoryWriter>,
    resources: Arc<MemoryWriter>,
    reactor: Reactor,
}

impl Harness {
    fn new(handler: ScriptedHandler, options: ReactorOptions) -> Self {
        let handler = Arc::new(handler.accepting("repo/"));
        let registry = Arc::new(Registry::new([Arc::clone(&handler) as Arc<dyn ResourceHandler>]));
        let documents = Arc::new(MemoryWriter::new());
        let resources = Arc::new(MemoryWriter::new());
        let reactor = Reactor::new(
            options,
            registry,
            Arc::clone(&documents) as _,
            Arc::clone(&resources) as _,
        );
        Self {
            handler,
            documents,
            resources,
            reactor,
        }
    }
}

fn workers(count: usize, fail_fast: bool) -> ReactorOptions {
    ReactorOptions {
        min_workers: count,
        max_workers: count,
        fail_fast,
        ..ReactorOptions::default()
    }
}

#[tokio::test]
async fn test_fail_fast_stops_at_first_failure() -> Result<()> {
    docweave::test_utils::init_test_logging(None);
    let docs = parse(THREE_DOCUMENTS, &HashMap::new(), false)?;
    let harness = Harness::new(
        ScriptedHandler::new("repo")
            .with_content("repo/a.md", "# A")
            .failing("repo/b.md", "connection reset by peer")
            .with_content("repo/c.md", "# C"),
        workers(1, true),
    );

    let err = harness.reactor.run(&docs).await.unwrap_err();
    let rendered = format!("{err:#}");
    assert!(rendered.contains("failed to process document b.md"), "{rendered}");
    assert!(rendered.contains("connection reset by peer"), "{rendered}");
    assert!(!matches!(err.downcast_ref::<DocweaveError>(), Some(DocweaveError::TasksFailed { .. })));

    assert_eq!(harness.documents.paths(), vec!["a.md"]);
    assert!(!harness.handler.reads().contains(&"repo/c.md".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_aggregate_policy_runs_every_task() -> Result<()> {
    let docs = parse(THREE_DOCUMENTS, &HashMap::new(), false)?;
    let harness = Harness::new(
        ScriptedHandler::new("repo")
            .with_content("repo/a.md", "# A")
            .failing("repo/b.md", "boom")
            .with_content("repo/c.md", "# C"),
        workers(1, false),
    );

    let err = harness.reactor.run(&docs).await.unwrap_err();
    match err.downcast_ref::<DocweaveError>() {
        Some(DocweaveError::TasksFailed { errors }) => assert_eq!(errors.len(), 1),
        other => panic!("expected an aggregated error, got {other:?}"),
    }
    let rendered = err.to_string();
    assert!(rendered.starts_with("1 error occurred:"), "{rendered}");
    assert!(rendered.contains("failed to process document b.md") && rendered.contains("boom"));
    assert_eq!(harness.documents.paths(), vec!["a.md", "c.md"]);
    Ok(())
}

#[tokio::test]
async fn test_multi_source_joins_parts_and_skips_missing() -> Result<()> {
    let docs = parse(
        r"
structure:
  - name: guides
    nodes:
      - name: joined.md
        multiSource: [repo/p1.md, repo/missing.md, repo/p2.md]
      - name: gone.md
        source: repo/gone.md
",
        &HashMap::new(),
        false,
    )?;
    let harness = Harness::new(
        ScriptedHandler::new("repo").with_content("repo/p1.md", "one").with_content("repo/p2.md", "two"),
        ReactorOptions::default(),
    );

    let report = harness.reactor.run(&docs).await?;
    assert_eq!(report.documents, 1);
    assert_eq!(harness.documents.get_string("guides/joined.md").as_deref(), Some("one\ntwo"));
    assert!(harness.documents.get("guides/gone.md").is_none());
    Ok(())
}

#[tokio::test]
async fn test_metadata_is_written_next_to_documents() -> Result<()> {
    let docs = parse(
        "structure:\n  - name: guides\n    nodes:\n      - name: a.md\n        source: repo/a.md\n",
        &HashMap::new(),
        false,
    )?;
    let metadata = Arc::new(MemoryWriter::new());
    let harness = Harness::new(
        ScriptedHandler::new("repo")
            .with_content("repo/a.md", "# A")
            .with_git_info("repo/a.md", r#"{"author":"Docs Bot"}"#),
        ReactorOptions::default(),
    );
    let reactor = harness.reactor.with_metadata_writer(Arc::clone(&metadata) as _);

    reactor.run(&docs).await?;
    assert_eq!(metadata.get_string("guides/a.md.json").as_deref(), Some(r#"{"author":"Docs Bot"}"#));
    assert!(harness.documents.get("guides/a.md").is_some());
    Ok(())
}

#[tokio::test]
async fn test_embedded_images_are_downloaded_once() -> Result<()> {
    let docs = parse(
        r"
structure:
  - name: guide.md
    source: repo/docs/guide.md
  - name: again.md
    source: repo/docs/again.md
",
        &HashMap::new(),
        false,
    )?;
    let harness = Harness::new(
        ScriptedHandler::new("repo")
            .with_content("repo/docs/guide.md", "![arch](img/arch.png) see [setup](setup.md)")
            .with_content("repo/docs/again.md", "![arch](./img/arch.png)")
            .with_content("repo/docs/img/arch.png", vec![0x89, b'P', b'N', b'G']),
        ReactorOptions::default(),
    );

    let report = harness.reactor.run(&docs).await?;
    let name = download_name("arch", "png", "repo/docs/img/arch.png");
    assert_eq!(report.resources, 1);
    assert_eq!(harness.resources.paths(), vec![name.clone()]);
    assert_eq!(harness.resources.get(&name), Some(vec![0x89, b'P', b'N', b'G']));

    let guide = harness.documents.get_string("guide.md").unwrap_or_default();
    assert_eq!(guide, format!("![arch](/__resources/{name}) see [setup](repo/docs/setup.md)"));
    let again = harness.documents.get_string("again.md").unwrap_or_default();
    assert_eq!(again, format!("![arch](/__resources/{name})"));
    Ok(())
}

#[tokio::test]
async fn test_resolve_mode_fetches_nothing() -> Result<()> {
    let docs = parse(
        "structure:\n  - name: reference\n    nodesSelector:\n      path: repo/reference\n",
        &HashMap::new(),
        false,
    )?;
    let harness = Harness::new(
        ScriptedHandler::new("repo")
            .with_selector("repo/reference", vec![NodeSpec::document("api.md", "repo/reference/api.md")])
            .with_content("repo/reference/api.md", "# API"),
        ReactorOptions {
            resolve: true,
            ..ReactorOptions::default()
        },
    );

    let report = harness.reactor.run(&docs).await?;
    assert_eq!(report.documents, 0);
    assert!(harness.handler.reads().is_empty());
    assert!(harness.documents.paths().is_empty());

    let resolved = &report.documentation;
    let reference = resolved.node(resolved.structure[0]);
    assert!(reference.node_selector.is_none());
    assert_eq!(resolved.node(reference.nodes[0]).source, "repo/reference/api.md");
    Ok(())
}

#[tokio::test]
async fn test_cancelled_reactor_reports_cancellation() -> Result<()> {
    let docs = parse(THREE_DOCUMENTS, &HashMap::new(), false)?;
    let harness = Harness::new(
        ScriptedHandler::new("repo")
            .with_content("repo/a.md", "# A")
            .with_content("repo/b.md", "# B")
            .with_content("repo/c.md", "# C"),
        workers(1, false),
    );
    harness.reactor.cancellation_token().cancel();

    let err = harness.reactor.run(&docs).await.unwrap_err();
    assert!(docweave::core::is_cancelled(&err));
    assert!(harness.documents.paths().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_processors_run_before_link_rewriting() -> Result<()> {
    let docs = parse(
        "structure:\n  - name: guide.md\n    source: repo/docs/guide.md\n",
        &HashMap::new(),
        false,
    )?;
    let harness = Harness::new(
        ScriptedHandler::new("repo").with_content("repo/docs/guide.md", "# Guide"),
        ReactorOptions::default(),
    );
    let front_matter = |content: Vec<u8>, node: &Node| -> Result<Vec<u8>> {
        let mut out = format!("---\ntitle: {}\n---\n[next](next.md)\n", node.name).into_bytes();
        out.extend(content);
        Ok(out)
    };
    let reactor = harness.reactor.with_processor(ProcessorChain::new().with(front_matter));

    reactor.run(&docs).await?;
    assert_eq!(
        harness.documents.get_string("guide.md").as_deref(),
        Some("---\ntitle: guide.md\n---\n[next](repo/docs/next.md)\n# Guide")
    );
    Ok(())
}
