//! End-to-end runs over the local filesystem.

use anyhow::Result;
use docweave::manifest::ParseOptions;
use docweave::reactor::{Reactor, ReactorOptions, download_name, load_manifest};
use docweave::resource::{FsHandler, Registry, ResourceHandler};
use docweave::writers::FsWriter;
use std::collections::HashMap;
use std::sync::Arc;

use crate::common::TestProject;

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a];

fn registry() -> Arc<Registry> {
    Arc::new(Registry::new([Arc::new(FsHandler::new("master")) as Arc<dyn ResourceHandler>]))
}

fn write_sources(project: &TestProject) -> Result<()> {
    project.write("docs/intro.md", "# Intro\n\n![diagram](img/diagram.png)\n")?;
    project.write("docs/img/diagram.png", PNG)?;
    project.write("docs/guides/setup.md", "# Setup\n")?;
    project.write("docs/guides/deploy/cloud.md", "# Cloud\n")?;
    project.write("docs/guides/notes.txt", "not markdown")?;
    Ok(())
}

#[tokio::test]
async fn test_builds_tree_from_local_sources() -> Result<()> {
    let project = TestProject::new()?;
    write_sources(&project)?;
    let manifest = project.write(
        "manifest.yaml",
        format!(
            "structure:\n  - name: intro.md\n    source: '{}'\n  - name: guides\n    nodesSelector:\n      path: '{}'\n",
            project.uri("docs/intro.md"),
            project.uri("docs/guides"),
        ),
    )?;

    let registry = registry();
    let options = ParseOptions::new(HashMap::new(), false);
    let docs = load_manifest(&manifest.to_string_lossy(), &registry, None, &options).await?;

    let out = project.path("out");
    let reactor = Reactor::new(
        ReactorOptions::default(),
        registry,
        Arc::new(FsWriter::new(&out)),
        Arc::new(FsWriter::new(out.join("__resources"))),
    );
    let report = reactor.run(&docs).await?;
    assert_eq!(report.documents, 3);
    assert_eq!(report.resources, 1);

    let image = download_name("diagram", "png", &project.uri("docs/img/diagram.png"));
    assert_eq!(std::fs::read(out.join("__resources").join(&image))?, PNG);
    assert_eq!(project.read("out/intro.md")?, format!("# Intro\n\n![diagram](/__resources/{image})\n"));
    assert_eq!(project.read("out/guides/setup.md")?, "# Setup\n");
    assert_eq!(project.read("out/guides/deploy/cloud.md")?, "# Cloud\n");
    assert!(!project.path("out/guides/notes.txt").exists());
    Ok(())
}

#[tokio::test]
async fn test_version_branch_is_injected_into_local_manifests() -> Result<()> {
    let project = TestProject::new()?;
    project.write("docs/release.md", "# Release notes\n")?;
    let manifest = project.write(
        "manifest.yaml",
        format!("structure:\n  - name: notes.md\n    source: '{}/{{{{ versions }}}}.md'\n", project.uri("docs")),
    )?;

    let registry = registry();
    let options = ParseOptions::new(HashMap::new(), false);
    let docs = load_manifest(&manifest.to_string_lossy(), &registry, Some("release"), &options).await?;
    assert_eq!(docs.node(docs.structure[0]).source, project.uri("docs/release.md"));
    Ok(())
}

#[tokio::test]
async fn test_directory_manifest_is_rejected() -> Result<()> {
    let project = TestProject::new()?;
    project.write("docs/intro.md", "# Intro\n")?;

    let err = load_manifest(
        &project.uri("docs"),
        &registry(),
        None,
        &ParseOptions::new(HashMap::new(), false),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("is a directory"));
    Ok(())
}

#[tokio::test]
async fn test_missing_local_sources_are_skipped() -> Result<()> {
    let project = TestProject::new()?;
    project.write("docs/intro.md", "# Intro\n")?;
    let manifest = project.write(
        "manifest.yaml",
        format!(
            "structure:\n  - name: combined.md\n    multiSource:\n      - '{}'\n      - '{}'\n  - name: gone.md\n    source: '{}'\n",
            project.uri("docs/intro.md"),
            project.uri("docs/missing.md"),
            project.uri("docs/also-missing.md"),
        ),
    )?;

    let registry = registry();
    let options = ParseOptions::new(HashMap::new(), false);
    let docs = load_manifest(&manifest.to_string_lossy(), &registry, None, &options).await?;

    let out = project.path("out");
    let reactor = Reactor::new(
        ReactorOptions::default(),
        registry,
        Arc::new(FsWriter::new(&out)),
        Arc::new(FsWriter::new(out.join("__resources"))),
    );
    let report = reactor.run(&docs).await?;
    assert_eq!(report.documents, 1);
    assert_eq!(project.read("out/combined.md")?, "# Intro\n");
    assert!(!project.path("out/gone.md").exists());
    Ok(())
}
