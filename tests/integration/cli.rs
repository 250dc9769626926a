//! Tests of the `docweave` binary.

use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;

use crate::common::TestProject;

fn project_with_manifest() -> Result<TestProject> {
    let project = TestProject::new()?;
    project.write("docs/intro.md", "# Intro\n\nSee [setup](guides/setup.md).\n")?;
    project.write("docs/guides/setup.md", "# Setup\n")?;
    project.write(
        "manifest.yaml",
        r"
structure:
  - name: intro.md
    source: docs/intro.md
  - name: guides
    nodesSelector:
      path: docs/guides
",
    )?;
    Ok(project)
}

#[test]
fn test_writes_documentation_tree() -> Result<()> {
    let project = project_with_manifest()?;

    let output = project.run_docweave(&["--manifest", "manifest.yaml", "--destination", "out"])?;
    assert!(output.success, "stderr: {}", output.stderr);
    assert!(output.stdout.contains("✓"));
    assert!(output.stdout.contains("Wrote 2 documents"));
    assert!(project.read("out/intro.md")?.contains("[setup](docs/guides/setup.md)"));
    assert_eq!(project.read("out/guides/setup.md")?, "# Setup\n");
    Ok(())
}

#[test]
fn test_resolve_prints_expanded_manifest() -> Result<()> {
    let project = project_with_manifest()?;

    let output = project.run_docweave(&["--manifest", "manifest.yaml", "--resolve"])?;
    assert!(output.success, "stderr: {}", output.stderr);
    assert!(output.stdout.contains("structure:"));
    assert!(output.stdout.contains("docs/guides/setup.md"));
    assert!(!output.stdout.contains("nodesSelector"));
    assert!(!project.path("out").exists());
    Ok(())
}

#[test]
fn test_dry_run_writes_nothing() -> Result<()> {
    let project = project_with_manifest()?;

    let output =
        project.run_docweave(&["--manifest", "manifest.yaml", "-d", "out", "--dry-run", "-q"])?;
    assert!(output.success, "stderr: {}", output.stderr);
    assert!(output.stdout.contains("intro.md"));
    assert!(output.stdout.contains("guides/setup.md"));
    assert!(!project.path("out").exists());
    Ok(())
}

#[test]
fn test_missing_manifest_fails() -> Result<()> {
    let project = TestProject::new()?;

    Command::cargo_bin("docweave")?
        .current_dir(project.root())
        .env("DOCWEAVE_CONFIG", project.path("config.toml"))
        .args(["--manifest", "missing.yaml", "-d", "out"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("Resource not found: missing.yaml"));
    Ok(())
}

#[test]
fn test_invalid_variable_is_rejected() -> Result<()> {
    let project = project_with_manifest()?;

    let output = project.run_docweave(&["--manifest", "manifest.yaml", "--resolve", "--var", "novalue"])?;
    assert!(!output.success);
    assert!(output.stderr.contains("KEY=VALUE"));
    Ok(())
}
