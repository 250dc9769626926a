//! Command-line interface for docweave
//!
//! ```text
//! docweave --manifest docs/manifest.yaml --destination site/content
//! docweave --manifest https://github.com/acme/app/blob/main/docs.yaml -d out --var version=v2 --fail-fast
//! docweave --manifest docs/manifest.yaml --resolve
//! ```
//!
//! Logging goes to stderr: `-v` enables debug output, `-q` limits it to
//! errors, and `RUST_LOG` overrides both.

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::GlobalConfig;
use crate::constants::{DEFAULT_RESOURCES_PATH, DEFAULT_VERSION_BRANCH};
use crate::git::CliGit;
use crate::manifest::{ParseOptions, serialize};
use crate::reactor::{Reactor, ReactorOptions, load_manifest};
use crate::resource::{FsHandler, GitHandler, Registry, ResourceHandler};
use crate::writers::{DryRunWriter, FsWriter, Writer};

#[derive(Parser, Debug)]
#[command(
    name = "docweave",
    about = "Aggregate a documentation site from a declarative manifest",
    version,
    long_about = "docweave reads a manifest describing a documentation tree, fetches every document from local paths or git repositories, rewrites links and writes the result to a destination directory."
)]
pub struct Cli {
    /// Manifest path or URL
    #[arg(short, long)]
    manifest: String,

    /// Directory the documentation is written to
    #[arg(short, long, required_unless_present = "resolve")]
    destination: Option<PathBuf>,

    /// Directory below the destination for downloaded resources
    #[arg(long, default_value = DEFAULT_RESOURCES_PATH)]
    resources_path: String,

    /// Directory below the destination for provenance metadata
    #[arg(long)]
    metadata_path: Option<String>,

    /// Manifest variable as key=value; may be repeated
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    variables: Vec<(String, String)>,

    /// Write a Hugo content tree (section files named _index.md)
    #[arg(long)]
    hugo: bool,

    /// Stop at the first failing document
    #[arg(long)]
    fail_fast: bool,

    /// Print the resolved manifest instead of building
    #[arg(long)]
    resolve: bool,

    /// Log what would be written without writing
    #[arg(long)]
    dry_run: bool,

    /// Minimum number of document workers
    #[arg(long)]
    min_workers: Option<usize>,

    /// Maximum number of document workers
    #[arg(long)]
    max_workers: Option<usize>,

    /// Number of resource download workers
    #[arg(long)]
    download_workers: Option<usize>,

    /// Version injected as `versions` into local manifests
    #[arg(long)]
    version_branch: Option<String>,

    /// Path to the configuration file
    #[arg(short, long, env = crate::config::CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        self.init_logging();
        let config = GlobalConfig::load_with_optional(self.config.clone()).await?;
        let registry = Arc::new(self.registry(&config)?);

        let variables: HashMap<String, String> = self.variables.iter().cloned().collect();
        let parse_options = ParseOptions::new(variables, self.hugo);
        let docs =
            load_manifest(&self.manifest, &registry, self.version_branch.as_deref(), &parse_options)
                .await?;

        let options = self.reactor_options(&config);
        let (reactor, dry_run) = self.reactor(options, Arc::clone(&registry))?;

        if self.resolve {
            let resolved = reactor.resolve(&docs).await?;
            print!("{}", serialize(&resolved)?);
            return Ok(());
        }

        let cancel = reactor.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        });

        let report = reactor.run(&docs).await?;
        if let Some(dry_run) = dry_run {
            for path in dry_run.paths() {
                println!("{path}");
            }
        }
        if !self.quiet {
            println!(
                "{} Wrote {} documents and {} resources",
                "✓".green(),
                report.documents,
                report.resources
            );
        }
        Ok(())
    }

    fn init_logging(&self) {
        let level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("docweave={level},git={level}")));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(self.verbose)
            .try_init();
    }

    fn registry(&self, config: &GlobalConfig) -> Result<Registry> {
        let version = self.version_branch.as_deref().unwrap_or(DEFAULT_VERSION_BRANCH);
        let hosts = config.git_hosts();
        let cache_dir = config.cache_dir()?;
        tracing::debug!("Git hosts: {}; cache: {}", hosts.join(", "), cache_dir.display());

        let handlers: [Arc<dyn ResourceHandler>; 2] = [
            Arc::new(FsHandler::new(version)),
            Arc::new(
                GitHandler::new(hosts, cache_dir, Arc::new(CliGit)).with_tokens(config.host_tokens()),
            ),
        ];
        Ok(Registry::new(handlers))
    }

    fn reactor_options(&self, config: &GlobalConfig) -> ReactorOptions {
        let defaults = config.reactor_options();
        ReactorOptions {
            min_workers: self.min_workers.unwrap_or(defaults.min_workers),
            max_workers: self.max_workers.unwrap_or(defaults.max_workers),
            download_workers: self.download_workers.unwrap_or(defaults.download_workers),
            fail_fast: self.fail_fast,
            resources_path: self.resources_path.clone(),
            hugo: self.hugo,
            resolve: self.resolve,
        }
    }

    /// Builds the reactor and, in dry-run mode, the writer recording
    /// document paths.
    fn reactor(
        &self,
        options: ReactorOptions,
        registry: Arc<Registry>,
    ) -> Result<(Reactor, Option<Arc<DryRunWriter>>)> {
        let destination = self.destination.clone().unwrap_or_default();
        if destination.as_os_str().is_empty() && !self.resolve {
            bail!("--destination is required");
        }
        let resources = destination.join(options.resources_path.trim_matches('/'));

        if self.dry_run {
            let documents = Arc::new(DryRunWriter::new("document"));
            let mut reactor = Reactor::new(
                options,
                registry,
                Arc::clone(&documents) as Arc<dyn Writer>,
                Arc::new(DryRunWriter::new("resource")),
            );
            if self.metadata_path.is_some() {
                reactor = reactor.with_metadata_writer(Arc::new(DryRunWriter::new("metadata")));
            }
            return Ok((reactor, Some(documents)));
        }

        let mut reactor = Reactor::new(
            options,
            registry,
            Arc::new(FsWriter::new(&destination)),
            Arc::new(FsWriter::new(resources)),
        );
        if let Some(metadata) = &self.metadata_path {
            reactor = reactor.with_metadata_writer(Arc::new(FsWriter::new(destination.join(metadata))));
        }
        Ok((reactor, None))
    }
}

/// Parses a `key=value` pair.
fn parse_key_val(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .with_context(|| format!("invalid KEY=VALUE: no '=' found in '{s}'"))?;
    if key.is_empty() {
        bail!("invalid KEY=VALUE: empty key in '{s}'");
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(parse_key_val("a=b=c").unwrap(), ("a".to_string(), "b=c".to_string()));
        assert_eq!(parse_key_val("empty=").unwrap(), ("empty".to_string(), String::new()));
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "docweave",
            "--manifest",
            "docs.yaml",
            "-d",
            "out",
            "--var",
            "v=1",
            "--var",
            "w=2",
            "--fail-fast",
            "--max-workers",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.variables.len(), 2);
        assert!(cli.fail_fast);

        let options = cli.reactor_options(&GlobalConfig::default());
        assert_eq!(options.max_workers, 3);
        assert_eq!(options.resources_path, DEFAULT_RESOURCES_PATH);
        assert!(options.fail_fast);
    }

    #[test]
    fn test_destination_required_unless_resolving() {
        assert!(Cli::try_parse_from(["docweave", "-m", "docs.yaml"]).is_err());
        assert!(Cli::try_parse_from(["docweave", "-m", "docs.yaml", "--resolve"]).is_ok());
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["docweave", "-m", "x", "--resolve", "-v", "-q"]).is_err());
    }
}
