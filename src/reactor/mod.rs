//! The reactor turns a validated manifest into written documents.
//!
//! A run has three phases:
//!
//! 1. **Resolve** - node selectors are expanded through the registry into a
//!    new, explicit [`Documentation`], which is checked for name collisions.
//! 2. **Derive** - every document node of the resolved tree becomes one
//!    [`DocumentWorkTask`]; containers yield none.
//! 3. **Execute** - a processing pool, sized by backlog within
//!    `[min_workers, max_workers]`, fetches, transforms, link-rewrites and
//!    writes each document. A fixed-width download pool concurrently stores
//!    the embeddable resources found while rewriting links.
//!
//! # Failure policy
//!
//! With `fail_fast` the first failure cancels the run: no new tasks start,
//! in-flight provider and writer calls abort, and that failure is returned.
//! Otherwise every task runs and all failures are returned together as
//! [`DocweaveError::TasksFailed`].
//!
//! Missing sources are not failures: they are logged and skipped.

mod downloads;
mod links;
mod pool;
mod tasks;
mod worker;

pub use downloads::{DownloadScheduler, DownloadTask};
pub use links::{LinkContext, LinkRules, download_name};
pub use tasks::{DocumentWorkTask, derive_tasks};

use anyhow::{Context, Result};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::constants::{
    DEFAULT_DOWNLOAD_WORKERS, DEFAULT_RESOURCES_PATH, DEFAULT_VERSION_BRANCH,
    MIN_PROCESSING_WORKERS, default_max_processing_workers,
};
use crate::core::DocweaveError;
use crate::manifest::{Documentation, ParseOptions, parser};
use crate::processors::ProcessorChain;
use crate::resource::Registry;
use crate::writers::Writer;
use downloads::Downloader;
use pool::{ErrorSink, ProcessingPool};
use worker::DocumentWorker;

/// Run-time settings of a [`Reactor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactorOptions {
    pub min_workers: usize,
    pub max_workers: usize,
    pub download_workers: usize,
    pub fail_fast: bool,
    /// Directory below the destination that downloaded resources are
    /// linked from.
    pub resources_path: String,
    pub hugo: bool,
    /// Stop after resolution; nothing is fetched or written.
    pub resolve: bool,
}

impl Default for ReactorOptions {
    fn default() -> Self {
        Self {
            min_workers: MIN_PROCESSING_WORKERS,
            max_workers: default_max_processing_workers(),
            download_workers: DEFAULT_DOWNLOAD_WORKERS,
            fail_fast: false,
            resources_path: DEFAULT_RESOURCES_PATH.to_string(),
            hugo: false,
            resolve: false,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The resolved manifest.
    pub documentation: Documentation,
    pub documents: usize,
    pub resources: usize,
}

pub struct Reactor {
    options: ReactorOptions,
    registry: Arc<Registry>,
    processor: ProcessorChain,
    writer: Arc<dyn Writer>,
    resource_writer: Arc<dyn Writer>,
    metadata_writer: Option<Arc<dyn Writer>>,
    cancel: CancellationToken,
}

impl Reactor {
    /// A reactor writing documents through `writer` and downloaded resources
    /// through `resource_writer`.
    pub fn new(
        options: ReactorOptions,
        registry: Arc<Registry>,
        writer: Arc<dyn Writer>,
        resource_writer: Arc<dyn Writer>,
    ) -> Self {
        Self {
            options,
            registry,
            processor: ProcessorChain::new(),
            writer,
            resource_writer,
            metadata_writer: None,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_processor(mut self, processor: ProcessorChain) -> Self {
        self.processor = processor;
        self
    }

    /// Writes provenance metadata of every document as `<name>.json`.
    #[must_use]
    pub fn with_metadata_writer(mut self, writer: Arc<dyn Writer>) -> Self {
        self.metadata_writer = Some(writer);
        self
    }

    #[must_use]
    pub fn options(&self) -> &ReactorOptions {
        &self.options
    }

    /// Token cancelling every run of this reactor.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Expands every node selector of `docs` without fetching content.
    pub async fn resolve(&self, docs: &Documentation) -> Result<Documentation> {
        let cancel = self.cancel.child_token();
        tasks::resolve_documentation(&self.registry, docs, self.options.hugo, &cancel).await
    }

    pub async fn run(&self, docs: &Documentation) -> Result<RunReport> {
        let cancel = self.cancel.child_token();
        let resolved =
            tasks::resolve_documentation(&self.registry, docs, self.options.hugo, &cancel).await?;
        if self.options.resolve {
            return Ok(RunReport {
                documentation: resolved,
                documents: 0,
                resources: 0,
            });
        }

        let resolved = Arc::new(resolved);
        let tasks = derive_tasks(&resolved, self.options.hugo)?;
        let links = Arc::new(LinkRules::compile(resolved.links.as_ref(), &self.options.resources_path)?);
        let sink = Arc::new(ErrorSink::new(self.options.fail_fast, cancel.clone()));
        let (scheduler, receiver) = DownloadScheduler::channel();

        let downloads = tokio::spawn(downloads::run_downloads(
            self.options.download_workers,
            receiver,
            Arc::new(Downloader::new(Arc::clone(&self.registry), Arc::clone(&self.resource_writer))),
            Arc::clone(&sink),
            cancel.clone(),
        ));

        let worker = Arc::new(DocumentWorker {
            registry: Arc::clone(&self.registry),
            processor: Arc::new(self.processor.clone()),
            writer: Arc::clone(&self.writer),
            metadata_writer: self.metadata_writer.clone(),
            links,
            downloads: scheduler,
        });
        let pool = ProcessingPool::new(self.options.min_workers, self.options.max_workers);
        // The pool drops the last scheduler handle, closing the download queue.
        let documents = pool.run(tasks, worker, Arc::clone(&sink), cancel.clone()).await;
        let resources = downloads.await.context("Download pool panicked")?;

        sink.finish()?;
        tracing::info!(
            target: "docweave::reactor",
            "Wrote {} documents and {} resources",
            documents,
            resources
        );
        Ok(RunReport {
            documentation: Arc::try_unwrap(resolved).unwrap_or_else(|shared| (*shared).clone()),
            documents,
            resources,
        })
    }
}

/// Loads the top-level manifest at `uri`.
///
/// Local files are parsed with `version_branch` as the injected version;
/// anything else is loaded through the registry.
pub async fn load_manifest(
    uri: &str,
    registry: &Registry,
    version_branch: Option<&str>,
    options: &ParseOptions,
) -> Result<Documentation> {
    let uri = uri.trim();
    let path = Path::new(uri);
    if path.exists() {
        if path.is_dir() {
            return Err(DocweaveError::FileSystemError {
                operation: "read manifest".to_string(),
                path: uri.to_string(),
            })
            .with_context(|| format!("Top level manifest {uri} is a directory"));
        }
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read manifest {uri}"))?;
        return parser::parse_with_metadata(
            &raw,
            version_branch.unwrap_or(DEFAULT_VERSION_BRANCH),
            &options.variables,
            options.hugo,
        )
        .with_context(|| format!("Failed to parse manifest {uri}"));
    }

    registry.require(uri)?.resolve_documentation(uri, options).await
}

/// Runs `future` unless `cancel` fires first.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(DocweaveError::Cancelled.into()),
        result = future => result,
    }
}
