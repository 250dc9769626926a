//! Fixed-width pool downloading resources referenced by documents.

use anyhow::{Context, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use reqwest::StatusCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::cancellable;
use super::pool::ErrorSink;
use crate::constants::DOWNLOAD_TIMEOUT;
use crate::core::{DocweaveError, is_resource_not_found};
use crate::resource::Registry;
use crate::writers::Writer;

/// A resource to fetch and store under `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub source: String,
    pub name: String,
}

/// Queues downloads for the pool, each source at most once per run.
#[derive(Debug, Clone)]
pub struct DownloadScheduler {
    sender: mpsc::UnboundedSender<DownloadTask>,
    scheduled: Arc<DashMap<String, String>>,
}

impl DownloadScheduler {
    /// A scheduler and the receiving end the pool drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DownloadTask>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let scheduler = Self {
            sender,
            scheduled: Arc::new(DashMap::new()),
        };
        (scheduler, receiver)
    }

    /// Queues `source` to be stored as `name` and returns the name the
    /// resource is stored under. A source queued earlier keeps its first name.
    pub fn schedule(&self, source: &str, name: &str) -> String {
        match self.scheduled.entry(source.to_string()) {
            Entry::Occupied(existing) => return existing.get().clone(),
            Entry::Vacant(vacant) => {
                vacant.insert(name.to_string());
            }
        }

        let task = DownloadTask {
            source: source.to_string(),
            name: name.to_string(),
        };
        if self.sender.send(task).is_err() {
            tracing::debug!(target: "docweave::reactor", "Download pool closed, dropping {}", source);
        }
        name.to_string()
    }
}

/// Fetches resources through their handler, or over HTTP when no handler
/// owns them, and writes them through the resources writer.
pub struct Downloader {
    registry: Arc<Registry>,
    writer: Arc<dyn Writer>,
    http: reqwest::Client,
}

impl Downloader {
    pub fn new(registry: Arc<Registry>, writer: Arc<dyn Writer>) -> Self {
        Self {
            registry,
            writer,
            http: reqwest::Client::new(),
        }
    }

    async fn download(&self, task: &DownloadTask, cancel: &CancellationToken) -> Result<()> {
        let content = match self.registry.get(&task.source) {
            Some(handler) => cancellable(cancel, handler.read(&task.source)).await?,
            None => cancellable(cancel, self.fetch_http(&task.source)).await?,
        };
        cancellable(cancel, self.writer.write(&task.name, "", &content, None))
            .await
            .with_context(|| format!("Failed to write resource {}", task.name))
    }

    async fn fetch_http(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("Failed to request {url}"))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(DocweaveError::ResourceNotFound {
                uri: url.to_string(),
            }
            .into());
        }
        let response = response.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Runs `width` download workers until the queue is closed and drained, or
/// the run is cancelled. Returns the number of stored resources.
pub async fn run_downloads(
    width: usize,
    receiver: mpsc::UnboundedReceiver<DownloadTask>,
    downloader: Arc<Downloader>,
    sink: Arc<ErrorSink>,
    cancel: CancellationToken,
) -> usize {
    let receiver = Arc::new(Mutex::new(receiver));
    let stored = Arc::new(AtomicUsize::new(0));
    let mut workers = JoinSet::new();

    for worker_id in 0..width.max(1) {
        let receiver = Arc::clone(&receiver);
        let downloader = Arc::clone(&downloader);
        let sink = Arc::clone(&sink);
        let cancel = cancel.clone();
        let stored = Arc::clone(&stored);

        workers.spawn(async move {
            loop {
                let next = {
                    let mut receiver = receiver.lock().await;
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => None,
                        task = receiver.recv() => task,
                    }
                };
                let Some(task) = next else {
                    break;
                };

                tracing::debug!(
                    target: "docweave::reactor",
                    "Download worker {} fetching {}",
                    worker_id,
                    task.source
                );
                match downloader.download(&task, &cancel).await {
                    Ok(()) => {
                        stored.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) if is_resource_not_found(&e) => {
                        tracing::warn!(
                            target: "docweave::reactor",
                            "Skipping download of missing resource {}",
                            task.source
                        );
                    }
                    Err(e) => sink.report(e.context(format!("Failed to download {}", task.source))),
                }
            }
        });
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            sink.report(anyhow::anyhow!("Download worker panicked: {e}"));
        }
    }
    stored.load(Ordering::Relaxed)
}
