use anyhow::{Context, Result};
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::cancellable;
use super::downloads::DownloadScheduler;
use super::links::{LinkContext, LinkRules};
use super::tasks::DocumentWorkTask;
use crate::core::is_resource_not_found;
use crate::processors::Processor;
use crate::resource::Registry;
use crate::writers::Writer;

/// Produces one document: read, transform, rewrite links, write.
pub struct DocumentWorker {
    pub(crate) registry: Arc<Registry>,
    pub(crate) processor: Arc<dyn Processor>,
    pub(crate) writer: Arc<dyn Writer>,
    pub(crate) metadata_writer: Option<Arc<dyn Writer>>,
    pub(crate) links: Arc<LinkRules>,
    pub(crate) downloads: DownloadScheduler,
}

impl DocumentWorker {
    /// Processes `task`. Returns `false` when the document was skipped
    /// because none of its sources exist.
    pub async fn process(&self, task: &DocumentWorkTask, cancel: &CancellationToken) -> Result<bool> {
        let node = task.node();
        let sources = node.sources();
        let Some(primary) = sources.first().copied() else {
            return Ok(false);
        };
        let output = task.output_path();
        tracing::debug!(target: "docweave::reactor", "Processing {} from {}", output, sources.join(", "));

        if let Some(metadata) = &self.metadata_writer {
            self.write_metadata(task, primary, metadata.as_ref(), cancel).await?;
        }

        let reads = sources.iter().map(|source| async move {
            let handler = self.registry.require(source)?;
            cancellable(cancel, handler.read(source)).await
        });
        let mut parts = Vec::with_capacity(sources.len());
        for (source, result) in sources.iter().zip(join_all(reads).await) {
            match result {
                Ok(content) => parts.push(content),
                Err(e) if is_resource_not_found(&e) => {
                    tracing::warn!(
                        target: "docweave::reactor",
                        "Skipping missing source {} of {}",
                        source,
                        output
                    );
                }
                Err(e) => return Err(e.context(format!("Failed to read {source}"))),
            }
        }
        if parts.is_empty() {
            return Ok(false);
        }

        let content = self.processor.process(parts.join(&b'\n'), node)?;
        let content = match String::from_utf8(content) {
            Ok(text) => {
                let handler = self.registry.require(primary)?;
                let ctx = LinkContext {
                    source: primary,
                    handler: handler.as_ref(),
                    registry: &self.registry,
                    downloads: &self.downloads,
                };
                self.links.rewrite(&text, &ctx).into_bytes()
            }
            Err(binary) => binary.into_bytes(),
        };

        cancellable(cancel, self.writer.write(&task.name, &task.path, &content, Some(node)))
            .await
            .with_context(|| format!("Failed to write {output}"))?;
        Ok(true)
    }

    async fn write_metadata(
        &self,
        task: &DocumentWorkTask,
        source: &str,
        writer: &dyn Writer,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let handler = self.registry.require(source)?;
        let info = match cancellable(cancel, handler.read_git_info(source)).await {
            Ok(Some(info)) => info,
            Ok(None) => return Ok(()),
            Err(e) if is_resource_not_found(&e) => return Ok(()),
            Err(e) => return Err(e.context(format!("Failed to read provenance of {source}"))),
        };
        let name = format!("{}.json", task.name);
        cancellable(cancel, writer.write(&name, &task.path, &info, Some(task.node())))
            .await
            .with_context(|| format!("Failed to write metadata {name}"))
    }
}
