//! Content transforms applied to every document before it is written.
//!
//! Target-format specific work (front matter injection, HTML cleanup and the
//! like) lives outside the crate and plugs in through [`Processor`]. The
//! reactor runs a [`ProcessorChain`] over each fetched document.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::manifest::Node;

/// A transform over a document's bytes.
pub trait Processor: Send + Sync {
    fn process(&self, content: Vec<u8>, node: &Node) -> Result<Vec<u8>>;

    /// Name used in error messages.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> Processor for F
where
    F: Fn(Vec<u8>, &Node) -> Result<Vec<u8>> + Send + Sync,
{
    fn process(&self, content: Vec<u8>, node: &Node) -> Result<Vec<u8>> {
        self(content, node)
    }

    fn name(&self) -> &str {
        "closure"
    }
}

/// Processors applied in insertion order.
#[derive(Clone, Default)]
pub struct ProcessorChain {
    processors: Vec<Arc<dyn Processor>>,
}

impl ProcessorChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, processor: impl Processor + 'static) -> Self {
        self.processors.push(Arc::new(processor));
        self
    }

    pub fn push(&mut self, processor: Arc<dyn Processor>) {
        self.processors.push(processor);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl std::fmt::Debug for ProcessorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.processors.iter().map(|p| p.name())).finish()
    }
}

impl Processor for ProcessorChain {
    fn process(&self, content: Vec<u8>, node: &Node) -> Result<Vec<u8>> {
        self.processors.iter().try_fold(content, |content, processor| {
            processor
                .process(content, node)
                .with_context(|| format!("Processor {} failed", processor.name()))
        })
    }

    fn name(&self) -> &str {
        "chain"
    }
}
