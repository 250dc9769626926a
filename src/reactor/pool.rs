//! Processing pool and the run-wide error sink.

use anyhow::Result;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::tasks::DocumentWorkTask;
use super::worker::DocumentWorker;
use crate::core::{DocweaveError, MultiError, TaskError, is_cancelled};

/// Collects failures from every worker of a run.
///
/// In fail-fast mode the first failure cancels the run. Failures that are
/// only a consequence of that cancellation are not recorded.
#[derive(Debug)]
pub struct ErrorSink {
    fail_fast: bool,
    cancel: CancellationToken,
    errors: Mutex<Vec<anyhow::Error>>,
}

impl ErrorSink {
    pub fn new(fail_fast: bool, cancel: CancellationToken) -> Self {
        Self {
            fail_fast,
            cancel,
            errors: Mutex::new(Vec::new()),
        }
    }

    pub fn report(&self, error: anyhow::Error) {
        if self.cancel.is_cancelled() && is_cancelled(&error) {
            tracing::debug!(target: "docweave::reactor", "Dropping cancelled task: {}", error);
            return;
        }
        tracing::debug!(target: "docweave::reactor", "Task failed: {:#}", error);
        self.errors.lock().unwrap_or_else(PoisonError::into_inner).push(error);
        if self.fail_fast {
            self.cancel.cancel();
        }
    }

    /// The first failure in fail-fast mode, otherwise all failures as
    /// [`DocweaveError::TasksFailed`]. A run cancelled from outside without
    /// failures yields [`DocweaveError::Cancelled`].
    pub fn finish(&self) -> Result<()> {
        let mut errors =
            std::mem::take(&mut *self.errors.lock().unwrap_or_else(PoisonError::into_inner));
        if errors.is_empty() {
            return if self.cancel.is_cancelled() { Err(DocweaveError::Cancelled.into()) } else { Ok(()) };
        }
        if self.fail_fast {
            return Err(errors.remove(0));
        }
        Err(DocweaveError::TasksFailed {
            errors: MultiError::from(errors),
        }
        .into())
    }
}

/// Pool of document workers sized by backlog within `[min, max]`.
#[derive(Debug, Clone, Copy)]
pub struct ProcessingPool {
    min: usize,
    max: usize,
}

impl ProcessingPool {
    #[must_use]
    pub fn new(min: usize, max: usize) -> Self {
        let min = min.max(1);
        Self {
            min,
            max: max.max(min),
        }
    }

    /// Number of workers started for `backlog` pending tasks.
    #[must_use]
    pub fn width(&self, backlog: usize) -> usize {
        backlog.clamp(self.min, self.max)
    }

    /// Processes `tasks` in FIFO order. Workers stop taking tasks once the
    /// run is cancelled; tasks already started finish or abort on their own.
    /// Returns the number of written documents.
    pub async fn run(
        &self,
        tasks: Vec<DocumentWorkTask>,
        worker: Arc<DocumentWorker>,
        sink: Arc<ErrorSink>,
        cancel: CancellationToken,
    ) -> usize {
        let width = self.width(tasks.len());
        tracing::debug!(
            target: "docweave::reactor",
            "Processing {} documents with {} workers",
            tasks.len(),
            width
        );

        let queue = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let written = Arc::new(AtomicUsize::new(0));
        let mut workers = JoinSet::new();

        for _ in 0..width {
            let queue = Arc::clone(&queue);
            let worker = Arc::clone(&worker);
            let sink = Arc::clone(&sink);
            let cancel = cancel.clone();
            let written = Arc::clone(&written);

            workers.spawn(async move {
                while !cancel.is_cancelled() {
                    let Some(task) = next_task(&queue) else {
                        break;
                    };
                    match worker.process(&task, &cancel).await {
                        Ok(true) => {
                            written.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(false) => {}
                        Err(source) => sink.report(
                            TaskError {
                                path: task.output_path(),
                                source,
                            }
                            .into(),
                        ),
                    }
                }
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                sink.report(anyhow::anyhow!("Document worker panicked: {e}"));
            }
        }
        written.load(Ordering::Relaxed)
    }
}

fn next_task(queue: &Mutex<VecDeque<DocumentWorkTask>>) -> Option<DocumentWorkTask> {
    queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
}
