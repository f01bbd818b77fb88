use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::item::ItemProcessor;
use crate::error::{Result, ScanlyError};
use crate::matching::MatchWorkerPool;
use crate::model::outcome::DirectoryOutcome;

type SharedTasks = Arc<Mutex<mpsc::UnboundedReceiver<PathBuf>>>;

/// Progress report handed to the `collect_results` callback.
#[derive(Debug, Clone, Copy)]
pub struct DirectoryProgress<'a> {
    pub completed: usize,
    pub total: usize,
    pub latest: &'a DirectoryOutcome,
}

impl DirectoryProgress<'_> {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 * 100.0 / self.total as f64
        }
    }
}

/// Fixed set of directory workers sharing one match pool.
pub struct DirectoryWorkerPool {
    matcher: Arc<MatchWorkerPool>,
    tasks: Mutex<Option<mpsc::UnboundedSender<PathBuf>>>,
    outcomes: Mutex<mpsc::UnboundedReceiver<DirectoryOutcome>>,
    submitted: AtomicUsize,
    collected: AtomicUsize,
    cancel: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for DirectoryWorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryWorkerPool")
            .field("submitted", &self.submitted.load(Ordering::Relaxed))
            .field("collected", &self.collected.load(Ordering::Relaxed))
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl DirectoryWorkerPool {
    pub fn spawn(
        workers: usize,
        matcher: Arc<MatchWorkerPool>,
        processor: Arc<ItemProcessor>,
    ) -> Self {
        let worker_count = workers.max(1);
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let tasks: SharedTasks = Arc::new(Mutex::new(task_rx));
        let cancel = CancellationToken::new();

        let handles = (0..worker_count)
            .map(|index| {
                tokio::spawn(run_worker(
                    index,
                    Arc::clone(&tasks),
                    outcome_tx.clone(),
                    Arc::clone(&matcher),
                    Arc::clone(&processor),
                    cancel.clone(),
                ))
            })
            .collect();
        // Only workers hold outcome senders: once they are all gone the
        // outcome channel closes.
        drop(outcome_tx);

        info!(workers = worker_count, "directory worker pool started");
        Self {
            matcher,
            tasks: Mutex::new(Some(task_tx)),
            outcomes: Mutex::new(outcome_rx),
            submitted: AtomicUsize::new(0),
            collected: AtomicUsize::new(0),
            cancel,
            workers: Mutex::new(handles),
        }
    }

    pub fn matcher(&self) -> &Arc<MatchWorkerPool> {
        &self.matcher
    }

    pub async fn submit(&self, directory: PathBuf) -> Result<()> {
        let guard = self.tasks.lock().await;
        let sender = guard
            .as_ref()
            .filter(|_| !self.cancel.is_cancelled())
            .ok_or_else(|| ScanlyError::Cancelled("directory pool is shut down".into()))?;
        sender
            .send(directory)
            .map_err(|_| ScanlyError::Cancelled("directory pool is shut down".into()))?;
        self.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub async fn submit_all<I>(&self, directories: I) -> Result<usize>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut count = 0;
        for directory in directories {
            self.submit(directory).await?;
            count += 1;
        }
        Ok(count)
    }

    /// Number of submitted directories whose outcome has not been collected.
    pub fn outstanding(&self) -> usize {
        self.submitted
            .load(Ordering::SeqCst)
            .saturating_sub(self.collected.load(Ordering::SeqCst))
    }

    /// Wait for every outstanding directory, calling `progress` after each
    /// one. Returns early only if all workers have exited.
    pub async fn collect_results<F>(&self, mut progress: F) -> Vec<DirectoryOutcome>
    where
        F: FnMut(DirectoryProgress<'_>),
    {
        let mut outcomes_rx = self.outcomes.lock().await;
        let total = self.outstanding();
        let mut outcomes = Vec::with_capacity(total);

        while outcomes.len() < total {
            let Some(outcome) = outcomes_rx.recv().await else {
                warn!(
                    collected = outcomes.len(),
                    total, "directory workers exited before all results arrived"
                );
                break;
            };
            self.collected.fetch_add(1, Ordering::SeqCst);
            outcomes.push(outcome);
            if let Some(latest) = outcomes.last() {
                progress(DirectoryProgress {
                    completed: outcomes.len(),
                    total,
                    latest,
                });
            }
        }
        outcomes
    }

    /// Stop the directory workers, then the match pool. In-flight directories
    /// finish; queued ones are dropped.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tasks.lock().await.take();
        let workers: Vec<_> = self.workers.lock().await.drain(..).collect();
        for err in join_all(workers).await.into_iter().filter_map(|r| r.err()) {
            warn!(error = %err, "directory worker ended abnormally");
        }
        self.matcher.shutdown().await;
        info!("directory worker pool stopped");
    }
}

impl Drop for DirectoryWorkerPool {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_worker(
    index: usize,
    tasks: SharedTasks,
    outcomes: mpsc::UnboundedSender<DirectoryOutcome>,
    matcher: Arc<MatchWorkerPool>,
    processor: Arc<ItemProcessor>,
    cancel: CancellationToken,
) {
    loop {
        let directory = tokio::select! {
            _ = cancel.cancelled() => break,
            next = next_task(&tasks) => match next {
                Some(directory) => directory,
                None => break,
            },
        };

        debug!(worker = index, path = %directory.display(), "processing directory");
        let child = {
            let matcher = Arc::clone(&matcher);
            let processor = Arc::clone(&processor);
            let directory = directory.clone();
            tokio::spawn(async move { processor.process_directory(&matcher, &directory).await })
        };
        let outcome = match child.await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(worker = index, path = %directory.display(), error = %err, "directory task failed");
                DirectoryOutcome::failed(&directory, format!("directory task failed: {err}"))
            }
        };

        if outcomes.send(outcome).is_err() {
            break;
        }
    }
    debug!(worker = index, "directory worker stopped");
}

async fn next_task(tasks: &SharedTasks) -> Option<PathBuf> {
    tasks.lock().await.recv().await
}
