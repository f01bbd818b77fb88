use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::MatchPoolConfig;
use super::results::ResultMap;
use super::score::rank_candidates;
use crate::error::{Result, ScanlyError};
use crate::model::ids::MatchRequestId;
use crate::model::matching::{MatchRequest, MatchResult};
use crate::reference::ReferenceListCache;

type SharedReceiver = Arc<Mutex<mpsc::Receiver<MatchRequest>>>;

/// Fixed set of match workers behind a bounded FIFO queue.
pub struct MatchWorkerPool {
    config: MatchPoolConfig,
    sender: Mutex<Option<mpsc::Sender<MatchRequest>>>,
    results: Arc<ResultMap>,
    cancel: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for MatchWorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchWorkerPool")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl MatchWorkerPool {
    pub fn spawn(config: MatchPoolConfig, cache: Arc<ReferenceListCache>) -> Self {
        let worker_count = config.workers.max(1);
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let receiver: SharedReceiver = Arc::new(Mutex::new(rx));
        let results = Arc::new(ResultMap::new(config.result_ttl()));
        let cancel = CancellationToken::new();

        let workers = (0..worker_count)
            .map(|index| {
                tokio::spawn(run_worker(
                    index,
                    Arc::clone(&receiver),
                    Arc::clone(&cache),
                    Arc::clone(&results),
                    cancel.clone(),
                ))
            })
            .collect();

        info!(workers = worker_count, "match worker pool started");
        Self {
            config,
            sender: Mutex::new(Some(tx)),
            results,
            cancel,
            workers: Mutex::new(workers),
        }
    }

    pub fn config(&self) -> &MatchPoolConfig {
        &self.config
    }

    /// Queue a request, waiting while the queue is full.
    pub async fn submit(&self, request: MatchRequest) -> Result<MatchRequestId> {
        let sender = self
            .sender
            .lock()
            .await
            .clone()
            .filter(|_| !self.cancel.is_cancelled())
            .ok_or_else(|| ScanlyError::Cancelled("match pool is shut down".into()))?;
        let id = request.id;
        sender
            .send(request)
            .await
            .map_err(|_| ScanlyError::Cancelled("match pool is shut down".into()))?;
        Ok(id)
    }

    /// Claim the result for `id`, waiting up to `within` (the configured
    /// default when `None`). `None` means the result did not arrive in time,
    /// not that nothing matched.
    pub async fn await_result(
        &self,
        id: MatchRequestId,
        within: Option<Duration>,
    ) -> Option<MatchResult> {
        let within = within.unwrap_or_else(|| self.config.await_timeout());
        self.results.wait(&id, within).await
    }

    /// Submit and wait with the default timeout.
    pub async fn resolve(&self, request: MatchRequest) -> Result<Option<MatchResult>> {
        let id = self.submit(request).await?;
        Ok(self.await_result(id, None).await)
    }

    pub fn results(&self) -> &Arc<ResultMap> {
        &self.results
    }

    /// Stop accepting work and wait for workers to finish their current
    /// request. Queued requests are dropped.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.sender.lock().await.take();
        let workers: Vec<_> = self.workers.lock().await.drain(..).collect();
        if workers.is_empty() {
            return;
        }
        for err in join_all(workers).await.into_iter().filter_map(|r| r.err()) {
            warn!(error = %err, "match worker ended abnormally");
        }
        info!("match worker pool stopped");
    }
}

impl Drop for MatchWorkerPool {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_worker(
    index: usize,
    receiver: SharedReceiver,
    cache: Arc<ReferenceListCache>,
    results: Arc<ResultMap>,
    cancel: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            _ = cancel.cancelled() => break,
            request = next_request(&receiver) => match request {
                Some(request) => request,
                None => break,
            },
        };

        let result = match_request(&cache, &request).await;
        debug!(
            worker = index,
            request = %request.id,
            candidates = result.candidates.len(),
            "match request scored"
        );
        results.publish(result).await;
    }
    debug!(worker = index, "match worker stopped");
}

async fn next_request(receiver: &SharedReceiver) -> Option<MatchRequest> {
    receiver.lock().await.recv().await
}

async fn match_request(cache: &ReferenceListCache, request: &MatchRequest) -> MatchResult {
    let list = request.category.reference_list();
    match cache.get(&list).await {
        Ok(entries) => MatchResult {
            candidates: rank_candidates(&request.title, request.year, &entries),
            ..MatchResult::empty(request)
        },
        Err(err) => {
            warn!(list = %list, error = %err, "reference list unavailable");
            MatchResult::failed(request, err.to_string())
        }
    }
}
