use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::{Instant, timeout};
use tracing::debug;

use crate::model::ids::MatchRequestId;
use crate::model::matching::MatchResult;

/// Longest single sleep while waiting for a result.
const POLL_SLICE: Duration = Duration::from_millis(100);

/// Results parked until their submitter claims them. Unclaimed results are
/// purged once older than the retention window.
#[derive(Debug)]
pub struct ResultMap {
    inner: Mutex<HashMap<MatchRequestId, (Instant, MatchResult)>>,
    published: Notify,
    ttl: Duration,
}

impl ResultMap {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            published: Notify::new(),
            ttl,
        }
    }

    pub async fn publish(&self, result: MatchResult) {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();
        let before = guard.len();
        guard.retain(|_, (stored_at, _)| now.duration_since(*stored_at) < self.ttl);
        let purged = before - guard.len();
        if purged > 0 {
            debug!(purged, "expired match results dropped");
        }
        guard.insert(result.request_id, (now, result));
        drop(guard);
        self.published.notify_waiters();
    }

    /// Remove and return the result if it is present.
    pub async fn take(&self, id: &MatchRequestId) -> Option<MatchResult> {
        self.inner.lock().await.remove(id).map(|(_, result)| result)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Wait until the result is published or the deadline passes, then
    /// claim it.
    pub async fn wait(&self, id: &MatchRequestId, within: Duration) -> Option<MatchResult> {
        let deadline = Instant::now() + within;
        loop {
            // Register interest before checking so a publish in between is
            // not missed.
            let notified = self.published.notified();
            if let Some(result) = self.take(id).await {
                return Some(result);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let slice = (deadline - now).min(POLL_SLICE);
            let _ = timeout(slice, notified).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::category::MediaCategory;
    use crate::model::matching::MatchRequest;

    #[tokio::test]
    async fn wait_returns_result_published_later() {
        let map = Arc::new(ResultMap::new(Duration::from_secs(60)));
        let request = MatchRequest::new("Heat", None, MediaCategory::Movie);
        let id = request.id;

        let publisher = Arc::clone(&map);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            publisher.publish(MatchResult::empty(&request)).await;
        });

        let result = map.wait(&id, Duration::from_secs(2)).await;
        assert_eq!(result.map(|r| r.request_id), Some(id));
        assert!(map.is_empty().await);
    }

    #[tokio::test]
    async fn wait_times_out_without_result() {
        let map = ResultMap::new(Duration::from_secs(60));
        let started = Instant::now();
        assert!(
            map.wait(&MatchRequestId::new(), Duration::from_millis(150))
                .await
                .is_none()
        );
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn publish_purges_expired_results() {
        let map = ResultMap::new(Duration::from_millis(20));
        let old = MatchRequest::new("Old", None, MediaCategory::Movie);
        map.publish(MatchResult::empty(&old)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        let fresh = MatchRequest::new("Fresh", None, MediaCategory::Movie);
        map.publish(MatchResult::empty(&fresh)).await;

        assert!(map.take(&old.id).await.is_none());
        assert!(map.take(&fresh.id).await.is_some());
    }
}
