use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use super::{NotificationEvent, Notifier};

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _event: NotificationEvent) {}
}

/// Writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: NotificationEvent) {
        match &event {
            NotificationEvent::PendingDiscovered { root_id, paths } => {
                info!(root = %root_id, count = paths.len(), "new pending items");
            }
            NotificationEvent::DirectoryProcessed {
                path,
                linked,
                skipped,
                failed,
            } => {
                info!(
                    path = %path.display(),
                    linked,
                    skipped,
                    failed,
                    "directory processed"
                );
            }
            NotificationEvent::LinksRepaired {
                found,
                repaired,
                failed,
            } => {
                info!(found, repaired, failed, "broken links repaired");
            }
        }
    }
}

/// Posts `{event, payload, timestamp}` to a webhook. Each delivery runs on
/// its own task; failures are logged and dropped.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, event: NotificationEvent) {
        let body = json!({
            "event": event.kind(),
            "payload": event,
            "timestamp": Utc::now().to_rfc3339(),
        });

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(event = event.kind(), "no runtime; webhook dropped");
            return;
        };

        let client = self.client.clone();
        let url = self.url.clone();
        runtime.spawn(async move {
            let response = client.post(&url).json(&body).send().await;
            match response.and_then(|r| r.error_for_status()) {
                Ok(_) => {}
                Err(err) => {
                    warn!(url = %url, error = %err, "webhook delivery failed");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::MonitoredRootId;

    #[test]
    fn events_serialize_with_tag() {
        let event = NotificationEvent::LinksRepaired {
            found: 2,
            repaired: 1,
            failed: 1,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "links_repaired");
        assert_eq!(value["repaired"], 1);
        assert_eq!(event.kind(), "links_repaired");
    }

    #[test]
    fn webhook_without_runtime_does_not_panic() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook");
        notifier.notify(NotificationEvent::PendingDiscovered {
            root_id: MonitoredRootId::new(),
            paths: vec!["/in/a".into()],
        });
    }
}
