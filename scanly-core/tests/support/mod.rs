#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use scanly_core::collaborators::{
    Collaborators, KeywordClassifier, LinkCreator, LinkRequest, MetadataResolver,
    NotificationEvent, Notifier, RegexTitleExtractor,
};
use scanly_core::model::category::MediaCategory;
use scanly_core::{Result, ScanlyError};

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: NotificationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Resolves every title to the same id (or to nothing).
#[derive(Debug, Default)]
pub struct StaticResolver {
    pub id: Option<String>,
    calls: AtomicUsize,
}

impl StaticResolver {
    pub fn new(id: Option<&str>) -> Self {
        Self {
            id: id.map(String::from),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataResolver for StaticResolver {
    async fn resolve_external_id(
        &self,
        _title: &str,
        _year: Option<u16>,
        _category: MediaCategory,
    ) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.id.clone())
    }
}

/// Records link requests. Titles containing `fail_on` error out, titles
/// containing `panic_on` panic.
#[derive(Debug, Default)]
pub struct RecordingLinker {
    requests: Mutex<Vec<LinkRequest>>,
    pub fail_on: Option<String>,
    pub panic_on: Option<String>,
}

impl RecordingLinker {
    pub fn failing_on(title: &str) -> Self {
        Self {
            fail_on: Some(title.to_string()),
            ..Self::default()
        }
    }

    pub fn panicking_on(title: &str) -> Self {
        Self {
            panic_on: Some(title.to_string()),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<LinkRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LinkCreator for RecordingLinker {
    async fn create_links(&self, request: &LinkRequest) -> Result<bool> {
        if let Some(needle) = &self.panic_on
            && request.title.contains(needle.as_str())
        {
            panic!("linker exploded on {}", request.title);
        }
        if let Some(needle) = &self.fail_on
            && request.title.contains(needle.as_str())
        {
            return Err(ScanlyError::Internal(format!("cannot link {}", request.title)));
        }
        self.requests.lock().unwrap().push(request.clone());
        Ok(true)
    }
}

pub fn collaborators(
    resolver: Arc<StaticResolver>,
    linker: Arc<RecordingLinker>,
    notifier: Arc<RecordingNotifier>,
) -> Collaborators {
    Collaborators {
        extractor: Arc::new(RegexTitleExtractor),
        classifier: Arc::new(KeywordClassifier),
        resolver,
        linker,
        notifier,
    }
}

pub fn write_list(dir: &Path, list: &str, lines: &[&str]) {
    std::fs::create_dir_all(dir).unwrap();
    let mut contents = lines.join("\n");
    contents.push('\n');
    std::fs::write(dir.join(format!("{list}.txt")), contents).unwrap();
}

/// Poll `check` every 50ms until it returns true or `secs` elapse.
pub async fn eventually<F, Fut>(secs: u64, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(secs);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    check().await
}
