use url::Url;

use crate::models::ScanlyConfig;

/// Smallest debounce window the watcher is allowed to run with.
pub const MIN_DEBOUNCE_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(&mut self, message: S, hint: H) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

/// Clamp or disable settings the daemon cannot run with and report what was
/// changed.
pub fn apply_guard_rails(config: &mut ScanlyConfig) -> ConfigWarnings {
    let mut warnings = ConfigWarnings::default();

    if config.watch.debounce_window_ms < MIN_DEBOUNCE_MS {
        warnings.push(format!(
            "watch.debounce_window_ms {} is too small; using {MIN_DEBOUNCE_MS}",
            config.watch.debounce_window_ms
        ));
        config.watch.debounce_window_ms = MIN_DEBOUNCE_MS;
    }
    if config.watch.poll_interval_secs == 0 {
        warnings.push("watch.poll_interval_secs is 0; using 1");
        config.watch.poll_interval_secs = 1;
    }
    if config.matching.workers == 0 {
        warnings.push("matching.workers is 0; using 1");
        config.matching.workers = 1;
    }
    if config.processing.directory_workers == 0 {
        warnings.push("processing.directory_workers is 0; using 1");
        config.processing.directory_workers = 1;
    }

    if config.repair.enabled && config.links.destination.is_none() {
        warnings.push_with_hint(
            "link repair is enabled but no link destination is configured; repair disabled",
            "Set links.destination or DESTINATION_DIRECTORY",
        );
        config.repair.enabled = false;
        config.repair.background = false;
    } else if config.repair.enabled
        && config.repair.search_roots.is_empty()
        && config.origin_directory.is_none()
    {
        warnings.push_with_hint(
            "link repair has no search roots; only links whose original target reappears can be fixed",
            "Set repair.search_roots or ORIGIN_DIRECTORY",
        );
    }

    if let Some(raw) = config.notifications.webhook_url.take() {
        match Url::parse(&raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                config.notifications.webhook_url = Some(raw);
            }
            Ok(url) => warnings.push(format!(
                "webhook URL scheme '{}' is not supported; notifications go to the log",
                url.scheme()
            )),
            Err(err) => warnings.push(format!(
                "webhook URL '{raw}' is invalid ({err}); notifications go to the log"
            )),
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn defaults_pass_untouched() {
        let mut config = ScanlyConfig::default();
        let warnings = apply_guard_rails(&mut config);
        assert!(warnings.is_empty());
        assert_eq!(config, ScanlyConfig::default());
    }

    #[test]
    fn zero_debounce_is_clamped() {
        let mut config = ScanlyConfig::default();
        config.watch.debounce_window_ms = 0;
        let warnings = apply_guard_rails(&mut config);
        assert_eq!(warnings.len(), 1);
        assert_eq!(config.watch.debounce_window_ms, MIN_DEBOUNCE_MS);
    }

    #[test]
    fn repair_without_destination_is_disabled() {
        let mut config = ScanlyConfig::default();
        config.repair.enabled = true;
        config.repair.background = true;
        let warnings = apply_guard_rails(&mut config);
        assert!(!config.repair.enabled);
        assert!(!config.repair.background);
        assert!(warnings.iter().any(|w| w.hint.is_some()));
    }

    #[test]
    fn unparseable_webhook_is_dropped() {
        let mut config = ScanlyConfig::default();
        config.notifications.webhook_url = Some("not a url".into());
        apply_guard_rails(&mut config);
        assert_eq!(config.notifications.webhook_url, None);

        config.notifications.webhook_url = Some("https://hooks.example.com/scanly".into());
        config.links.destination = Some(PathBuf::from("/library"));
        assert!(apply_guard_rails(&mut config).is_empty());
        assert!(config.notifications.webhook_url.is_some());
    }
}
