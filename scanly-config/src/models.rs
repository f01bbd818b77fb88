use std::path::PathBuf;
use std::time::Duration;

use scanly_core::context::ContextSettings;
use scanly_core::matching::MatchPoolConfig;
use scanly_core::monitor::WatchConfig;
use scanly_core::processing::ProcessingConfig;
use scanly_core::reference::RemoteListSource;
use scanly_core::repair::RepairConfig;
use serde::{Deserialize, Serialize};

/// Fully resolved daemon configuration. Every section falls back to its
/// defaults when absent from the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ScanlyConfig {
    /// JSON document holding monitored roots and their pending queues.
    pub state_file: PathBuf,
    /// Where downloads land. Used as the repair search root when none are
    /// configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_directory: Option<PathBuf>,
    pub reference: ReferenceConfig,
    pub watch: WatchConfig,
    pub matching: MatchPoolConfig,
    pub processing: ProcessingSection,
    pub links: LinksConfig,
    pub repair: RepairSection,
    pub notifications: NotificationsConfig,
}

impl Default for ScanlyConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("data/monitor_state.json"),
            origin_directory: None,
            reference: ReferenceConfig::default(),
            watch: WatchConfig::default(),
            matching: MatchPoolConfig::default(),
            processing: ProcessingSection::default(),
            links: LinksConfig::default(),
            repair: RepairSection::default(),
            notifications: NotificationsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    pub directory: PathBuf,
    /// Remote-backed lists older than this are refetched.
    pub freshness_hours: u64,
    pub remote: Vec<RemoteListSource>,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("data/reference_lists"),
            freshness_hours: 24,
            remote: Vec::new(),
        }
    }
}

impl ReferenceConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.freshness_hours.saturating_mul(60 * 60))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSection {
    pub directory_workers: usize,
    pub dispatch_interval_secs: u64,
    /// Drain pending items automatically while the daemon runs.
    pub auto_process: bool,
}

impl Default for ProcessingSection {
    fn default() -> Self {
        let core = ProcessingConfig::default();
        Self {
            directory_workers: core.directory_workers,
            dispatch_interval_secs: core.dispatch_interval_secs,
            auto_process: true,
        }
    }
}

impl ProcessingSection {
    pub fn to_core(&self) -> ProcessingConfig {
        ProcessingConfig {
            directory_workers: self.directory_workers,
            dispatch_interval_secs: self.dispatch_interval_secs,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    /// Root of the organized link tree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    pub relative: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairSection {
    pub enabled: bool,
    /// Run the repair monitor inside the daemon.
    pub background: bool,
    pub interval_secs: u64,
    pub search_roots: Vec<PathBuf>,
}

impl Default for RepairSection {
    fn default() -> Self {
        Self {
            enabled: false,
            background: false,
            interval_secs: 3_600,
            search_roots: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

impl ScanlyConfig {
    /// Repair settings, when repair is enabled and there is a tree to
    /// repair.
    pub fn repair_config(&self) -> Option<RepairConfig> {
        if !self.repair.enabled {
            return None;
        }
        let destination = self.links.destination.clone()?;
        let search_roots = if self.repair.search_roots.is_empty() {
            self.origin_directory.iter().cloned().collect()
        } else {
            self.repair.search_roots.clone()
        };
        Some(RepairConfig {
            destination,
            search_roots,
            relative_links: self.links.relative,
            interval_secs: self.repair.interval_secs,
        })
    }

    pub fn context_settings(&self) -> ContextSettings {
        let mut settings =
            ContextSettings::new(self.state_file.clone(), self.reference.directory.clone());
        settings.remote_lists = self.reference.remote.clone();
        settings.list_max_age = self.reference.max_age();
        settings.watch = self.watch.clone();
        settings.matching = self.matching.clone();
        settings.processing = self.processing.to_core();
        settings.repair = self.repair_config();
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: ScanlyConfig = toml::from_str("").unwrap();
        assert_eq!(config, ScanlyConfig::default());
        assert!(config.processing.auto_process);
        assert_eq!(config.watch.debounce_window_ms, 5_000);
    }

    #[test]
    fn repair_needs_a_destination() {
        let mut config = ScanlyConfig::default();
        config.repair.enabled = true;
        assert!(config.repair_config().is_none());

        config.links.destination = Some(PathBuf::from("/library"));
        config.origin_directory = Some(PathBuf::from("/downloads"));
        let repair = config.repair_config().unwrap();
        assert_eq!(repair.search_roots, vec![PathBuf::from("/downloads")]);
    }

    #[test]
    fn context_settings_carry_sections_through() {
        let mut config = ScanlyConfig::default();
        config.reference.freshness_hours = 6;
        config.processing.directory_workers = 7;
        let settings = config.context_settings();
        assert_eq!(settings.list_max_age, Duration::from_secs(6 * 3600));
        assert_eq!(settings.processing.directory_workers, 7);
        assert!(settings.repair.is_none());
    }
}
