use std::path::PathBuf;
use std::time::Duration;

use crate::loader::ConfigLoadError;
use crate::models::ScanlyConfig;
use crate::util::{parse_bool, parse_duration};

/// Environment-derived configuration values. Unset and empty variables are
/// `None`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub destination_directory: Option<PathBuf>,
    pub origin_directory: Option<PathBuf>,
    pub relative_symlink: Option<bool>,
    pub state_file: Option<PathBuf>,
    pub reference_dir: Option<PathBuf>,
    pub debounce: Option<Duration>,
    pub poll_interval: Option<Duration>,
    pub match_workers: Option<usize>,
    pub directory_workers: Option<usize>,
    pub auto_process: Option<bool>,
    pub auto_repair: Option<bool>,
    pub repair_interval: Option<Duration>,
    pub webhook_url: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Result<Self, ConfigLoadError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        Ok(Self {
            config_path: vars.path("SCANLY_CONFIG_PATH"),
            destination_directory: vars.path("DESTINATION_DIRECTORY"),
            origin_directory: vars.path("ORIGIN_DIRECTORY"),
            relative_symlink: vars.boolean("RELATIVE_SYMLINK")?,
            state_file: vars.path("SCANLY_STATE_FILE"),
            reference_dir: vars.path("SCANLY_REFERENCE_DIR"),
            debounce: vars.duration("SCANLY_DEBOUNCE")?,
            poll_interval: vars.duration("SCANLY_POLL_INTERVAL")?,
            match_workers: vars.count("SCANLY_MATCH_WORKERS")?,
            directory_workers: vars.count("SCANLY_DIRECTORY_WORKERS")?,
            auto_process: vars.boolean("SCANLY_AUTO_PROCESS")?,
            auto_repair: vars.boolean("AUTO_REPAIR_SYMLINKS")?,
            repair_interval: vars.duration("SYMLINK_REPAIR_INTERVAL")?,
            webhook_url: vars.raw("SCANLY_WEBHOOK_URL"),
        })
    }

    /// Layer these values over a file-derived config.
    pub fn apply(&self, config: &mut ScanlyConfig) {
        if let Some(destination) = &self.destination_directory {
            config.links.destination = Some(destination.clone());
        }
        if let Some(origin) = &self.origin_directory {
            config.origin_directory = Some(origin.clone());
        }
        if let Some(relative) = self.relative_symlink {
            config.links.relative = relative;
        }
        if let Some(state_file) = &self.state_file {
            config.state_file = state_file.clone();
        }
        if let Some(reference_dir) = &self.reference_dir {
            config.reference.directory = reference_dir.clone();
        }
        if let Some(debounce) = self.debounce {
            config.watch.debounce_window_ms =
                u64::try_from(debounce.as_millis()).unwrap_or(u64::MAX);
        }
        if let Some(poll) = self.poll_interval {
            config.watch.poll_interval_secs = poll.as_secs();
        }
        if let Some(workers) = self.match_workers {
            config.matching.workers = workers;
        }
        if let Some(workers) = self.directory_workers {
            config.processing.directory_workers = workers;
        }
        if let Some(auto_process) = self.auto_process {
            config.processing.auto_process = auto_process;
        }
        if let Some(auto_repair) = self.auto_repair {
            config.repair.enabled = auto_repair;
            config.repair.background = auto_repair;
        }
        if let Some(interval) = self.repair_interval {
            config.repair.interval_secs = interval.as_secs();
        }
        if let Some(url) = &self.webhook_url {
            config.notifications.webhook_url = Some(url.clone());
        }
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn path(&self, name: &str) -> Option<PathBuf> {
        self.raw(name).map(PathBuf::from)
    }

    fn boolean(&self, name: &str) -> Result<Option<bool>, ConfigLoadError> {
        self.parsed(name, |value| {
            parse_bool(value).ok_or_else(|| "expected true/false".to_string())
        })
    }

    fn duration(&self, name: &str) -> Result<Option<Duration>, ConfigLoadError> {
        self.parsed(name, |value| parse_duration(value).map_err(|err| err.to_string()))
    }

    fn count(&self, name: &str) -> Result<Option<usize>, ConfigLoadError> {
        self.parsed(name, |value| value.parse::<usize>().map_err(|err| err.to_string()))
    }

    fn parsed<T>(
        &self,
        name: &str,
        parse: impl FnOnce(&str) -> Result<T, String>,
    ) -> Result<Option<T>, ConfigLoadError> {
        let Some(value) = self.raw(name) else {
            return Ok(None);
        };
        parse(&value)
            .map(Some)
            .map_err(|reason| ConfigLoadError::InvalidEnv {
                var: name.to_string(),
                value,
                reason,
            })
    }
}
