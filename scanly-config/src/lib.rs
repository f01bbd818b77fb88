//! Configuration loading for the Scanly daemon.
//!
//! Values are resolved in layers: built-in defaults, then `scanly.toml`,
//! then environment variables (optionally seeded from a `.env` file).
//! Guard rails run last and report anything they had to change as
//! [`ConfigWarning`]s.
#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod sources;
pub mod util;
pub mod validation;

pub use loader::{
    ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions,
    ConfigMetadata,
};
pub use models::{
    LinksConfig, NotificationsConfig, ProcessingSection, ReferenceConfig,
    RepairSection, ScanlyConfig,
};
pub use sources::EnvConfig;
pub use validation::{ConfigWarning, ConfigWarnings, apply_guard_rails};
