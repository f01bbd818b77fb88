//! Monitored roots: durable state, discovery (native events or polling) and
//! the user-facing service that ties the two together.

pub mod config;
pub mod filter;
pub mod mount;
mod poll;
pub mod service;
pub mod store;
pub mod watch;

pub use config::WatchConfig;
pub use filter::CandidateFilter;
pub use mount::{FixedMountProbe, MountKind, MountProbe, ProcMountProbe};
pub use service::{MonitorService, RearmSummary};
pub use store::{MonitorStateStore, ProcessingCounts};
pub use watch::{DiscoverySink, WatchEngine};
