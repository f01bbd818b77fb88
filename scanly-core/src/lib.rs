//! # Scanly Core
//!
//! The concurrent engine behind the Scanly media organizer.
//!
//! ## Overview
//!
//! - **Monitoring**: [`monitor`] watches incoming roots (native events or
//!   polling on remote mounts), debounces new top-level items and persists
//!   them in a durable pending queue.
//! - **Reference lists**: [`reference`] caches parsed title lists and keeps
//!   remote-sourced lists fresh.
//! - **Matching**: [`matching`] scores titles against reference lists on a
//!   bounded worker pool and correlates results by request id.
//! - **Processing**: [`processing`] fans directories out over a bounded pool
//!   of directory workers and drains the pending queue.
//! - **Link repair**: [`repair`] finds and re-points broken symlinks in the
//!   destination tree.
//!
//! External behaviour (title extraction, classification, online lookups, link
//! creation, notifications) is injected through the traits in
//! [`collaborators`]. [`context::ScanlyContext`] wires everything together
//! once at startup.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod collaborators;
pub mod context;
pub mod error;
pub mod fs;
pub mod matching;
pub mod monitor;
pub mod paths;
pub mod processing;
pub mod reference;
pub mod repair;

pub use error::{Result, ScanlyError};
pub use scanly_model as model;
