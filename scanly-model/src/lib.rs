//! Core data model definitions shared across Scanly crates.
#![allow(missing_docs)]

pub mod category;
pub mod error;
pub mod ids;
pub mod matching;
pub mod outcome;
pub mod reference;
pub mod repair;
pub mod roots;

pub mod prelude {
    pub use crate::category::MediaCategory;
    pub use crate::ids::{MatchRequestId, MonitoredRootId};
    pub use crate::matching::{
        MatchCandidate, MatchRequest, MatchResult, MatchTier,
    };
    pub use crate::outcome::{DirectoryOutcome, ItemOutcome, ItemStatus};
    pub use crate::reference::{ReferenceEntry, ReferenceListId};
    pub use crate::repair::{
        LinkStatus, RepairPhase, RepairReport, SymlinkRecord,
    };
    pub use crate::roots::{
        DiscoveryMode, MonitoredRoot, PendingItem, RootStats,
    };
}
