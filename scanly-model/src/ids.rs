use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::ModelError;

/// Strongly typed ID for monitored roots
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct MonitoredRootId(pub Uuid);

impl Default for MonitoredRootId {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitoredRootId {
    pub fn new() -> Self {
        MonitoredRootId(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for MonitoredRootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MonitoredRootId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(MonitoredRootId(Uuid::parse_str(s.trim())?))
    }
}

/// Caller-assigned correlation id for a match request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct MatchRequestId(pub Uuid);

impl Default for MatchRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchRequestId {
    pub fn new() -> Self {
        MatchRequestId(Uuid::now_v7())
    }
}

impl fmt::Display for MatchRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MatchRequestId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(MatchRequestId(Uuid::parse_str(s.trim())?))
    }
}
