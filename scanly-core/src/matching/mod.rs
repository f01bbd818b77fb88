//! Title matching against reference lists.
//!
//! [`MatchWorkerPool`] owns a fixed set of worker tasks draining a bounded
//! request queue. Results are parked in a [`ResultMap`] keyed by request id
//! until the submitter claims them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod normalize;
pub mod pool;
pub mod results;
pub mod score;

pub use pool::MatchWorkerPool;
pub use results::ResultMap;
pub use score::rank_candidates;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MatchPoolConfig {
    /// Number of long-lived match workers.
    pub workers: usize,
    /// Bound on queued requests; submitters wait when it is full.
    pub queue_capacity: usize,
    /// Default wait in `await_result`.
    pub await_timeout_secs: u64,
    /// How long an unclaimed result is retained.
    pub result_ttl_secs: u64,
}

impl Default for MatchPoolConfig {
    fn default() -> Self {
        Self {
            workers: default_match_workers(),
            queue_capacity: 256,
            await_timeout_secs: 30,
            result_ttl_secs: 120,
        }
    }
}

impl MatchPoolConfig {
    pub fn await_timeout(&self) -> Duration {
        Duration::from_secs(self.await_timeout_secs)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }
}

pub fn default_match_workers() -> usize {
    (num_cpus::get() / 2).max(2)
}
