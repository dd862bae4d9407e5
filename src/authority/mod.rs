//! Lifecycle authority: the system of record for dump state and eviction order.
//!
//! The janitor never decides on its own which dump is least valuable. It asks
//! the authority for per-id states when reconciling, and for the next prunable
//! dump, one at a time, when reclaiming space.

#![allow(missing_docs)]

pub mod http;
pub mod memory;

use std::collections::HashMap;

use crate::core::errors::Result;

/// State label that marks a dump as dead.
pub const ERRORED_STATE: &str = "errored";

/// Answer to a prune request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionTarget {
    pub id: i64,
    /// `false` means nothing is left to evict and `id` carries no meaning.
    pub prunable: bool,
}

impl EvictionTarget {
    #[must_use]
    pub const fn prunable(id: i64) -> Self {
        Self { id, prunable: true }
    }

    #[must_use]
    pub const fn exhausted() -> Self {
        Self {
            id: 0,
            prunable: false,
        }
    }
}

/// Operations the janitor needs from the system of record.
pub trait LifecycleAuthority: Send + Sync {
    /// Lifecycle state of each known id. Ids the authority has never heard of
    /// are simply absent from the result. Callers send at most
    /// [`crate::janitor::DEAD_DUMP_BATCH_SIZE`] ids per call.
    fn states(&self, ids: &[i64]) -> Result<HashMap<i64, String>>;

    /// Next dump to evict under the authority's ordering. The authority
    /// forgets the returned dump, so each call yields a different id.
    fn prune(&self) -> Result<EvictionTarget>;
}

pub use self::http::HttpAuthority;
pub use self::memory::MemoryAuthority;
