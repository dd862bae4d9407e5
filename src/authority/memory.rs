//! In-memory authority for deterministic tests and local experiments.

#![allow(missing_docs)]

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::authority::{EvictionTarget, LifecycleAuthority};
use crate::core::errors::{JanitorError, Result};

#[derive(Debug, Default)]
struct Inner {
    states: HashMap<i64, String>,
    prune_order: VecDeque<i64>,
    states_calls: Vec<Vec<i64>>,
    prune_calls: usize,
    unavailable: bool,
}

/// Authority backed by a state map and an explicit eviction queue.
///
/// Every call is recorded so tests can assert on batching and on how many
/// times the eviction loop went back to the authority.
#[derive(Debug, Default)]
pub struct MemoryAuthority {
    inner: Mutex<Inner>,
}

impl MemoryAuthority {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `state` for `id`.
    #[must_use]
    pub fn with_state(self, id: i64, state: &str) -> Self {
        self.inner.lock().states.insert(id, state.to_string());
        self
    }

    /// Queue `ids` for eviction, oldest first.
    #[must_use]
    pub fn with_prune_order(self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.inner.lock().prune_order.extend(ids);
        self
    }

    /// Make every subsequent call fail as if the authority were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unavailable = unavailable;
    }

    /// Id batches received by [`LifecycleAuthority::states`], in call order.
    #[must_use]
    pub fn states_calls(&self) -> Vec<Vec<i64>> {
        self.inner.lock().states_calls.clone()
    }

    #[must_use]
    pub fn prune_calls(&self) -> usize {
        self.inner.lock().prune_calls
    }

    #[must_use]
    pub fn state_of(&self, id: i64) -> Option<String> {
        self.inner.lock().states.get(&id).cloned()
    }
}

impl LifecycleAuthority for MemoryAuthority {
    fn states(&self, ids: &[i64]) -> Result<HashMap<i64, String>> {
        let mut inner = self.inner.lock();
        inner.states_calls.push(ids.to_vec());
        if inner.unavailable {
            return Err(unavailable("states"));
        }
        Ok(ids
            .iter()
            .filter_map(|id| inner.states.get(id).map(|state| (*id, state.clone())))
            .collect())
    }

    fn prune(&self) -> Result<EvictionTarget> {
        let mut inner = self.inner.lock();
        inner.prune_calls += 1;
        if inner.unavailable {
            return Err(unavailable("prune"));
        }
        let Some(id) = inner.prune_order.pop_front() else {
            return Ok(EvictionTarget::exhausted());
        };
        inner.states.remove(&id);
        Ok(EvictionTarget::prunable(id))
    }
}

fn unavailable(operation: &'static str) -> JanitorError {
    JanitorError::Authority {
        operation,
        details: "authority unavailable".to_string(),
    }
}
