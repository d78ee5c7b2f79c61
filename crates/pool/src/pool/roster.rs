//! Roster of live workers
//!
//! An arena of worker handles keyed by [`WorkerId`]. The roster only lives
//! behind the pool's single roster lock; workers never touch it.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

/// Identity of one worker within its pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(u64);

impl WorkerId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Roster {
    workers: HashMap<WorkerId, JoinHandle<()>>,
    next_id: u64,
}

impl Roster {
    pub(crate) fn len(&self) -> usize {
        self.workers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Hand out the next id; ids are never reused within a pool
    pub(crate) fn allocate(&mut self) -> WorkerId {
        self.next_id += 1;
        WorkerId(self.next_id)
    }

    pub(crate) fn insert(&mut self, id: WorkerId, handle: JoinHandle<()>) {
        self.workers.insert(id, handle);
    }

    /// Returns `true` if the worker was still on the roster
    pub(crate) fn remove(&mut self, id: WorkerId) -> bool {
        self.workers.remove(&id).is_some()
    }

    /// Abort every live worker task; entries leave once their exits are reported
    pub(crate) fn abort_all(&self) -> usize {
        for handle in self.workers.values() {
            handle.abort();
        }
        self.workers.len()
    }
}
