//! Fault policies
//!
//! A [`FaultPolicy`] is consulted every time a worker's work unit faults and
//! decides whether that worker keeps looping or exits. Policies are called
//! synchronously on the worker's task and must return promptly.
//!
//! Teardown signals ([`WorkError::Cancelled`]) never reach a policy.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::WorkError;
use crate::pool::WorkerId;

/// What a faulting worker should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultDecision {
    /// Keep looping while the pool is running
    Continue,
    /// Exit the worker now
    Break,
}

impl FaultDecision {
    pub fn should_break(self) -> bool {
        self == FaultDecision::Break
    }
}

/// Decides how a worker reacts to a fault from its work unit
pub trait FaultPolicy: Send + Sync + 'static {
    /// Called with the faulting worker and the fault it raised
    fn on_fault(&self, worker: WorkerId, fault: &WorkError) -> FaultDecision;

    /// Called once a worker has left the roster
    fn worker_retired(&self, _worker: WorkerId) {}
}

impl<F> FaultPolicy for F
where
    F: Fn(WorkerId, &WorkError) -> FaultDecision + Send + Sync + 'static,
{
    fn on_fault(&self, worker: WorkerId, fault: &WorkError) -> FaultDecision {
        self(worker, fault)
    }
}

impl<P: FaultPolicy + ?Sized> FaultPolicy for Arc<P> {
    fn on_fault(&self, worker: WorkerId, fault: &WorkError) -> FaultDecision {
        (**self).on_fault(worker, fault)
    }

    fn worker_retired(&self, worker: WorkerId) {
        (**self).worker_retired(worker)
    }
}

/// Log every fault and keep the worker looping
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinueOnFault;

impl FaultPolicy for ContinueOnFault {
    fn on_fault(&self, worker: WorkerId, fault: &WorkError) -> FaultDecision {
        warn!(%worker, error = %fault, "Work unit faulted, continuing");
        FaultDecision::Continue
    }
}

/// Log the fault and stop the faulting worker
#[derive(Debug, Clone, Copy, Default)]
pub struct BreakOnFault;

impl FaultPolicy for BreakOnFault {
    fn on_fault(&self, worker: WorkerId, fault: &WorkError) -> FaultDecision {
        warn!(%worker, error = %fault, "Work unit faulted, stopping worker");
        FaultDecision::Break
    }
}

/// Tolerate a fixed number of faults per worker, then stop it
///
/// Counters are per worker and are dropped when the worker retires, so a
/// replacement worker starts with a fresh budget.
#[derive(Debug)]
pub struct FaultBudget {
    max_faults: u32,
    faults: DashMap<WorkerId, u32>,
}

impl FaultBudget {
    /// Break a worker on its `max_faults`-th fault
    pub fn per_worker(max_faults: u32) -> Self {
        Self {
            max_faults: max_faults.max(1),
            faults: DashMap::new(),
        }
    }

    /// Faults recorded so far for a live worker
    pub fn faults(&self, worker: WorkerId) -> u32 {
        self.faults.get(&worker).map(|n| *n).unwrap_or(0)
    }

    pub fn max_faults(&self) -> u32 {
        self.max_faults
    }
}

impl FaultPolicy for FaultBudget {
    fn on_fault(&self, worker: WorkerId, fault: &WorkError) -> FaultDecision {
        let count = {
            let mut entry = self.faults.entry(worker).or_insert(0);
            *entry += 1;
            *entry
        };

        if count >= self.max_faults {
            warn!(
                %worker,
                faults = count,
                error = %fault,
                "Fault budget exhausted, stopping worker"
            );
            FaultDecision::Break
        } else {
            warn!(%worker, faults = count, error = %fault, "Work unit faulted");
            FaultDecision::Continue
        }
    }

    fn worker_retired(&self, worker: WorkerId) {
        self.faults.remove(&worker);
    }
}
