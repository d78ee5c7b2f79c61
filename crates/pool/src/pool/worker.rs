//! A worker's execution loop
//!
//! A worker loops while the pool is `Running`, invoking the work unit once per
//! iteration. Faults go to the fault policy; teardown signals end the worker
//! without consulting it. However the worker's future ends (normal exit, panic,
//! abort, or never being polled) its [`ExitGuard`] reports the exit to the
//! pool's supervisor, which is the only code that edits the roster.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::roster::{Roster, WorkerId};
use super::state::LifecycleState;
use super::worker_pool::Shared;
use crate::error::WorkError;
use crate::work::panic_message;

/// Why a worker left its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitReason {
    /// The pool stopped running
    Drained,
    /// The fault policy asked the worker to stop
    FaultPolicy,
    /// The work unit signalled teardown
    Teardown,
}

/// Reports a worker's exit when dropped
struct ExitGuard {
    id: WorkerId,
    exits: mpsc::UnboundedSender<WorkerId>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        // Fails only once the supervisor is gone, i.e. the pool itself was dropped
        let _ = self.exits.send(self.id);
    }
}

/// Spawn one worker and enter it on the roster.
///
/// Must be called with the roster lock held so the exit report cannot be
/// processed before the insert.
pub(super) fn spawn(shared: &Arc<Shared>, roster: &mut Roster) -> WorkerId {
    let id = roster.allocate();
    let guard = ExitGuard {
        id,
        exits: shared.exits.clone(),
    };
    let worker = Arc::clone(shared);

    let handle = shared.runtime.spawn(async move {
        let _guard = guard;
        run(worker, id).await;
    });
    roster.insert(id, handle);

    debug!(pool = %shared.config.name, worker = %id, "Spawned worker");
    id
}

async fn run(shared: Arc<Shared>, id: WorkerId) {
    let reason = loop {
        if shared.state.get() != LifecycleState::Running {
            break ExitReason::Drained;
        }

        let outcome = AssertUnwindSafe(async { shared.work.invoke().await })
            .catch_unwind()
            .await;

        let fault = match outcome {
            Ok(Ok(())) => {
                tokio::task::yield_now().await;
                continue;
            }
            Ok(Err(fault)) => fault,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(pool = %shared.config.name, worker = %id, panic = %message, "Work unit panicked");
                WorkError::Panicked(message)
            }
        };

        if fault.is_teardown() {
            break ExitReason::Teardown;
        }

        if shared.fault_policy.on_fault(id, &fault).should_break() {
            break ExitReason::FaultPolicy;
        }

        tokio::task::yield_now().await;
    };

    debug!(pool = %shared.config.name, worker = %id, ?reason, "Worker exiting");
}
