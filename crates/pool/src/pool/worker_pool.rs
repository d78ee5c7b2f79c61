//! Worker pool lifecycle engine
//!
//! Owns the lifecycle state, the configured worker count and the roster of
//! live workers. Control operations are synchronous and never wait on work;
//! `restart` and the `wait_idle*` helpers are the only calls that block.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument};

use super::config::WorkerPoolConfig;
use super::roster::{Roster, WorkerId};
use super::state::{self, LifecycleState, StateCell, StateObserver};
use super::worker;
use crate::error::PoolError;
use crate::fault::FaultPolicy;
use crate::work::{Runnable, RunnableAdapter, WorkUnit};

/// Point-in-time view of a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub name: String,
    pub state: LifecycleState,
    /// Configured target, as reported by `worker_count`
    pub configured_workers: usize,
    /// Workers currently on the roster
    pub live_workers: usize,
}

/// State shared between the pool handle, its workers and its supervisor
pub(crate) struct Shared {
    pub(super) config: WorkerPoolConfig,
    pub(super) work: WorkUnit,
    pub(super) fault_policy: Arc<dyn FaultPolicy>,
    pub(super) state: StateCell,
    pub(super) runtime: Handle,
    pub(super) exits: mpsc::UnboundedSender<WorkerId>,
    desired: AtomicUsize,
    roster: Mutex<Roster>,
}

impl Shared {
    /// Spawn workers until the roster reaches the configured count.
    ///
    /// Only while `Running`; never removes workers.
    fn reconcile(self: &Arc<Self>, roster: &mut Roster) {
        if self.state.get() != LifecycleState::Running {
            return;
        }

        while roster.len() < self.desired.load(Ordering::SeqCst) {
            worker::spawn(self, roster);
        }
    }

    /// Move a non-idle pool to `Stopping`, completing the drain at once if
    /// the roster is already empty. Returns whether the state changed.
    fn begin_drain(&self, roster: &Roster) -> bool {
        let stopping = self
            .state
            .apply(|s| (s != LifecycleState::Idle).then_some(LifecycleState::Stopping))
            .is_some();

        if roster.is_empty() {
            self.state
                .apply(|s| (s == LifecycleState::Stopping).then_some(LifecycleState::Idle));
        }
        stopping
    }

    /// Take a worker off the roster after it reported its exit
    fn retire(&self, id: WorkerId) {
        {
            let mut roster = self.roster.lock();
            if !roster.remove(id) {
                return;
            }
            debug!(pool = %self.config.name, worker = %id, live = roster.len(), "Worker retired");

            if roster.is_empty() {
                self.state.apply(|_| Some(LifecycleState::Idle));
            }
        }

        self.fault_policy.worker_retired(id);
    }
}

/// Raise `count` by `by`, saturating at `usize::MAX`; returns the new value
fn grow(count: &AtomicUsize, by: usize) -> usize {
    let previous = count
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| Some(c.saturating_add(by)))
        .unwrap_or_default();
    previous.saturating_add(by)
}

/// Lower `count` by `by`, saturating at zero; returns the new value
fn shrink(count: &AtomicUsize, by: usize) -> usize {
    let previous = count
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| Some(c.saturating_sub(by)))
        .unwrap_or_default();
    previous.saturating_sub(by)
}

/// Drains worker exit reports into the roster
async fn supervise(shared: Weak<Shared>, mut exits: mpsc::UnboundedReceiver<WorkerId>) {
    while let Some(id) = exits.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.retire(id);
    }
}

/// A dynamically resizable pool of workers repeatedly running one work unit
///
/// Cloning the handle is cheap; clones control the same pool.
///
/// # Example
///
/// ```ignore
/// use servicing_pool::prelude::*;
///
/// let pool = WorkerPool::builder()
///     .name("poller")
///     .work_fn(|| async { poll_once().await.map_err(WorkError::from) })
///     .fault_policy(ContinueOnFault)
///     .build()?;
///
/// pool.start(4);
/// pool.add_workers(2);
/// pool.stop();
/// pool.wait_idle().await;
/// ```
#[derive(Clone)]
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    pub fn builder() -> WorkerPoolBuilder {
        WorkerPoolBuilder::default()
    }

    /// Pool name from its configuration
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.shared.config
    }

    /// Set the worker count and run; repeated calls overwrite the count.
    ///
    /// Spawns workers up to the new count but never removes live ones.
    ///
    /// Called while `Stopping`, the pool returns to `Running` and workers still
    /// inside their loop resume. A worker that already left its loop stays on
    /// the roster until its exit is processed, so it is neither resumed nor
    /// replaced; if it was the last one, its exit still moves the pool to
    /// `Idle` after this call returned.
    pub fn start(&self, workers: usize) {
        {
            let mut roster = self.shared.roster.lock();
            self.shared.desired.store(workers, Ordering::SeqCst);
            self.shared.state.apply(|_| Some(LifecycleState::Running));
            self.shared.reconcile(&mut roster);
        }

        info!(pool = %self.name(), workers, "Worker pool started");
    }

    /// `start` with the configured `initial_workers`
    pub fn start_default(&self) {
        self.start(self.shared.config.initial_workers);
    }

    /// Raise the worker count, saturating at `usize::MAX`; ignored unless running
    pub fn add_workers(&self, workers: usize) {
        let mut roster = self.shared.roster.lock();
        if self.shared.state.get() == LifecycleState::Running {
            grow(&self.shared.desired, workers);
        }
        self.shared.reconcile(&mut roster);
    }

    /// Lower the worker count, saturating at zero, in any state.
    ///
    /// Live workers are not torn down. Only when the count reaches zero does
    /// the pool start draining, which ends every live worker.
    pub fn remove_workers(&self, workers: usize) {
        let roster = self.shared.roster.lock();
        if shrink(&self.shared.desired, workers) == 0 && self.shared.begin_drain(&roster) {
            info!(pool = %self.name(), "Worker count reached zero, draining");
        }
    }

    /// Ask the pool to drain. Returns without waiting; idempotent when idle.
    pub fn stop(&self) {
        let stopping = {
            let roster = self.shared.roster.lock();
            self.shared.begin_drain(&roster)
        };

        if stopping {
            info!(pool = %self.name(), "Worker pool stopping");
        }
    }

    /// Forced teardown: drain and abort every live worker, interrupting
    /// in-flight work.
    pub fn abort(&self) {
        let aborted = {
            let roster = self.shared.roster.lock();
            self.shared.begin_drain(&roster);
            roster.abort_all()
        };

        info!(pool = %self.name(), aborted, "Worker pool aborted");
    }

    /// Stop, wait for idle, then start again with the count configured
    /// before the stop
    #[instrument(skip(self), fields(pool = %self.name()))]
    pub async fn restart(&self) {
        let workers = self.worker_count();
        info!(workers, "Restarting worker pool");

        self.stop();
        self.wait_idle().await;
        self.start(workers);
    }

    /// Wait until the pool is idle
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.state.subscribe();
        // The sender lives in `shared`, which `self` keeps alive
        let _ = rx.wait_for(|s| *s == LifecycleState::Idle).await;
    }

    /// Wait until the pool is idle, giving up after `timeout`
    pub async fn wait_idle_timeout(&self, timeout: Duration) -> Result<(), PoolError> {
        tokio::time::timeout(timeout, self.wait_idle())
            .await
            .map_err(|_| PoolError::DrainTimeout(timeout))
    }

    /// Configured worker count. This is the target, not the number of
    /// workers currently running; see [`WorkerPool::live_workers`].
    pub fn worker_count(&self) -> usize {
        self.shared.desired.load(Ordering::SeqCst)
    }

    /// Workers currently on the roster
    pub fn live_workers(&self) -> usize {
        self.shared.roster.lock().len()
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.state.get()
    }

    /// Receive every state transition
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.shared.state.subscribe()
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            name: self.name().to_string(),
            state: self.state(),
            configured_workers: self.worker_count(),
            live_workers: self.live_workers(),
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name())
            .field("state", &self.state())
            .field("configured_workers", &self.worker_count())
            .finish()
    }
}

/// Builder for [`WorkerPool`]
///
/// A work unit and a fault policy are required.
#[derive(Default)]
pub struct WorkerPoolBuilder {
    config: WorkerPoolConfig,
    work: Option<WorkUnit>,
    fault_policy: Option<Arc<dyn FaultPolicy>>,
    observer: Option<StateObserver>,
    runtime: Option<Handle>,
}

impl WorkerPoolBuilder {
    /// Replace the whole configuration
    pub fn config(mut self, config: WorkerPoolConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn work(mut self, work: impl Into<WorkUnit>) -> Self {
        self.work = Some(work.into());
        self
    }

    /// Use an async closure as the work unit
    pub fn work_fn<F, Fut>(self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = crate::error::WorkResult> + Send + 'static,
    {
        self.work(WorkUnit::new(f))
    }

    /// Use a [`Runnable`] as the work unit
    pub fn runnable<R: Runnable>(self, runnable: Arc<R>) -> Self {
        self.work(RunnableAdapter::from_arc(runnable))
    }

    pub fn fault_policy<P: FaultPolicy>(mut self, policy: P) -> Self {
        self.fault_policy = Some(Arc::new(policy));
        self
    }

    /// Called with `(from, to)` on every state transition.
    ///
    /// Runs on a dedicated notifier task, one call at a time and in the order
    /// the transitions happened. It may call back into the pool. A panicking
    /// observer silences all later notifications.
    pub fn on_state_change<F>(mut self, observer: F) -> Self
    where
        F: Fn(LifecycleState, LifecycleState) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Runtime that hosts the workers; defaults to the current runtime
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> Result<WorkerPool, PoolError> {
        let work = self.work.ok_or(PoolError::MissingWork)?;
        let fault_policy = self.fault_policy.ok_or(PoolError::MissingFaultPolicy)?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| PoolError::NoRuntime)?,
        };

        let events = self.observer.map(|observer| {
            let (tx, rx) = mpsc::unbounded_channel();
            runtime.spawn(state::notify(observer, rx));
            tx
        });

        let (exits, exits_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            state: StateCell::new(self.config.name.clone(), events),
            config: self.config,
            work,
            fault_policy,
            runtime,
            exits,
            desired: AtomicUsize::new(0),
            roster: Mutex::new(Roster::default()),
        });

        shared
            .runtime
            .spawn(supervise(Arc::downgrade(&shared), exits_rx));

        debug!(pool = %shared.config.name, "Worker pool created");
        Ok(WorkerPool { shared })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::{BreakOnFault, ContinueOnFault};

    fn idle_work() -> WorkUnit {
        WorkUnit::new(|| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(())
        })
    }

    fn pool() -> WorkerPool {
        WorkerPool::builder()
            .name("unit")
            .work(idle_work())
            .fault_policy(ContinueOnFault)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_build_requires_work() {
        let err = WorkerPool::builder()
            .fault_policy(ContinueOnFault)
            .build()
            .unwrap_err();
        assert!(matches!(err, PoolError::MissingWork));
    }

    #[tokio::test]
    async fn test_build_requires_fault_policy() {
        let err = WorkerPool::builder()
            .work(idle_work())
            .build()
            .unwrap_err();
        assert!(matches!(err, PoolError::MissingFaultPolicy));
    }

    #[test]
    fn test_build_requires_runtime() {
        let err = WorkerPool::builder()
            .work(idle_work())
            .fault_policy(BreakOnFault)
            .build()
            .unwrap_err();
        assert!(matches!(err, PoolError::NoRuntime));
    }

    #[test]
    fn test_build_with_explicit_runtime() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        let pool = WorkerPool::builder()
            .work(idle_work())
            .fault_policy(BreakOnFault)
            .runtime(runtime.handle().clone())
            .build()
            .unwrap();

        pool.start(2);
        assert_eq!(pool.live_workers(), 2);
        pool.stop();
        runtime
            .block_on(pool.wait_idle_timeout(Duration::from_secs(5)))
            .unwrap();
    }

    #[tokio::test]
    async fn test_fresh_pool_is_idle() {
        let pool = pool();
        assert_eq!(pool.state(), LifecycleState::Idle);
        assert_eq!(pool.worker_count(), 0);
        assert_eq!(pool.live_workers(), 0);
    }

    #[tokio::test]
    async fn test_start_zero_then_stop_settles_idle() {
        let pool = pool();
        pool.start(0);
        assert_eq!(pool.state(), LifecycleState::Running);
        assert_eq!(pool.live_workers(), 0);

        pool.stop();
        assert_eq!(pool.state(), LifecycleState::Idle);
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let pool = pool();
        pool.start(3);

        let status = pool.status();
        assert_eq!(status.name, "unit");
        assert_eq!(status.state, LifecycleState::Running);
        assert_eq!(status.configured_workers, 3);
        assert_eq!(status.live_workers, 3);

        pool.stop();
        pool.wait_idle_timeout(Duration::from_secs(5)).await.unwrap();
    }

    #[test]
    fn test_worker_count_arithmetic_saturates() {
        let count = AtomicUsize::new(3);
        assert_eq!(grow(&count, 2), 5);
        assert_eq!(grow(&count, usize::MAX), usize::MAX);
        assert_eq!(count.load(Ordering::SeqCst), usize::MAX);

        assert_eq!(shrink(&count, 1), usize::MAX - 1);
        assert_eq!(shrink(&count, usize::MAX), 0);
        assert_eq!(shrink(&count, 6), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_start_default_uses_config() {
        let pool = WorkerPool::builder()
            .config(WorkerPoolConfig::new("defaults").with_initial_workers(2))
            .work(idle_work())
            .fault_policy(ContinueOnFault)
            .build()
            .unwrap();

        pool.start_default();
        assert_eq!(pool.worker_count(), 2);
        assert_eq!(pool.name(), "defaults");

        pool.stop();
        pool.wait_idle_timeout(Duration::from_secs(5)).await.unwrap();
    }
}
