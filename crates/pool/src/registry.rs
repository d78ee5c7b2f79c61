//! Name-keyed registry of pools
//!
//! The registry maps names to [`Service`] handles and forwards commands to
//! them. Commands for unknown names go to a shared idle stand-in: they never
//! fail, report `Idle` with zero workers, and change nothing.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::RegistryError;
use crate::pool::{LifecycleState, WorkerPool};

/// Control surface shared by pools and the idle stand-in
#[async_trait]
pub trait Service: Send + Sync {
    /// Configured worker count
    fn worker_count(&self) -> usize;

    fn add_workers(&self, workers: usize);

    fn remove_workers(&self, workers: usize);

    /// Stop, wait for the drain, start again
    async fn restart(&self);

    fn start(&self, workers: usize);

    fn state(&self) -> LifecycleState;

    /// Request a drain without waiting for it
    fn stop(&self);
}

#[async_trait]
impl Service for WorkerPool {
    fn worker_count(&self) -> usize {
        WorkerPool::worker_count(self)
    }

    fn add_workers(&self, workers: usize) {
        WorkerPool::add_workers(self, workers)
    }

    fn remove_workers(&self, workers: usize) {
        WorkerPool::remove_workers(self, workers)
    }

    async fn restart(&self) {
        WorkerPool::restart(self).await
    }

    fn start(&self, workers: usize) {
        WorkerPool::start(self, workers)
    }

    fn state(&self) -> LifecycleState {
        WorkerPool::state(self)
    }

    fn stop(&self) {
        WorkerPool::stop(self)
    }
}

/// Stand-in for names that are not registered
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleService;

static IDLE: IdleService = IdleService;

#[async_trait]
impl Service for IdleService {
    fn worker_count(&self) -> usize {
        0
    }

    fn add_workers(&self, _workers: usize) {}

    fn remove_workers(&self, _workers: usize) {}

    async fn restart(&self) {}

    fn start(&self, _workers: usize) {}

    fn state(&self) -> LifecycleState {
        LifecycleState::Idle
    }

    fn stop(&self) {}
}

/// Registry of services keyed by name
///
/// # Example
///
/// ```ignore
/// let registry = PoolRegistry::new();
/// registry.register("mailer", Arc::new(mailer_pool))?;
///
/// registry.start("mailer", 4);
/// registry.start("unknown", 4); // silently ignored
///
/// registry.stop_all().await;
/// ```
#[derive(Default)]
pub struct PoolRegistry {
    services: DashMap<String, Arc<dyn Service>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service; fails if the name is taken
    pub fn register(
        &self,
        name: impl Into<String>,
        service: Arc<dyn Service>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        match self.services.entry(name.clone()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateName(name)),
            Entry::Vacant(slot) => {
                slot.insert(service);
                debug!(service = %name, "Registered service");
                Ok(())
            }
        }
    }

    /// Register a worker pool under its configured name
    pub fn register_pool(&self, pool: WorkerPool) -> Result<(), RegistryError> {
        let name = pool.name().to_string();
        self.register(name, Arc::new(pool))
    }

    /// Remove a service; no-op for unknown names
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Service>> {
        let removed = self.services.remove(name).map(|(_, service)| service);
        if removed.is_some() {
            debug!(service = %name, "Unregistered service");
        }
        removed
    }

    /// The registered service, if any
    pub fn get(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Run `op` against the named service, or the idle stand-in
    pub fn dispatch<R>(&self, name: &str, op: impl FnOnce(&dyn Service) -> R) -> R {
        match self.get(name) {
            Some(service) => op(service.as_ref()),
            None => op(&IDLE),
        }
    }

    pub fn worker_count(&self, name: &str) -> usize {
        self.dispatch(name, |s| s.worker_count())
    }

    pub fn add_workers(&self, name: &str, workers: usize) {
        self.dispatch(name, |s| s.add_workers(workers))
    }

    pub fn remove_workers(&self, name: &str, workers: usize) {
        self.dispatch(name, |s| s.remove_workers(workers))
    }

    pub fn start(&self, name: &str, workers: usize) {
        self.dispatch(name, |s| s.start(workers))
    }

    pub fn state(&self, name: &str) -> LifecycleState {
        self.dispatch(name, |s| s.state())
    }

    pub fn stop(&self, name: &str) {
        self.dispatch(name, |s| s.stop())
    }

    pub async fn restart(&self, name: &str) {
        match self.get(name) {
            Some(service) => service.restart().await,
            None => IDLE.restart().await,
        }
    }

    /// Stop every registered service concurrently.
    ///
    /// Returns once every `stop` call has returned, which does not mean the
    /// services have drained.
    pub async fn stop_all(&self) {
        let services: Vec<Arc<dyn Service>> = self
            .services
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        info!(count = services.len(), "Stopping all services");

        let mut stops = JoinSet::new();
        for service in services {
            stops.spawn(async move { service.stop() });
        }

        while let Some(result) = stops.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Stop task failed");
            }
        }
    }

    /// Names of all registered services, in no particular order
    pub fn list(&self) -> Vec<String> {
        self.services.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("services", &self.list())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records every call it receives
    #[derive(Default)]
    struct RecordingService {
        calls: Mutex<Vec<String>>,
        workers: usize,
        state: Option<LifecycleState>,
    }

    impl RecordingService {
        fn with_workers(workers: usize) -> Self {
            Self {
                workers,
                ..Default::default()
            }
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Service for RecordingService {
        fn worker_count(&self) -> usize {
            self.record("worker_count");
            self.workers
        }

        fn add_workers(&self, workers: usize) {
            self.record(format!("add_workers({workers})"));
        }

        fn remove_workers(&self, workers: usize) {
            self.record(format!("remove_workers({workers})"));
        }

        async fn restart(&self) {
            self.record("restart");
        }

        fn start(&self, workers: usize) {
            self.record(format!("start({workers})"));
        }

        fn state(&self) -> LifecycleState {
            self.record("state");
            self.state.unwrap_or(LifecycleState::Idle)
        }

        fn stop(&self) {
            self.record("stop");
        }
    }

    fn registry_with_two() -> (PoolRegistry, Arc<RecordingService>, Arc<RecordingService>) {
        let registry = PoolRegistry::new();
        let first = Arc::new(RecordingService::with_workers(10));
        let second = Arc::new(RecordingService {
            state: Some(LifecycleState::Running),
            ..Default::default()
        });
        registry.register("0", first.clone()).unwrap();
        registry.register("1", second.clone()).unwrap();
        (registry, first, second)
    }

    #[test]
    fn test_forwards_to_named_service_only() {
        let (registry, first, second) = registry_with_two();

        assert_eq!(registry.worker_count("0"), 10);
        registry.add_workers("0", 2);
        registry.remove_workers("0", 1);
        registry.start("0", 1);
        registry.stop("0");

        assert_eq!(
            first.calls(),
            vec!["worker_count", "add_workers(2)", "remove_workers(1)", "start(1)", "stop"]
        );
        assert!(second.calls().is_empty());

        assert_eq!(registry.state("1"), LifecycleState::Running);
        assert_eq!(second.calls(), vec!["state"]);
    }

    #[test]
    fn test_unknown_name_is_a_silent_no_op() {
        let (registry, first, second) = registry_with_two();

        assert_eq!(registry.worker_count("10"), 0);
        assert_eq!(registry.state("10"), LifecycleState::Idle);
        registry.add_workers("10", 2);
        registry.remove_workers("10", 2);
        registry.start("10", 2);
        registry.stop("10");

        assert!(first.calls().is_empty());
        assert!(second.calls().is_empty());
    }

    #[tokio::test]
    async fn test_restart_forwarding() {
        let (registry, first, second) = registry_with_two();

        registry.restart("0").await;
        registry.restart("10").await;

        assert_eq!(first.calls(), vec!["restart"]);
        assert!(second.calls().is_empty());
    }

    #[test]
    fn test_empty_registry_never_fails() {
        let registry = PoolRegistry::new();
        assert_eq!(registry.worker_count("0"), 0);
        assert_eq!(registry.state("0"), LifecycleState::Idle);
        registry.start("0", 1);
        registry.stop("0");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let (registry, first, _) = registry_with_two();

        let err = registry
            .register("0", Arc::new(RecordingService::default()))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(ref n) if n == "0"));

        // The original registration is untouched
        registry.stop("0");
        assert_eq!(first.calls(), vec!["stop"]);
    }

    #[test]
    fn test_unregister_then_reuse_name() {
        let (registry, _, _) = registry_with_two();

        assert!(registry.unregister("0").is_some());
        assert!(registry.unregister("0").is_none());
        assert_eq!(registry.count(), 1);
        assert!(!registry.contains("0"));

        registry
            .register("0", Arc::new(RecordingService::default()))
            .unwrap();
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_list_services() {
        let (registry, _, _) = registry_with_two();

        let mut names = registry.list();
        names.sort();
        assert_eq!(names, vec!["0", "1"]);

        let single = PoolRegistry::new();
        single
            .register("Zero:Zero:Zero", Arc::new(RecordingService::default()))
            .unwrap();
        assert_eq!(single.list(), vec!["Zero:Zero:Zero"]);
    }

    #[tokio::test]
    async fn test_stop_all_stops_each_service_once() {
        let (registry, first, second) = registry_with_two();

        registry.stop_all().await;

        assert_eq!(first.calls(), vec!["stop"]);
        assert_eq!(second.calls(), vec!["stop"]);
    }

    #[tokio::test]
    async fn test_stop_all_on_empty_registry() {
        PoolRegistry::new().stop_all().await;
    }

    #[test]
    fn test_dispatch_returns_service_result() {
        let (registry, _, _) = registry_with_two();
        assert_eq!(registry.dispatch("0", |s| s.worker_count() * 2), 20);
        assert_eq!(registry.dispatch("missing", |s| s.worker_count()), 0);
    }

    #[test]
    fn test_registry_debug() {
        let registry = PoolRegistry::new();
        registry
            .register("mailer", Arc::new(RecordingService::default()))
            .unwrap();
        assert!(format!("{registry:?}").contains("mailer"));
    }
}
