//! Registry tests driving real worker pools
//!
//! Run with: cargo test -p servicing-pool --test registry_test

use std::sync::Arc;
use std::time::Duration;

use servicing_pool::prelude::*;

const DRAIN: Duration = Duration::from_secs(5);

fn pool(name: &str) -> WorkerPool {
    WorkerPool::builder()
        .name(name)
        .work_fn(|| async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok(())
        })
        .fault_policy(ContinueOnFault)
        .build()
        .unwrap()
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_commands_reach_registered_pool() {
    let registry = PoolRegistry::new();
    let mailer = pool("mailer");
    registry.register_pool(mailer.clone()).unwrap();

    registry.start("mailer", 2);
    assert_eq!(registry.state("mailer"), LifecycleState::Running);
    assert_eq!(registry.worker_count("mailer"), 2);
    assert_eq!(mailer.live_workers(), 2);

    registry.add_workers("mailer", 1);
    registry.remove_workers("mailer", 2);
    assert_eq!(registry.worker_count("mailer"), 1);

    registry.stop("mailer");
    mailer.wait_idle_timeout(DRAIN).await.unwrap();
    assert_eq!(registry.state("mailer"), LifecycleState::Idle);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_register_pool_rejects_duplicate_names() {
    let registry = PoolRegistry::new();
    registry.register_pool(pool("reports")).unwrap();

    let err = registry.register_pool(pool("reports")).unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateName(_)));
    assert_eq!(registry.count(), 1);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_restart_by_name_preserves_count() {
    let registry = PoolRegistry::new();
    let indexer = pool("indexer");
    registry.register_pool(indexer.clone()).unwrap();

    registry.start("indexer", 3);
    tokio::time::timeout(DRAIN, registry.restart("indexer"))
        .await
        .unwrap();

    assert_eq!(indexer.state(), LifecycleState::Running);
    assert_eq!(indexer.worker_count(), 3);

    indexer.stop();
    indexer.wait_idle_timeout(DRAIN).await.unwrap();
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_stop_all_drains_every_pool() {
    let registry = PoolRegistry::new();
    let pools: Vec<WorkerPool> = ["a", "b", "c"].into_iter().map(pool).collect();
    for (i, p) in pools.iter().enumerate() {
        registry.register(p.name(), Arc::new(p.clone())).unwrap();
        p.start(i + 1);
    }

    registry.stop_all().await;

    for p in &pools {
        assert_ne!(p.state(), LifecycleState::Running);
        p.wait_idle_timeout(DRAIN).await.unwrap();
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_unregistered_pool_no_longer_receives_commands() {
    let registry = PoolRegistry::new();
    let poller = pool("poller");
    registry.register_pool(poller.clone()).unwrap();

    let removed = registry.unregister("poller").unwrap();
    assert_eq!(removed.state(), LifecycleState::Idle);

    registry.start("poller", 2);
    assert_eq!(poller.state(), LifecycleState::Idle);
    assert_eq!(registry.worker_count("poller"), 0);
}
