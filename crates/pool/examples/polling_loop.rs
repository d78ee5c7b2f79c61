//! Polling loop demo
//!
//! Runs a pool that "polls" a fake inbox, resizes it, restarts it and then
//! drains on Ctrl-C (or after a few seconds).
//!
//! Configure via environment variables:
//! - POOL_NAME: pool name (default: "pool")
//! - POOL_INITIAL_WORKERS: workers for the first start (default: 1)
//! - RUST_LOG: log filter (default: "servicing_pool=debug,polling_loop=info")
//!
//! Run with: cargo run -p servicing-pool --example polling_loop

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use servicing_pool::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("servicing_pool=debug,polling_loop=info")),
        )
        .init();

    let config = WorkerPoolConfig::from_env();
    tracing::info!(name = %config.name, initial_workers = config.initial_workers, "Polling loop starting...");

    let polls = Arc::new(AtomicU64::new(0));
    let pool = WorkerPool::builder()
        .config(config)
        .work_fn({
            let polls = Arc::clone(&polls);
            move || {
                let polls = Arc::clone(&polls);
                async move {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    let n = polls.fetch_add(1, Ordering::Relaxed) + 1;
                    // Every 7th poll fails, to exercise the fault policy
                    if n % 7 == 0 {
                        return Err(WorkError::failed(format!("inbox unavailable on poll {n}")));
                    }
                    tracing::debug!(poll = n, "Inbox polled");
                    Ok(())
                }
            }
        })
        .fault_policy(FaultBudget::per_worker(3))
        .on_state_change(|from, to| tracing::info!(%from, %to, "Pool state changed"))
        .build()
        .context("Failed to build worker pool")?;

    pool.start_default();
    pool.add_workers(2);
    tracing::info!(status = ?pool.status(), "Pool resized");

    tokio::select! {
        _ = async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            pool.restart().await;
            tracing::info!(status = ?pool.status(), "Pool restarted");
            tokio::time::sleep(Duration::from_secs(2)).await;
        } => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
    }

    pool.stop();
    pool.wait_idle_timeout(Duration::from_secs(5))
        .await
        .context("Pool did not drain")?;

    tracing::info!(polls = polls.load(Ordering::Relaxed), "Polling loop shutdown complete");
    Ok(())
}
