//! # Servicing Pool
//!
//! Run a unit of work repeatedly across a dynamically resizable pool of
//! concurrent workers, without writing pool management or shutdown logic by
//! hand. Suited to polling loops, queue consumers and periodic jobs.
//!
//! ## Features
//!
//! - **Lifecycle**: `Idle` → `Running` → `Stopping` → `Idle`, observable through
//!   a watch channel or a state-change callback
//! - **Runtime sizing**: grow and shrink the configured worker count while running
//! - **Drain to idle**: `stop` lets in-flight work finish; the last worker out
//!   returns the pool to `Idle`
//! - **Fault policies**: an injected policy decides whether a faulting worker
//!   keeps looping or exits
//! - **Registry**: address pools by name, with unknown names treated as idle no-ops
//!
//! ## Example
//!
//! ```ignore
//! use servicing_pool::prelude::*;
//!
//! let pool = WorkerPool::builder()
//!     .name("inbox")
//!     .work_fn(|| async {
//!         poll_inbox().await?;
//!         Ok(())
//!     })
//!     .fault_policy(FaultBudget::per_worker(5))
//!     .build()?;
//!
//! pool.start(4);
//! pool.remove_workers(1); // configured count is now 3; live workers keep running
//! pool.restart().await;   // drains, then starts 3 workers
//! pool.stop();
//! ```

pub mod error;
pub mod fault;
pub mod pool;
pub mod registry;
pub mod work;

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::{PoolError, RegistryError, WorkError, WorkResult};
    pub use crate::fault::{BreakOnFault, ContinueOnFault, FaultBudget, FaultDecision, FaultPolicy};
    pub use crate::pool::{LifecycleState, PoolStatus, WorkerId, WorkerPool, WorkerPoolConfig};
    pub use crate::registry::{PoolRegistry, Service};
    pub use crate::work::{Runnable, RunnableAdapter, WorkUnit};
}

// Re-export key types at crate root
pub use error::{PoolError, RegistryError, WorkError, WorkResult};
pub use fault::{BreakOnFault, ContinueOnFault, FaultBudget, FaultDecision, FaultPolicy};
pub use pool::{
    LifecycleState, PoolStatus, StateObserver, Transition, WorkerId, WorkerPool,
    WorkerPoolBuilder, WorkerPoolConfig,
};
pub use registry::{IdleService, PoolRegistry, Service};
pub use work::{blocking, Runnable, RunnableAdapter, WorkUnit};
