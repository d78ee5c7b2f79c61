//! Worker pool lifecycle engine
//!
//! This module provides:
//! - [`WorkerPool`] - Resizable pool of workers repeatedly running one work unit
//! - [`WorkerPoolConfig`] - Pool naming and defaults
//! - [`LifecycleState`] - The idle / running / stopping state machine
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        WorkerPool                            │
//! │  start / add / remove / stop / abort ──► roster lock         │
//! │                                           │                  │
//! │             ┌─────────────────────────────┘                  │
//! │             ▼                                                │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │  Roster: worker-1  worker-2  ...  worker-N           │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! │             ▲                         │                      │
//! │   retire    │                         │ loop while Running   │
//! │  ┌──────────┴──────────┐   exit id    ▼                      │
//! │  │     Supervisor      │ ◄──────── Worker tasks              │
//! │  │ (last out => Idle)  │            │ fault                  │
//! │  └─────────────────────┘            ▼                        │
//! │                                 FaultPolicy                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod roster;
mod state;
mod worker;
mod worker_pool;

pub use config::WorkerPoolConfig;
pub use roster::WorkerId;
pub use state::{LifecycleState, StateObserver, Transition};
pub use worker_pool::{PoolStatus, WorkerPool, WorkerPoolBuilder};
