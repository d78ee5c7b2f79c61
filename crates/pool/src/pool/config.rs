//! Worker pool configuration

use serde::{Deserialize, Serialize};

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Pool name, used in logs and status snapshots
    pub name: String,

    /// Worker count used by `start_default`
    pub initial_workers: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            name: "pool".to_string(),
            initial_workers: 1,
        }
    }
}

impl WorkerPoolConfig {
    pub const ENV_NAME: &'static str = "POOL_NAME";
    pub const ENV_INITIAL_WORKERS: &'static str = "POOL_INITIAL_WORKERS";

    /// Create a configuration for a named pool
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let name = get(Self::ENV_NAME)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.name);

        let initial_workers = get(Self::ENV_INITIAL_WORKERS)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.initial_workers);

        Self {
            name,
            initial_workers,
        }
    }

    /// Set the pool name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the worker count used by `start_default`
    pub fn with_initial_workers(mut self, workers: usize) -> Self {
        self.initial_workers = workers;
        self
    }
}
