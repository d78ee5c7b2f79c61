//! Error types for pools, registries and work units

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the pool control plane
#[derive(Debug, Error)]
pub enum PoolError {
    /// No work unit was supplied to the builder
    #[error("configuration error: a work unit is required")]
    MissingWork,

    /// No fault policy was supplied to the builder
    #[error("configuration error: a fault policy is required")]
    MissingFaultPolicy,

    /// Built outside a tokio runtime and no handle was provided
    #[error("configuration error: no tokio runtime available to host workers")]
    NoRuntime,

    /// The pool did not drain to idle in time
    #[error("pool did not reach idle within {0:?}")]
    DrainTimeout(Duration),
}

impl PoolError {
    /// Whether this error was raised while building the pool
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PoolError::MissingWork | PoolError::MissingFaultPolicy | PoolError::NoRuntime
        )
    }
}

/// Errors from registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A service is already registered under this name
    #[error("a service named '{0}' is already registered")]
    DuplicateName(String),
}

/// Outcome of a single work unit invocation that did not succeed
#[derive(Debug, Error)]
pub enum WorkError {
    /// Application fault; routed to the fault policy
    #[error(transparent)]
    Failed(#[from] anyhow::Error),

    /// The work unit panicked; routed to the fault policy
    #[error("work unit panicked: {0}")]
    Panicked(String),

    /// Cooperative teardown of the hosting worker; never routed to the fault policy
    #[error("worker teardown requested")]
    Cancelled,
}

impl WorkError {
    /// Create an application fault from a message
    pub fn failed(msg: impl Into<String>) -> Self {
        WorkError::Failed(anyhow::anyhow!(msg.into()))
    }

    /// Whether this error is a forced teardown rather than a recoverable fault
    pub fn is_teardown(&self) -> bool {
        matches!(self, WorkError::Cancelled)
    }
}

/// Result of a single work unit invocation
pub type WorkResult = std::result::Result<(), WorkError>;
