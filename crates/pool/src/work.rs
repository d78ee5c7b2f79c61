//! Work units and adapters
//!
//! A [`WorkUnit`] is the callable every worker invokes in a loop. It takes no
//! arguments, produces no value, and reports faults through [`WorkError`].
//!
//! - [`WorkUnit::new`] wraps an async closure
//! - [`RunnableAdapter`] wraps any [`Runnable`] object
//! - [`blocking`] wraps a synchronous closure and runs it on the blocking pool

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::{WorkError, WorkResult};

type WorkFn = dyn Fn() -> BoxFuture<'static, WorkResult> + Send + Sync;

/// The callable a worker invokes on every iteration
#[derive(Clone)]
pub struct WorkUnit {
    inner: Arc<WorkFn>,
}

impl WorkUnit {
    /// Wrap an async closure
    ///
    /// # Example
    ///
    /// ```ignore
    /// let work = WorkUnit::new(move || {
    ///     let queue = queue.clone();
    ///     async move {
    ///         queue.drain_one().await?;
    ///         Ok(())
    ///     }
    /// });
    /// ```
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WorkResult> + Send + 'static,
    {
        Self {
            inner: Arc::new(move || f().boxed()),
        }
    }

    /// Produce the future for one iteration
    pub fn invoke(&self) -> BoxFuture<'static, WorkResult> {
        (self.inner)()
    }
}

impl fmt::Debug for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkUnit").finish_non_exhaustive()
    }
}

/// An object exposing a single parameterless `run` capability
#[async_trait]
pub trait Runnable: Send + Sync + 'static {
    /// Perform one unit of work
    async fn run(&self) -> WorkResult;
}

/// Adapts a [`Runnable`] into a [`WorkUnit`]
///
/// Faults from `run` pass through unchanged.
pub struct RunnableAdapter<R: Runnable> {
    runnable: Arc<R>,
}

impl<R: Runnable> RunnableAdapter<R> {
    pub fn new(runnable: R) -> Self {
        Self::from_arc(Arc::new(runnable))
    }

    pub fn from_arc(runnable: Arc<R>) -> Self {
        Self { runnable }
    }

    /// The wrapped object
    pub fn runnable(&self) -> &Arc<R> {
        &self.runnable
    }

    pub fn into_work_unit(self) -> WorkUnit {
        let runnable = self.runnable;
        WorkUnit::new(move || {
            let runnable = Arc::clone(&runnable);
            async move { runnable.run().await }
        })
    }
}

impl<R: Runnable> From<RunnableAdapter<R>> for WorkUnit {
    fn from(adapter: RunnableAdapter<R>) -> Self {
        adapter.into_work_unit()
    }
}

/// Wrap a synchronous closure, running each call on tokio's blocking pool
///
/// A panic inside `f` is reported as [`WorkError::Panicked`].
pub fn blocking<F>(f: F) -> WorkUnit
where
    F: Fn() -> WorkResult + Send + Sync + 'static,
{
    let f = Arc::new(f);
    WorkUnit::new(move || {
        let f = Arc::clone(&f);
        async move {
            match tokio::task::spawn_blocking(move || f()).await {
                Ok(result) => result,
                Err(join) if join.is_panic() => {
                    Err(WorkError::Panicked(panic_message(join.into_panic().as_ref())))
                }
                Err(_) => Err(WorkError::Cancelled),
            }
        }
    })
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
