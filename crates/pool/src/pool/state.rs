//! Lifecycle state machine
//!
//! ```text
//! ┌──────┐  start   ┌─────────┐  stop / count hits 0  ┌──────────┐
//! │ Idle │ ───────► │ Running │ ────────────────────► │ Stopping │
//! └──────┘          └─────────┘                       └──────────┘
//!    ▲                   │          last worker exits       │
//!    └───────────────────┴──────────────────────────────────┘
//! ```
//!
//! The current state lives in a `watch` channel: reads never block on the
//! roster, writes are read-modify-write under the channel's own lock, and
//! every change is published to subscribers.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Pool lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// No workers exist
    Idle,

    /// Workers are running toward the configured count
    Running,

    /// Draining: no new workers, live workers exit at their next iteration
    Stopping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}

/// A state change that actually happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

/// Callback fired on every transition
pub type StateObserver = Arc<dyn Fn(LifecycleState, LifecycleState) + Send + Sync>;

pub(crate) struct StateCell {
    pool: String,
    tx: watch::Sender<LifecycleState>,
    events: Option<mpsc::UnboundedSender<Transition>>,
}

impl StateCell {
    pub(crate) fn new(pool: String, events: Option<mpsc::UnboundedSender<Transition>>) -> Self {
        let (tx, _rx) = watch::channel(LifecycleState::Idle);
        Self { pool, tx, events }
    }

    pub(crate) fn get(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Apply `next` to the current state atomically.
    ///
    /// Returns the transition if the state changed. Transitions are queued for
    /// the observer in the order they are applied.
    pub(crate) fn apply<F>(&self, next: F) -> Option<Transition>
    where
        F: FnOnce(LifecycleState) -> Option<LifecycleState>,
    {
        let mut change = None;
        self.tx.send_if_modified(|state| match next(*state) {
            Some(to) if to != *state => {
                let t = Transition { from: *state, to };
                if let Some(events) = &self.events {
                    // Fails only once the notifier is gone
                    let _ = events.send(t);
                }
                change = Some(t);
                *state = to;
                true
            }
            _ => false,
        });

        if let Some(t) = change {
            debug!(pool = %self.pool, from = %t.from, to = %t.to, "State transition");
        }
        change
    }
}

/// Deliver queued transitions to the observer, one at a time and in order
pub(crate) async fn notify(observer: StateObserver, mut events: mpsc::UnboundedReceiver<Transition>) {
    while let Some(t) = events.recv().await {
        observer(t.from, t.to);
    }
}
