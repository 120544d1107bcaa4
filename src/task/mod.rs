//! Pour futures — the cancellable, observable unit of hardware work.
//!
//! ```text
//!            start()             timer / body
//!  Created ──────────▶ Running ───────────────▶ Succeeded | Failed
//!     │                   │
//!     │ cancel()          │ cancel(): cancel handlers ──▶ Cancelled
//!     └───────────────────┴──────────────────────────────▶ Cancelled
//! ```
//!
//! Terminal states are one-way. Complete handlers run exactly once on
//! every terminal path, always after any cancel handler. Nothing blocks:
//! a running future resumes from whichever callback (timer, child future)
//! resolves it.

pub mod combinators;

pub use combinators::{ParallelPolicy, parallel, sequenced};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::debug;

use crate::app::ports::TimerHandle;
use crate::drivers::pump::TimedPour;
use crate::error::PourError;

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// Lifecycle state of a [`PourFuture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PourState {
    Created,
    Running,
    Succeeded,
    Failed(PourError),
    Cancelled,
}

impl PourState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_) | Self::Cancelled)
    }
}

/// How a future ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PourOutcome {
    Succeeded,
    Failed(PourError),
    Cancelled,
}

impl From<PourOutcome> for PourState {
    fn from(outcome: PourOutcome) -> Self {
        match outcome {
            PourOutcome::Succeeded => Self::Succeeded,
            PourOutcome::Failed(e) => Self::Failed(e),
            PourOutcome::Cancelled => Self::Cancelled,
        }
    }
}

type Body = Box<dyn FnOnce(&PourFuture) + Send>;
type CancelHandler = Box<dyn FnOnce(&PourFuture) + Send>;
type CompleteHandler = Box<dyn FnOnce(&PourFuture, PourOutcome) + Send>;

struct Core {
    state: PourState,
    /// Set when `cancel()` begins on a running future; blocks any other
    /// terminal transition until the cancel handlers have run.
    cancelling: bool,
    body: Option<Body>,
    cancel_handlers: Vec<CancelHandler>,
    complete_handlers: Vec<CompleteHandler>,
    timer: Option<TimerHandle>,
    /// Futures driven by this one; cancellation reaches them.
    children: Vec<PourFuture>,
}

struct Inner {
    name: String,
    timed: Option<TimedPour>,
    core: Mutex<Core>,
    done: Signal<CriticalSectionRawMutex, PourOutcome>,
}

// ---------------------------------------------------------------------------
// PourFuture
// ---------------------------------------------------------------------------

/// Shared handle to one unit of hardware work.
///
/// Cloning is cheap; every clone observes and drives the same state.
#[derive(Clone)]
pub struct PourFuture {
    inner: Arc<Inner>,
}

impl PourFuture {
    /// Create a future whose `body` runs once on [`start`](Self::start).
    ///
    /// The body resolves the future, either synchronously or later from a
    /// callback, with [`succeed`](Self::succeed) or [`fail`](Self::fail).
    pub fn new(name: &str, body: impl FnOnce(&PourFuture) + Send + 'static) -> Self {
        Self::build(name, None, PourState::Created, Some(Box::new(body)))
    }

    /// A future that is already `Failed` with `reason`.
    pub fn failed(name: &str, reason: PourError) -> Self {
        let future = Self::build(name, None, PourState::Failed(reason), None);
        future.inner.done.signal(PourOutcome::Failed(reason));
        future
    }

    pub(crate) fn timed(
        name: &str,
        timed: TimedPour,
        body: impl FnOnce(&PourFuture) + Send + 'static,
    ) -> Self {
        Self::build(name, Some(timed), PourState::Created, Some(Box::new(body)))
    }

    fn build(name: &str, timed: Option<TimedPour>, state: PourState, body: Option<Body>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                timed,
                core: Mutex::new(Core {
                    state,
                    cancelling: false,
                    body,
                    cancel_handlers: Vec::new(),
                    complete_handlers: Vec::new(),
                    timer: None,
                    children: Vec::new(),
                }),
                done: Signal::new(),
            }),
        }
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        self.inner.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> PourState {
        self.core().state
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Terminal outcome, or `None` while still pending.
    pub fn outcome(&self) -> Option<PourOutcome> {
        match self.state() {
            PourState::Succeeded => Some(PourOutcome::Succeeded),
            PourState::Failed(e) => Some(PourOutcome::Failed(e)),
            PourState::Cancelled => Some(PourOutcome::Cancelled),
            PourState::Created | PourState::Running => None,
        }
    }

    /// Pump bookkeeping for futures created by a pump's timed pour.
    pub fn timed_pour(&self) -> Option<&TimedPour> {
        self.inner.timed.as_ref()
    }

    /// True once `cancel()` has begun, even before `Cancelled` is committed.
    pub fn is_cancel_requested(&self) -> bool {
        let core = self.core();
        core.cancelling || core.state == PourState::Cancelled
    }

    /// Whether two handles refer to the same future.
    pub fn same_as(&self, other: &PourFuture) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ── Handlers ──────────────────────────────────────────────

    /// Register a handler that runs during cancellation of a running
    /// future, before `Cancelled` is committed. Ignored once terminal.
    pub fn on_cancel(&self, handler: impl FnOnce(&PourFuture) + Send + 'static) -> &Self {
        let mut core = self.core();
        if !core.state.is_terminal() {
            core.cancel_handlers.push(Box::new(handler));
        }
        self
    }

    /// Register a handler that runs exactly once when the future becomes
    /// terminal. Runs immediately if it already is.
    pub fn on_complete(
        &self,
        handler: impl FnOnce(&PourFuture, PourOutcome) + Send + 'static,
    ) -> &Self {
        let outcome = {
            let mut core = self.core();
            match core.state {
                PourState::Succeeded => PourOutcome::Succeeded,
                PourState::Failed(e) => PourOutcome::Failed(e),
                PourState::Cancelled => PourOutcome::Cancelled,
                PourState::Created | PourState::Running => {
                    core.complete_handlers.push(Box::new(handler));
                    return self;
                }
            }
        };
        handler(self, outcome);
        self
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Move `Created → Running` and run the body. No-op in any other state.
    pub fn start(&self) {
        let body = {
            let mut core = self.core();
            if core.state != PourState::Created {
                debug!("{}: start ignored in {:?}", self.inner.name, core.state);
                return;
            }
            core.state = PourState::Running;
            core.body.take()
        };
        if let Some(body) = body {
            body(self);
        }
    }

    /// Request cancellation.
    ///
    /// On a running future the cancel handlers run, every child that has
    /// not finished is cancelled, any pending timer is dropped and
    /// `Cancelled` is committed. A created future goes straight to
    /// `Cancelled`.
    ///
    /// A terminal future keeps its state, but children still running
    /// (siblings left behind by a failed parallel pour) are cancelled.
    /// Returns `true` if this call cancelled anything.
    pub fn cancel(&self) -> bool {
        let (handlers, children) = {
            let mut core = self.core();
            if core.cancelling {
                return false;
            }
            if core.state.is_terminal() {
                let children = core.children.clone();
                drop(core);
                return children
                    .iter()
                    .filter(|c| c.state() == PourState::Running)
                    .fold(false, |any, child| child.cancel() || any);
            }
            core.cancelling = true;
            core.body = None;
            let handlers = match core.state {
                PourState::Running => std::mem::take(&mut core.cancel_handlers),
                _ => Vec::new(),
            };
            (handlers, core.children.clone())
        };
        for handler in handlers {
            handler(self);
        }
        // Created children are cancelled too, so a late start() on one is inert.
        for child in &children {
            child.cancel();
        }
        self.finish(PourOutcome::Cancelled)
    }

    /// Register the futures this one drives, for cancellation.
    pub(crate) fn adopt(&self, children: &[PourFuture]) {
        self.core().children.extend(children.iter().cloned());
    }

    /// Resolve as `Succeeded`. Returns `false` if already resolved.
    pub fn succeed(&self) -> bool {
        self.finish(PourOutcome::Succeeded)
    }

    /// Resolve as `Failed(reason)`. Returns `false` if already resolved.
    pub fn fail(&self, reason: PourError) -> bool {
        self.finish(PourOutcome::Failed(reason))
    }

    /// Commit a terminal state and run the complete handlers.
    pub(crate) fn finish(&self, outcome: PourOutcome) -> bool {
        let (handlers, timer) = {
            let mut core = self.core();
            if core.state.is_terminal() {
                return false;
            }
            if core.cancelling && outcome != PourOutcome::Cancelled {
                return false;
            }
            core.state = outcome.into();
            core.body = None;
            core.cancel_handlers.clear();
            let timer = match outcome {
                PourOutcome::Succeeded => None,
                PourOutcome::Failed(_) | PourOutcome::Cancelled => core.timer.take(),
            };
            (std::mem::take(&mut core.complete_handlers), timer)
        };
        drop(timer);
        for handler in handlers {
            handler(self, outcome);
        }
        self.inner.done.signal(outcome);
        true
    }

    /// Keep the completion timer so cancellation can disarm it.
    pub(crate) fn arm_timer(&self, handle: TimerHandle) {
        let mut core = self.core();
        if core.cancelling || core.state.is_terminal() {
            drop(core);
            handle.cancel();
            return;
        }
        core.timer = Some(handle);
    }

    // ── Waiting ───────────────────────────────────────────────

    /// Resolve with the terminal outcome, after all complete handlers ran.
    ///
    /// Meant for one waiter at a time; sequential waiters all observe the
    /// same outcome.
    pub async fn finished(&self) -> PourOutcome {
        let outcome = self.inner.done.wait().await;
        self.inner.done.signal(outcome);
        outcome
    }

    /// Blocking form of [`finished`](Self::finished) for synchronous callers.
    pub fn wait(&self) -> PourOutcome {
        futures_lite::future::block_on(self.finished())
    }
}

impl core::fmt::Debug for PourFuture {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PourFuture")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}
