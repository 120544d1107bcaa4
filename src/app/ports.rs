//! Port traits — the hexagonal boundary between pour logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ PourEngine (domain)
//! ```
//!
//! Driven adapters (resolver, event sinks, timers) implement these traits.
//! The [`PourEngine`](super::service::PourEngine) consumes them via
//! generics, so the domain core never touches sockets or threads directly.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::drivers::pump::PumpHandle;

// ───────────────────────────────────────────────────────────────
// Graph resolver (consumed capability)
// ───────────────────────────────────────────────────────────────

/// Ingredient → pump bindings for one beverage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    by_ingredient: BTreeMap<String, PumpHandle>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an ingredient to a pump, replacing any earlier binding.
    pub fn bind(&mut self, ingredient_id: &str, pump: PumpHandle) {
        self.by_ingredient.insert(ingredient_id.into(), pump);
    }

    /// Builder form of [`bind`](Self::bind).
    #[must_use]
    pub fn with(mut self, ingredient_id: &str, pump: PumpHandle) -> Self {
        self.bind(ingredient_id, pump);
        self
    }

    pub fn pump_for(&self, ingredient_id: &str) -> Option<PumpHandle> {
        self.by_ingredient.get(ingredient_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ingredient.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_ingredient.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, PumpHandle)> {
        self.by_ingredient.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// The beverage dependency-graph resolver, specified only by the contract
/// the pour engine consumes.
pub trait GraphResolver {
    /// Whether the beverage can currently be poured.
    fn is_available(&self, beverage_id: &str) -> bool;

    /// Pumps to use for each ingredient of the beverage, or `None` when no
    /// valid binding exists.
    fn resolve(&self, beverage_id: &str) -> Option<Bindings>;
}

impl<T: GraphResolver + ?Sized> GraphResolver for Arc<T> {
    fn is_available(&self, beverage_id: &str) -> bool {
        (**self).is_available(beverage_id)
    }

    fn resolve(&self, beverage_id: &str) -> Option<Bindings> {
        (**self).resolve(beverage_id)
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → pump-event bookkeeping)
// ───────────────────────────────────────────────────────────────

/// The engine emits [`DispenseEvent`](super::events::DispenseEvent)s
/// through this port. Emission is fire-and-forget: nothing flows back
/// into the pour.
pub trait EventSink {
    fn emit(&self, event: &super::events::DispenseEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: &super::events::DispenseEvent) {
        (**self).emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Timer port (shared scheduling facility)
// ───────────────────────────────────────────────────────────────

/// Callback invoked once when a scheduled delay elapses.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// A single shared facility producing asynchronous completion callbacks.
pub trait TimerService: Send + Sync {
    /// Run `callback` once after `delay`. Dropping the returned handle (or
    /// calling [`TimerHandle::cancel`]) before it fires cancels the callback.
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;
}

/// Cancellation guard for one scheduled callback.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    /// Wrap the adapter-specific cancellation action.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Cancel the callback if it has not fired yet.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl core::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}
