//! Hand-driven timer.
//!
//! Callbacks fire only from [`ManualTimer::advance`], in due order, on the
//! caller's thread. Used by the fast simulation mode and by tests so timed
//! pours complete deterministically without sleeping.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use crate::app::ports::{TimerCallback, TimerHandle, TimerService};

struct Entry {
    due: Duration,
    callback: TimerCallback,
}

#[derive(Default)]
struct Clock {
    now: Duration,
    next_id: u64,
    scheduled: usize,
    entries: BTreeMap<u64, Entry>,
}

#[derive(Default)]
pub struct ManualTimer {
    clock: Arc<Mutex<Clock>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    fn clock(&self) -> MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Time elapsed since creation, as far as this timer knows.
    pub fn now(&self) -> Duration {
        self.clock().now
    }

    /// Callbacks scheduled so far, fired or not.
    pub fn scheduled_count(&self) -> usize {
        self.clock().scheduled
    }

    /// Callbacks still waiting to fire.
    pub fn pending(&self) -> usize {
        self.clock().entries.len()
    }

    /// Move time forward by `by`, firing every callback that falls due.
    /// Returns the number fired.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        let mut fired = 0;
        loop {
            let next = {
                let mut clock = self.clock();
                let due = clock
                    .entries
                    .iter()
                    .filter(|(_, e)| e.due <= target)
                    .min_by_key(|(id, e)| (e.due, **id))
                    .map(|(id, _)| *id);
                match due.and_then(|id| clock.entries.remove(&id)) {
                    Some(entry) => {
                        clock.now = entry.due;
                        Some(entry.callback)
                    }
                    None => {
                        clock.now = target;
                        None
                    }
                }
            };
            match next {
                Some(callback) => {
                    callback();
                    fired += 1;
                }
                None => return fired,
            }
        }
    }

    /// Fire callbacks until none are pending, including any scheduled by
    /// the callbacks themselves.
    pub fn run_until_idle(&self) -> usize {
        let mut fired = 0;
        loop {
            let next_due = {
                let clock = self.clock();
                clock.entries.values().map(|e| e.due).min().map(|due| due.saturating_sub(clock.now))
            };
            match next_due {
                Some(wait) => fired += self.advance(wait),
                None => return fired,
            }
        }
    }
}

impl TimerService for ManualTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let id = {
            let mut clock = self.clock();
            let id = clock.next_id;
            clock.next_id += 1;
            clock.scheduled += 1;
            let due = clock.now + delay;
            clock.entries.insert(id, Entry { due, callback });
            id
        };
        let clock: Weak<Mutex<Clock>> = Arc::downgrade(&self.clock);
        TimerHandle::new(move || {
            if let Some(clock) = clock.upgrade() {
                let removed = clock
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entries
                    .remove(&id);
                drop(removed);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fires_in_due_order() {
        let timer = ManualTimer::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for (delay, tag) in [(30, "c"), (10, "a"), (20, "b")] {
            let o = order.clone();
            let handle = timer.schedule(
                Duration::from_millis(delay),
                Box::new(move || o.lock().unwrap().push(tag)),
            );
            std::mem::forget(handle);
        }
        assert_eq!(timer.advance(Duration::from_millis(25)), 2);
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(timer.run_until_idle(), 1);
        assert_eq!(timer.now(), Duration::from_millis(30));
    }

    #[test]
    fn dropping_handle_cancels() {
        let timer = ManualTimer::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let handle = timer.schedule(
            Duration::from_millis(5),
            Box::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(timer.pending(), 1);
        drop(handle);
        assert_eq!(timer.pending(), 0);
        timer.advance(Duration::from_millis(10));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(timer.scheduled_count(), 1);
    }
}
