//! Shared timer thread.
//!
//! One background thread runs an `edge-executor` [`Executor`]; every
//! scheduled callback is a task that sleeps on an `async-io-mini` reactor
//! timer and then runs. Cancelling a callback drops its task, which removes
//! the timer from the reactor. No thread per pump, no polling.
//!
//! ```text
//!  schedule(d, cb) ──spawn──▶ ┌──────────────────────────────┐
//!                             │ timer thread                 │
//!  TimerHandle::cancel ─drop─▶│  Executor · Timer::after(d)  │──▶ cb()
//!                             └──────────────────────────────┘
//! ```

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use edge_executor::Executor;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{info, warn};

use crate::app::ports::{TimerCallback, TimerHandle, TimerService};

/// Maximum number of callbacks woken at the same instant.
const WAKE_QUEUE: usize = 64;

pub struct ExecutorTimer {
    executor: Arc<Executor<'static, WAKE_QUEUE>>,
    shutdown: Arc<Signal<CriticalSectionRawMutex, ()>>,
    thread: Option<JoinHandle<()>>,
}

impl ExecutorTimer {
    /// Start the timer thread.
    pub fn start() -> std::io::Result<Self> {
        let executor = Arc::new(Executor::new());
        let shutdown = Arc::new(Signal::new());

        let (ex, stop) = (Arc::clone(&executor), Arc::clone(&shutdown));
        let thread = std::thread::Builder::new()
            .name("pour-timer".into())
            .spawn(move || {
                futures_lite::future::block_on(ex.run(async move { stop.wait().await }));
                info!("timer thread stopped");
            })?;
        info!("timer thread started");

        Ok(Self {
            executor,
            shutdown,
            thread: Some(thread),
        })
    }
}

impl TimerService for ExecutorTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let task = self.executor.spawn(async move {
            async_io_mini::Timer::after(delay).await;
            callback();
        });
        TimerHandle::new(move || drop(task))
    }
}

impl Drop for ExecutorTimer {
    fn drop(&mut self) {
        self.shutdown.signal(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("timer thread panicked");
            }
        }
    }
}
