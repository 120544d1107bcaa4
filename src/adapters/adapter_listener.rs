//! Adapter listener — the connection-event source for the hardware link.
//!
//! Runs in a dedicated thread using `edge-executor` with `async-io-mini`
//! reactor timers. Two concurrent futures:
//!
//! 1. **Accept** — polls the listening socket every 50ms; each accepted
//!    connection becomes a new [`TcpSession`] attached to the link,
//!    replacing whatever was attached before.
//! 2. **Close** — wakes on the session-closed channel and detaches the
//!    link if the closed session is still the current one.
//!
//! ```text
//!  ┌───────────────────────────────────────────────────┐
//!  │  adapter-listener thread                          │
//!  │  ┌─────────────────────────────────────────────┐  │
//!  │  │  edge_executor::LocalExecutor               │  │
//!  │  │  ┌──────────┐            ┌───────────────┐  │  │
//!  │  │  │ Accept   │  attach    │ Close         │  │  │
//!  │  │  │ 50ms ⏱   │──────┐ ┌───│ wake-on-send  │  │  │
//!  │  │  └──────────┘      ▼ ▼   └───────────────┘  │  │
//!  │  │              LinkController                 │  │
//!  │  └─────────────────────────────────────────────┘  │
//!  └───────────────────────────────────────────────────┘
//! ```
//!
//! The controller lives on this thread only, so the link has exactly one
//! writer.

use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::rc::Rc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::{info, warn};

use super::tcp_session::{ClosedChannel, TcpSession};
use crate::link::{LinkController, SessionId};

const ACCEPT_POLL: Duration = Duration::from_millis(50);

pub struct AdapterListener {
    listener: TcpListener,
    controller: LinkController,
    ack_timeout: Duration,
}

impl AdapterListener {
    /// Bind `addr`. The link stays `Disconnected` until an adapter connects.
    pub fn bind(
        addr: impl ToSocketAddrs,
        controller: LinkController,
        ack_timeout: Duration,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        info!("adapter listener on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            controller,
            ack_timeout,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Move the listener onto its own thread.
    pub fn spawn(self) -> std::io::Result<ListenerHandle> {
        let shutdown = Arc::new(Signal::new());
        let stop = Arc::clone(&shutdown);
        let thread = std::thread::Builder::new()
            .name("adapter-listener".into())
            .spawn(move || self.run(&stop))?;
        Ok(ListenerHandle {
            shutdown,
            thread: Some(thread),
        })
    }

    fn run(self, shutdown: &Signal<CriticalSectionRawMutex, ()>) {
        let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
        let closed = Arc::new(ClosedChannel::new());
        let controller = Rc::new(self.controller);

        executor
            .spawn(accept_loop(
                self.listener,
                Rc::clone(&controller),
                self.ack_timeout,
                Arc::clone(&closed),
            ))
            .detach();
        executor
            .spawn(close_loop(Rc::clone(&controller), closed))
            .detach();

        future::block_on(executor.run(shutdown.wait()));
        controller.on_detach();
        info!("adapter listener stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    controller: Rc<LinkController>,
    ack_timeout: Duration,
    closed: Arc<ClosedChannel>,
) {
    let mut next_id = 0u64;
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                next_id += 1;
                let id = SessionId(next_id);
                match TcpSession::new(id, stream, ack_timeout, Arc::clone(&closed)) {
                    Ok(session) => {
                        info!("adapter {} connected as {}", peer, id);
                        controller.on_attach(Arc::new(session));
                    }
                    Err(e) => warn!("adapter {}: session setup failed: {}", peer, e),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => warn!("adapter accept failed: {}", e),
        }
        async_io_mini::Timer::after(ACCEPT_POLL).await;
    }
}

async fn close_loop(controller: Rc<LinkController>, closed: Arc<ClosedChannel>) {
    loop {
        let id = closed.receive().await;
        controller.on_session_closed(id);
    }
}

/// Running listener. Dropping it stops the thread and detaches the link.
pub struct ListenerHandle {
    shutdown: Arc<Signal<CriticalSectionRawMutex, ()>>,
    thread: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        self.shutdown.signal(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("adapter listener thread panicked");
            }
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}
