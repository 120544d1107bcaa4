//! Hardware link — the live, hot-swappable connection to the pump board.
//!
//! ```text
//!   connection-event source ──▶ LinkController (single writer)
//!                                     │ attach / detach
//!                                     ▼
//!                               ┌─────────────┐
//!                               │  LinkState  │  Disconnected | Connected(session)
//!                               └─────────────┘
//!                                     ▲
//!   pumps / board / engine ──▶ HardwareLink (many readers, Clone)
//! ```
//!
//! The state is replaced as a whole under a critical section, so a reader
//! sees either a complete `Connected` session or `Disconnected`, never a
//! half-torn value. Readers take their own `Arc` to the session; a detach
//! invalidates the link for every later command while a command already in
//! flight finishes against the session it started with.

pub mod codec;
pub mod protocol;

use core::cell::RefCell;
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{info, warn};

use crate::error::TransportError;
pub use protocol::BoardIface;

/// Identity of one adapter session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// A persistent request/acknowledge channel to the board.
pub trait BoardSession: Send + Sync {
    fn id(&self) -> SessionId;

    /// Send one request and wait for its acknowledge.
    fn send_and_recv(&self, api: u8, payload: &[u8]) -> Result<(), TransportError>;
}

/// Link state as seen by readers.
#[derive(Clone, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connected(Arc<dyn BoardSession>),
}

impl LinkState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}

impl core::fmt::Debug for LinkState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Disconnected => f.write_str("Disconnected"),
            Self::Connected(s) => write!(f, "Connected({})", s.id()),
        }
    }
}

struct Shared {
    state: Mutex<CriticalSectionRawMutex, RefCell<LinkState>>,
}

/// Create a link in the `Disconnected` state.
///
/// Returns the single writer, to be handed to the connection-event source,
/// and a reader that can be cloned freely.
pub fn hardware_link() -> (LinkController, HardwareLink) {
    let shared = Arc::new(Shared {
        state: Mutex::new(RefCell::new(LinkState::Disconnected)),
    });
    (
        LinkController {
            shared: Arc::clone(&shared),
        },
        HardwareLink { shared },
    )
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Read-only view of the link.
#[derive(Clone)]
pub struct HardwareLink {
    shared: Arc<Shared>,
}

impl HardwareLink {
    /// Snapshot of the current state.
    pub fn state(&self) -> LinkState {
        self.shared.state.lock(|s| s.borrow().clone())
    }

    pub fn session(&self) -> Option<Arc<dyn BoardSession>> {
        match self.state() {
            LinkState::Connected(session) => Some(session),
            LinkState::Disconnected => None,
        }
    }

    /// Typed board interface over the current session, if connected.
    pub fn iface(&self) -> Option<BoardIface> {
        self.session().map(BoardIface::new)
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state.lock(|s| s.borrow().is_connected())
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.shared.state.lock(|s| match &*s.borrow() {
            LinkState::Connected(session) => Some(session.id()),
            LinkState::Disconnected => None,
        })
    }
}

impl core::fmt::Debug for HardwareLink {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("HardwareLink").field(&self.state()).finish()
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// The only handle allowed to change the link state. Not `Clone`.
pub struct LinkController {
    shared: Arc<Shared>,
}

impl LinkController {
    /// Replace the current session (if any) with `session`.
    pub fn on_attach(&self, session: Arc<dyn BoardSession>) {
        let id = session.id();
        let previous = self
            .shared
            .state
            .lock(|s| s.replace(LinkState::Connected(session)));
        match previous {
            LinkState::Connected(old) => info!("link: {} replaced by {}", old.id(), id),
            LinkState::Disconnected => info!("link: attached {}", id),
        }
    }

    /// Drop the current session. Later commands see `Disconnected`.
    pub fn on_detach(&self) {
        let previous = self
            .shared
            .state
            .lock(|s| s.replace(LinkState::Disconnected));
        if let LinkState::Connected(old) = previous {
            info!("link: detached {}", old.id());
        }
    }

    /// Detach only if `id` is still the current session.
    ///
    /// Returns `true` if the link was detached.
    pub fn on_session_closed(&self, id: SessionId) -> bool {
        let detached = self.shared.state.lock(|s| {
            let mut state = s.borrow_mut();
            match &*state {
                LinkState::Connected(current) if current.id() == id => {
                    *state = LinkState::Disconnected;
                    true
                }
                _ => false,
            }
        });
        if detached {
            warn!("link: {} closed, now disconnected", id);
        }
        detached
    }
}
