//! In-process simulated board.
//!
//! Acknowledges every `PUMP` request like the native adapter does and
//! records the decoded commands. Failures can be injected to exercise the
//! transport error path.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::error::TransportError;
use crate::link::protocol::{API_PUMP, PumpCommand};
use crate::link::{BoardSession, SessionId};

#[derive(Default)]
struct SimState {
    commands: Vec<PumpCommand>,
    fail_next: Option<TransportError>,
    fail_always: Option<TransportError>,
}

pub struct SimBoard {
    id: SessionId,
    state: Mutex<SimState>,
}

impl SimBoard {
    pub fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id: SessionId(id),
            state: Mutex::new(SimState::default()),
        })
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every command acknowledged so far, in order.
    pub fn commands(&self) -> Vec<PumpCommand> {
        self.state().commands.clone()
    }

    pub fn starts(&self) -> Vec<PumpCommand> {
        self.commands().into_iter().filter(|c| !c.is_stop()).collect()
    }

    pub fn stops(&self) -> Vec<PumpCommand> {
        self.commands().into_iter().filter(PumpCommand::is_stop).collect()
    }

    /// Fail the next request with `error`.
    pub fn fail_next(&self, error: TransportError) {
        self.state().fail_next = Some(error);
    }

    /// Fail every request with `error` until [`heal`](Self::heal).
    pub fn fail_always(&self, error: TransportError) {
        self.state().fail_always = Some(error);
    }

    pub fn heal(&self) {
        let mut state = self.state();
        state.fail_next = None;
        state.fail_always = None;
    }
}

impl BoardSession for SimBoard {
    fn id(&self) -> SessionId {
        self.id
    }

    fn send_and_recv(&self, api: u8, payload: &[u8]) -> Result<(), TransportError> {
        if api != API_PUMP {
            return Err(TransportError::BadAck);
        }
        let command = PumpCommand::decode(payload).ok_or(TransportError::BadAck)?;
        let mut state = self.state();
        if let Some(e) = state.fail_next.take().or(state.fail_always) {
            return Err(e);
        }
        debug!("sim {}: {:?}", self.id, command);
        state.commands.push(command);
        Ok(())
    }
}
