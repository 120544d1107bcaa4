//! Board command protocol.
//!
//! The board understands a single request, `PUMP` (api 2):
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────────┐
//! │ position i32 │ rate_q8 i32  │ duration_ms i32  │   little-endian
//! └──────────────┴──────────────┴──────────────────┘
//! ```
//!
//! Stopping a pump is the same request with a zero rate and duration.
//! The board never reports status; a transport error is the only failure.

use std::sync::Arc;

use super::BoardSession;
use crate::error::TransportError;

/// API number of the pump command.
pub const API_PUMP: u8 = 2;

/// Encoded size of a [`PumpCommand`].
pub const PUMP_PAYLOAD_LEN: usize = 12;

/// Convert a flow rate (mL/s) to Q8 fixed point, saturating at the `i32` range.
pub fn to_q8(rate: f64) -> i32 {
    (rate * 256.0).round() as i32
}

/// Convert a Q8 fixed-point rate back to mL/s.
pub fn from_q8(rate_q8: i32) -> f64 {
    f64::from(rate_q8) / 256.0
}

/// One `PUMP` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PumpCommand {
    pub pos: i32,
    pub rate_q8: i32,
    pub duration_ms: i32,
}

impl PumpCommand {
    pub fn start(pos: u8, rate: f64, duration_ms: u32) -> Self {
        Self {
            pos: i32::from(pos),
            rate_q8: to_q8(rate),
            duration_ms: i32::try_from(duration_ms).unwrap_or(i32::MAX),
        }
    }

    pub const fn stop(pos: u8) -> Self {
        Self {
            pos: pos as i32,
            rate_q8: 0,
            duration_ms: 0,
        }
    }

    pub const fn is_stop(&self) -> bool {
        self.rate_q8 == 0 && self.duration_ms == 0
    }

    pub fn rate(&self) -> f64 {
        from_q8(self.rate_q8)
    }

    pub fn encode(&self) -> [u8; PUMP_PAYLOAD_LEN] {
        let mut out = [0u8; PUMP_PAYLOAD_LEN];
        out[0..4].copy_from_slice(&self.pos.to_le_bytes());
        out[4..8].copy_from_slice(&self.rate_q8.to_le_bytes());
        out[8..12].copy_from_slice(&self.duration_ms.to_le_bytes());
        out
    }

    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() != PUMP_PAYLOAD_LEN {
            return None;
        }
        let word = |i: usize| i32::from_le_bytes([payload[i], payload[i + 1], payload[i + 2], payload[i + 3]]);
        Some(Self {
            pos: word(0),
            rate_q8: word(4),
            duration_ms: word(8),
        })
    }
}

/// Typed access to the board over a live session.
///
/// Obtained from [`HardwareLink::iface`](super::HardwareLink::iface); holds
/// its own reference to the session so a concurrent detach cannot pull it
/// out from under a command already in flight.
#[derive(Clone)]
pub struct BoardIface {
    session: Arc<dyn BoardSession>,
}

impl BoardIface {
    pub fn new(session: Arc<dyn BoardSession>) -> Self {
        Self { session }
    }

    /// Start a pump.
    ///
    /// * `pos` — 0-3 are micros, 4/5 are macros on the stock board
    /// * `rate` — mL/s, sent as Q8
    /// * `duration_ms` — how long to pour
    pub fn start_pump(&self, pos: u8, rate: f64, duration_ms: u32) -> Result<(), TransportError> {
        self.send(PumpCommand::start(pos, rate, duration_ms))
    }

    /// Stop a pump by sending a zero rate and duration.
    pub fn stop_pump(&self, pos: u8) -> Result<(), TransportError> {
        self.send(PumpCommand::stop(pos))
    }

    pub fn send(&self, command: PumpCommand) -> Result<(), TransportError> {
        self.session.send_and_recv(API_PUMP, &command.encode())
    }

    pub fn session_id(&self) -> super::SessionId {
        self.session.id()
    }
}
