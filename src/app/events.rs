//! Outbound dispense events.
//!
//! The [`PourEngine`](super::service::PourEngine) emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other side
//! decide what to do with them: log them, count pump usage, and so on.

use crate::drivers::pump::PumpHandle;
use crate::error::PourError;

/// Structured events emitted by the pour engine.
#[derive(Debug, Clone, PartialEq)]
pub enum DispenseEvent {
    /// A plan was accepted and these pumps are about to start.
    PumpsEngaged {
        beverage_id: String,
        pumps: Vec<PumpHandle>,
        duration_ms: u32,
    },

    /// The pour was refused before any pump was touched.
    PourRejected {
        beverage_id: String,
        reason: PourError,
    },
}
