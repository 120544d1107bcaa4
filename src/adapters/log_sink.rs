//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each dispense event as one
//! structured log line. A pump-usage counter or a UI bridge would
//! implement the same trait.

use log::{info, warn};

use crate::app::events::DispenseEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`DispenseEvent`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&self, event: &DispenseEvent) {
        match event {
            DispenseEvent::PumpsEngaged {
                beverage_id,
                pumps,
                duration_ms,
            } => {
                let pumps: Vec<String> = pumps
                    .iter()
                    .map(|p| format!("{}@{}", p.kind().type_name(), p.pos()))
                    .collect();
                info!(
                    "POUR  | bev={} | pumps=[{}] | duration={}ms",
                    beverage_id,
                    pumps.join(","),
                    duration_ms
                );
            }
            DispenseEvent::PourRejected {
                beverage_id,
                reason,
            } => {
                warn!(
                    "REJECT | bev={} | reason={} ({})",
                    beverage_id,
                    reason.code(),
                    reason
                );
            }
        }
    }
}
