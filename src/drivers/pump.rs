//! Pump actuator — one channel on the dispensing board.
//!
//! Two closed variants share a single timed-pour contract:
//!
//! - **FixedRate** (macro valves: carb, water). The valve flows at its
//!   calibrated rate whatever the caller asks; the requested rate is kept
//!   for bookkeeping only.
//! - **VariableRate** (micro pumps). The caller's rate goes on the wire.
//!
//! ## Command sequence
//!
//! ```text
//!   start()  ── PUMP(pos, rate, duration) ──▶ board     timer(duration) ──▶ Succeeded
//!   cancel() ── PUMP(pos, 0, 0) ───────────▶ board     timer dropped   ──▶ Cancelled
//! ```
//!
//! The board runs the pump for `duration` on its own; completion is the
//! host timer firing, never a hardware poll.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::TimerService;
use crate::error::PourError;
use crate::link::HardwareLink;
use crate::task::PourFuture;

/// Stable identity of a pump within one board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PumpId(pub u8);

/// Flow capability of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpKind {
    FixedRate,
    VariableRate,
}

impl PumpKind {
    /// Short label used in log lines.
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::FixedRate => "valve",
            Self::VariableRate => "micro",
        }
    }
}

/// Opaque reference to a pump, handed out by the board and the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PumpHandle {
    id: PumpId,
    pos: u8,
    kind: PumpKind,
}

impl PumpHandle {
    pub const fn new(id: PumpId, pos: u8, kind: PumpKind) -> Self {
        Self { id, pos, kind }
    }

    pub const fn id(&self) -> PumpId {
        self.id
    }

    /// Position on the board bus. Only the protocol uses it.
    pub const fn pos(&self) -> u8 {
        self.pos
    }

    pub const fn kind(&self) -> PumpKind {
        self.kind
    }
}

/// Bookkeeping record attached to every timed-pour future.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedPour {
    pub pump: PumpHandle,
    pub duration_ms: u32,
    /// Rate the caller asked for (mL/s).
    pub requested_rate: f64,
    /// Rate actually sent to the board (mL/s).
    pub command_rate: f64,
}

#[derive(Debug, Clone, Copy)]
enum Drive {
    Fixed { calibrated: f64 },
    Variable,
}

/// One pump channel bound to the shared link and timer.
pub struct Pump {
    handle: PumpHandle,
    name: String,
    drive: Drive,
    link: HardwareLink,
    timer: Arc<dyn TimerService>,
}

impl Pump {
    /// A fixed-rate valve flowing at `calibrated` mL/s.
    pub fn fixed_rate(
        id: PumpId,
        name: &str,
        pos: u8,
        calibrated: f64,
        link: HardwareLink,
        timer: Arc<dyn TimerService>,
    ) -> Self {
        Self {
            handle: PumpHandle::new(id, pos, PumpKind::FixedRate),
            name: name.into(),
            drive: Drive::Fixed { calibrated },
            link,
            timer,
        }
    }

    /// A variable-rate micro pump.
    pub fn variable_rate(
        id: PumpId,
        name: &str,
        pos: u8,
        link: HardwareLink,
        timer: Arc<dyn TimerService>,
    ) -> Self {
        Self {
            handle: PumpHandle::new(id, pos, PumpKind::VariableRate),
            name: name.into(),
            drive: Drive::Variable,
            link,
            timer,
        }
    }

    pub fn handle(&self) -> PumpHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PumpKind {
        self.handle.kind
    }

    /// Calibrated flow for fixed-rate valves.
    pub fn calibrated_rate(&self) -> Option<f64> {
        match self.drive {
            Drive::Fixed { calibrated } => Some(calibrated),
            Drive::Variable => None,
        }
    }

    /// Rate that goes on the wire for a requested `rate`.
    pub fn command_rate(&self, rate: f64) -> f64 {
        match self.drive {
            Drive::Fixed { calibrated } => calibrated,
            Drive::Variable => rate,
        }
    }

    /// Run the pump for `duration_ms` at `rate` mL/s.
    ///
    /// The returned future is `Created`; nothing reaches the board until it
    /// is started. A zero duration, one the board's `i32` cannot carry, or a
    /// non-positive rate yields a future that is already
    /// `Failed(InvalidPourable)`.
    pub fn timed_pour(&self, duration_ms: u32, rate: f64) -> PourFuture {
        let name = format!("tpour-{}", self.name);
        let fits_wire = duration_ms > 0 && i32::try_from(duration_ms).is_ok();
        if !fits_wire || !(rate.is_finite() && rate > 0.0) {
            warn!("{}: refusing pour of {} ms at {} ml/s", name, duration_ms, rate);
            return PourFuture::failed(&name, PourError::InvalidPourable);
        }

        let record = TimedPour {
            pump: self.handle,
            duration_ms,
            requested_rate: rate,
            command_rate: self.command_rate(rate),
        };
        let pos = self.handle.pos;
        // Serializes the start command against the stop command so a cancel
        // racing the body sends exactly one stop after any start.
        let wire = Arc::new(Mutex::new(()));

        let (link, timer, body_wire) = (self.link.clone(), Arc::clone(&self.timer), Arc::clone(&wire));
        let future = PourFuture::timed(&name, record, move |f| {
            let Some(iface) = link.iface() else {
                warn!("{}: link not connected", f.name());
                f.fail(PourError::NotConnected);
                return;
            };
            {
                let guard = body_wire.lock().unwrap_or_else(PoisonError::into_inner);
                if f.is_cancel_requested() {
                    return;
                }
                info!(
                    "start: {} pos={} rate={:.3} ml/s for {} ms",
                    f.name(),
                    pos,
                    record.command_rate,
                    duration_ms
                );
                if let Err(e) = iface.start_pump(pos, record.command_rate, duration_ms) {
                    drop(guard);
                    warn!("{}: start failed: {}", f.name(), e);
                    f.fail(e.into());
                    return;
                }
            }
            let done = f.clone();
            let handle = timer.schedule(
                Duration::from_millis(u64::from(duration_ms)),
                Box::new(move || {
                    done.succeed();
                }),
            );
            f.arm_timer(handle);
        });

        let link = self.link.clone();
        future.on_cancel(move |f| {
            let _guard = wire.lock().unwrap_or_else(PoisonError::into_inner);
            match link.iface() {
                Some(iface) => {
                    info!("cancel: {} pos={}", f.name(), pos);
                    if let Err(e) = iface.stop_pump(pos) {
                        warn!("{}: stop failed: {}", f.name(), e);
                    }
                }
                None => info!("cancel: {} pos={} (link down, no stop sent)", f.name(), pos),
            }
        });
        future.on_complete(|f, outcome| {
            info!("stop: {} {:?}", f.name(), outcome);
        });
        future
    }

    /// Pour `volume` at `rate`; the duration is `floor(volume / rate)`.
    pub fn volume_pour(&self, volume: f64, rate: f64) -> PourFuture {
        if !(rate.is_finite() && rate > 0.0) {
            warn!("tpour-{}: refusing volume pour at {} ml/s", self.name, rate);
            return PourFuture::failed(&format!("tpour-{}", self.name), PourError::InvalidPourable);
        }
        let duration = (volume / rate).floor();
        let duration_ms = if duration.is_finite() && duration >= 0.0 && duration <= f64::from(i32::MAX) {
            duration as u32
        } else {
            0
        };
        self.timed_pour(duration_ms, rate)
    }
}

impl core::fmt::Debug for Pump {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pump")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .field("drive", &self.drive)
            .finish()
    }
}
