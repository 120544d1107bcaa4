//! Pour engine — the hexagonal core.
//!
//! [`PourEngine`] turns a beverage order into one observable pour: it asks
//! the resolver for bindings, plans the per-pump rates, starts one timed
//! pour per engaged pump and hands back a single parallel future.
//!
//! ```text
//!  GraphResolver ──▶ ┌─────────────────────────┐ ──▶ EventSink
//!                    │        PourEngine        │
//!      Brandset ──▶  │  planner · pumps · task  │ ──▶ PourFuture
//!                    └─────────────────────────┘
//! ```
//!
//! No error escapes synchronously: every refusal comes back as an
//! already-failed future carrying the reason.

use std::sync::Arc;

use log::{info, warn};

use crate::brandset::Brandset;
use crate::config::PourConfig;
use crate::drivers::board::Board;
use crate::error::PourError;
use crate::task::{ParallelPolicy, PourFuture, parallel};

use super::events::DispenseEvent;
use super::planner::{self, PourPlan};
use super::ports::{EventSink, GraphResolver};

/// Name of the aggregate future returned by [`PourEngine::pour_beverage`].
pub const POUR_NAME: &str = "bev-pour";

// ───────────────────────────────────────────────────────────────
// PourEngine
// ───────────────────────────────────────────────────────────────

pub struct PourEngine<R, S> {
    brandset: Arc<Brandset>,
    board: Arc<Board>,
    resolver: R,
    sink: S,
    config: PourConfig,
}

impl<R: GraphResolver, S: EventSink> PourEngine<R, S> {
    pub fn new(
        brandset: Arc<Brandset>,
        board: Arc<Board>,
        resolver: R,
        sink: S,
        config: PourConfig,
    ) -> Self {
        Self {
            brandset,
            board,
            resolver,
            sink,
            config,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    fn policy(&self) -> ParallelPolicy {
        if self.config.cancel_siblings_on_failure {
            ParallelPolicy::CancelSiblings
        } else {
            ParallelPolicy::LeaveRunning
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn is_pourable(&self, beverage_id: &str) -> bool {
        self.resolver.is_available(beverage_id)
    }

    /// Plan a pour without touching the hardware.
    pub fn plan(&self, beverage_id: &str, volume_ml: f64) -> Result<PourPlan, PourError> {
        if !self.resolver.is_available(beverage_id) {
            return Err(PourError::Unavailable);
        }
        let bindings = self
            .resolver
            .resolve(beverage_id)
            .ok_or(PourError::Unavailable)?;
        let volume_ml = self.clamp_volume(beverage_id, volume_ml);
        planner::plan(self.brandset.recipe_parts(beverage_id), &bindings, volume_ml)
    }

    fn clamp_volume(&self, beverage_id: &str, volume_ml: f64) -> f64 {
        let max = self.config.max_pour_volume_ml;
        if volume_ml > max {
            warn!("{}: {} ml clamped to {} ml", beverage_id, volume_ml, max);
            max
        } else {
            volume_ml
        }
    }

    // ── Pour ──────────────────────────────────────────────────

    /// Start pouring `volume_ml` of a beverage.
    ///
    /// The returned future is already running, or already `Failed` with
    /// `Unavailable` / `InvalidPourable` if the order was refused.
    /// Cancelling it cancels every pump still running.
    pub fn pour_beverage(&self, beverage_id: &str, volume_ml: f64) -> PourFuture {
        let plan = match self.plan(beverage_id, volume_ml) {
            Ok(plan) => plan,
            Err(reason) => return self.reject(beverage_id, reason),
        };

        let mut children = Vec::with_capacity(plan.per_pump.len());
        for entry in &plan.per_pump {
            let Some(pump) = self.board.pump(entry.pump) else {
                warn!("{}: resolver bound a pump not on this board", beverage_id);
                return self.reject(beverage_id, PourError::Unavailable);
            };
            children.push(pump.timed_pour(plan.duration_ms, entry.rate));
        }

        self.sink.emit(&DispenseEvent::PumpsEngaged {
            beverage_id: beverage_id.into(),
            pumps: plan.pumps().collect(),
            duration_ms: plan.duration_ms,
        });
        info!(
            "{}: pouring {} on {} pumps for {} ms",
            POUR_NAME,
            beverage_id,
            children.len(),
            plan.duration_ms
        );

        let pour = parallel(POUR_NAME, children, self.policy());
        pour.start();
        pour
    }

    fn reject(&self, beverage_id: &str, reason: PourError) -> PourFuture {
        warn!("{}: {} rejected: {}", POUR_NAME, beverage_id, reason);
        self.sink.emit(&DispenseEvent::PourRejected {
            beverage_id: beverage_id.into(),
            reason,
        });
        PourFuture::failed(POUR_NAME, reason)
    }
}
