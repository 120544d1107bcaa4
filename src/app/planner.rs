//! Pour planner — recipe + bindings + volume → per-pump rates and one
//! shared duration.
//!
//! Every pump in a plan runs for the same `duration_ms`; only the rates
//! differ, so a recipe mixed from several pumps finishes together.
//!
//! ```text
//!   duration_ms = floor(volume * 1000 / Σ part.rate)
//!   rate[pump]  = Σ part.rate  over every part bound to that pump
//! ```

use log::debug;

use crate::app::ports::Bindings;
use crate::brandset::RecipePart;
use crate::drivers::pump::PumpHandle;
use crate::error::PourError;

/// Cumulative rate commanded on one pump.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PumpRate {
    pub pump: PumpHandle,
    pub rate: f64,
}

/// A validated pour plan. Never built with a zero duration.
#[derive(Debug, Clone, PartialEq)]
pub struct PourPlan {
    pub bindings: Bindings,
    /// One entry per engaged pump, in order of first appearance in the recipe.
    pub per_pump: Vec<PumpRate>,
    pub total_rate: f64,
    pub duration_ms: u32,
}

impl PourPlan {
    pub fn rate_for(&self, pump: PumpHandle) -> Option<f64> {
        self.per_pump.iter().find(|p| p.pump == pump).map(|p| p.rate)
    }

    pub fn pumps(&self) -> impl Iterator<Item = PumpHandle> + '_ {
        self.per_pump.iter().map(|p| p.pump)
    }
}

/// `floor(volume * 1000 / total_rate)`, or 0 when either input is not
/// positive and finite or the result does not fit the wire's `i32`.
pub fn duration_ms(volume_ml: f64, total_rate: f64) -> u32 {
    if !(volume_ml.is_finite() && total_rate.is_finite()) || volume_ml <= 0.0 || total_rate <= 0.0 {
        return 0;
    }
    let ms = (volume_ml * 1000.0 / total_rate).floor();
    if ms > f64::from(i32::MAX) { 0 } else { ms as u32 }
}

/// Build a plan for pouring `volume_ml` of `recipe`.
///
/// Fails `InvalidPourable` for an empty recipe, empty bindings or a zero
/// duration, and `Unavailable` when any part has no bound pump.
pub fn plan(recipe: &[RecipePart], bindings: &Bindings, volume_ml: f64) -> Result<PourPlan, PourError> {
    if recipe.is_empty() || bindings.is_empty() {
        return Err(PourError::InvalidPourable);
    }

    let mut per_pump: Vec<PumpRate> = Vec::new();
    let mut total_rate = 0.0;
    for part in recipe {
        let pump = bindings
            .pump_for(&part.ingredient_id)
            .ok_or(PourError::Unavailable)?;
        match per_pump.iter_mut().find(|p| p.pump == pump) {
            Some(entry) => entry.rate += part.rate,
            None => per_pump.push(PumpRate { pump, rate: part.rate }),
        }
        total_rate += part.rate;
    }

    let duration_ms = duration_ms(volume_ml, total_rate);
    if duration_ms == 0 {
        return Err(PourError::InvalidPourable);
    }
    debug!(
        "plan: {} parts on {} pumps, total {:.3} ml/s, {} ms",
        recipe.len(),
        per_pump.len(),
        total_rate,
        duration_ms
    );
    Ok(PourPlan {
        bindings: bindings.clone(),
        per_pump,
        total_rate,
        duration_ms,
    })
}
