//! In-memory resolver over explicit ingredient → pump assignments.
//!
//! Stands in for the beverage dependency graph: a beverage is available
//! when every ingredient of its recipe is installed on a pump that is not
//! blocked. Blocking a pump (e.g. while it is being primed or cleaned)
//! makes every beverage that needs it unpourable until it is unblocked.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use crate::app::ports::{Bindings, GraphResolver};
use crate::brandset::Brandset;
use crate::config::Assignment;
use crate::drivers::board::Board;
use crate::drivers::pump::{PumpHandle, PumpId};

#[derive(Default)]
struct Table {
    by_ingredient: BTreeMap<String, PumpHandle>,
    blocked: BTreeSet<PumpId>,
}

pub struct AssignmentResolver {
    brandset: Arc<Brandset>,
    table: Mutex<Table>,
}

impl AssignmentResolver {
    /// Build from named assignments. Assignments naming a pump that is not
    /// on `board` are skipped with a warning.
    pub fn new(brandset: Arc<Brandset>, board: &Board, assignments: &[Assignment]) -> Self {
        let mut table = Table::default();
        for a in assignments {
            match board.pump_by_name(&a.pump) {
                Some(pump) => {
                    table.by_ingredient.insert(a.ingredient.clone(), pump.handle());
                }
                None => warn!("assignments: {} -> unknown pump {}", a.ingredient, a.pump),
            }
        }
        info!("assignments: {} ingredients installed", table.by_ingredient.len());
        Self {
            brandset,
            table: Mutex::new(table),
        }
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove `ingredient`. Returns the pump it was on.
    pub fn unassign(&self, ingredient: &str) -> Option<PumpHandle> {
        self.table().by_ingredient.remove(ingredient)
    }

    /// Stop offering beverages that need `pump`.
    pub fn block_pump(&self, pump: PumpHandle) {
        if self.table().blocked.insert(pump.id()) {
            info!("assignments: pump {} blocked", pump.pos());
        }
    }

    pub fn unblock_pump(&self, pump: PumpHandle) {
        if self.table().blocked.remove(&pump.id()) {
            info!("assignments: pump {} unblocked", pump.pos());
        }
    }

    fn bindings_for(&self, beverage_id: &str) -> Option<Bindings> {
        let recipe = self.brandset.recipe_parts(beverage_id);
        if recipe.is_empty() {
            return None;
        }
        let table = self.table();
        let mut bindings = Bindings::new();
        for part in recipe {
            let Some(pump) = table.by_ingredient.get(&part.ingredient_id).copied() else {
                debug!("{}: {} not installed", beverage_id, part.ingredient_id);
                return None;
            };
            if table.blocked.contains(&pump.id()) {
                debug!("{}: pump {} blocked", beverage_id, pump.pos());
                return None;
            }
            bindings.bind(&part.ingredient_id, pump);
        }
        Some(bindings)
    }
}

impl GraphResolver for AssignmentResolver {
    fn is_available(&self, beverage_id: &str) -> bool {
        self.bindings_for(beverage_id).is_some()
    }

    fn resolve(&self, beverage_id: &str) -> Option<Bindings> {
        self.bindings_for(beverage_id)
    }
}
