use std::sync::Mutex;

use chrono::Utc;

use crate::error::{PlanError, Result};
use crate::ledger::lock;
use crate::models::{
    Food, PantryEntry, PantryStatus, ShoppingEntry, ShoppingStatus, StockStatus,
};

pub const DEFAULT_UNIT: &str = "unit";

#[derive(Default)]
struct PantryState {
    entries: Vec<PantryEntry>,
    shopping: Vec<ShoppingEntry>,
    next_entry_id: i64,
    next_shopping_id: i64,
}

impl PantryState {
    fn status_of(&self, food_id: &str) -> PantryStatus {
        self.entries
            .iter()
            .find(|e| e.food_id == food_id)
            .map_or(PantryStatus::Missing, |e| e.status.into())
    }

    fn pending_mut(&mut self, food_id: &str) -> Option<&mut ShoppingEntry> {
        self.shopping
            .iter_mut()
            .find(|s| s.food_id == food_id && s.status == ShoppingStatus::Pending)
    }

    fn push_shopping(&mut self, food: &Food, quantity: f64, unit: &str) -> i64 {
        self.next_shopping_id += 1;
        let id = self.next_shopping_id;
        self.shopping.push(ShoppingEntry {
            id,
            food_id: food.id.clone(),
            food_name: food.name.clone(),
            quantity,
            unit: unit.to_string(),
            status: ShoppingStatus::Pending,
            created_at: Utc::now(),
        });
        id
    }

    fn ensure_shopping(&mut self, food: &Food) -> bool {
        if self.status_of(&food.id) == PantryStatus::Available || self.pending_mut(&food.id).is_some() {
            return false;
        }
        self.push_shopping(food, 1.0, DEFAULT_UNIT);
        true
    }
}

/// Pantry stock plus the shopping list derived from it.
///
/// One mutex guards both lists. Callers holding a day lock may take it; it is
/// never held while a day lock is acquired.
#[derive(Default)]
pub struct Pantry {
    state: Mutex<PantryState>,
}

impl Pantry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status_of(&self, food_id: &str) -> PantryStatus {
        lock(&self.state).status_of(food_id)
    }

    /// Make sure a food that is not in stock sits on the shopping list.
    /// Returns whether a new pending entry was created.
    pub fn ensure_shopping_for(&self, food: &Food) -> bool {
        let created = lock(&self.state).ensure_shopping(food);
        if created {
            tracing::debug!(food_id = %food.id, "added to shopping list");
        }
        created
    }

    /// Insert or update the pantry entry for `food`, then re-derive shopping.
    pub fn upsert(&self, food: &Food, status: StockStatus, quantity: f64, unit: &str) -> Result<i64> {
        if quantity < 0.0 {
            return Err(PlanError::invalid("quantity must not be negative"));
        }
        let mut state = lock(&self.state);
        let id = if let Some(entry) = state.entries.iter_mut().find(|e| e.food_id == food.id) {
            entry.status = status;
            entry.quantity = quantity;
            entry.unit = unit.to_string();
            entry.id
        } else {
            state.next_entry_id += 1;
            let id = state.next_entry_id;
            state.entries.push(PantryEntry {
                id,
                food_id: food.id.clone(),
                food_name: food.name.clone(),
                status,
                quantity,
                unit: unit.to_string(),
            });
            id
        };
        state.ensure_shopping(food);
        Ok(id)
    }

    /// Accumulate onto the pending entry for `food` or start a new one.
    pub fn add_shopping(&self, food: &Food, quantity: f64, unit: &str) -> Result<i64> {
        if quantity < 0.0 {
            return Err(PlanError::invalid("quantity must not be negative"));
        }
        let mut state = lock(&self.state);
        if let Some(entry) = state.pending_mut(&food.id) {
            entry.quantity += quantity;
            entry.unit = unit.to_string();
            return Ok(entry.id);
        }
        Ok(state.push_shopping(food, quantity, unit))
    }

    pub fn mark_bought(&self, shopping_id: i64) -> Result<()> {
        let mut state = lock(&self.state);
        let entry = state
            .shopping
            .iter_mut()
            .find(|s| s.id == shopping_id)
            .ok_or_else(|| PlanError::not_found("shopping entry", shopping_id))?;
        entry.status = ShoppingStatus::Bought;
        Ok(())
    }

    #[must_use]
    pub fn list_pantry(&self) -> Vec<PantryEntry> {
        let mut entries = lock(&self.state).entries.clone();
        entries.sort_by(|a, b| a.food_name.to_lowercase().cmp(&b.food_name.to_lowercase()));
        entries
    }

    /// Newest first.
    #[must_use]
    pub fn list_shopping(&self, status: ShoppingStatus) -> Vec<ShoppingEntry> {
        let state = lock(&self.state);
        state
            .shopping
            .iter()
            .rev()
            .filter(|s| s.status == status)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        let state = lock(&self.state);
        (state.entries.len(), state.shopping.len())
    }
}
