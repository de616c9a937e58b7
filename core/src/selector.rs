use rand::Rng;

use crate::error::{PlanError, Result};
use crate::models::{Food, MealSlot, Role};

/// Source of the uniform pick over a candidate pool.
pub trait RandomSource: Send + Sync {
    /// Returns an index in `0..len`. Never called with `len == 0`.
    fn pick_index(&self, len: usize) -> usize;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick_index(&self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

/// Foods whose role tag contains `role` and that are allowed in `slot`.
///
/// When nothing qualifies the slot restriction is dropped and the pool is
/// every food carrying the role. The second value reports whether that
/// fallback was used.
#[must_use]
pub fn candidate_pool(foods: &[Food], slot: MealSlot, role: Role) -> (Vec<&Food>, bool) {
    let strict: Vec<&Food> = foods
        .iter()
        .filter(|f| role.matches_tag(&f.role_tag) && f.allows_slot(slot))
        .collect();
    if !strict.is_empty() {
        return (strict, false);
    }
    let by_role = foods
        .iter()
        .filter(|f| role.matches_tag(&f.role_tag))
        .collect();
    (by_role, true)
}

pub struct CandidateSelector {
    random: Box<dyn RandomSource>,
}

impl CandidateSelector {
    #[must_use]
    pub fn new(random: Box<dyn RandomSource>) -> Self {
        Self { random }
    }

    pub fn select(&self, foods: &[Food], slot: MealSlot, role: Role) -> Result<Food> {
        let (pool, fallback) = candidate_pool(foods, slot, role);
        if pool.is_empty() {
            return Err(PlanError::NoCandidate { role, slot });
        }
        if fallback {
            tracing::debug!(%slot, %role, pool = pool.len(), "no slot match, using role-only pool");
        }
        let idx = self.random.pick_index(pool.len()).min(pool.len() - 1);
        Ok(pool[idx].clone())
    }
}

impl Default for CandidateSelector {
    fn default() -> Self {
        Self::new(Box::new(ThreadRandom))
    }
}
