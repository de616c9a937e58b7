use crate::models::{Food, MacroVector, MealSlot, Role, slot_weight};

pub const MIN_PORTION_G: f64 = 10.0;
pub const MAX_PORTION_G: f64 = 400.0;
/// Portion used when a food has neither the role's macro nor any calories.
pub const FALLBACK_PORTION_G: f64 = 50.0;

/// The slot's share of the day target, componentwise.
#[must_use]
pub fn meal_target(day_target: &MacroVector, slot: MealSlot) -> MacroVector {
    meal_target_for_key(day_target, slot.key())
}

#[must_use]
pub fn meal_target_for_key(day_target: &MacroVector, key: &str) -> MacroVector {
    day_target.scaled(slot_weight(key))
}

/// Grams of `food` that cover the role's macro in `target`, clamped to
/// `[MIN_PORTION_G, MAX_PORTION_G]`.
///
/// Foods without any of the role's macro are sized by calories instead;
/// foods without calories either get [`FALLBACK_PORTION_G`].
#[must_use]
pub fn portion_grams(food: &Food, role: Role, target: &MacroVector) -> f64 {
    let per_100g = food.per_100g().component(role);
    if per_100g > 0.0 {
        return clamp_portion(target.component(role) / per_100g * 100.0);
    }
    if food.kcal_per_100g <= 0.0 {
        return FALLBACK_PORTION_G;
    }
    clamp_portion(target.kcal / food.kcal_per_100g * 100.0)
}

fn clamp_portion(grams: f64) -> f64 {
    grams.clamp(MIN_PORTION_G, MAX_PORTION_G)
}
