use crate::models::{Meal, MealItem};

/// Upper bound for a rescaled portion.
pub const MAX_ADJUSTED_G: f64 = 9999.0;
const KCAL_EPSILON: f64 = 1e-6;

/// Rescale every non-treat item so the day's planned calories land on
/// `target_kcal` once the treats' calories are taken out.
///
/// One uniform factor is applied to all non-treat items; per-macro drift is
/// not corrected. Treat items always end with `adjusted_g == planned_g`.
/// Only `adjusted_g` is written, and it is derived from `planned_g`, so
/// calling this twice in a row yields the same grams. Returns the factor.
pub fn rebalance(meals: &mut [Meal], target_kcal: f64) -> f64 {
    let (treat_kcal, other_kcal) = meals
        .iter()
        .flat_map(|m| m.items.iter())
        .fold((0.0, 0.0), |(treat, other), item| {
            let kcal = planned_kcal(item);
            if item.is_treat {
                (treat + kcal, other)
            } else {
                (treat, other + kcal)
            }
        });

    let remaining = (target_kcal - treat_kcal).max(0.0);
    let scale = if other_kcal > KCAL_EPSILON {
        remaining / other_kcal
    } else {
        1.0
    };

    for item in meals.iter_mut().flat_map(|m| m.items.iter_mut()) {
        item.adjusted_g = if item.is_treat {
            item.planned_g
        } else {
            (item.planned_g * scale).clamp(0.0, MAX_ADJUSTED_G)
        };
    }
    scale
}

fn planned_kcal(item: &MealItem) -> f64 {
    item.food.kcal_for(item.planned_g)
}
