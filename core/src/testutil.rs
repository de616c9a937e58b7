use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::models::{Food, FoodSource};
use crate::selector::RandomSource;

pub(crate) fn food(id: &str, kcal: f64, p: f64, c: f64, f: f64, role: &str) -> Food {
    Food {
        id: id.to_string(),
        name: id.to_string(),
        brand: None,
        barcode: None,
        kcal_per_100g: kcal,
        protein_per_100g: p,
        carbs_per_100g: c,
        fat_per_100g: f,
        role_tag: role.to_string(),
        allowed_slots: BTreeSet::new(),
        source: FoodSource::Catalog,
    }
}

/// One unrestricted food per role.
pub(crate) fn basic_catalog() -> Vec<Food> {
    vec![
        food("chicken", 165.0, 31.0, 0.0, 3.6, "protein"),
        food("rice", 130.0, 2.7, 28.0, 0.3, "carb"),
        food("olive oil", 884.0, 0.0, 0.0, 100.0, "fat"),
    ]
}

pub(crate) struct FirstPick;

impl RandomSource for FirstPick {
    fn pick_index(&self, _len: usize) -> usize {
        0
    }
}

#[derive(Default)]
pub(crate) struct CyclePick(AtomicUsize);

impl RandomSource for CyclePick {
    fn pick_index(&self, len: usize) -> usize {
        self.0.fetch_add(1, Ordering::Relaxed) % len
    }
}
