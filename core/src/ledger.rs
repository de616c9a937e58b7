use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::NaiveDate;

use crate::error::{PlanError, Result};
use crate::models::{Day, MacroVector, Meal, MealSlot};

pub type DayHandle = Arc<Mutex<Day>>;

/// Lock a mutex, recovering the data if a previous holder panicked.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory day → meal → item ledger.
///
/// Each day lives behind its own mutex. Meal and item ids resolve to their
/// day through two indexes; the index locks are released before any day lock
/// is taken.
pub struct LedgerStore {
    days: RwLock<HashMap<NaiveDate, DayHandle>>,
    meals: RwLock<HashMap<i64, NaiveDate>>,
    items: RwLock<HashMap<i64, NaiveDate>>,
    next_meal_id: AtomicI64,
    next_item_id: AtomicI64,
    default_training: bool,
}

impl LedgerStore {
    #[must_use]
    pub fn new(default_training: bool) -> Self {
        Self {
            days: RwLock::new(HashMap::new()),
            meals: RwLock::new(HashMap::new()),
            items: RwLock::new(HashMap::new()),
            next_meal_id: AtomicI64::new(1),
            next_item_id: AtomicI64::new(1),
            default_training,
        }
    }

    /// The day for `date`, created with its seven empty meals on first access.
    pub fn day(&self, date: NaiveDate) -> DayHandle {
        if let Some(day) = self
            .days
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&date)
        {
            return Arc::clone(day);
        }

        let mut days = self.days.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(day) = days.get(&date) {
            return Arc::clone(day);
        }

        let meals: Vec<Meal> = MealSlot::ALL
            .iter()
            .map(|&slot| Meal::empty(self.next_meal_id.fetch_add(1, Ordering::Relaxed), date, slot))
            .collect();
        {
            let mut index = self.meals.write().unwrap_or_else(PoisonError::into_inner);
            for meal in &meals {
                index.insert(meal.id, date);
            }
        }
        tracing::debug!(date = %date, training = self.default_training, "created day");

        let day = Arc::new(Mutex::new(Day {
            date,
            is_training: self.default_training,
            planned: MacroVector::ZERO,
            adjusted: MacroVector::ZERO,
            consumed: MacroVector::ZERO,
            meals,
        }));
        days.insert(date, Arc::clone(&day));
        day
    }

    pub fn day_of_meal(&self, meal_id: i64) -> Result<DayHandle> {
        let date = self
            .meals
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&meal_id)
            .copied()
            .ok_or_else(|| PlanError::not_found("meal", meal_id))?;
        Ok(self.day(date))
    }

    pub fn day_of_item(&self, item_id: i64) -> Result<DayHandle> {
        let date = self
            .items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&item_id)
            .copied()
            .ok_or_else(|| PlanError::not_found("item", item_id))?;
        Ok(self.day(date))
    }

    pub fn next_item_id(&self) -> i64 {
        self.next_item_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn index_items(&self, date: NaiveDate, ids: impl IntoIterator<Item = i64>) {
        let mut index = self.items.write().unwrap_or_else(PoisonError::into_inner);
        for id in ids {
            index.insert(id, date);
        }
    }

    pub fn forget_items(&self, ids: impl IntoIterator<Item = i64>) {
        let mut index = self.items.write().unwrap_or_else(PoisonError::into_inner);
        for id in ids {
            index.remove(&id);
        }
    }

    #[must_use]
    pub fn day_count(&self) -> usize {
        self.days.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new(true)
    }
}

pub fn recompute_meal(meal: &mut Meal) {
    meal.planned_macros = meal.items.iter().map(|i| i.food.macros_for(i.planned_g)).sum();
    meal.adjusted_macros = meal.items.iter().map(|i| i.food.macros_for(i.adjusted_g)).sum();
}

/// Refresh every meal, then roll the meals up into the day totals.
/// `consumed` only counts confirmed items.
pub fn recompute_day(day: &mut Day) {
    for meal in &mut day.meals {
        recompute_meal(meal);
    }
    day.planned = day.meals.iter().map(|m| m.planned_macros).sum();
    day.adjusted = day.meals.iter().map(|m| m.adjusted_macros).sum();
    day.consumed = day
        .items()
        .filter(|i| i.is_confirmed)
        .map(|i| i.food.macros_for(i.consumed_g))
        .sum();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MealItem, PantryStatus, Role};
    use crate::testutil::food;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_day_created_lazily_with_seven_meals() {
        let store = LedgerStore::new(true);
        assert_eq!(store.day_count(), 0);

        let day = store.day(date());
        let guard = lock(&day);
        assert_eq!(guard.meals.len(), 7);
        assert!(guard.is_training);
        let slots: Vec<MealSlot> = guard.meals.iter().map(|m| m.slot).collect();
        assert_eq!(slots, MealSlot::ALL.to_vec());
        assert!(guard.meals.iter().all(|m| m.items.is_empty()));
        drop(guard);

        assert_eq!(store.day_count(), 1);
    }

    #[test]
    fn test_same_day_returned_twice() {
        let store = LedgerStore::default();
        let a = store.day(date());
        let b = store.day(date());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.day_count(), 1);
    }

    #[test]
    fn test_default_training_flag() {
        let store = LedgerStore::new(false);
        assert!(!lock(&store.day(date())).is_training);
    }

    #[test]
    fn test_meal_ids_resolve_to_their_day() {
        let store = LedgerStore::default();
        let other = NaiveDate::from_ymd_opt(2024, 6, 16).unwrap();
        store.day(date());
        let second = store.day(other);
        let meal_id = lock(&second).meals[3].id;

        let found = store.day_of_meal(meal_id).unwrap();
        assert!(Arc::ptr_eq(&found, &second));

        let err = store.day_of_meal(9999).err().unwrap();
        assert!(matches!(err, PlanError::NotFound { kind: "meal", .. }));
    }

    #[test]
    fn test_item_index() {
        let store = LedgerStore::default();
        store.day(date());
        let id = store.next_item_id();
        assert!(store.day_of_item(id).is_err());

        store.index_items(date(), [id]);
        assert!(store.day_of_item(id).is_ok());

        store.forget_items([id]);
        assert!(matches!(
            store.day_of_item(id),
            Err(PlanError::NotFound { kind: "item", .. })
        ));
    }

    #[test]
    fn test_recompute_day_sums_meals() {
        let store = LedgerStore::default();
        let handle = store.day(date());
        let mut day = lock(&handle);

        let rice = food("rice", 130.0, 2.7, 28.0, 0.3, "carb");
        let chicken = food("chicken", 165.0, 31.0, 0.0, 3.6, "protein");
        let meal_id = day.meals[0].id;
        day.meals[0].items.push(MealItem::planned(1, meal_id, rice, Role::Carb, 200.0, PantryStatus::Missing));
        let meal_id = day.meals[2].id;
        let mut item = MealItem::planned(2, meal_id, chicken, Role::Protein, 100.0, PantryStatus::Missing);
        item.adjusted_g = 50.0;
        day.meals[2].items.push(item);

        recompute_day(&mut day);

        assert!((day.meals[0].planned_macros.kcal - 260.0).abs() < 1e-9);
        assert!((day.planned.kcal - 425.0).abs() < 1e-9);
        assert!((day.adjusted.kcal - (260.0 + 82.5)).abs() < 1e-9);
        let summed: MacroVector = day.meals.iter().map(|m| m.planned_macros).sum();
        assert_eq!(day.planned, summed);
        // nothing confirmed yet
        assert_eq!(day.consumed, MacroVector::ZERO);
    }

    #[test]
    fn test_consumed_counts_confirmed_items_only() {
        let store = LedgerStore::default();
        let handle = store.day(date());
        let mut day = lock(&handle);

        let rice = food("rice", 130.0, 2.7, 28.0, 0.3, "carb");
        let meal_id = day.meals[0].id;
        let mut eaten = MealItem::planned(1, meal_id, rice.clone(), Role::Carb, 200.0, PantryStatus::Missing);
        eaten.is_confirmed = true;
        eaten.consumed_g = 150.0;
        let mut skipped = MealItem::planned(2, meal_id, rice, Role::Carb, 200.0, PantryStatus::Missing);
        skipped.consumed_g = 80.0;
        day.meals[0].items.extend([eaten, skipped]);

        recompute_day(&mut day);
        assert!((day.consumed.kcal - 195.0).abs() < 1e-9);
        assert!((day.consumed.carbs - 42.0).abs() < 1e-9);
    }
}
