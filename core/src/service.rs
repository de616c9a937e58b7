use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::audit::{AuditEvent, AuditKind, AuditLog};
use crate::catalog::Catalog;
use crate::error::{PlanError, Result};
use crate::ledger::{LedgerStore, lock, recompute_day};
use crate::models::{
    Day, DayOverview, Food, MacroProfiles, MacroVector, Meal, MealItem, NewFood, PantryEntry,
    Role, ShoppingEntry, ShoppingStatus, StockStatus,
};
use crate::pantry::{DEFAULT_UNIT, Pantry};
use crate::rebalance::rebalance;
use crate::selector::{CandidateSelector, RandomSource, ThreadRandom};
use crate::sizer::{meal_target, portion_grams};

/// External nutrition lookup for product codes missing from the catalog.
///
/// The CLI implements this with reqwest against OpenFoodFacts. Called
/// synchronously; async callers should invoke `Planner::scan_product` from a
/// blocking task.
pub trait FoodLookupProvider: Send + Sync {
    fn lookup_barcode(&self, barcode: &str) -> anyhow::Result<Option<NewFood>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub profiles: MacroProfiles,
    /// Training flag for days created on first access.
    pub default_training: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            profiles: MacroProfiles::default(),
            default_training: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanSource {
    Catalog,
    Lookup,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub source: ScanSource,
    pub food: Food,
    pub pantry_id: i64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Health {
    pub foods: usize,
    pub days: usize,
    pub pantry: usize,
    pub shopping: usize,
    pub events: usize,
}

/// Plan generation, macro rebalancing and the pantry-aware ledger.
///
/// Every day-level operation holds that day's lock from selection through the
/// final aggregate refresh, so concurrent calls on one day serialize.
pub struct Planner {
    catalog: Catalog,
    ledger: LedgerStore,
    pantry: Pantry,
    audit: AuditLog,
    selector: CandidateSelector,
    profiles: MacroProfiles,
}

impl Planner {
    #[must_use]
    pub fn new(catalog: Catalog, config: PlannerConfig, random: Box<dyn RandomSource>) -> Self {
        Self {
            catalog,
            ledger: LedgerStore::new(config.default_training),
            pantry: Pantry::new(),
            audit: AuditLog::new(),
            selector: CandidateSelector::new(random),
            profiles: config.profiles,
        }
    }

    /// Planner picking candidates with the thread-local RNG.
    #[must_use]
    pub fn with_catalog(catalog: Catalog, config: PlannerConfig) -> Self {
        Self::new(catalog, config, Box::new(ThreadRandom))
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    // --- Days ---

    pub fn get_day(&self, date: NaiveDate) -> DayOverview {
        let handle = self.ledger.day(date);
        let day = lock(&handle);
        self.overview(&day)
    }

    pub fn get_meals(&self, date: NaiveDate) -> Vec<Meal> {
        let handle = self.ledger.day(date);
        let day = lock(&handle);
        day.meals.clone()
    }

    /// Switch the day's profile and rebalance against the new target.
    pub fn set_training(&self, date: NaiveDate, is_training: bool) -> DayOverview {
        let handle = self.ledger.day(date);
        let mut day = lock(&handle);
        day.is_training = is_training;
        self.settle(&mut day);
        self.audit.record(AuditKind::SetTraining, date);
        self.overview(&day)
    }

    /// Replace every meal's items with a fresh selection.
    ///
    /// All items are built before the ledger is touched: on `NoCandidate`
    /// the day keeps its previous plan.
    pub fn generate_day(&self, date: NaiveDate) -> Result<Vec<Meal>> {
        let foods = self.catalog.list_foods();
        let handle = self.ledger.day(date);
        let mut day = lock(&handle);
        let target = self.profiles.for_day(day.is_training);

        let fresh = day
            .meals
            .iter()
            .map(|meal| self.build_items(&foods, meal, &target))
            .collect::<Result<Vec<_>>>()?;

        let old_ids: Vec<i64> = day.items().map(|i| i.id).collect();
        for (meal, items) in day.meals.iter_mut().zip(fresh) {
            meal.items = items;
        }
        let new_ids: Vec<i64> = day.items().map(|i| i.id).collect();
        self.ledger.forget_items(old_ids);
        self.ledger.index_items(date, new_ids);

        self.settle(&mut day);
        self.audit.record(AuditKind::GenerateDay, date);
        tracing::debug!(date = %date, items = day.items().count(), "day generated");
        Ok(day.meals.clone())
    }

    pub fn accept_day(&self, date: NaiveDate) {
        self.ledger.day(date);
        self.audit.record(AuditKind::AcceptDay, date);
    }

    pub fn reject_day(&self, date: NaiveDate) -> Result<Vec<Meal>> {
        self.audit.record(AuditKind::RejectDay, date);
        self.generate_day(date)
    }

    // --- Meals and items ---

    pub fn regenerate_meal(&self, meal_id: i64) -> Result<Meal> {
        let handle = self.ledger.day_of_meal(meal_id)?;
        let foods = self.catalog.list_foods();
        let mut day = lock(&handle);
        let target = self.profiles.for_day(day.is_training);

        let meal = day
            .meals
            .iter()
            .find(|m| m.id == meal_id)
            .ok_or_else(|| PlanError::not_found("meal", meal_id))?;
        let items = self.build_items(&foods, meal, &target)?;
        let new_ids: Vec<i64> = items.iter().map(|i| i.id).collect();

        let date = day.date;
        let meal = day
            .meal_mut(meal_id)
            .ok_or_else(|| PlanError::not_found("meal", meal_id))?;
        let old_ids: Vec<i64> = meal.items.iter().map(|i| i.id).collect();
        meal.items = items;
        self.ledger.forget_items(old_ids);
        self.ledger.index_items(date, new_ids);

        self.settle(&mut day);
        self.audit.record(AuditKind::RegenerateMeal, meal_id);
        find_meal(&day, meal_id)
    }

    /// Put a different food for `role` into the item, keeping its planned grams.
    pub fn swap_item(&self, item_id: i64, role: Role) -> Result<MealItem> {
        let handle = self.ledger.day_of_item(item_id)?;
        let foods = self.catalog.list_foods();
        let mut day = lock(&handle);

        let (slot, _) = day
            .item_mut(item_id)
            .ok_or_else(|| PlanError::not_found("item", item_id))?;
        let food = self.selector.select(&foods, slot, role)?;
        let status = self.pantry.status_of(&food.id);
        tracing::debug!(item_id, food_id = %food.id, %role, "swapping item");

        let (_, item) = day
            .item_mut(item_id)
            .ok_or_else(|| PlanError::not_found("item", item_id))?;
        item.swap_food(food, role, status);

        self.settle(&mut day);
        self.audit.record(AuditKind::SwapItem, item_id);
        find_item(&day, item_id)
    }

    /// Append a user-chosen item. Treats are recorded as already eaten and
    /// keep their grams through every rebalance.
    pub fn add_extra(
        &self,
        meal_id: i64,
        food_id: &str,
        grams: f64,
        as_treat: bool,
    ) -> Result<MealItem> {
        check_grams(grams)?;
        let food = self.catalog.get(food_id)?;
        let handle = self.ledger.day_of_meal(meal_id)?;
        let mut day = lock(&handle);

        let status = self.pantry.status_of(&food.id);
        let id = self.ledger.next_item_id();
        let date = day.date;
        let meal = day
            .meal_mut(meal_id)
            .ok_or_else(|| PlanError::not_found("meal", meal_id))?;
        meal.items
            .push(MealItem::extra(id, meal_id, food, grams, as_treat, status));
        self.ledger.index_items(date, [id]);

        self.settle(&mut day);
        self.audit.record(AuditKind::AddExtra, id);
        find_item(&day, id)
    }

    /// Record what was actually eaten. Aggregates are refreshed; portions are
    /// not rebalanced.
    pub fn confirm_item(&self, item_id: i64, consumed_g: f64, confirmed: bool) -> Result<MealItem> {
        check_grams(consumed_g)?;
        let handle = self.ledger.day_of_item(item_id)?;
        let mut day = lock(&handle);

        let (_, item) = day
            .item_mut(item_id)
            .ok_or_else(|| PlanError::not_found("item", item_id))?;
        item.consumed_g = consumed_g;
        item.is_confirmed = confirmed;

        recompute_day(&mut day);
        self.audit.record(AuditKind::ConfirmItem, item_id);
        find_item(&day, item_id)
    }

    // --- Catalog ---

    pub fn list_foods(&self) -> Vec<Food> {
        self.catalog.list_foods()
    }

    pub fn search_foods(&self, query: &str, limit: usize) -> Vec<Food> {
        self.catalog.search(query, limit)
    }

    pub fn get_food(&self, food_id: &str) -> Result<Food> {
        self.catalog.get(food_id)
    }

    pub fn create_manual_food(&self, food: NewFood) -> Result<Food> {
        self.catalog.add_custom(food)
    }

    /// Swap in a new catalog file. Existing plan items keep their food copies.
    pub fn reload_catalog(&self, path: &Path) -> anyhow::Result<usize> {
        self.catalog.reload(path)
    }

    // --- Pantry / shopping ---

    pub fn list_pantry(&self) -> Vec<PantryEntry> {
        self.pantry.list_pantry()
    }

    pub fn upsert_pantry(
        &self,
        food_id: &str,
        status: StockStatus,
        quantity: f64,
        unit: &str,
    ) -> Result<i64> {
        let food = self.catalog.get(food_id)?;
        self.pantry.upsert(&food, status, quantity, unit)
    }

    /// Put a scanned product into the pantry, importing it through `provider`
    /// when no known food carries the code.
    pub fn scan_product(
        &self,
        provider: &dyn FoodLookupProvider,
        code: &str,
        status: StockStatus,
    ) -> Result<ScanOutcome> {
        let code = code.trim();
        if code.is_empty() {
            return Err(PlanError::invalid("product code must not be empty"));
        }

        if let Some(food) = self.catalog.find_by_barcode(code) {
            let pantry_id = self.pantry.upsert(&food, status, 1.0, DEFAULT_UNIT)?;
            return Ok(ScanOutcome {
                source: ScanSource::Catalog,
                food,
                pantry_id,
            });
        }

        let found = match provider.lookup_barcode(code) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(code, error = %e, "product lookup failed");
                None
            }
        };
        let Some(mut new_food) = found else {
            return Err(PlanError::not_found("product", code));
        };
        new_food.allowed_slots = None;
        if new_food.barcode.is_none() {
            new_food.barcode = Some(code.to_string());
        }
        let food = self.catalog.add_custom(new_food)?;
        let pantry_id = self.pantry.upsert(&food, status, 1.0, DEFAULT_UNIT)?;
        Ok(ScanOutcome {
            source: ScanSource::Lookup,
            food,
            pantry_id,
        })
    }

    pub fn list_shopping(&self, status: ShoppingStatus) -> Vec<ShoppingEntry> {
        self.pantry.list_shopping(status)
    }

    pub fn add_shopping(&self, food_id: &str, quantity: f64, unit: &str) -> Result<i64> {
        let food = self.catalog.get(food_id)?;
        self.pantry.add_shopping(&food, quantity, unit)
    }

    pub fn mark_bought(&self, shopping_id: i64) -> Result<()> {
        self.pantry.mark_bought(shopping_id)
    }

    // --- Audit ---

    pub fn events(&self) -> Vec<AuditEvent> {
        self.audit.snapshot()
    }

    pub fn health(&self) -> Health {
        let (pantry, shopping) = self.pantry.counts();
        Health {
            foods: self.catalog.len(),
            days: self.ledger.day_count(),
            pantry,
            shopping,
            events: self.audit.len(),
        }
    }

    // --- Internals ---

    fn build_items(&self, foods: &[Food], meal: &Meal, day_target: &MacroVector) -> Result<Vec<MealItem>> {
        let target = meal_target(day_target, meal.slot);
        meal.slot
            .roles()
            .iter()
            .map(|&role| {
                let food = self.selector.select(foods, meal.slot, role)?;
                let grams = portion_grams(&food, role, &target);
                let status = self.pantry.status_of(&food.id);
                Ok(MealItem::planned(
                    self.ledger.next_item_id(),
                    meal.id,
                    food,
                    role,
                    grams,
                    status,
                ))
            })
            .collect()
    }

    /// Rebalance, make sure every referenced food is stocked or listed, and
    /// refresh the aggregates.
    fn settle(&self, day: &mut Day) {
        let target = self.profiles.for_day(day.is_training);
        let scale = rebalance(&mut day.meals, target.kcal);
        for item in day.items() {
            self.pantry.ensure_shopping_for(&item.food);
        }
        recompute_day(day);
        tracing::debug!(date = %day.date, scale, "day rebalanced");
    }

    fn overview(&self, day: &Day) -> DayOverview {
        DayOverview {
            date: day.date,
            is_training: day.is_training,
            target: self.profiles.for_day(day.is_training),
            planned: day.planned,
            adjusted: day.adjusted,
            consumed: day.consumed,
        }
    }
}

fn check_grams(grams: f64) -> Result<()> {
    if grams.is_finite() && grams >= 0.0 {
        Ok(())
    } else {
        Err(PlanError::invalid("grams must be a non-negative number"))
    }
}

fn find_meal(day: &Day, meal_id: i64) -> Result<Meal> {
    day.meals
        .iter()
        .find(|m| m.id == meal_id)
        .cloned()
        .ok_or_else(|| PlanError::not_found("meal", meal_id))
}

fn find_item(day: &Day, item_id: i64) -> Result<MealItem> {
    day.items()
        .find(|i| i.id == item_id)
        .cloned()
        .ok_or_else(|| PlanError::not_found("item", item_id))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::{MealSlot, PantryStatus};
    use crate::sizer::{MAX_PORTION_G, MIN_PORTION_G};
    use crate::testutil::{FirstPick, basic_catalog, food};

    struct MockProvider {
        foods: Vec<NewFood>,
    }

    impl FoodLookupProvider for MockProvider {
        fn lookup_barcode(&self, barcode: &str) -> anyhow::Result<Option<NewFood>> {
            Ok(self
                .foods
                .iter()
                .find(|f| f.barcode.as_deref() == Some(barcode))
                .cloned())
        }
    }

    struct FailingProvider;

    impl FoodLookupProvider for FailingProvider {
        fn lookup_barcode(&self, _barcode: &str) -> anyhow::Result<Option<NewFood>> {
            anyhow::bail!("connection refused")
        }
    }

    fn planner() -> Planner {
        Planner::new(
            Catalog::new(basic_catalog()),
            PlannerConfig::default(),
            Box::new(FirstPick),
        )
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "{a} != {b}");
    }

    fn chocolate() -> NewFood {
        NewFood {
            name: "Dark chocolate".to_string(),
            kcal_per_100g: 540.0,
            protein_per_100g: 6.0,
            carbs_per_100g: 45.0,
            fat_per_100g: 31.0,
            ..NewFood::default()
        }
    }

    #[test]
    fn test_fresh_day_is_empty_training_day() {
        let p = planner();
        let overview = p.get_day(date());
        assert!(overview.is_training);
        assert_close(overview.target.kcal, 2300.0);
        assert_eq!(overview.planned, MacroVector::ZERO);
        assert_eq!(p.get_meals(date()).len(), 7);
    }

    #[test]
    fn test_generate_training_day_item_counts() {
        let p = planner();
        let meals = p.generate_day(date()).unwrap();
        assert_eq!(meals.len(), 7);

        let main: usize = meals.iter().filter(|m| !m.slot.is_dessert()).map(|m| m.items.len()).sum();
        let dessert: usize = meals.iter().filter(|m| m.slot.is_dessert()).map(|m| m.items.len()).sum();
        assert_eq!(main, 15);
        assert_eq!(dessert, 4);

        for meal in &meals {
            let roles: Vec<Role> = meal.items.iter().map(|i| i.role).collect();
            assert_eq!(roles, meal.slot.roles().to_vec());
            for item in &meal.items {
                assert!(!item.is_extra && !item.is_treat && !item.is_confirmed);
                assert!(item.planned_g >= MIN_PORTION_G && item.planned_g <= MAX_PORTION_G);
                assert!(item.adjusted_g >= 0.0);
                assert_eq!(item.meal_id, meal.id);
            }
        }
    }

    #[test]
    fn test_generated_day_aggregates_and_hits_target() {
        let p = planner();
        let meals = p.generate_day(date()).unwrap();
        let day = p.get_day(date());

        let planned: MacroVector = meals.iter().map(|m| m.planned_macros).sum();
        let adjusted: MacroVector = meals.iter().map(|m| m.adjusted_macros).sum();
        assert_close(day.planned.kcal, planned.kcal);
        assert_close(day.planned.protein, planned.protein);
        assert_close(day.adjusted.fat, adjusted.fat);
        assert_close(day.adjusted.kcal, 2300.0);
        assert_eq!(day.consumed, MacroVector::ZERO);
    }

    #[test]
    fn test_generate_populates_shopping_list() {
        let p = planner();
        p.upsert_pantry("rice", StockStatus::Available, 1.0, "kg").unwrap();
        let meals = p.generate_day(date()).unwrap();

        let pending = p.list_shopping(ShoppingStatus::Pending);
        let mut ids: Vec<&str> = pending.iter().map(|s| s.food_id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["chicken", "olive oil"]);

        let rice_item = meals[0].items.iter().find(|i| i.food.id == "rice").unwrap();
        assert_eq!(rice_item.pantry_status, PantryStatus::Available);
        let chicken = meals[0].items.iter().find(|i| i.food.id == "chicken").unwrap();
        assert_eq!(chicken.pantry_status, PantryStatus::Missing);

        // regenerating does not duplicate pending entries
        p.generate_day(date()).unwrap();
        assert_eq!(p.list_shopping(ShoppingStatus::Pending).len(), 2);
    }

    #[test]
    fn test_no_candidate_leaves_day_unchanged() {
        let p = planner();
        let before = p.generate_day(date()).unwrap();
        p.catalog()
            .replace_master(vec![food("chicken", 165.0, 31.0, 0.0, 3.6, "protein")]);

        let err = p.generate_day(date()).unwrap_err();
        assert!(matches!(err, PlanError::NoCandidate { role: Role::Carb, .. }));

        let after = p.get_meals(date());
        let ids = |meals: &[Meal]| -> Vec<i64> {
            meals.iter().flat_map(|m| m.items.iter().map(|i| i.id)).collect()
        };
        assert_eq!(ids(&before), ids(&after));
    }

    #[test]
    fn test_reject_regenerates_with_new_ids() {
        let p = planner();
        let first = p.generate_day(date()).unwrap();
        let second = p.reject_day(date()).unwrap();
        assert_ne!(first[0].items[0].id, second[0].items[0].id);

        // old ids are gone from the index
        assert!(matches!(
            p.confirm_item(first[0].items[0].id, 10.0, true),
            Err(PlanError::NotFound { kind: "item", .. })
        ));
        assert!(p.confirm_item(second[0].items[0].id, 10.0, true).is_ok());
    }

    #[test]
    fn test_regenerate_meal_keeps_other_meals() {
        let p = planner();
        let meals = p.generate_day(date()).unwrap();
        let lunch = &meals[2];
        assert_eq!(lunch.slot, MealSlot::Lunch);

        let regenerated = p.regenerate_meal(lunch.id).unwrap();
        assert_eq!(regenerated.id, lunch.id);
        assert_eq!(regenerated.items.len(), 3);
        assert!(regenerated.items.iter().all(|i| !lunch.items.iter().any(|o| o.id == i.id)));

        let after = p.get_meals(date());
        assert_eq!(after[0].items[0].id, meals[0].items[0].id);
        assert_close(p.get_day(date()).adjusted.kcal, 2300.0);
    }

    #[test]
    fn test_regenerate_unknown_meal() {
        let p = planner();
        assert!(matches!(
            p.regenerate_meal(424_242),
            Err(PlanError::NotFound { kind: "meal", .. })
        ));
    }

    #[test]
    fn test_swap_keeps_planned_grams() {
        let p = planner();
        let meals = p.generate_day(date()).unwrap();
        let original = meals[0].items[0].clone();
        assert_eq!(original.role, Role::Protein);

        // user foods list first, so FirstPick lands on it
        let tuna = p
            .create_manual_food(NewFood {
                name: "Tuna".to_string(),
                kcal_per_100g: 116.0,
                protein_per_100g: 26.0,
                fat_per_100g: 1.0,
                ..NewFood::default()
            })
            .unwrap();

        let swapped = p.swap_item(original.id, Role::Protein).unwrap();
        assert_eq!(swapped.id, original.id);
        assert_eq!(swapped.food.id, tuna.id);
        assert_eq!(swapped.role, Role::Protein);
        assert_close(swapped.planned_g, original.planned_g);

        let day = p.get_day(date());
        assert_close(day.adjusted.kcal, 2300.0);
        assert!(p
            .list_shopping(ShoppingStatus::Pending)
            .iter()
            .any(|s| s.food_id == tuna.id));
    }

    #[test]
    fn test_swap_role_follows_new_food() {
        let p = planner();
        let meals = p.generate_day(date()).unwrap();
        let protein_item = meals[0].items[0].id;

        let swapped = p.swap_item(protein_item, Role::Fat).unwrap();
        assert_eq!(swapped.food.id, "olive oil");
        assert_eq!(swapped.role, Role::Fat);
    }

    #[test]
    fn test_swap_unknown_item() {
        let p = planner();
        assert!(matches!(
            p.swap_item(99, Role::Carb),
            Err(PlanError::NotFound { kind: "item", .. })
        ));
    }

    #[test]
    fn test_add_extra_treat() {
        let p = planner();
        let meals = p.generate_day(date()).unwrap();
        let choc = p.create_manual_food(chocolate()).unwrap();

        let treat = p.add_extra(meals[5].id, &choc.id, 40.0, true).unwrap();
        assert!(treat.is_extra && treat.is_treat && treat.is_confirmed);
        assert_close(treat.consumed_g, 40.0);
        assert_close(treat.adjusted_g, 40.0);

        let day = p.get_day(date());
        assert_close(day.consumed.kcal, 216.0);
        assert_close(day.adjusted.kcal, 2300.0);

        // the treat survives later rebalances untouched
        p.set_training(date(), false);
        let meals = p.get_meals(date());
        let held = meals[5].items.iter().find(|i| i.id == treat.id).unwrap();
        assert_close(held.adjusted_g, 40.0);
        assert_close(p.get_day(date()).adjusted.kcal, 1900.0);
    }

    #[test]
    fn test_add_extra_plain() {
        let p = planner();
        let meals = p.generate_day(date()).unwrap();
        let extra = p.add_extra(meals[1].id, "rice", 40.0, false).unwrap();
        assert!(extra.is_extra);
        assert!(!extra.is_treat && !extra.is_confirmed);
        assert_eq!(extra.role, Role::Carb);
        assert!(extra.consumed_g.abs() < f64::EPSILON);
        assert_eq!(p.get_day(date()).consumed, MacroVector::ZERO);
    }

    #[test]
    fn test_add_extra_errors() {
        let p = planner();
        let meal_id = p.get_meals(date())[0].id;
        assert!(matches!(
            p.add_extra(meal_id, "rice", -5.0, false),
            Err(PlanError::InvalidInput(_))
        ));
        assert!(matches!(
            p.add_extra(meal_id, "unicorn", 5.0, false),
            Err(PlanError::NotFound { kind: "food", .. })
        ));
        assert!(matches!(
            p.add_extra(777, "rice", 5.0, false),
            Err(PlanError::NotFound { kind: "meal", .. })
        ));
    }

    #[test]
    fn test_confirm_item_skips_rebalance() {
        let p = planner();
        let meals = p.generate_day(date()).unwrap();
        let item = meals[2].items[1].clone();
        assert_eq!(item.food.id, "rice");

        let confirmed = p.confirm_item(item.id, 100.0, true).unwrap();
        assert!(confirmed.is_confirmed);
        assert_close(confirmed.adjusted_g, item.adjusted_g);

        let day = p.get_day(date());
        assert_close(day.consumed.kcal, 130.0);
        assert_close(day.consumed.carbs, 28.0);

        let after = p.get_meals(date());
        for (a, b) in meals.iter().zip(&after) {
            for (x, y) in a.items.iter().zip(&b.items) {
                assert_close(x.adjusted_g, y.adjusted_g);
            }
        }

        p.confirm_item(item.id, 100.0, false).unwrap();
        assert_eq!(p.get_day(date()).consumed, MacroVector::ZERO);

        assert!(matches!(
            p.confirm_item(item.id, -1.0, true),
            Err(PlanError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_set_training_switches_target() {
        let p = planner();
        p.generate_day(date()).unwrap();
        let rest = p.set_training(date(), false);
        assert!(!rest.is_training);
        assert_close(rest.target.kcal, 1900.0);
        assert_close(rest.adjusted.kcal, 1900.0);
    }

    #[test]
    fn test_configured_profiles_and_default_training() {
        let config = PlannerConfig {
            profiles: MacroProfiles {
                training: MacroVector::new(2600.0, 180.0, 300.0, 70.0),
                rest: MacroVector::new(2000.0, 160.0, 180.0, 70.0),
            },
            default_training: false,
        };
        let p = Planner::new(Catalog::new(basic_catalog()), config, Box::new(FirstPick));
        p.generate_day(date()).unwrap();
        let day = p.get_day(date());
        assert!(!day.is_training);
        assert_close(day.adjusted.kcal, 2000.0);
    }

    #[test]
    fn test_scan_imports_unknown_product() {
        let p = planner();
        let provider = MockProvider {
            foods: vec![NewFood {
                name: "Skyr".to_string(),
                barcode: Some("8410000000001".to_string()),
                kcal_per_100g: 63.0,
                protein_per_100g: 11.0,
                carbs_per_100g: 4.0,
                fat_per_100g: 0.2,
                allowed_slots: Some("breakfast".to_string()),
                ..NewFood::default()
            }],
        };

        let outcome = p
            .scan_product(&provider, " 8410000000001 ", StockStatus::Available)
            .unwrap();
        assert_eq!(outcome.source, ScanSource::Lookup);
        assert!(outcome.food.id.starts_with("custom:"));
        assert_eq!(outcome.food.role_tag, "protein");
        assert!(outcome.food.allowed_slots.is_empty());

        let pantry = p.list_pantry();
        assert_eq!(pantry.len(), 1);
        assert_eq!(pantry[0].food_id, outcome.food.id);
        assert_eq!(pantry[0].unit, "unit");

        // second scan is served from the imported food
        let again = p
            .scan_product(&MockProvider { foods: vec![] }, "8410000000001", StockStatus::Out)
            .unwrap();
        assert_eq!(again.source, ScanSource::Catalog);
        assert_eq!(again.pantry_id, outcome.pantry_id);
        assert_eq!(p.list_shopping(ShoppingStatus::Pending).len(), 1);
    }

    #[test]
    fn test_scan_misses() {
        let p = planner();
        let empty = MockProvider { foods: vec![] };
        assert!(matches!(
            p.scan_product(&empty, "000", StockStatus::Available),
            Err(PlanError::NotFound { kind: "product", .. })
        ));
        assert!(matches!(
            p.scan_product(&FailingProvider, "000", StockStatus::Available),
            Err(PlanError::NotFound { .. })
        ));
        assert!(matches!(
            p.scan_product(&empty, "  ", StockStatus::Available),
            Err(PlanError::InvalidInput(_))
        ));
        assert_eq!(p.list_foods().len(), 3);
    }

    #[test]
    fn test_shopping_operations() {
        let p = planner();
        let id = p.add_shopping("rice", 2.0, "kg").unwrap();
        assert_eq!(p.add_shopping("rice", 1.0, "kg").unwrap(), id);
        p.mark_bought(id).unwrap();
        assert_eq!(p.list_shopping(ShoppingStatus::Bought).len(), 1);
        assert!(p.mark_bought(id + 100).is_err());
        assert!(matches!(
            p.add_shopping("nope", 1.0, "unit"),
            Err(PlanError::NotFound { .. })
        ));
        assert!(matches!(
            p.upsert_pantry("nope", StockStatus::Out, 1.0, "unit"),
            Err(PlanError::NotFound { .. })
        ));
    }

    #[test]
    fn test_search_foods() {
        let p = planner();
        p.create_manual_food(chocolate()).unwrap();
        assert!(p.search_foods("", 10).is_empty());
        let hits = p.search_foods("CHOC", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(p.list_foods()[0].name, "Dark chocolate");
    }

    #[test]
    fn test_events_and_health() {
        let p = planner();
        let meals = p.generate_day(date()).unwrap();
        p.accept_day(date());
        p.confirm_item(meals[0].items[0].id, 50.0, true).unwrap();

        let kinds: Vec<AuditKind> = p.events().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![AuditKind::GenerateDay, AuditKind::AcceptDay, AuditKind::ConfirmItem]
        );
        assert_eq!(p.events()[0].subject, "2024-06-15");

        let health = p.health();
        assert_eq!(health.foods, 3);
        assert_eq!(health.days, 1);
        assert_eq!(health.shopping, 3);
        assert_eq!(health.events, 3);
    }

    #[test]
    fn test_days_generate_concurrently() {
        let p = Arc::new(planner());
        let handles: Vec<_> = (1..=6)
            .map(|d| {
                let p = Arc::clone(&p);
                std::thread::spawn(move || {
                    let date = NaiveDate::from_ymd_opt(2024, 7, d).unwrap();
                    p.generate_day(date).unwrap();
                    p.get_day(date)
                })
            })
            .collect();
        for h in handles {
            let day = h.join().unwrap();
            assert_close(day.adjusted.kcal, 2300.0);
        }
        assert_eq!(p.health().days, 6);
    }

    #[test]
    fn test_accept_opens_the_day() {
        let p = planner();
        assert_eq!(p.health().days, 0);
        p.accept_day(date());
        assert_eq!(p.health().days, 1);
        assert_eq!(p.get_meals(date()).len(), 7);
    }

    #[test]
    fn test_same_day_operations_serialize() {
        let p = Arc::new(planner());
        let meals = p.generate_day(date()).unwrap();
        let generated = meals.iter().map(|m| m.items.len()).sum::<usize>();
        let meal_id = meals[1].id;
        let other_meal = meals[3].id;

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let p = Arc::clone(&p);
                std::thread::spawn(move || {
                    p.add_extra(meal_id, "rice", 30.0, n % 2 == 0).unwrap();
                    p.regenerate_meal(other_meal).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let meals = p.get_meals(date());
        let total = meals.iter().map(|m| m.items.len()).sum::<usize>();
        assert_eq!(total, generated + 8);
        assert_eq!(
            meals
                .iter()
                .find(|m| m.id == meal_id)
                .unwrap()
                .items
                .iter()
                .filter(|i| i.is_extra)
                .count(),
            8
        );

        let day = p.get_day(date());
        let summed: MacroVector = meals.iter().map(|m| m.adjusted_macros).sum();
        assert_close(day.adjusted.kcal, summed.kcal);
        assert_close(day.adjusted.protein, summed.protein);
        assert_close(day.adjusted.carbs, summed.carbs);
        assert_close(day.adjusted.fat, summed.fat);
        assert_close(day.adjusted.kcal, 2300.0);
    }
}
