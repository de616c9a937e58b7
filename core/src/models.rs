use std::collections::BTreeSet;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};

// --- Macros ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroVector {
    pub kcal: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl MacroVector {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(kcal: f64, protein: f64, carbs: f64, fat: f64) -> Self {
        Self {
            kcal,
            protein,
            carbs,
            fat,
        }
    }

    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self::new(
            self.kcal * factor,
            self.protein * factor,
            self.carbs * factor,
            self.fat * factor,
        )
    }

    /// The component a role is sized against: protein, fat, or carbs.
    #[must_use]
    pub fn component(&self, role: Role) -> f64 {
        match role {
            Role::Protein => self.protein,
            Role::Carb => self.carbs,
            Role::Fat => self.fat,
        }
    }
}

impl Add for MacroVector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(
            self.kcal + rhs.kcal,
            self.protein + rhs.protein,
            self.carbs + rhs.carbs,
            self.fat + rhs.fat,
        )
    }
}

impl AddAssign for MacroVector {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for MacroVector {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

/// Day targets used after the calorie deficit has already been applied.
pub const TRAINING_TARGET: MacroVector = MacroVector::new(2300.0, 154.0, 278.0, 64.0);
pub const REST_TARGET: MacroVector = MacroVector::new(1900.0, 151.0, 157.0, 74.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroProfiles {
    pub training: MacroVector,
    pub rest: MacroVector,
}

impl Default for MacroProfiles {
    fn default() -> Self {
        Self {
            training: TRAINING_TARGET,
            rest: REST_TARGET,
        }
    }
}

impl MacroProfiles {
    #[must_use]
    pub fn for_day(&self, is_training: bool) -> MacroVector {
        if is_training { self.training } else { self.rest }
    }
}

// --- Roles ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Protein,
    Carb,
    Fat,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Protein, Role::Carb, Role::Fat];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Protein => "protein",
            Role::Carb => "carb",
            Role::Fat => "fat",
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Role::Protein => &["protein", "proteina", "proteína"],
            Role::Carb => &["carb", "hidrato"],
            Role::Fat => &["fat", "grasa"],
        }
    }

    /// Substring match against a free-text role tag. A compound tag such as
    /// `"protein,fat"` matches more than one role.
    #[must_use]
    pub fn matches_tag(self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.keywords().iter().any(|k| tag.contains(k))
    }

    /// First role (protein, carb, fat order) whose keyword appears in `tag`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Role> {
        Self::ALL.into_iter().find(|r| r.matches_tag(tag))
    }

    pub fn parse(s: &str) -> Result<Role> {
        Self::from_tag(s.trim()).ok_or_else(|| {
            PlanError::invalid(format!(
                "Invalid role '{s}'. Must be one of: protein, carb, fat"
            ))
        })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dominant macro among protein, carbs and fat. Ties go to the earlier one.
#[must_use]
pub fn infer_role(protein: f64, carbs: f64, fat: f64) -> Role {
    let mut best = (Role::Protein, protein);
    if carbs > best.1 {
        best = (Role::Carb, carbs);
    }
    if fat > best.1 {
        best = (Role::Fat, fat);
    }
    best.0
}

// --- Meal slots ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealSlot {
    Breakfast,
    MidMorning,
    Lunch,
    AfternoonSnack,
    Dinner,
    LunchDessert,
    DinnerDessert,
}

/// Share of the day target assigned to each slot key.
pub const MEAL_WEIGHTS: &[(&str, f64)] = &[
    ("breakfast", 0.22),
    ("mid_morning", 0.10),
    ("lunch", 0.28),
    ("afternoon_snack", 0.10),
    ("dinner", 0.25),
    ("lunch_dessert", 0.025),
    ("dinner_dessert", 0.025),
];

pub const DEFAULT_SLOT_WEIGHT: f64 = 0.15;

#[must_use]
pub fn slot_weight(key: &str) -> f64 {
    MEAL_WEIGHTS
        .iter()
        .find(|(k, _)| *k == key)
        .map_or(DEFAULT_SLOT_WEIGHT, |(_, w)| *w)
}

const MAIN_ROLES: &[Role] = &[Role::Protein, Role::Carb, Role::Fat];
const DESSERT_ROLES: &[Role] = &[Role::Carb, Role::Fat];

impl MealSlot {
    pub const ALL: [MealSlot; 7] = [
        MealSlot::Breakfast,
        MealSlot::MidMorning,
        MealSlot::Lunch,
        MealSlot::AfternoonSnack,
        MealSlot::Dinner,
        MealSlot::LunchDessert,
        MealSlot::DinnerDessert,
    ];

    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            MealSlot::Breakfast => "breakfast",
            MealSlot::MidMorning => "mid_morning",
            MealSlot::Lunch => "lunch",
            MealSlot::AfternoonSnack => "afternoon_snack",
            MealSlot::Dinner => "dinner",
            MealSlot::LunchDessert => "lunch_dessert",
            MealSlot::DinnerDessert => "dinner_dessert",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            MealSlot::Breakfast => "Breakfast",
            MealSlot::MidMorning => "Mid-morning",
            MealSlot::Lunch => "Lunch",
            MealSlot::AfternoonSnack => "Afternoon snack",
            MealSlot::Dinner => "Dinner",
            MealSlot::LunchDessert => "Dessert (lunch)",
            MealSlot::DinnerDessert => "Dessert (dinner)",
        }
    }

    #[must_use]
    pub fn weight(self) -> f64 {
        slot_weight(self.key())
    }

    #[must_use]
    pub fn is_dessert(self) -> bool {
        matches!(self, MealSlot::LunchDessert | MealSlot::DinnerDessert)
    }

    /// Roles filled when the slot is generated.
    #[must_use]
    pub fn roles(self) -> &'static [Role] {
        if self.is_dessert() {
            DESSERT_ROLES
        } else {
            MAIN_ROLES
        }
    }

    /// Accepts the canonical keys and the catalog's Spanish meal names.
    #[must_use]
    pub fn from_key(key: &str) -> Option<MealSlot> {
        let key = key.trim().to_lowercase().replace([' ', '-'], "_");
        match key.as_str() {
            "breakfast" | "desayuno" => Some(MealSlot::Breakfast),
            "mid_morning" | "media_mañana" | "media_manana" => Some(MealSlot::MidMorning),
            "lunch" | "almuerzo" => Some(MealSlot::Lunch),
            "afternoon_snack" | "merienda" => Some(MealSlot::AfternoonSnack),
            "dinner" | "cena" => Some(MealSlot::Dinner),
            "lunch_dessert" | "postre_almuerzo" => Some(MealSlot::LunchDessert),
            "dinner_dessert" | "postre_cena" => Some(MealSlot::DinnerDessert),
            _ => None,
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Parse an allowed-meals cell such as `"desayuno, almuerzo; postre"`.
///
/// The generic `dessert`/`postre` token allows both dessert slots. Unknown
/// tokens are dropped, so a cell with nothing recognisable yields the empty
/// (unrestricted) set.
#[must_use]
pub fn parse_allowed_slots(text: &str) -> BTreeSet<MealSlot> {
    let mut slots = BTreeSet::new();
    for token in text.split([',', ';']).map(str::trim).filter(|t| !t.is_empty()) {
        match token.to_lowercase().as_str() {
            "dessert" | "postre" => {
                slots.insert(MealSlot::LunchDessert);
                slots.insert(MealSlot::DinnerDessert);
            }
            other => {
                if let Some(slot) = MealSlot::from_key(other) {
                    slots.insert(slot);
                }
            }
        }
    }
    slots
}

// --- Foods ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodSource {
    Catalog,
    UserDefined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Food {
    pub id: String,
    pub name: String,
    pub brand: Option<String>,
    pub barcode: Option<String>,
    pub kcal_per_100g: f64,
    pub protein_per_100g: f64,
    pub carbs_per_100g: f64,
    pub fat_per_100g: f64,
    pub role_tag: String,
    #[serde(default)]
    pub allowed_slots: BTreeSet<MealSlot>,
    pub source: FoodSource,
}

impl Food {
    #[must_use]
    pub fn per_100g(&self) -> MacroVector {
        MacroVector::new(
            self.kcal_per_100g,
            self.protein_per_100g,
            self.carbs_per_100g,
            self.fat_per_100g,
        )
    }

    #[must_use]
    pub fn macros_for(&self, grams: f64) -> MacroVector {
        self.per_100g().scaled(grams / 100.0)
    }

    #[must_use]
    pub fn kcal_for(&self, grams: f64) -> f64 {
        self.kcal_per_100g * grams / 100.0
    }

    /// Role recorded on items that pick this food up outside of generation.
    #[must_use]
    pub fn primary_role(&self) -> Role {
        Role::from_tag(&self.role_tag).unwrap_or(Role::Carb)
    }

    #[must_use]
    pub fn allows_slot(&self, slot: MealSlot) -> bool {
        self.allowed_slots.is_empty() || self.allowed_slots.contains(&slot)
    }
}

/// A user-defined food before it gets an id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewFood {
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    pub kcal_per_100g: f64,
    pub protein_per_100g: f64,
    pub carbs_per_100g: f64,
    pub fat_per_100g: f64,
    /// Allowed-meals text; empty or absent means any slot.
    #[serde(default)]
    pub allowed_slots: Option<String>,
}

/// Name must not be empty, no macro may be negative.
pub fn validate_new_food(food: &NewFood) -> Result<()> {
    if food.name.trim().is_empty() {
        return Err(PlanError::invalid("Food name must not be empty"));
    }
    let fields = [
        ("kcal_per_100g", food.kcal_per_100g),
        ("protein_per_100g", food.protein_per_100g),
        ("carbs_per_100g", food.carbs_per_100g),
        ("fat_per_100g", food.fat_per_100g),
    ];
    for (name, value) in fields {
        if value < 0.0 {
            return Err(PlanError::invalid(format!("{name} must not be negative")));
        }
    }
    Ok(())
}

// --- Ledger ---

#[derive(Debug, Clone, Serialize)]
pub struct MealItem {
    pub id: i64,
    pub meal_id: i64,
    pub food: Food,
    pub role: Role,
    pub planned_g: f64,
    pub adjusted_g: f64,
    pub consumed_g: f64,
    pub is_confirmed: bool,
    pub is_extra: bool,
    pub is_treat: bool,
    pub pantry_status: PantryStatus,
}

impl MealItem {
    /// A generator-produced item: not extra, not a treat, unconfirmed.
    #[must_use]
    pub fn planned(
        id: i64,
        meal_id: i64,
        food: Food,
        role: Role,
        grams: f64,
        pantry_status: PantryStatus,
    ) -> Self {
        Self {
            id,
            meal_id,
            food,
            role,
            planned_g: grams,
            adjusted_g: grams,
            consumed_g: 0.0,
            is_confirmed: false,
            is_extra: false,
            is_treat: false,
            pantry_status,
        }
    }

    /// A user-added item. Treats are self-reported as eaten when added.
    #[must_use]
    pub fn extra(
        id: i64,
        meal_id: i64,
        food: Food,
        grams: f64,
        as_treat: bool,
        pantry_status: PantryStatus,
    ) -> Self {
        let role = food.primary_role();
        Self {
            id,
            meal_id,
            food,
            role,
            planned_g: grams,
            adjusted_g: grams,
            consumed_g: if as_treat { grams } else { 0.0 },
            is_confirmed: as_treat,
            is_extra: true,
            is_treat: as_treat,
            pantry_status,
        }
    }

    /// Replace the food but keep the portion: `adjusted_g` resets to
    /// `planned_g` until the next rebalance. The requested role sticks when
    /// the new food's tag carries it.
    pub fn swap_food(&mut self, food: Food, role: Role, pantry_status: PantryStatus) {
        self.role = if role.matches_tag(&food.role_tag) {
            role
        } else {
            food.primary_role()
        };
        self.food = food;
        self.adjusted_g = self.planned_g;
        self.pantry_status = pantry_status;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Meal {
    pub id: i64,
    pub date: NaiveDate,
    pub slot: MealSlot,
    pub label: &'static str,
    pub items: Vec<MealItem>,
    pub planned_macros: MacroVector,
    pub adjusted_macros: MacroVector,
}

impl Meal {
    #[must_use]
    pub fn empty(id: i64, date: NaiveDate, slot: MealSlot) -> Self {
        Self {
            id,
            date,
            slot,
            label: slot.label(),
            items: Vec::new(),
            planned_macros: MacroVector::ZERO,
            adjusted_macros: MacroVector::ZERO,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Day {
    pub date: NaiveDate,
    pub is_training: bool,
    pub planned: MacroVector,
    pub adjusted: MacroVector,
    pub consumed: MacroVector,
    pub meals: Vec<Meal>,
}

impl Day {
    pub fn items(&self) -> impl Iterator<Item = &MealItem> {
        self.meals.iter().flat_map(|m| m.items.iter())
    }

    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut MealItem> {
        self.meals.iter_mut().flat_map(|m| m.items.iter_mut())
    }

    pub fn meal_mut(&mut self, meal_id: i64) -> Option<&mut Meal> {
        self.meals.iter_mut().find(|m| m.id == meal_id)
    }

    pub fn item_mut(&mut self, item_id: i64) -> Option<(MealSlot, &mut MealItem)> {
        self.meals.iter_mut().find_map(|m| {
            let slot = m.slot;
            m.items.iter_mut().find(|i| i.id == item_id).map(|i| (slot, i))
        })
    }
}

/// What `get_day` hands to callers: the ledger totals next to the target.
#[derive(Debug, Clone, Serialize)]
pub struct DayOverview {
    pub date: NaiveDate,
    pub is_training: bool,
    pub target: MacroVector,
    pub planned: MacroVector,
    pub adjusted: MacroVector,
    pub consumed: MacroVector,
}

// --- Pantry / shopping ---

/// Pantry lookup result; `Missing` means the food was never recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PantryStatus {
    Available,
    Out,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Available,
    Out,
}

impl From<StockStatus> for PantryStatus {
    fn from(s: StockStatus) -> Self {
        match s {
            StockStatus::Available => PantryStatus::Available,
            StockStatus::Out => PantryStatus::Out,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PantryEntry {
    pub id: i64,
    pub food_id: String,
    pub food_name: String,
    pub status: StockStatus,
    pub quantity: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShoppingStatus {
    Pending,
    Bought,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShoppingEntry {
    pub id: i64,
    pub food_id: String,
    pub food_name: String,
    pub quantity: f64,
    pub unit: String,
    pub status: ShoppingStatus,
    pub created_at: DateTime<Utc>,
}
