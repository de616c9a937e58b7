use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{PoisonError, RwLock};

use anyhow::{Context, bail};

use crate::error::{PlanError, Result};
use crate::models::{
    Food, FoodSource, NewFood, infer_role, parse_allowed_slots, validate_new_food,
};

/// Header aliases accepted for each catalog column, matched case-insensitively.
const NAME_COLS: &[&str] = &["name", "nombre"];
const ID_COLS: &[&str] = &["id"];
const BRAND_COLS: &[&str] = &["brand", "marca"];
const CODE_COLS: &[&str] = &["code", "barcode", "ean"];
const KCAL_COLS: &[&str] = &["kcal_100g", "kcal_per_100g"];
const PROTEIN_COLS: &[&str] = &["protein_100g", "protein_per_100g", "proteina_100g"];
const CARBS_COLS: &[&str] = &["carbs_100g", "carbs_per_100g", "hidratos_100g"];
const FAT_COLS: &[&str] = &["fat_100g", "fat_per_100g", "grasas_100g"];
const ROLE_COLS: &[&str] = &["role", "rol_principal"];
const ALLOWED_COLS: &[&str] = &["allowed_meals", "permitido_comidas"];

/// Spreadsheet exports sometimes turn product codes into floats (`8410.0`).
fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim();
    let code = code.strip_suffix(".0").filter(|c| c.chars().all(|ch| ch.is_ascii_digit())).unwrap_or(code);
    (!code.is_empty()).then(|| code.to_string())
}

/// Stable id for a catalog row: `code:<code>` or `fresh:<name>`.
#[must_use]
pub fn catalog_id(name: &str, code: Option<&str>) -> String {
    match code {
        Some(code) => format!("code:{code}"),
        None => format!("fresh:{}", name.trim().to_lowercase()),
    }
}

/// Parse a catalog CSV from any reader.
///
/// Only the name column is required. Missing numeric cells read as zero;
/// rows without a name are skipped, as are repeated ids (first one wins).
pub fn parse_catalog_csv<R: Read>(reader: R) -> anyhow::Result<Vec<Food>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();

    let col = |names: &[&str]| -> Option<usize> {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
    };

    let Some(idx_name) = col(NAME_COLS) else {
        bail!("Missing required column: name");
    };
    let idx_id = col(ID_COLS);
    let idx_brand = col(BRAND_COLS);
    let idx_code = col(CODE_COLS);
    let idx_kcal = col(KCAL_COLS);
    let idx_protein = col(PROTEIN_COLS);
    let idx_carbs = col(CARBS_COLS);
    let idx_fat = col(FAT_COLS);
    let idx_role = col(ROLE_COLS);
    let idx_allowed = col(ALLOWED_COLS);

    let mut foods = Vec::new();
    let mut seen = HashSet::new();

    for (line_num, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse CSV row {}", line_num + 2))?;

        let text = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("").trim();
        let number = |idx: Option<usize>| -> f64 {
            text(idx).replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
        };

        let name = text(Some(idx_name));
        if name.is_empty() {
            continue;
        }
        let code = normalize_code(text(idx_code));
        let id = match text(idx_id) {
            "" => catalog_id(name, code.as_deref()),
            explicit => explicit.to_string(),
        };
        if !seen.insert(id.clone()) {
            tracing::debug!(food_id = %id, row = line_num + 2, "duplicate catalog id skipped");
            continue;
        }

        let brand = Some(text(idx_brand)).filter(|b| !b.is_empty()).map(ToString::to_string);

        foods.push(Food {
            id,
            name: name.to_string(),
            brand,
            barcode: code,
            kcal_per_100g: number(idx_kcal),
            protein_per_100g: number(idx_protein),
            carbs_per_100g: number(idx_carbs),
            fat_per_100g: number(idx_fat),
            role_tag: text(idx_role).to_string(),
            allowed_slots: parse_allowed_slots(text(idx_allowed)),
            source: FoodSource::Catalog,
        });
    }

    Ok(foods)
}

pub fn load_catalog_file(path: &Path) -> anyhow::Result<Vec<Food>> {
    let file = File::open(path).with_context(|| format!("Failed to open catalog {}", path.display()))?;
    parse_catalog_csv(file).with_context(|| format!("Failed to load catalog {}", path.display()))
}

/// Catalog rows plus the foods created at runtime.
pub struct Catalog {
    master: RwLock<Vec<Food>>,
    custom: RwLock<Vec<Food>>,
    next_custom: AtomicI64,
}

impl Catalog {
    #[must_use]
    pub fn new(foods: Vec<Food>) -> Self {
        Self {
            master: RwLock::new(foods),
            custom: RwLock::new(Vec::new()),
            next_custom: AtomicI64::new(1),
        }
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let foods = load_catalog_file(path)?;
        tracing::info!(path = %path.display(), foods = foods.len(), "catalog loaded");
        Ok(Self::new(foods))
    }

    /// Replace the catalog rows; user-defined foods are kept.
    pub fn replace_master(&self, foods: Vec<Food>) {
        *self.master.write().unwrap_or_else(PoisonError::into_inner) = foods;
    }

    /// Re-read the catalog file. Returns the new row count.
    pub fn reload(&self, path: &Path) -> anyhow::Result<usize> {
        let foods = load_catalog_file(path)?;
        let count = foods.len();
        self.replace_master(foods);
        tracing::info!(path = %path.display(), foods = count, "catalog reloaded");
        Ok(count)
    }

    /// User-defined foods first, then catalog rows.
    #[must_use]
    pub fn list_foods(&self) -> Vec<Food> {
        let custom = self.custom.read().unwrap_or_else(PoisonError::into_inner);
        let master = self.master.read().unwrap_or_else(PoisonError::into_inner);
        custom.iter().chain(master.iter()).cloned().collect()
    }

    pub fn get(&self, id: &str) -> Result<Food> {
        let custom = self.custom.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(food) = custom.iter().find(|f| f.id == id) {
            return Ok(food.clone());
        }
        drop(custom);
        self.master
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or_else(|| PlanError::not_found("food", id))
    }

    #[must_use]
    pub fn find_by_barcode(&self, code: &str) -> Option<Food> {
        let code = code.trim();
        self.list_foods()
            .into_iter()
            .find(|f| f.barcode.as_deref() == Some(code))
    }

    /// Case-insensitive name substring or product-code substring match.
    /// An empty query matches nothing.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<Food> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return Vec::new();
        }
        self.list_foods()
            .into_iter()
            .filter(|f| {
                f.name.to_lowercase().contains(&q)
                    || f.barcode.as_deref().is_some_and(|c| c.contains(&q))
            })
            .take(limit)
            .collect()
    }

    /// Create a user-defined food with an inferred role.
    pub fn add_custom(&self, new: NewFood) -> Result<Food> {
        validate_new_food(&new)?;
        let id = format!("custom:{}", self.next_custom.fetch_add(1, Ordering::Relaxed));
        let role = infer_role(new.protein_per_100g, new.carbs_per_100g, new.fat_per_100g);
        let food = Food {
            id,
            name: new.name.trim().to_string(),
            brand: new.brand.filter(|b| !b.trim().is_empty()),
            barcode: new.barcode.and_then(|c| normalize_code(&c)),
            kcal_per_100g: new.kcal_per_100g,
            protein_per_100g: new.protein_per_100g,
            carbs_per_100g: new.carbs_per_100g,
            fat_per_100g: new.fat_per_100g,
            role_tag: role.as_str().to_string(),
            allowed_slots: parse_allowed_slots(new.allowed_slots.as_deref().unwrap_or("")),
            source: FoodSource::UserDefined,
        };
        tracing::info!(food_id = %food.id, food_name = %food.name, role = %role, "user food created");
        self.custom
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(0, food.clone());
        Ok(food)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.master.read().unwrap_or_else(PoisonError::into_inner).len()
            + self.custom.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
