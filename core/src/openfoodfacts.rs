use serde::Deserialize;

use crate::models::NewFood;

#[derive(Debug, Deserialize)]
pub struct ProductResponse {
    #[serde(default)]
    pub status: Option<i32>,
    pub product: Option<ProductData>,
}

impl ProductResponse {
    /// The mapped food, or `None` when the lookup found nothing.
    #[must_use]
    pub fn into_food(self, code: &str) -> Option<NewFood> {
        if self.status == Some(0) {
            return None;
        }
        self.product.map(|p| product_to_food(p, code))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductData {
    pub product_name: Option<String>,
    pub generic_name: Option<String>,
    pub brands: Option<String>,
    pub code: Option<String>,
    pub nutriments: Option<Nutriments>,
}

#[derive(Debug, Default, Deserialize)]
#[allow(clippy::struct_field_names)]
pub struct Nutriments {
    #[serde(rename = "energy-kcal_100g")]
    pub energy_kcal_100g: Option<f64>,
    pub proteins_100g: Option<f64>,
    pub carbohydrates_100g: Option<f64>,
    pub fat_100g: Option<f64>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Map an OpenFoodFacts product onto a user-defined food.
///
/// Missing macros count as zero. Only the first listed brand is kept.
#[must_use]
pub fn product_to_food(p: ProductData, code: &str) -> NewFood {
    let name = non_empty(p.product_name)
        .or_else(|| non_empty(p.generic_name))
        .unwrap_or_else(|| format!("Product {code}"));
    let brand = p
        .brands
        .as_deref()
        .and_then(|b| b.split(',').next())
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(ToString::to_string);
    let barcode = non_empty(p.code).unwrap_or_else(|| code.to_string());
    let n = p.nutriments.unwrap_or_default();

    NewFood {
        name,
        brand,
        barcode: Some(barcode),
        kcal_per_100g: n.energy_kcal_100g.unwrap_or(0.0),
        protein_per_100g: n.proteins_100g.unwrap_or(0.0),
        carbs_per_100g: n.carbohydrates_100g.unwrap_or(0.0),
        fat_per_100g: n.fat_100g.unwrap_or(0.0),
        allowed_slots: None,
    }
}
