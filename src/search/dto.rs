use serde::Serialize;

use crate::fdc::normalize::Nutrients;
use crate::foods::repo_types::{Food, FoodSource, UserFood};

/// One searchable food in wire form. The `id` is a local UUID for stored
/// records and the synthetic `fdc-{id}` form for provider records that have
/// not been cached yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFood {
    pub id: String,
    pub fdc_id: Option<i64>,
    pub name: String,
    pub brand: Option<String>,
    pub data_type: Option<String>,
    pub serving_size: f64,
    pub serving_unit: String,
    #[serde(flatten)]
    pub nutrients: Nutrients,
    pub verified: bool,
    pub source: FoodSource,
}

impl From<Food> for SearchFood {
    fn from(food: Food) -> Self {
        Self {
            id: food.id.to_string(),
            fdc_id: food.fdc_id,
            name: food.name,
            brand: food.brand,
            data_type: None,
            serving_size: food.serving_size,
            serving_unit: food.serving_unit,
            nutrients: food.nutrients,
            verified: food.verified,
            source: food.source,
        }
    }
}

impl From<UserFood> for SearchFood {
    fn from(food: UserFood) -> Self {
        Self {
            id: food.id.to_string(),
            fdc_id: None,
            name: food.name,
            brand: food.brand,
            data_type: None,
            serving_size: food.serving_size,
            serving_unit: food.serving_unit,
            nutrients: food.nutrients,
            verified: false,
            source: FoodSource::Internal,
        }
    }
}

/// Two-tier search outcome: trusted records first, everything else below.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultSet {
    pub best_match: Vec<SearchFood>,
    pub more_results: Vec<SearchFood>,
    pub total: usize,
}
