use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::fdc::normalize::Nutrients;

use super::repo_types::{Food, FoodSource, ServingOption};

/// POST /foods/external body: the search result the user picked, plus the
/// provider id that deduplicates it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheExternalRequest {
    pub fdc_id: i64,
    pub name: String,
    pub brand: Option<String>,
    #[serde(default = "default_serving_size")]
    pub serving_size: f64,
    #[serde(default = "default_serving_unit")]
    pub serving_unit: String,
    #[serde(flatten)]
    pub nutrients: Nutrients,
}

fn default_serving_size() -> f64 {
    100.0
}

fn default_serving_unit() -> String {
    "g".to_owned()
}

/// `food_id` is null when the record could not be cached; the selection is
/// still usable, it just has no local reference yet.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheExternalResponse {
    pub food_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodDetails {
    pub id: Uuid,
    pub fdc_id: Option<i64>,
    pub name: String,
    pub brand: Option<String>,
    pub serving_size: f64,
    pub serving_unit: String,
    #[serde(flatten)]
    pub nutrients: Nutrients,
    pub verified: bool,
    pub source: FoodSource,
    pub created_at: OffsetDateTime,
    pub serving_options: Vec<ServingOption>,
}

impl FoodDetails {
    pub fn from_parts(food: Food, serving_options: Vec<ServingOption>) -> Self {
        Self {
            id: food.id,
            fdc_id: food.fdc_id,
            name: food.name,
            brand: food.brand,
            serving_size: food.serving_size,
            serving_unit: food.serving_unit,
            nutrients: food.nutrients,
            verified: food.verified,
            source: food.source,
            created_at: food.created_at,
            serving_options,
        }
    }
}
