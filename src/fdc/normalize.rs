use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::fdc::dto::{FdcFood, FdcFoodNutrient};
use crate::foods::repo_types::FoodSource;
use crate::search::dto::SearchFood;

/// The ten nutrient fields every food in the system carries, per 100g or per
/// the record's serving. Values default to 0 rather than null so consumers
/// never branch on missing nutrients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase", default)]
pub struct Nutrients {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
    pub sugar: f64,
    pub sodium: f64,
    pub saturated_fat: f64,
    pub cholesterol: f64,
    pub potassium: f64,
}

type FieldMut = for<'a> fn(&'a mut Nutrients) -> &'a mut f64;

lazy_static! {
    /// FoodData Central nutrient numbers for the fields we track. Anything
    /// not listed here is ignored on purpose.
    static ref NUTRIENT_FIELDS: HashMap<i64, FieldMut> = {
        let mut fields: HashMap<i64, FieldMut> = HashMap::new();
        fields.insert(1008, |n| &mut n.calories); // Energy (kcal)
        fields.insert(1003, |n| &mut n.protein);
        fields.insert(1005, |n| &mut n.carbs); // Carbohydrate, by difference
        fields.insert(1004, |n| &mut n.fat); // Total lipid
        fields.insert(1079, |n| &mut n.fiber);
        fields.insert(2000, |n| &mut n.sugar); // Total sugars
        fields.insert(1093, |n| &mut n.sodium);
        fields.insert(1258, |n| &mut n.saturated_fat);
        fields.insert(1253, |n| &mut n.cholesterol);
        fields.insert(1092, |n| &mut n.potassium);
        fields
    };
}

/// Provider data-quality tags treated as curated. These are FoodData
/// Central's two lab-analyzed datasets; everything else (Branded, Survey) is
/// user- or vendor-reported.
pub const CURATED_DATA_TYPES: [&str; 2] = ["Foundation", "SR Legacy"];

/// Fold a provider nutrient list into the canonical vector. Entries with
/// unmapped ids or no value are skipped; a repeated id overwrites (last write
/// wins).
pub fn normalize(raw: &[FdcFoodNutrient]) -> Nutrients {
    let mut nutrients = Nutrients::default();
    for entry in raw {
        if let (Some(field), Some(value)) = (NUTRIENT_FIELDS.get(&entry.nutrient_id), entry.value)
        {
            *field(&mut nutrients) = value;
        }
    }
    nutrients
}

pub fn is_curated(data_type: Option<&str>) -> bool {
    data_type.map_or(false, |tag| CURATED_DATA_TYPES.contains(&tag))
}

/// Stable local identifier for an uncached provider record. Repeated searches
/// for the same item must yield the same id.
pub fn synthetic_id(fdc_id: i64) -> String {
    format!("fdc-{fdc_id}")
}

/// Shape a raw provider record into the search wire form.
pub fn to_search_food(food: &FdcFood) -> SearchFood {
    SearchFood {
        id: synthetic_id(food.fdc_id),
        fdc_id: Some(food.fdc_id),
        name: food.description.clone(),
        brand: food.brand_owner.clone().or_else(|| food.brand_name.clone()),
        data_type: food.data_type.clone(),
        serving_size: food.serving_size.unwrap_or(100.0),
        serving_unit: food
            .serving_size_unit
            .clone()
            .unwrap_or_else(|| "g".to_owned()),
        nutrients: normalize(&food.food_nutrients),
        verified: is_curated(food.data_type.as_deref()),
        source: FoodSource::Fdc,
    }
}

/// Split normalized provider records into the curated tier and the rest,
/// preserving provider order within each tier.
pub fn partition_by_tier(foods: Vec<SearchFood>) -> (Vec<SearchFood>, Vec<SearchFood>) {
    foods
        .into_iter()
        .partition(|food| is_curated(food.data_type.as_deref()))
}
