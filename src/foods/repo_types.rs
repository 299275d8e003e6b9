use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::fdc::normalize::Nutrients;

/// Where a canonical record came from. `Fdc` records carry the provider id
/// that deduplicates them; `Internal` records never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "food_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FoodSource {
    Internal,
    Fdc,
}

/// A row of the shared catalog.
#[derive(Debug, Clone, FromRow)]
pub struct Food {
    pub id: Uuid,
    pub fdc_id: Option<i64>,
    pub name: String,
    pub brand: Option<String>,
    pub serving_size: f64,
    pub serving_unit: String,
    #[sqlx(flatten)]
    pub nutrients: Nutrients,
    pub verified: bool,
    pub source: FoodSource,
    pub created_at: OffsetDateTime,
}

/// A row of one user's private catalog, as search consumes it.
#[derive(Debug, Clone, FromRow)]
pub struct UserFood {
    pub id: Uuid,
    pub name: String,
    pub brand: Option<String>,
    pub serving_size: f64,
    pub serving_unit: String,
    #[sqlx(flatten)]
    pub nutrients: Nutrients,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServingOption {
    pub id: Uuid,
    pub label: String,
    pub grams: f64,
    pub is_default: bool,
}
