use serde::{Deserialize, Serialize};

use crate::search::dto::SearchFood;

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MIN_QUERY_CHARS: usize = 2;
pub const MAX_QUERY_CHARS: usize = 100;

/// Raw query parameters as they arrive on `GET /search-foods`. Page values
/// are kept as strings until validated so a malformed number is a 400, not a
/// deserialization failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFoodsParams {
    pub query: Option<String>,
    pub page_size: Option<String>,
    pub page_number: Option<String>,
    pub data_type: Option<String>,
}

/// Parameters that passed validation and are safe to send upstream.
#[derive(Debug, Clone)]
pub struct FdcSearchQuery {
    pub query: String,
    pub page_size: u32,
    pub page_number: u32,
    pub data_type: Option<String>,
}

impl SearchFoodsParams {
    pub fn validate(self) -> Result<FdcSearchQuery, String> {
        let query = self
            .query
            .map(|q| q.trim().to_owned())
            .filter(|q| !q.is_empty())
            .ok_or_else(|| "Search query is required".to_owned())?;

        let chars = query.chars().count();
        if !(MIN_QUERY_CHARS..=MAX_QUERY_CHARS).contains(&chars) {
            return Err(format!(
                "Search query must be between {MIN_QUERY_CHARS} and {MAX_QUERY_CHARS} characters"
            ));
        }

        let page_size = match self.page_size {
            None => DEFAULT_PAGE_SIZE,
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| (1..=50).contains(n))
                .ok_or_else(|| "pageSize must be an integer between 1 and 50".to_owned())?,
        };

        let page_number = match self.page_number {
            None => 1,
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| "pageNumber must be a positive integer".to_owned())?,
        };

        let data_type = self
            .data_type
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());

        Ok(FdcSearchQuery {
            query,
            page_size,
            page_number,
            data_type,
        })
    }
}

/// Body of a FoodData Central `/foods/search` response. Fields we do not use
/// are simply ignored on deserialization.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FdcSearchResponse {
    #[serde(default)]
    pub total_hits: i64,
    #[serde(default)]
    pub current_page: i64,
    #[serde(default)]
    pub total_pages: i64,
    #[serde(default)]
    pub foods: Vec<FdcFood>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FdcFood {
    pub fdc_id: i64,
    pub description: String,
    pub data_type: Option<String>,
    pub brand_owner: Option<String>,
    pub brand_name: Option<String>,
    pub serving_size: Option<f64>,
    pub serving_size_unit: Option<String>,
    #[serde(default)]
    pub food_nutrients: Vec<FdcFoodNutrient>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FdcFoodNutrient {
    pub nutrient_id: i64,
    pub value: Option<f64>,
}

/// What `GET /search-foods` returns: every normalized record in provider
/// order, plus the two tiers, plus the provider's paging counters.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFoodsResponse {
    pub foods: Vec<SearchFood>,
    pub best_match: Vec<SearchFood>,
    pub more_results: Vec<SearchFood>,
    pub total_hits: i64,
    pub current_page: i64,
    pub total_pages: i64,
}
