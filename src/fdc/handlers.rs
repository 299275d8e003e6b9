use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use tracing::{error, instrument, warn};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

use super::dto::{SearchFoodsParams, SearchFoodsResponse};
use super::normalize::{partition_by_tier, to_search_food};

pub fn router() -> Router<AppState> {
    Router::new().route("/search-foods", get(search_foods))
}

/// GET /search-foods?query=&pageSize=&pageNumber=&dataType=
///
/// Validates, counts the request against the caller's rate limit window, then
/// queries the provider and splits the normalized records into tiers. The
/// remaining quota rides back on `X-RateLimit-Remaining`.
#[instrument(skip(state))]
pub async fn search_foods(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<SearchFoodsParams>,
) -> Result<(HeaderMap, Json<SearchFoodsResponse>), ApiError> {
    let query = params.validate().map_err(ApiError::Validation)?;

    let admission = state.limiter.admit(user_id);
    if !admission.allowed {
        warn!(%user_id, reset_at = %admission.reset_at, "food search rate limit exceeded");
        return Err(ApiError::RateLimited {
            reset_at: admission.reset_at.unix_timestamp(),
        });
    }

    let upstream = state.fdc.search(&query).await.map_err(|e| {
        error!(error = %e, %user_id, query = %query.query, "food data provider search failed");
        ApiError::from(e)
    })?;

    let foods: Vec<_> = upstream.foods.iter().map(to_search_food).collect();
    let (best_match, more_results) = partition_by_tier(foods.clone());

    let mut headers = HeaderMap::new();
    if let Ok(value) = admission.remaining.to_string().parse() {
        headers.insert("X-RateLimit-Remaining", value);
    }

    Ok((
        headers,
        Json(SearchFoodsResponse {
            foods,
            best_match,
            more_results,
            total_hits: upstream.total_hits,
            current_page: upstream.current_page,
            total_pages: upstream.total_pages,
        }),
    ))
}
