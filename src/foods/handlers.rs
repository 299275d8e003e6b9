use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

use super::dto::{CacheExternalRequest, CacheExternalResponse, FoodDetails};
use super::repo::{self, NewExternalFood};
use super::services::{get_or_create_food, PgFoodStore};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/foods/external", post(cache_external_food))
        .route("/foods/:id", get(get_food))
}

/// POST /foods/external
///
/// Cache-on-selection: called when the user picks an external search result.
/// A failed write degrades to `foodId: null` instead of failing the request;
/// the client keeps the raw result either way.
#[instrument(skip(state, body))]
pub async fn cache_external_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CacheExternalRequest>,
) -> Result<Json<CacheExternalResponse>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".into()));
    }
    if body.fdc_id <= 0 {
        return Err(ApiError::Validation("fdcId must be a positive integer".into()));
    }

    let new = NewExternalFood {
        fdc_id: body.fdc_id,
        name: body.name.trim().to_owned(),
        brand: body.brand,
        serving_size: body.serving_size,
        serving_unit: body.serving_unit,
        nutrients: body.nutrients,
    };

    let store = PgFoodStore::new(state.db.clone());
    let food_id = match get_or_create_food(&store, &new).await {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(error = %e, %user_id, fdc_id = new.fdc_id, "selection not cached");
            None
        }
    };

    Ok(Json(CacheExternalResponse { food_id }))
}

#[instrument(skip(state))]
pub async fn get_food(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FoodDetails>, ApiError> {
    let food = repo::get_food(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Food"))?;
    let options = repo::list_serving_options(&state.db, id).await?;
    Ok(Json(FoodDetails::from_parts(food, options)))
}
