use sqlx::PgPool;
use uuid::Uuid;

use crate::fdc::normalize::Nutrients;

use super::repo_types::{Food, ServingOption, UserFood};

/// Insert parameters for a provider record being cached locally. Cached rows
/// are always `verified` and `source = 'fdc'`.
#[derive(Debug, Clone)]
pub struct NewExternalFood {
    pub fdc_id: i64,
    pub name: String,
    pub brand: Option<String>,
    pub serving_size: f64,
    pub serving_unit: String,
    pub nutrients: Nutrients,
}

pub async fn find_food_id_by_fdc_id(db: &PgPool, fdc_id: i64) -> anyhow::Result<Option<Uuid>> {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id FROM foods WHERE fdc_id = $1
    "#,
    )
    .bind(fdc_id)
    .fetch_optional(db)
    .await?;
    Ok(id)
}

/// Insert a cached provider record. Returns `None` when another insert with
/// the same `fdc_id` won the race; callers re-read the existing row instead
/// of treating that as an error.
pub async fn insert_external_food(db: &PgPool, new: &NewExternalFood) -> anyhow::Result<Option<Uuid>> {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO foods (id, fdc_id, name, brand, serving_size, serving_unit,
                           calories, protein, carbs, fat, fiber, sugar, sodium,
                           saturated_fat, cholesterol, potassium, verified, source)
        VALUES ($1, $2, $3, $4, $5, $6,
                $7, $8, $9, $10, $11, $12, $13,
                $14, $15, $16, TRUE, 'fdc')
        ON CONFLICT (fdc_id) DO NOTHING
        RETURNING id
    "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.fdc_id)
    .bind(&new.name)
    .bind(&new.brand)
    .bind(new.serving_size)
    .bind(&new.serving_unit)
    .bind(new.nutrients.calories)
    .bind(new.nutrients.protein)
    .bind(new.nutrients.carbs)
    .bind(new.nutrients.fat)
    .bind(new.nutrients.fiber)
    .bind(new.nutrients.sugar)
    .bind(new.nutrients.sodium)
    .bind(new.nutrients.saturated_fat)
    .bind(new.nutrients.cholesterol)
    .bind(new.nutrients.potassium)
    .fetch_optional(db)
    .await?;
    Ok(id)
}

pub async fn get_food(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Food>> {
    let food = sqlx::query_as::<_, Food>(
        r#"
        SELECT id, fdc_id, name, brand, serving_size, serving_unit,
               calories, protein, carbs, fat, fiber, sugar, sodium,
               saturated_fat, cholesterol, potassium, verified, source, created_at
        FROM foods
        WHERE id = $1
    "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(food)
}

pub async fn list_serving_options(db: &PgPool, food_id: Uuid) -> anyhow::Result<Vec<ServingOption>> {
    let options = sqlx::query_as::<_, ServingOption>(
        r#"
        SELECT id, label, grams, is_default
        FROM serving_options
        WHERE food_id = $1
        ORDER BY is_default DESC, label ASC
    "#,
    )
    .bind(food_id)
    .fetch_all(db)
    .await?;
    Ok(options)
}

pub async fn insert_serving_option(
    db: &PgPool,
    food_id: Uuid,
    label: &str,
    grams: f64,
    is_default: bool,
) -> anyhow::Result<Uuid> {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO serving_options (id, food_id, label, grams, is_default)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    "#,
    )
    .bind(Uuid::new_v4())
    .bind(food_id)
    .bind(label)
    .bind(grams)
    .bind(is_default)
    .fetch_one(db)
    .await?;
    Ok(id)
}

pub async fn search_catalog(db: &PgPool, query: &str, limit: i64) -> anyhow::Result<Vec<Food>> {
    let foods = sqlx::query_as::<_, Food>(
        r#"
        SELECT id, fdc_id, name, brand, serving_size, serving_unit,
               calories, protein, carbs, fat, fiber, sugar, sodium,
               saturated_fat, cholesterol, potassium, verified, source, created_at
        FROM foods
        WHERE name ILIKE $1
        ORDER BY verified DESC, name ASC
        LIMIT $2
    "#,
    )
    .bind(like_pattern(query))
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(foods)
}

pub async fn search_user_foods(
    db: &PgPool,
    user_id: Uuid,
    query: &str,
    limit: i64,
) -> anyhow::Result<Vec<UserFood>> {
    let foods = sqlx::query_as::<_, UserFood>(
        r#"
        SELECT id, name, brand, serving_size, serving_unit,
               calories, protein, carbs, fat, fiber, sugar, sodium,
               saturated_fat, cholesterol, potassium
        FROM user_foods
        WHERE user_id = $1 AND name ILIKE $2
        ORDER BY name ASC
        LIMIT $3
    "#,
    )
    .bind(user_id)
    .bind(like_pattern(query))
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(foods)
}

/// Substring pattern for ILIKE with the user's text escaped so `%`/`_` match
/// literally.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
