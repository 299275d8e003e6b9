use axum::async_trait;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::repo::{self, NewExternalFood};

/// Narrow store seam for the cache-on-selection flow. One canonical record
/// per provider id is the store's invariant, not the application's: a
/// conflicting insert reports `None` instead of erroring.
#[async_trait]
pub trait FoodStore: Send + Sync {
    async fn find_by_fdc_id(&self, fdc_id: i64) -> anyhow::Result<Option<Uuid>>;
    async fn insert_external(&self, new: &NewExternalFood) -> anyhow::Result<Option<Uuid>>;
    async fn insert_default_serving(
        &self,
        food_id: Uuid,
        label: &str,
        grams: f64,
    ) -> anyhow::Result<()>;
}

pub struct PgFoodStore {
    db: PgPool,
}

impl PgFoodStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FoodStore for PgFoodStore {
    async fn find_by_fdc_id(&self, fdc_id: i64) -> anyhow::Result<Option<Uuid>> {
        repo::find_food_id_by_fdc_id(&self.db, fdc_id).await
    }

    async fn insert_external(&self, new: &NewExternalFood) -> anyhow::Result<Option<Uuid>> {
        repo::insert_external_food(&self.db, new).await
    }

    async fn insert_default_serving(
        &self,
        food_id: Uuid,
        label: &str,
        grams: f64,
    ) -> anyhow::Result<()> {
        repo::insert_serving_option(&self.db, food_id, label, grams, true).await?;
        Ok(())
    }
}

/// Return the local id for a provider record, inserting it on first sight.
///
/// A repeat call with the same `fdc_id` is a pure read and never rewrites the
/// stored nutrients. When two first-time calls race, the loser re-reads the
/// winner's row. A fresh record also gets the provider's serving recorded as
/// its default serving option; failure there is logged and swallowed since
/// the record itself is already usable.
pub async fn get_or_create_food(
    store: &dyn FoodStore,
    new: &NewExternalFood,
) -> anyhow::Result<Uuid> {
    if let Some(existing) = store.find_by_fdc_id(new.fdc_id).await? {
        return Ok(existing);
    }

    let inserted = store.insert_external(new).await.map_err(|e| {
        error!(error = %e, fdc_id = new.fdc_id, name = %new.name, "failed to cache external food");
        e
    })?;

    if let Some(id) = inserted {
        info!(%id, fdc_id = new.fdc_id, "cached external food");
        let label = format!("{} {}", new.serving_size, new.serving_unit);
        if let Err(e) = store.insert_default_serving(id, &label, new.serving_size).await {
            warn!(error = %e, %id, "default serving option not recorded");
        }
        return Ok(id);
    }

    // Lost the insert race; the uniqueness constraint guarantees a row exists.
    match store.find_by_fdc_id(new.fdc_id).await? {
        Some(id) => Ok(id),
        None => anyhow::bail!("food with fdc_id {} missing after insert conflict", new.fdc_id),
    }
}
