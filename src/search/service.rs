use axum::async_trait;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::foods::repo;
use crate::foods::repo_types::{Food, UserFood};

use super::dto::{SearchFood, SearchResultSet};

/// Catalog access seam for local search. The shared partition is the
/// verified-first canonical catalog; the private partition is scoped to one
/// user.
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    async fn search_catalog(&self, query: &str, limit: i64) -> anyhow::Result<Vec<Food>>;
    async fn search_user_foods(
        &self,
        user_id: Uuid,
        query: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<UserFood>>;
}

pub struct PgCatalog {
    db: PgPool,
}

impl PgCatalog {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogSearch for PgCatalog {
    async fn search_catalog(&self, query: &str, limit: i64) -> anyhow::Result<Vec<Food>> {
        repo::search_catalog(&self.db, query, limit).await
    }

    async fn search_user_foods(
        &self,
        user_id: Uuid,
        query: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<UserFood>> {
        repo::search_user_foods(&self.db, user_id, query, limit).await
    }
}

/// Query both partitions concurrently and merge. The private partition only
/// runs for authenticated callers and gets about a third of the shared limit.
/// A failed partition logs and contributes nothing; the worst case is a
/// thinner result set, never a failed lookup.
pub async fn run_local_search(
    catalog: &dyn CatalogSearch,
    user_id: Option<Uuid>,
    query: &str,
    limit: i64,
) -> SearchResultSet {
    let private_limit = (limit / 3).max(1);

    let shared = catalog.search_catalog(query, limit);
    let private = async {
        match user_id {
            Some(user_id) => catalog.search_user_foods(user_id, query, private_limit).await,
            None => Ok(Vec::new()),
        }
    };
    let (shared, private) = tokio::join!(shared, private);

    let shared = shared.unwrap_or_else(|e| {
        warn!(error = %e, query, "shared catalog search failed");
        Vec::new()
    });
    let private = private.unwrap_or_else(|e| {
        warn!(error = %e, query, "private catalog search failed");
        Vec::new()
    });

    merge_results(shared, private)
}

/// Verified shared records are the best matches; private records come before
/// unverified shared records in the remainder.
pub fn merge_results(shared: Vec<Food>, private: Vec<UserFood>) -> SearchResultSet {
    let (verified, unverified): (Vec<_>, Vec<_>) =
        shared.into_iter().partition(|food| food.verified);

    let best_match: Vec<SearchFood> = verified.into_iter().map(SearchFood::from).collect();
    let mut more_results: Vec<SearchFood> = private.into_iter().map(SearchFood::from).collect();
    more_results.extend(unverified.into_iter().map(SearchFood::from));

    let total = best_match.len() + more_results.len();
    SearchResultSet {
        best_match,
        more_results,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fdc::normalize::Nutrients;
    use crate::foods::repo_types::FoodSource;
    use std::sync::Mutex;
    use time::OffsetDateTime;

    fn food(name: &str, verified: bool) -> Food {
        Food {
            id: Uuid::new_v4(),
            fdc_id: None,
            name: name.to_owned(),
            brand: None,
            serving_size: 100.0,
            serving_unit: "g".to_owned(),
            nutrients: Nutrients::default(),
            verified,
            source: FoodSource::Internal,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn user_food(name: &str) -> UserFood {
        UserFood {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            brand: None,
            serving_size: 100.0,
            serving_unit: "g".to_owned(),
            nutrients: Nutrients::default(),
        }
    }

    #[test]
    fn merge_tiers_verified_and_orders_private_first_in_the_remainder() {
        let shared = vec![
            food("Apple", true),
            food("Apple pie filling", false),
            food("Applesauce", true),
        ];
        let private = vec![user_food("Apple crumble (home)")];

        let merged = merge_results(shared, private);

        let best: Vec<_> = merged.best_match.iter().map(|f| f.name.as_str()).collect();
        let more: Vec<_> = merged.more_results.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(best, vec!["Apple", "Applesauce"]);
        assert_eq!(more, vec!["Apple crumble (home)", "Apple pie filling"]);
        assert_eq!(merged.total, 4);
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        let merged = merge_results(Vec::new(), Vec::new());
        assert_eq!(merged, SearchResultSet::default());
    }

    #[derive(Default)]
    struct RecordingCatalog {
        foods: Vec<Food>,
        user_foods: Vec<UserFood>,
        fail_shared: bool,
        fail_private: bool,
        private_limits: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl CatalogSearch for RecordingCatalog {
        async fn search_catalog(&self, _query: &str, _limit: i64) -> anyhow::Result<Vec<Food>> {
            if self.fail_shared {
                anyhow::bail!("catalog offline");
            }
            Ok(self.foods.clone())
        }

        async fn search_user_foods(
            &self,
            _user_id: Uuid,
            _query: &str,
            limit: i64,
        ) -> anyhow::Result<Vec<UserFood>> {
            self.private_limits.lock().expect("lock").push(limit);
            if self.fail_private {
                anyhow::bail!("private catalog offline");
            }
            Ok(self.user_foods.clone())
        }
    }

    #[tokio::test]
    async fn anonymous_lookup_skips_the_private_partition() {
        let catalog = RecordingCatalog {
            foods: vec![food("Oats", true)],
            user_foods: vec![user_food("My oats")],
            ..RecordingCatalog::default()
        };

        let results = run_local_search(&catalog, None, "oat", 30).await;

        assert_eq!(results.best_match.len(), 1);
        assert!(results.more_results.is_empty());
        assert!(
            catalog.private_limits.lock().expect("lock").is_empty(),
            "anonymous callers must not touch the private catalog"
        );
    }

    #[tokio::test]
    async fn private_partition_gets_a_third_of_the_limit() {
        let catalog = RecordingCatalog::default();

        run_local_search(&catalog, Some(Uuid::new_v4()), "oat", 30).await;
        run_local_search(&catalog, Some(Uuid::new_v4()), "oat", 2).await;

        let limits = catalog.private_limits.lock().expect("lock").clone();
        assert_eq!(limits, vec![10, 1], "limit/3 with a floor of one");
    }

    #[tokio::test]
    async fn failed_shared_partition_degrades_to_private_results_only() {
        let catalog = RecordingCatalog {
            foods: vec![food("Oats", true)],
            user_foods: vec![user_food("My oats")],
            fail_shared: true,
            ..RecordingCatalog::default()
        };

        let results = run_local_search(&catalog, Some(Uuid::new_v4()), "oat", 30).await;

        assert!(results.best_match.is_empty());
        let more: Vec<_> = results.more_results.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(more, vec!["My oats"]);
        assert_eq!(results.total, 1);
    }

    #[tokio::test]
    async fn failed_private_partition_keeps_shared_results() {
        let catalog = RecordingCatalog {
            foods: vec![food("Oats", true), food("Oat bran", false)],
            fail_private: true,
            ..RecordingCatalog::default()
        };

        let results = run_local_search(&catalog, Some(Uuid::new_v4()), "oat", 30).await;

        assert_eq!(results.best_match.len(), 1);
        assert_eq!(results.more_results.len(), 1);
        assert_eq!(results.total, 2);
    }
}
