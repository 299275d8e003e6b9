use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::fdc::dto::MIN_QUERY_CHARS;

use super::dto::SearchResultSet;
use super::service::{run_local_search, CatalogSearch};

/// Publish slot guarded by two counters: `issued` bumps the moment a query
/// change arrives, `published` tracks what the watch channel currently shows.
/// A completed lookup only lands while its sequence is still the newest
/// issued one, so correctness never depends on cancellation signals reaching
/// a task in time.
struct PublishSlot {
    issued: AtomicU64,
    published: Mutex<u64>,
    tx: watch::Sender<SearchResultSet>,
}

impl PublishSlot {
    fn next_seq(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn publish(&self, seq: u64, results: SearchResultSet) {
        let mut published = self.published.lock().unwrap_or_else(|e| e.into_inner());
        // A superseded task can still complete: cancellation only lands at a
        // yield point, and a store call already past its last one runs
        // through to here. The issued check discards such results even when
        // the newer lookup has not published anything yet.
        if seq == self.issued.load(Ordering::SeqCst) && seq > *published {
            *published = seq;
            self.tx.send_replace(results);
        }
    }
}

/// Debounced search pipeline for one caller session. Every query change
/// supersedes the previous one: the pending lookup is aborted and, should it
/// still complete, its results are discarded by the publish guard. Dropping
/// the orchestrator cancels any outstanding lookup.
pub struct SearchOrchestrator<S: CatalogSearch + 'static> {
    catalog: Arc<S>,
    user_id: Option<Uuid>,
    debounce: Duration,
    result_limit: i64,
    slot: Arc<PublishSlot>,
    in_flight: Mutex<Option<(u64, JoinHandle<()>)>>,
}

impl<S: CatalogSearch + 'static> SearchOrchestrator<S> {
    pub fn new(catalog: Arc<S>, user_id: Option<Uuid>, config: &SearchConfig) -> Self {
        let (tx, _) = watch::channel(SearchResultSet::default());
        Self {
            catalog,
            user_id,
            debounce: Duration::from_millis(config.debounce_ms),
            result_limit: config.result_limit,
            slot: Arc::new(PublishSlot {
                issued: AtomicU64::new(0),
                published: Mutex::new(0),
                tx,
            }),
            in_flight: Mutex::new(None),
        }
    }

    /// Feed the current query text. Only the last call within the debounce
    /// window actually reaches the store; text below the minimum length
    /// clears the results immediately with no store access.
    pub fn on_query_change(&self, text: &str) {
        let seq = self.slot.next_seq();

        let query = text.trim().to_owned();
        if query.chars().count() < MIN_QUERY_CHARS {
            self.retire(seq);
            self.slot.publish(seq, SearchResultSet::default());
            return;
        }

        let catalog = Arc::clone(&self.catalog);
        let slot = Arc::clone(&self.slot);
        let user_id = self.user_id;
        let debounce = self.debounce;
        let limit = self.result_limit;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let results = run_local_search(catalog.as_ref(), user_id, &query, limit).await;
            slot.publish(seq, results);
        });
        self.register(seq, handle);
    }

    /// The latest published result set.
    pub fn results(&self) -> SearchResultSet {
        self.slot.tx.borrow().clone()
    }

    /// Watch published results change; lets a live session push updates as
    /// they land instead of polling.
    pub fn subscribe(&self) -> watch::Receiver<SearchResultSet> {
        self.slot.tx.subscribe()
    }

    /// Swap `handle` in as the in-flight lookup, cancelling the one it
    /// supersedes. The newest sequence keeps the slot no matter the order
    /// interleaved callers arrive in.
    fn register(&self, seq: u64, handle: JoinHandle<()>) {
        let mut in_flight = self.lock_in_flight();
        if in_flight.as_ref().map_or(false, |(current, _)| *current > seq) {
            handle.abort();
            return;
        }
        if let Some((_, previous)) = in_flight.replace((seq, handle)) {
            previous.abort();
        }
    }

    /// Cancel the in-flight lookup, unless a newer one already holds the slot.
    fn retire(&self, seq: u64) {
        let mut in_flight = self.lock_in_flight();
        if in_flight.as_ref().map_or(false, |(current, _)| *current < seq) {
            if let Some((_, previous)) = in_flight.take() {
                previous.abort();
            }
        }
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<(u64, JoinHandle<()>)>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<S: CatalogSearch + 'static> Drop for SearchOrchestrator<S> {
    fn drop(&mut self) {
        let in_flight = self.in_flight.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some((_, handle)) = in_flight.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fdc::normalize::Nutrients;
    use crate::foods::repo_types::{Food, FoodSource, UserFood};
    use crate::search::service::merge_results;
    use axum::async_trait;
    use std::collections::HashMap;
    use time::OffsetDateTime;
    use tokio::sync::oneshot;

    fn config() -> SearchConfig {
        SearchConfig {
            debounce_ms: 300,
            result_limit: 30,
        }
    }

    fn verified_food(name: &str) -> Food {
        Food {
            id: Uuid::new_v4(),
            fdc_id: None,
            name: name.to_owned(),
            brand: None,
            serving_size: 100.0,
            serving_unit: "g".to_owned(),
            nutrients: Nutrients::default(),
            verified: true,
            source: FoodSource::Internal,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn published_set(name: &str) -> SearchResultSet {
        merge_results(vec![verified_food(name)], Vec::new())
    }

    /// Echoes the query back as a single verified food, recording every
    /// lookup that actually reaches the store.
    #[derive(Default)]
    struct ScriptedCatalog {
        queries: Mutex<Vec<String>>,
        delays: HashMap<String, Duration>,
    }

    impl ScriptedCatalog {
        fn with_delay(query: &str, delay: Duration) -> Self {
            Self {
                queries: Mutex::new(Vec::new()),
                delays: HashMap::from([(query.to_owned(), delay)]),
            }
        }

        fn seen_queries(&self) -> Vec<String> {
            self.queries.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl CatalogSearch for ScriptedCatalog {
        async fn search_catalog(&self, query: &str, _limit: i64) -> anyhow::Result<Vec<Food>> {
            self.queries.lock().expect("lock").push(query.to_owned());
            if let Some(delay) = self.delays.get(query) {
                tokio::time::sleep(*delay).await;
            }
            Ok(vec![verified_food(query)])
        }

        async fn search_user_foods(
            &self,
            _user_id: Uuid,
            _query: &str,
            _limit: i64,
        ) -> anyhow::Result<Vec<UserFood>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn starts_with_empty_results() {
        let orchestrator =
            SearchOrchestrator::new(Arc::new(ScriptedCatalog::default()), None, &config());
        assert_eq!(orchestrator.results(), SearchResultSet::default());
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_keystrokes_coalesce_into_one_lookup_of_the_final_text() {
        let catalog = Arc::new(ScriptedCatalog::default());
        let orchestrator = SearchOrchestrator::new(Arc::clone(&catalog), None, &config());

        orchestrator.on_query_change("chi");
        tokio::time::sleep(Duration::from_millis(100)).await;
        orchestrator.on_query_change("chick");
        tokio::time::sleep(Duration::from_millis(100)).await;
        orchestrator.on_query_change("chicken");
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(
            catalog.seen_queries(),
            vec!["chicken"],
            "only the final keystroke inside the window may reach the store"
        );
        let results = orchestrator.results();
        assert_eq!(results.best_match[0].name, "chicken");
        assert_eq!(results.total, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn a_superseded_lookup_never_overwrites_newer_results() {
        let catalog = Arc::new(ScriptedCatalog::with_delay(
            "slow pudding",
            Duration::from_secs(10),
        ));
        let orchestrator = SearchOrchestrator::new(Arc::clone(&catalog), None, &config());

        orchestrator.on_query_change("slow pudding");
        tokio::time::sleep(Duration::from_millis(350)).await;
        // The first lookup is now stuck inside the store call.
        orchestrator.on_query_change("fast toast");
        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(orchestrator.results().best_match[0].name, "fast toast");

        // Long after the slow lookup's delay would have elapsed, the newer
        // results still stand.
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(orchestrator.results().best_match[0].name, "fast toast");
        assert_eq!(
            catalog.seen_queries(),
            vec!["slow pudding", "fast toast"],
            "both lookups started, only the fresh one landed"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn publish_requires_the_newest_issued_sequence() {
        let orchestrator =
            SearchOrchestrator::new(Arc::new(ScriptedCatalog::default()), None, &config());
        let first = orchestrator.slot.next_seq();
        let second = orchestrator.slot.next_seq();

        // The newer lookup is issued but has published nothing; the older
        // completion must be discarded, not shown in the meantime.
        orchestrator.slot.publish(first, published_set("stale pudding"));
        assert_eq!(orchestrator.results(), SearchResultSet::default());

        orchestrator.slot.publish(second, published_set("fresh toast"));
        assert_eq!(orchestrator.results().best_match[0].name, "fresh toast");

        // A late retry of the stale sequence changes nothing either.
        orchestrator.slot.publish(first, published_set("stale pudding"));
        assert_eq!(orchestrator.results().best_match[0].name, "fresh toast");
    }

    /// Parks one query's store call inside its poll, so cancellation cannot
    /// take effect before the call finishes and the lookup runs through to
    /// its publish attempt.
    struct GatedCatalog {
        gated_query: String,
        entered: tokio::sync::mpsc::UnboundedSender<()>,
        release: Mutex<Option<std::sync::mpsc::Receiver<()>>>,
    }

    #[async_trait]
    impl CatalogSearch for GatedCatalog {
        async fn search_catalog(&self, query: &str, _limit: i64) -> anyhow::Result<Vec<Food>> {
            if query == self.gated_query {
                let gate = self.release.lock().expect("lock").take();
                if let Some(gate) = gate {
                    let _ = self.entered.send(());
                    let _ = gate.recv();
                }
            }
            Ok(vec![verified_food(query)])
        }

        async fn search_user_foods(
            &self,
            _user_id: Uuid,
            _query: &str,
            _limit: i64,
        ) -> anyhow::Result<Vec<UserFood>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn a_lookup_that_completes_despite_cancellation_is_discarded() {
        let (entered_tx, mut entered_rx) = tokio::sync::mpsc::unbounded_channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let catalog = Arc::new(GatedCatalog {
            gated_query: "slow pudding".to_owned(),
            entered: entered_tx,
            release: Mutex::new(Some(release_rx)),
        });
        let quick = SearchConfig {
            debounce_ms: 50,
            result_limit: 30,
        };
        let orchestrator = SearchOrchestrator::new(Arc::clone(&catalog), None, &quick);
        let mut updates = orchestrator.subscribe();

        orchestrator.on_query_change("slow pudding");
        entered_rx.recv().await.expect("the gated store call should start");

        // The first lookup is mid-poll and past its last cancellation point.
        // Supersede it, then let it run through to its publish attempt.
        orchestrator.on_query_change("fast toast");
        release_tx.send(()).expect("open the gate");

        updates.changed().await.expect("a result set should be published");
        let shown = updates.borrow_and_update().best_match[0].name.clone();
        assert_eq!(
            shown, "fast toast",
            "a lookup superseded before completion must never be displayed"
        );
        assert_eq!(orchestrator.results().best_match[0].name, "fast toast");
    }

    #[tokio::test(start_paused = true)]
    async fn an_older_caller_cannot_evict_a_newer_registered_lookup() {
        let orchestrator =
            SearchOrchestrator::new(Arc::new(ScriptedCatalog::default()), None, &config());

        let (newer_tx, mut newer_rx) = oneshot::channel::<()>();
        let (older_tx, mut older_rx) = oneshot::channel::<()>();
        let newer = tokio::spawn(async move {
            let _guard = newer_tx;
            std::future::pending::<()>().await;
        });
        let older = tokio::spawn(async move {
            let _guard = older_tx;
            std::future::pending::<()>().await;
        });

        // Arrival order inverted relative to issue order.
        orchestrator.register(2, newer);
        orchestrator.register(1, older);
        tokio::time::sleep(Duration::from_millis(1)).await;

        {
            let in_flight = orchestrator.lock_in_flight();
            let (seq, _) = in_flight.as_ref().expect("a lookup must stay registered");
            assert_eq!(*seq, 2, "the newest lookup must keep the slot");
        }
        assert!(
            matches!(older_rx.try_recv(), Err(oneshot::error::TryRecvError::Closed)),
            "the stale registration must be cancelled"
        );
        assert!(
            matches!(newer_rx.try_recv(), Err(oneshot::error::TryRecvError::Empty)),
            "the newer lookup must keep running"
        );

        orchestrator.retire(1);
        assert!(
            orchestrator.lock_in_flight().is_some(),
            "a stale clear must not cancel a newer lookup"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sub_minimum_text_clears_results_without_store_access() {
        let catalog = Arc::new(ScriptedCatalog::default());
        let orchestrator = SearchOrchestrator::new(Arc::clone(&catalog), None, &config());

        orchestrator.on_query_change("oats");
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(orchestrator.results().total, 1);

        orchestrator.on_query_change("o");
        assert_eq!(
            orchestrator.results(),
            SearchResultSet::default(),
            "clearing takes effect immediately, no debounce"
        );
        assert_eq!(catalog.seen_queries(), vec!["oats"], "no extra store access");
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_wins_over_an_in_flight_lookup() {
        let catalog = Arc::new(ScriptedCatalog::with_delay(
            "slow pudding",
            Duration::from_secs(10),
        ));
        let orchestrator = SearchOrchestrator::new(Arc::clone(&catalog), None, &config());

        orchestrator.on_query_change("slow pudding");
        tokio::time::sleep(Duration::from_millis(350)).await;
        orchestrator.on_query_change("");

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(orchestrator.results(), SearchResultSet::default());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_orchestrator_cancels_outstanding_work() {
        let catalog = Arc::new(ScriptedCatalog::default());
        {
            let orchestrator = SearchOrchestrator::new(Arc::clone(&catalog), None, &config());
            orchestrator.on_query_change("chicken");
            tokio::time::sleep(Duration::from_millis(100)).await;
            // Dropped mid-debounce.
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(
            catalog.seen_queries().is_empty(),
            "no lookup may run after teardown"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_published_updates() {
        let orchestrator =
            SearchOrchestrator::new(Arc::new(ScriptedCatalog::default()), None, &config());
        let mut rx = orchestrator.subscribe();

        orchestrator.on_query_change("oats");
        tokio::time::sleep(Duration::from_millis(350)).await;

        assert!(rx.has_changed().expect("sender alive"));
        let set = rx.borrow_and_update().clone();
        assert_eq!(set.best_match[0].name, "oats");
    }
}
