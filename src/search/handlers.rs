use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::auth::MaybeAuthUser;
use crate::fdc::dto::MIN_QUERY_CHARS;
use crate::state::AppState;

use super::dto::SearchResultSet;
use super::orchestrator::SearchOrchestrator;
use super::service::{run_local_search, PgCatalog};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/foods/search", get(search_foods_local))
        .route("/foods/search/live", get(search_foods_live))
}

#[derive(Debug, Deserialize)]
pub struct LocalSearchParams {
    pub query: Option<String>,
}

/// GET /foods/search?query=
///
/// One-shot local catalog lookup. Anonymous callers get shared results only;
/// authenticated callers also get their private foods. Text below the
/// minimum length short-circuits to an empty set.
#[instrument(skip(state))]
pub async fn search_foods_local(
    State(state): State<AppState>,
    MaybeAuthUser(user_id): MaybeAuthUser,
    Query(params): Query<LocalSearchParams>,
) -> Json<SearchResultSet> {
    let query = params.query.unwrap_or_default();
    let query = query.trim();
    if query.chars().count() < MIN_QUERY_CHARS {
        return Json(SearchResultSet::default());
    }

    let catalog = PgCatalog::new(state.db.clone());
    let results =
        run_local_search(&catalog, user_id, query, state.config.search.result_limit).await;
    Json(results)
}

/// GET /foods/search/live
///
/// Search-as-you-type over a WebSocket: every text frame becomes the current
/// query, result sets are pushed back as JSON when they land. Closing the
/// socket tears the session down and cancels any in-flight lookup.
#[instrument(skip(state, upgrade))]
pub async fn search_foods_live(
    State(state): State<AppState>,
    MaybeAuthUser(user_id): MaybeAuthUser,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| live_session(state, user_id, socket))
}

async fn live_session(state: AppState, user_id: Option<Uuid>, mut socket: WebSocket) {
    let catalog = Arc::new(PgCatalog::new(state.db.clone()));
    let orchestrator = SearchOrchestrator::new(catalog, user_id, &state.config.search);
    let mut updates = orchestrator.subscribe();

    // Send the current (empty) result set so the client starts from a known
    // state; the watch channel only reports updates after subscription.
    if let Ok(snapshot) = serde_json::to_string(&orchestrator.results()) {
        if socket.send(Message::Text(snapshot)).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Text(text))) => orchestrator.on_query_change(&text),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "live search socket error");
                        break;
                    }
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                // The watch ref must not be held across the send await.
                let payload = {
                    let results = updates.borrow_and_update();
                    serde_json::to_string(&*results)
                };
                match payload {
                    Ok(payload) => {
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to encode live search results"),
                }
            }
        }
    }
    // Dropping the orchestrator here aborts any outstanding lookup.
}
