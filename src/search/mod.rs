pub mod dto;
pub mod handlers;
pub mod orchestrator;
pub mod service;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::router()
}
