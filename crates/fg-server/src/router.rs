//! Route table.

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::handlers;
use crate::state::EngineState;

/// Builds the engine's router.
///
/// `/sso` is the guard entry point, `/acs` receives assertions from IdPs,
/// `/acs/process` is polled by the browser while the attribute pipeline
/// runs, and `/register` onboards a new guard.
pub fn engine_router(state: Arc<EngineState>) -> Router {
    Router::new()
        .route("/sso", get(handlers::sso))
        .route("/acs", get(handlers::acs).post(handlers::acs))
        .route("/acs/process", get(handlers::process))
        .route("/register", post(handlers::register))
        .with_state(state)
}
