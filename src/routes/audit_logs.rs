use axum::{middleware, routing::get, Router};

use crate::handlers::audit;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/audit-logs", get(audit::list_recent))
        .route("/audit-logs/{entity}", get(audit::list_for_entity))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
