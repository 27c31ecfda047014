use axum::{middleware, routing::get, Router};

use crate::handlers::finance;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/finance/entries", get(finance::list_entries))
        .route("/finance/summary", get(finance::get_summary))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
