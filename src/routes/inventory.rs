use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::inventory;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/inventory/low-stock", get(inventory::get_low_stock))
        .route("/inventory/slow-moving", get(inventory::get_slow_moving))
        .route("/inventory/snapshot", post(inventory::create_snapshot))
        .route("/inventory/snapshots", get(inventory::list_snapshots))
        .route("/inventory/reconcile", post(inventory::reconcile))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
