use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::handlers::order;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/orders", get(order::list_orders).post(order::place_order))
        .route("/orders/{id}", get(order::get_order))
        .route("/orders/{id}/status", patch(order::update_order_status))
        .route("/orders/{id}/return", post(order::process_return))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
