use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::handlers::repair;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/repairs", post(repair::create_repair))
        .route("/repairs/{id}", get(repair::get_repair))
        .route("/repairs/track/{tracking_id}", get(repair::track_repair))
        .route("/repairs/{id}/status", patch(repair::update_repair_status))
        .route("/repairs/{id}/parts", post(repair::add_parts))
        .route("/repairs/{id}/deliver", post(repair::deliver_repair))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
