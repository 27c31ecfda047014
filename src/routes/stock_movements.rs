use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::stock_movement;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/stock/movements", post(stock_movement::create_movement))
        .route("/stock/movements/products/{product_id}", get(stock_movement::get_product_movements))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
