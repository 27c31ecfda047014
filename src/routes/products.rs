use axum::{
    middleware,
    routing::{get, patch},
    Router,
};

use crate::handlers::product;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/products", get(product::get_products).post(product::create_product))
        .route("/products/{id}", get(product::get_product))
        .route("/products/{id}/active", patch(product::set_product_active))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
