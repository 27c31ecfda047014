use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::purchase_order;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/suppliers", get(purchase_order::list_suppliers).post(purchase_order::create_supplier))
        .route(
            "/purchase-orders",
            get(purchase_order::list_purchase_orders).post(purchase_order::create_purchase_order),
        )
        .route("/purchase-orders/{id}", get(purchase_order::get_purchase_order))
        .route("/purchase-orders/{id}/submit", post(purchase_order::submit_purchase_order))
        .route("/purchase-orders/{id}/receive", post(purchase_order::receive_purchase_order))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
