pub mod audit_logs;
pub mod finance;
pub mod inventory;
pub mod orders;
pub mod products;
pub mod purchase_orders;
pub mod repairs;
pub mod stock_movements;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application: authenticated API under `/api`, open `/health`.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(products::routes(state.clone()))
        .merge(stock_movements::routes(state.clone()))
        .merge(inventory::routes(state.clone()))
        .merge(orders::routes(state.clone()))
        .merge(repairs::routes(state.clone()))
        .merge(purchase_orders::routes(state.clone()))
        .merge(finance::routes(state.clone()))
        .merge(audit_logs::routes(state.clone()));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
