use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::instrument;

use crate::dtos::product::ProductResponse;
use crate::dtos::stock::{
    InventorySnapshot, LimitQuery, ReconcileResponse, SlowMovingProduct, SlowMovingQuery,
    StockCount,
};
use crate::error::AppError;
use crate::handlers::page_limit;
use crate::middleware::auth::AuthContext;
use crate::services::stock;
use crate::state::AppState;

// GET /inventory/low-stock - Active products at or below their threshold
#[instrument(skip(state))]
pub async fn get_low_stock(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductResponse>>, AppError> {
    let products = stock::get_low_stock_products(&state.db_pool).await?;
    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}

// GET /inventory/slow-moving?days= - Stocked products with no recent sale
#[instrument(skip(state))]
pub async fn get_slow_moving(
    State(state): State<AppState>,
    Query(params): Query<SlowMovingQuery>,
) -> Result<Json<Vec<SlowMovingProduct>>, AppError> {
    let days = params.days.unwrap_or(state.config.slow_moving_days);
    let products = stock::get_slow_moving_products(&state.db_pool, days).await?;
    Ok(Json(products))
}

// POST /inventory/snapshot - Record capital and item counts
#[instrument(skip(state, auth))]
pub async fn create_snapshot(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<(StatusCode, Json<InventorySnapshot>), AppError> {
    let snapshot = stock::create_snapshot(&state, auth.user_id).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

// GET /inventory/snapshots - Stored snapshots, newest first
#[instrument(skip(state))]
pub async fn list_snapshots(
    State(state): State<AppState>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<InventorySnapshot>>, AppError> {
    let snapshots = stock::list_snapshots(&state.db_pool, page_limit(params.limit)).await?;
    Ok(Json(snapshots))
}

// POST /inventory/reconcile - Apply a physical count, managers only
#[instrument(skip(state, auth, counts))]
pub async fn reconcile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(counts): Json<Vec<StockCount>>,
) -> Result<Json<ReconcileResponse>, AppError> {
    auth.require_manager("reconcile stock")?;

    let report = stock::reconcile(&state, counts, auth.user_id).await?;
    Ok(Json(report))
}
