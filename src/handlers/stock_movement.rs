use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::instrument;

use crate::dtos::stock::{CreateMovementRequest, ProductMovementHistory};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::product::StockMovement;
use crate::services::stock;
use crate::state::AppState;

// ==================== Record Movement ====================

// POST /stock/movements - Manual correction, managers only
#[instrument(skip(state, auth))]
pub async fn create_movement(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CreateMovementRequest>,
) -> Result<(StatusCode, Json<StockMovement>), AppError> {
    auth.require_manager("record stock movements")?;

    let movement = stock::record_movement(&state, payload, auth.user_id).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

// ==================== Product History ====================

// GET /stock/movements/products/{id} - Ledger with running balance
#[instrument(skip(state))]
pub async fn get_product_movements(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<Json<ProductMovementHistory>, AppError> {
    let history = stock::get_product_movements(&state.db_pool, product_id).await?;
    Ok(Json(history))
}
