use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use tracing::instrument;

use crate::dtos::purchase_order::{
    CreatePurchaseOrderRequest, CreateSupplierRequest, PurchaseOrderResponse,
};
use crate::error::AppError;
use crate::handlers::page_limit;
use crate::middleware::auth::AuthContext;
use crate::models::purchase_order::{PurchaseOrder, PurchaseOrderStatus, Supplier};
use crate::services::purchase_order;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PurchaseOrderQuery {
    pub status: Option<PurchaseOrderStatus>,
    pub limit: Option<i64>,
}

// ==================== Suppliers ====================

// GET /suppliers
#[instrument(skip(state))]
pub async fn list_suppliers(State(state): State<AppState>) -> Result<Json<Vec<Supplier>>, AppError> {
    Ok(Json(purchase_order::list_suppliers(&state.db_pool).await?))
}

// POST /suppliers
#[instrument(skip(state, auth))]
pub async fn create_supplier(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CreateSupplierRequest>,
) -> Result<(StatusCode, Json<Supplier>), AppError> {
    let supplier = purchase_order::create_supplier(&state, payload, auth.user_id).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

// ==================== Purchase Orders ====================

// GET /purchase-orders?status=&limit=
#[instrument(skip(state))]
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    Query(params): Query<PurchaseOrderQuery>,
) -> Result<Json<Vec<PurchaseOrder>>, AppError> {
    let rows = purchase_order::list_pos(&state.db_pool, params.status, page_limit(params.limit)).await?;
    Ok(Json(rows))
}

// POST /purchase-orders
#[instrument(skip(state, auth, payload))]
pub async fn create_purchase_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CreatePurchaseOrderRequest>,
) -> Result<(StatusCode, Json<PurchaseOrderResponse>), AppError> {
    let created = purchase_order::create_po(&state, payload, auth.user_id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

// GET /purchase-orders/{id}
#[instrument(skip(state))]
pub async fn get_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PurchaseOrderResponse>, AppError> {
    Ok(Json(purchase_order::get_po(&state.db_pool, id).await?))
}

// POST /purchase-orders/{id}/submit
#[instrument(skip(state, auth))]
pub async fn submit_purchase_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<PurchaseOrderResponse>, AppError> {
    Ok(Json(purchase_order::submit_po(&state, id, auth.user_id).await?))
}

// POST /purchase-orders/{id}/receive - Credit stock, book purchase
#[instrument(skip(state, auth))]
pub async fn receive_purchase_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<PurchaseOrderResponse>, AppError> {
    Ok(Json(purchase_order::receive_po(&state, id, auth.user_id).await?))
}
