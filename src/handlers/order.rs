use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::instrument;

use crate::dtos::order::{
    OrderListQuery, OrderResponse, PlaceOrderRequest, ReturnOrderRequest, UpdateOrderStatusRequest,
};
use crate::error::AppError;
use crate::handlers::page_limit;
use crate::middleware::auth::AuthContext;
use crate::models::order::Order;
use crate::services::order;
use crate::state::AppState;

// POST /orders - Checkout or POS sale
#[instrument(skip(state, auth, payload))]
pub async fn place_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    let placed = order::place_order(&state, payload, auth.user_id).await?;
    Ok((StatusCode::CREATED, Json(placed)))
}

// GET /orders?status=&limit=
#[instrument(skip(state))]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<OrderListQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = order::list_orders(&state.db_pool, params.status, page_limit(params.limit)).await?;
    Ok(Json(orders))
}

// GET /orders/{id} - Order with items and status history
#[instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, AppError> {
    Ok(Json(order::get_order(&state.db_pool, id).await?))
}

// PATCH /orders/{id}/status
#[instrument(skip(state, auth))]
pub async fn update_order_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    let updated = order::update_order_status(&state, id, payload, auth.user_id).await?;
    Ok(Json(updated))
}

// POST /orders/{id}/return - Restock and refund, once per order
#[instrument(skip(state, auth))]
pub async fn process_return(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(payload): Json<ReturnOrderRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    let returned = order::process_return(&state, id, &payload.reason, auth.user_id).await?;
    Ok(Json(returned))
}
