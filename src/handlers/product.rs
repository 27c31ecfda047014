// src/handlers/product.rs
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::instrument;

use crate::dtos::product::{CreateProductRequest, ProductResponse, SetProductActiveRequest};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::services::stock;
use crate::state::AppState;

// GET /products - List all products
#[instrument(skip(state))]
pub async fn get_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductResponse>>, AppError> {
    let products = stock::list_products(&state.db_pool).await?;
    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}

// GET /products/{id} - Get single product
#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = stock::get_product(&state.db_pool, id).await?;
    Ok(Json(ProductResponse::from(product)))
}

// POST /products - Create product with opening stock
#[instrument(skip(state, auth, payload))]
pub async fn create_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), AppError> {
    let product = stock::create_product(&state, payload, auth.user_id).await?;
    Ok((StatusCode::CREATED, Json(ProductResponse::from(product))))
}

// PATCH /products/{id}/active - Activate or retire a product
#[instrument(skip(state, auth))]
pub async fn set_product_active(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(payload): Json<SetProductActiveRequest>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = stock::set_product_active(&state, id, payload.is_active, auth.user_id).await?;
    Ok(Json(ProductResponse::from(product)))
}
