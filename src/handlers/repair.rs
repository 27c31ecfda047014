use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::instrument;

use crate::dtos::repair::{
    AddPartsRequest, CreateRepairRequest, DeliverRepairRequest, RepairResponse,
    UpdateRepairStatusRequest,
};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::services::repair;
use crate::state::AppState;

// POST /repairs - Intake
#[instrument(skip(state, auth, payload))]
pub async fn create_repair(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CreateRepairRequest>,
) -> Result<(StatusCode, Json<RepairResponse>), AppError> {
    let created = repair::create_repair(&state, payload, auth.user_id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

// GET /repairs/{id}
#[instrument(skip(state))]
pub async fn get_repair(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RepairResponse>, AppError> {
    Ok(Json(repair::get_repair(&state.db_pool, id).await?))
}

// GET /repairs/track/{tracking_id} - Customer lookup
#[instrument(skip(state))]
pub async fn track_repair(
    State(state): State<AppState>,
    Path(tracking_id): Path<String>,
) -> Result<Json<RepairResponse>, AppError> {
    Ok(Json(repair::get_repair_by_tracking(&state.db_pool, &tracking_id).await?))
}

// PATCH /repairs/{id}/status
#[instrument(skip(state, auth))]
pub async fn update_repair_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateRepairStatusRequest>,
) -> Result<Json<RepairResponse>, AppError> {
    let updated = repair::update_repair_status(&state, id, payload, auth.user_id).await?;
    Ok(Json(updated))
}

// POST /repairs/{id}/parts - Consume parts from stock
#[instrument(skip(state, auth, payload))]
pub async fn add_parts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(payload): Json<AddPartsRequest>,
) -> Result<Json<RepairResponse>, AppError> {
    let updated = repair::add_parts(&state, id, payload.parts, auth.user_id).await?;
    Ok(Json(updated))
}

// POST /repairs/{id}/deliver - Hand over and bill
#[instrument(skip(state, auth, payload))]
pub async fn deliver_repair(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    payload: Option<Json<DeliverRepairRequest>>,
) -> Result<Json<RepairResponse>, AppError> {
    let Json(payload) = payload.unwrap_or_default();
    let delivered = repair::mark_delivered(&state, id, payload.signature_url, auth.user_id).await?;
    Ok(Json(delivered))
}
