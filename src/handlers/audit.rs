use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::instrument;

use crate::audit::{get_logs_for_entity, get_recent_logs};
use crate::dtos::audit::{AuditLogResponse, AuditQuery};
use crate::error::AppError;
use crate::handlers::page_limit;
use crate::state::AppState;

// GET /audit-logs?limit=
#[instrument(skip(state))]
pub async fn list_recent(
    State(state): State<AppState>,
    Query(params): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLogResponse>>, AppError> {
    let logs = get_recent_logs(&state.db_pool, page_limit(params.limit)).await?;
    Ok(Json(logs.into_iter().map(AuditLogResponse::from).collect()))
}

// GET /audit-logs/{entity}?entity_id=&limit=
#[instrument(skip(state))]
pub async fn list_for_entity(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Query(params): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLogResponse>>, AppError> {
    let logs = get_logs_for_entity(
        &state.db_pool,
        &entity,
        params.entity_id.as_deref(),
        page_limit(params.limit),
    )
    .await?;
    Ok(Json(logs.into_iter().map(AuditLogResponse::from).collect()))
}
