use axum::{
    extract::{Query, State},
    Json,
};
use tracing::instrument;

use crate::dtos::finance::{FinanceQuery, FinanceSummary};
use crate::error::AppError;
use crate::handlers::page_limit;
use crate::models::finance::FinanceEntry;
use crate::services::finance;
use crate::state::AppState;

// GET /finance/entries?entry_type=&limit=
#[instrument(skip(state))]
pub async fn list_entries(
    State(state): State<AppState>,
    Query(params): Query<FinanceQuery>,
) -> Result<Json<Vec<FinanceEntry>>, AppError> {
    let entries = finance::list_entries(&state.db_pool, params.entry_type, page_limit(params.limit)).await?;
    Ok(Json(entries))
}

// GET /finance/summary
#[instrument(skip(state))]
pub async fn get_summary(State(state): State<AppState>) -> Result<Json<FinanceSummary>, AppError> {
    Ok(Json(finance::summary(&state.db_pool).await?))
}
