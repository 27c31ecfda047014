use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::product::MovementType;

// ==================== Movement DTOs ====================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMovementRequest {
    pub product_id: i64,
    pub change: i64,
    pub movement_type: MovementType,
    pub reference_id: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct StockMovementDetail {
    pub id: i64,
    pub change: i64,
    pub movement_type: MovementType,
    pub reference_id: Option<String>,
    pub note: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub running_balance: i64,
}

#[derive(Debug, Serialize)]
pub struct ProductMovementHistory {
    pub product_id: i64,
    pub product_name: String,
    pub current_quantity: i64,
    pub movements: Vec<StockMovementDetail>,
}

// ==================== Inventory DTOs ====================

#[derive(Debug, Deserialize)]
pub struct SlowMovingQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct SlowMovingProduct {
    pub id: i64,
    pub name: String,
    pub product_type: String,
    pub quantity: i64,
    pub last_sale_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StockCount {
    pub product_id: i64,
    pub actual_count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Variance {
    pub product_id: i64,
    pub product_name: String,
    pub expected: i64,
    pub actual: i64,
    pub diff: i64,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub reference_id: String,
    pub adjusted_products: usize,
    pub variances: Vec<Variance>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct TypeDistribution {
    pub product_type: String,
    pub capital: f64,
    pub items: i64,
    pub product_count: i64,
}

#[derive(Debug, Serialize)]
pub struct InventorySnapshot {
    pub id: i64,
    pub total_capital: f64,
    pub total_items: i64,
    pub distribution: Vec<TypeDistribution>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}
