use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub product_type: String,
    pub quantity: i64,
    pub low_stock_threshold: i64,
    pub purchase_price: f64,
    pub selling_price: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Sale,       // Sold through an online or POS order
    Return,     // Restored by an order return
    Purchase,   // Received from a supplier PO
    Adjustment, // Manual correction or stock-take variance
    RepairUse,  // Consumed as a repair part
    Initial,    // Opening stock at product creation
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Sale => "sale",
            MovementType::Return => "return",
            MovementType::Purchase => "purchase",
            MovementType::Adjustment => "adjustment",
            MovementType::RepairUse => "repair_use",
            MovementType::Initial => "initial",
        }
    }
}

/// Immutable ledger row; the table rejects UPDATE and DELETE.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StockMovement {
    pub id: i64,
    pub product_id: i64,
    pub change: i64,
    pub movement_type: MovementType,
    pub reference_id: Option<String>,
    pub note: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InventorySnapshotRow {
    pub id: i64,
    pub total_capital: f64,
    pub total_items: i64,
    pub distribution: String,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}
