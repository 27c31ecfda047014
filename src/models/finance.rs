use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Revenue,
    Expense,
    Purchase,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FinanceEntry {
    pub id: i64,
    pub entry_type: EntryType,
    pub amount: f64,
    pub reference_type: String,
    pub reference_id: String,
    pub description: String,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}
