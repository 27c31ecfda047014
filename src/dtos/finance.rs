use serde::{Deserialize, Serialize};

use crate::models::finance::EntryType;

#[derive(Debug, Deserialize)]
pub struct FinanceQuery {
    pub entry_type: Option<EntryType>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct FinanceSummary {
    pub revenue: f64,
    pub expense: f64,
    pub purchase: f64,
    pub net: f64,
}
