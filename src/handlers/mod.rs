pub mod audit;
pub mod finance;
pub mod inventory;
pub mod order;
pub mod product;
pub mod purchase_order;
pub mod repair;
pub mod stock_movement;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

/// Page size for list endpoints: 50 unless asked, never above 500.
pub(crate) fn page_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}
