//! Business workflows.
//!
//! Every mutating operation runs inside one write transaction
//! (`AppState::begin_write`), so stock, finance and status rows commit
//! together or not at all. Audit events are emitted only after commit.

pub mod finance;
pub mod order;
pub mod purchase_order;
pub mod repair;
pub mod stock;

use chrono::Utc;
use uuid::Uuid;

/// Human-facing document number, e.g. `ORD-20261019-3F2A9C01`.
pub(crate) fn document_number(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("{}-{}-{}", prefix, Utc::now().format("%Y%m%d"), suffix)
}

/// Money inputs must be finite and non-negative.
pub(crate) fn is_valid_amount(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}
