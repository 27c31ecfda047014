use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// What happened, as a closed set rather than free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // Inventory
    ProductCreated,
    ProductActiveChanged,
    StockMovementApplied,
    StockReconciled,
    SnapshotCreated,
    // Orders
    OrderPlaced,
    OrderStatusChanged,
    OrderReturned,
    // Repairs
    RepairCreated,
    RepairStatusChanged,
    RepairPartsAdded,
    RepairDelivered,
    // Purchasing
    SupplierCreated,
    PurchaseOrderCreated,
    PurchaseOrderSubmitted,
    PurchaseOrderReceived,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::ProductCreated => "product_created",
            AuditAction::ProductActiveChanged => "product_active_changed",
            AuditAction::StockMovementApplied => "stock_movement_applied",
            AuditAction::StockReconciled => "stock_reconciled",
            AuditAction::SnapshotCreated => "snapshot_created",
            AuditAction::OrderPlaced => "order_placed",
            AuditAction::OrderStatusChanged => "order_status_changed",
            AuditAction::OrderReturned => "order_returned",
            AuditAction::RepairCreated => "repair_created",
            AuditAction::RepairStatusChanged => "repair_status_changed",
            AuditAction::RepairPartsAdded => "repair_parts_added",
            AuditAction::RepairDelivered => "repair_delivered",
            AuditAction::SupplierCreated => "supplier_created",
            AuditAction::PurchaseOrderCreated => "purchase_order_created",
            AuditAction::PurchaseOrderSubmitted => "purchase_order_submitted",
            AuditAction::PurchaseOrderReceived => "purchase_order_received",
        }
    }
}

/// One audit record on its way to the sink.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub entity: &'static str,
    pub entity_id: String,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub actor: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        action: AuditAction,
        entity: &'static str,
        entity_id: impl ToString,
        actor: Option<i64>,
    ) -> Self {
        Self {
            action,
            entity,
            entity_id: entity_id.to_string(),
            old_values: None,
            new_values: None,
            actor,
            created_at: Utc::now(),
        }
    }

    pub fn old_values(mut self, values: Value) -> Self {
        self.old_values = Some(values);
        self
    }

    pub fn new_values(mut self, values: Value) -> Self {
        self.new_values = Some(values);
        self
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AuditLog {
    pub id: i64,
    pub entity: String,
    pub entity_id: String,
    pub action: String,
    pub old_values: Option<String>,
    pub new_values: Option<String>,
    pub actor: Option<i64>,
    pub created_at: DateTime<Utc>,
}
