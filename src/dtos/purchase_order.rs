use serde::{Deserialize, Serialize};

use crate::models::purchase_order::{PurchaseOrder, PurchaseOrderItem};

#[derive(Debug, Deserialize)]
pub struct CreateSupplierRequest {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseOrderItemRequest {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_cost: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePurchaseOrderRequest {
    pub supplier_id: i64,
    pub items: Vec<PurchaseOrderItemRequest>,
    pub notes: Option<String>,
    #[serde(default)]
    pub submit: bool,
}

#[derive(Debug, Serialize)]
pub struct PurchaseOrderResponse {
    #[serde(flatten)]
    pub purchase_order: PurchaseOrder,
    pub items: Vec<PurchaseOrderItem>,
}
