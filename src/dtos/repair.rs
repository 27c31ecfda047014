use serde::{Deserialize, Serialize};

use crate::models::repair::{Repair, RepairPart, RepairStatus};

#[derive(Debug, Deserialize)]
pub struct CreateRepairRequest {
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub device_model: String,
    pub issue_description: String,
    pub cost_estimate: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRepairStatusRequest {
    pub new_status: RepairStatus,
    pub final_cost: Option<f64>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepairPartRequest {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_cost: f64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddPartsRequest {
    pub parts: Vec<RepairPartRequest>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeliverRepairRequest {
    pub signature_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RepairResponse {
    #[serde(flatten)]
    pub repair: Repair,
    pub parts: Vec<RepairPart>,
}
