use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RepairStatus {
    Received,
    Diagnosing,
    WaitingParts,
    Repairing,
    Ready,
    Delivered,
}

impl RepairStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairStatus::Received => "received",
            RepairStatus::Diagnosing => "diagnosing",
            RepairStatus::WaitingParts => "waiting_parts",
            RepairStatus::Repairing => "repairing",
            RepairStatus::Ready => "ready",
            RepairStatus::Delivered => "delivered",
        }
    }

    pub fn can_transition_to(&self, next: RepairStatus) -> bool {
        use RepairStatus::*;
        matches!(
            (self, next),
            (Received, Diagnosing)
                | (Diagnosing, WaitingParts)
                | (Diagnosing, Repairing)
                | (WaitingParts, Repairing)
                | (Repairing, WaitingParts)
                | (Repairing, Ready)
                | (Ready, Repairing)
                | (Ready, Delivered)
        )
    }
}

impl fmt::Display for RepairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Repair {
    pub id: i64,
    pub tracking_id: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub device_model: String,
    pub issue_description: String,
    pub status: RepairStatus,
    pub cost_estimate: f64,
    pub cost_actual: f64,
    pub final_cost: Option<f64>,
    pub signature_url: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Repair {
    /// Amount billed at hand-over: the agreed final cost, else the parts cost.
    pub fn billable_amount(&self) -> f64 {
        match self.final_cost {
            Some(cost) if cost > 0.0 => cost,
            _ => self.cost_actual,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RepairPart {
    pub id: i64,
    pub repair_id: i64,
    pub product_id: i64,
    pub name: String,
    pub quantity: i64,
    pub unit_cost: f64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RepairStatus; 6] = [
        RepairStatus::Received,
        RepairStatus::Diagnosing,
        RepairStatus::WaitingParts,
        RepairStatus::Repairing,
        RepairStatus::Ready,
        RepairStatus::Delivered,
    ];

    #[test]
    fn delivered_only_follows_ready() {
        for from in ALL {
            assert_eq!(
                from.can_transition_to(RepairStatus::Delivered),
                from == RepairStatus::Ready,
                "{from} -> delivered"
            );
        }
    }

    #[test]
    fn delivered_is_terminal() {
        for next in ALL {
            assert!(!RepairStatus::Delivered.can_transition_to(next));
        }
    }

    #[test]
    fn ready_can_go_back_for_rework() {
        assert!(RepairStatus::Ready.can_transition_to(RepairStatus::Repairing));
        assert!(!RepairStatus::Received.can_transition_to(RepairStatus::Ready));
    }
}
