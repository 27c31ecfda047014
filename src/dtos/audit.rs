use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audit::AuditLog;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub entity_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub id: i64,
    pub entity: String,
    pub entity_id: String,
    pub action: String,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub actor: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<AuditLog> for AuditLogResponse {
    fn from(log: AuditLog) -> Self {
        Self {
            id: log.id,
            entity: log.entity,
            entity_id: log.entity_id,
            action: log.action,
            old_values: log.old_values.and_then(|v| serde_json::from_str(&v).ok()),
            new_values: log.new_values.and_then(|v| serde_json::from_str(&v).ok()),
            actor: log.actor,
            created_at: log.created_at,
        }
    }
}
