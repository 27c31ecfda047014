use sqlx::SqlitePool;
use tokio::sync::mpsc;

use super::types::AuditEvent;

/// Background sink draining the audit channel into `audit_logs`.
pub struct AuditWorker {
    pool: SqlitePool,
}

impl AuditWorker {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Runs until every sender is dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<AuditEvent>) {
        tracing::info!("Audit worker started");

        while let Some(event) = rx.recv().await {
            match self.write(&event).await {
                Ok(id) => {
                    tracing::debug!(
                        audit_id = id,
                        action = event.action.as_str(),
                        entity = event.entity,
                        "Audit entry recorded"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        action = event.action.as_str(),
                        entity = event.entity,
                        entity_id = %event.entity_id,
                        "Failed to write audit entry"
                    );
                }
            }
        }

        tracing::info!("Audit channel closed, worker stopping");
    }

    async fn write(&self, event: &AuditEvent) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO audit_logs
             (entity, entity_id, action, old_values, new_values, actor, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(event.entity)
        .bind(&event.entity_id)
        .bind(event.action.as_str())
        .bind(event.old_values.as_ref().map(|v| v.to_string()))
        .bind(event.new_values.as_ref().map(|v| v.to_string()))
        .bind(event.actor)
        .bind(event.created_at)
        .fetch_one(&self.pool)
        .await
    }
}
