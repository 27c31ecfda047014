use sqlx::SqlitePool;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::types::{AuditEvent, AuditLog};

/// Sending half of the audit channel.
///
/// `log` never blocks and never returns an error: the business operation
/// has already committed by the time it is called.
#[derive(Clone, Debug)]
pub struct AuditTrail {
    tx: mpsc::Sender<AuditEvent>,
}

impl AuditTrail {
    pub fn new(buffer_size: usize) -> (Self, mpsc::Receiver<AuditEvent>) {
        let (tx, rx) = mpsc::channel(buffer_size);
        (Self { tx }, rx)
    }

    pub fn log(&self, event: AuditEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    action = event.action.as_str(),
                    entity = event.entity,
                    entity_id = %event.entity_id,
                    "Audit channel full, entry dropped"
                );
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!(
                    action = event.action.as_str(),
                    entity = event.entity,
                    entity_id = %event.entity_id,
                    "Audit worker stopped, entry dropped"
                );
            }
        }
    }
}

pub async fn get_recent_logs(pool: &SqlitePool, limit: i64) -> Result<Vec<AuditLog>, sqlx::Error> {
    sqlx::query_as::<_, AuditLog>(
        "SELECT id, entity, entity_id, action, old_values, new_values, actor, created_at
         FROM audit_logs
         ORDER BY created_at DESC, id DESC
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn get_logs_for_entity(
    pool: &SqlitePool,
    entity: &str,
    entity_id: Option<&str>,
    limit: i64,
) -> Result<Vec<AuditLog>, sqlx::Error> {
    sqlx::query_as::<_, AuditLog>(
        "SELECT id, entity, entity_id, action, old_values, new_values, actor, created_at
         FROM audit_logs
         WHERE entity = ? AND (? IS NULL OR entity_id = ?)
         ORDER BY created_at DESC, id DESC
         LIMIT ?",
    )
    .bind(entity)
    .bind(entity_id)
    .bind(entity_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditAction, AuditWorker};
    use crate::database;
    use serde_json::json;

    async fn pool() -> SqlitePool {
        let pool = database::create_pool("sqlite::memory:", 1).await.unwrap();
        database::run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn log_never_fails_when_the_worker_is_gone() {
        let (trail, rx) = AuditTrail::new(1);
        drop(rx);
        // Closed channel: dropped with a warning, no panic, no error
        trail.log(AuditEvent::new(AuditAction::OrderPlaced, "order", 1, Some(1)));
    }

    #[tokio::test]
    async fn log_drops_when_full() {
        let (trail, mut rx) = AuditTrail::new(1);
        trail.log(AuditEvent::new(AuditAction::OrderPlaced, "order", 1, None));
        trail.log(AuditEvent::new(AuditAction::OrderPlaced, "order", 2, None));
        assert_eq!(rx.recv().await.unwrap().entity_id, "1");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reads_are_newest_first_and_filter_by_entity() {
        let pool = pool().await;
        let (trail, rx) = AuditTrail::new(16);

        trail.log(
            AuditEvent::new(AuditAction::OrderPlaced, "order", 1, Some(9))
                .new_values(json!({"status": "pending"})),
        );
        trail.log(
            AuditEvent::new(AuditAction::OrderStatusChanged, "order", 1, Some(9))
                .old_values(json!({"status": "pending"}))
                .new_values(json!({"status": "confirmed"})),
        );
        trail.log(AuditEvent::new(AuditAction::RepairCreated, "repair", 4, Some(9)));
        trail.log(AuditEvent::new(AuditAction::OrderPlaced, "order", 2, Some(9)));
        drop(trail);

        AuditWorker::new(pool.clone()).run(rx).await;

        let recent = get_recent_logs(&pool, 10).await.unwrap();
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].entity_id, "2");
        assert_eq!(recent[3].action, "order_placed");

        let order_one = get_logs_for_entity(&pool, "order", Some("1"), 10).await.unwrap();
        assert_eq!(order_one.len(), 2);
        assert_eq!(order_one[0].action, "order_status_changed");
        assert!(order_one[0].old_values.as_deref().unwrap().contains("pending"));

        let all_orders = get_logs_for_entity(&pool, "order", None, 10).await.unwrap();
        assert_eq!(all_orders.len(), 3);

        let limited = get_recent_logs(&pool, 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }
}
