//! Repair desk: intake, parts consumption and hand-over.
//!
//! `delivered` is reachable only from `ready`, and only through
//! `mark_delivered`, which books the repair revenue.

use chrono::Utc;
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::audit::{AuditAction, AuditEvent};
use crate::dtos::repair::{CreateRepairRequest, RepairPartRequest, RepairResponse, UpdateRepairStatusRequest};
use crate::error::{AppError, AppResult};
use crate::models::finance::EntryType;
use crate::models::product::MovementType;
use crate::models::repair::{Repair, RepairPart, RepairStatus};
use crate::services::finance::{self, NewEntry};
use crate::services::stock::{self, MovementInput};
use crate::services::{document_number, is_valid_amount};
use crate::state::AppState;

const REPAIR_COLUMNS: &str = "id, tracking_id, customer_name, customer_phone, device_model,
    issue_description, status, cost_estimate, cost_actual, final_cost, signature_url,
    delivered_at, created_by, created_at, updated_at";

pub async fn create_repair(
    state: &AppState,
    req: CreateRepairRequest,
    actor: i64,
) -> AppResult<RepairResponse> {
    if req.customer_name.trim().is_empty() {
        return Err(AppError::validation("Customer name is required"));
    }
    if req.device_model.trim().is_empty() || req.issue_description.trim().is_empty() {
        return Err(AppError::validation("Device model and issue description are required"));
    }
    let cost_estimate = req.cost_estimate.unwrap_or(0.0);
    if !is_valid_amount(cost_estimate) {
        return Err(AppError::validation("Cost estimate cannot be negative"));
    }

    let (_write, mut tx) = state.begin_write().await?;
    let now = Utc::now();

    let repair = sqlx::query_as::<_, Repair>(&format!(
        "INSERT INTO repairs
         (tracking_id, customer_name, customer_phone, device_model, issue_description, status,
          cost_estimate, cost_actual, created_by, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, 0.0, ?, ?, ?)
         RETURNING {REPAIR_COLUMNS}"
    ))
    .bind(document_number("RPR"))
    .bind(req.customer_name.trim())
    .bind(&req.customer_phone)
    .bind(req.device_model.trim())
    .bind(req.issue_description.trim())
    .bind(RepairStatus::Received)
    .bind(cost_estimate)
    .bind(actor)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    insert_status_log(&mut tx, repair.id, None, RepairStatus::Received, None, actor).await?;
    tx.commit().await?;

    info!(repair_id = repair.id, tracking_id = %repair.tracking_id, "Repair received");
    state.audit.log(
        AuditEvent::new(AuditAction::RepairCreated, "repair", repair.id, Some(actor))
            .new_values(json!(repair)),
    );

    Ok(RepairResponse { repair, parts: Vec::new() })
}

// ==================== Status ====================

pub async fn update_repair_status(
    state: &AppState,
    repair_id: i64,
    req: UpdateRepairStatusRequest,
    actor: i64,
) -> AppResult<RepairResponse> {
    if let Some(cost) = req.final_cost {
        if !is_valid_amount(cost) {
            return Err(AppError::validation("Final cost cannot be negative"));
        }
    }

    // Delivery always goes through the hand-over path
    if req.new_status == RepairStatus::Delivered {
        return deliver(state, repair_id, None, req.final_cost, actor).await;
    }

    let (_write, mut tx) = state.begin_write().await?;

    let repair = fetch_repair(&mut tx, repair_id).await?;
    if !repair.status.can_transition_to(req.new_status) {
        return Err(AppError::invalid_transition("repair", repair.status, req.new_status));
    }

    let result = sqlx::query(
        "UPDATE repairs SET status = ?, final_cost = COALESCE(?, final_cost), updated_at = ?
         WHERE id = ? AND status = ?",
    )
    .bind(req.new_status)
    .bind(req.final_cost)
    .bind(Utc::now())
    .bind(repair_id)
    .bind(repair.status)
    .execute(&mut *tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::invalid_transition("repair", repair.status, req.new_status));
    }

    insert_status_log(
        &mut tx,
        repair_id,
        Some(repair.status),
        req.new_status,
        req.note.as_deref(),
        actor,
    )
    .await?;

    tx.commit().await?;

    state.audit.log(
        AuditEvent::new(AuditAction::RepairStatusChanged, "repair", repair_id, Some(actor))
            .old_values(json!({ "status": repair.status, "final_cost": repair.final_cost }))
            .new_values(json!({
                "status": req.new_status,
                "final_cost": req.final_cost.or(repair.final_cost),
                "note": req.note,
            })),
    );

    get_repair(&state.db_pool, repair_id).await
}

// ==================== Parts ====================

/// Consumes parts from stock and recomputes `cost_actual` over every part
/// ever added to the repair.
pub async fn add_parts(
    state: &AppState,
    repair_id: i64,
    parts: Vec<RepairPartRequest>,
    actor: i64,
) -> AppResult<RepairResponse> {
    if parts.is_empty() {
        return Err(AppError::validation("At least one part is required"));
    }
    for part in &parts {
        if part.quantity <= 0 {
            return Err(AppError::validation("Part quantity must be greater than 0"));
        }
        if !is_valid_amount(part.unit_cost) {
            return Err(AppError::validation("Part unit cost cannot be negative"));
        }
    }

    let (_write, mut tx) = state.begin_write().await?;

    let repair = fetch_repair(&mut tx, repair_id).await?;
    if repair.status == RepairStatus::Delivered {
        return Err(AppError::invalid_transition("repair", repair.status, "parts_added"));
    }

    let reference_id = repair_id.to_string();
    let now = Utc::now();
    for part in &parts {
        let product = stock::fetch_product(&mut tx, part.product_id).await?;
        let name = if part.name.trim().is_empty() {
            product.name.clone()
        } else {
            part.name.trim().to_string()
        };

        stock::apply_movement(
            &mut tx,
            &MovementInput {
                product_id: part.product_id,
                change: -part.quantity,
                movement_type: MovementType::RepairUse,
                reference_id: Some(reference_id.clone()),
                note: Some(format!("Repair {}: {}", repair.tracking_id, name)),
            },
            actor,
        )
        .await?;

        sqlx::query(
            "INSERT INTO repair_parts (repair_id, product_id, name, quantity, unit_cost, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(repair_id)
        .bind(part.product_id)
        .bind(&name)
        .bind(part.quantity)
        .bind(part.unit_cost)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    let cost_actual = sqlx::query_scalar::<_, f64>(
        "SELECT CAST(COALESCE(SUM(unit_cost * quantity), 0) AS REAL) FROM repair_parts WHERE repair_id = ?",
    )
    .bind(repair_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE repairs SET cost_actual = ?, updated_at = ? WHERE id = ?")
        .bind(cost_actual)
        .bind(now)
        .bind(repair_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    state.audit.log(
        AuditEvent::new(AuditAction::RepairPartsAdded, "repair", repair_id, Some(actor))
            .old_values(json!({ "cost_actual": repair.cost_actual }))
            .new_values(json!({
                "cost_actual": cost_actual,
                "parts": parts
                    .iter()
                    .map(|p| json!({ "product_id": p.product_id, "quantity": p.quantity, "unit_cost": p.unit_cost }))
                    .collect::<Vec<_>>(),
            })),
    );

    get_repair(&state.db_pool, repair_id).await
}

// ==================== Delivery ====================

pub async fn mark_delivered(
    state: &AppState,
    repair_id: i64,
    signature_url: Option<String>,
    actor: i64,
) -> AppResult<RepairResponse> {
    deliver(state, repair_id, signature_url, None, actor).await
}

async fn deliver(
    state: &AppState,
    repair_id: i64,
    signature_url: Option<String>,
    final_cost: Option<f64>,
    actor: i64,
) -> AppResult<RepairResponse> {
    let (_write, mut tx) = state.begin_write().await?;

    let mut repair = fetch_repair(&mut tx, repair_id).await?;
    if repair.status != RepairStatus::Ready {
        return Err(AppError::invalid_transition("repair", repair.status, RepairStatus::Delivered));
    }
    if final_cost.is_some() {
        repair.final_cost = final_cost;
    }

    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE repairs
         SET status = 'delivered', signature_url = COALESCE(?, signature_url),
             final_cost = COALESCE(?, final_cost), delivered_at = ?, updated_at = ?
         WHERE id = ? AND status = 'ready'",
    )
    .bind(&signature_url)
    .bind(final_cost)
    .bind(now)
    .bind(now)
    .bind(repair_id)
    .execute(&mut *tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::invalid_transition("repair", repair.status, RepairStatus::Delivered));
    }

    let amount = repair.billable_amount();
    if amount > 0.0 {
        finance::record_entry(
            &mut tx,
            NewEntry {
                entry_type: EntryType::Revenue,
                amount,
                reference_type: "repair",
                reference_id: repair_id.to_string(),
                description: format!("Repair {} ({})", repair.tracking_id, repair.device_model),
            },
            actor,
        )
        .await?;
    }

    insert_status_log(
        &mut tx,
        repair_id,
        Some(RepairStatus::Ready),
        RepairStatus::Delivered,
        None,
        actor,
    )
    .await?;

    tx.commit().await?;

    info!(repair_id, tracking_id = %repair.tracking_id, amount, "Repair delivered");
    state.audit.log(
        AuditEvent::new(AuditAction::RepairDelivered, "repair", repair_id, Some(actor))
            .old_values(json!({ "status": repair.status }))
            .new_values(json!({
                "status": RepairStatus::Delivered,
                "billed": amount,
                "final_cost": repair.final_cost,
                "signature_url": signature_url,
            })),
    );

    get_repair(&state.db_pool, repair_id).await
}

// ==================== Reads ====================

pub async fn get_repair(pool: &SqlitePool, repair_id: i64) -> AppResult<RepairResponse> {
    let mut conn = pool.acquire().await?;
    let repair = fetch_repair(&mut conn, repair_id).await?;
    let parts = fetch_parts(&mut conn, repair_id).await?;
    Ok(RepairResponse { repair, parts })
}

pub async fn get_repair_by_tracking(pool: &SqlitePool, tracking_id: &str) -> AppResult<RepairResponse> {
    let mut conn = pool.acquire().await?;
    let repair = sqlx::query_as::<_, Repair>(&format!(
        "SELECT {REPAIR_COLUMNS} FROM repairs WHERE tracking_id = ?"
    ))
    .bind(tracking_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Repair not found"))?;
    let parts = fetch_parts(&mut conn, repair.id).await?;
    Ok(RepairResponse { repair, parts })
}

async fn fetch_repair(conn: &mut SqliteConnection, repair_id: i64) -> AppResult<Repair> {
    sqlx::query_as::<_, Repair>(&format!("SELECT {REPAIR_COLUMNS} FROM repairs WHERE id = ?"))
        .bind(repair_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Repair not found"))
}

async fn fetch_parts(conn: &mut SqliteConnection, repair_id: i64) -> AppResult<Vec<RepairPart>> {
    let parts = sqlx::query_as::<_, RepairPart>(
        "SELECT id, repair_id, product_id, name, quantity, unit_cost, created_at
         FROM repair_parts WHERE repair_id = ? ORDER BY id",
    )
    .bind(repair_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(parts)
}

async fn insert_status_log(
    conn: &mut SqliteConnection,
    repair_id: i64,
    old_status: Option<RepairStatus>,
    new_status: RepairStatus,
    note: Option<&str>,
    actor: i64,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO repair_status_logs (repair_id, old_status, new_status, note, created_by, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(repair_id)
    .bind(old_status)
    .bind(new_status)
    .bind(note)
    .bind(actor)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{self, ACTOR};

    fn intake() -> CreateRepairRequest {
        CreateRepairRequest {
            customer_name: "Sam Okafor".into(),
            customer_phone: Some("555-0199".into()),
            device_model: "iPhone 13".into(),
            issue_description: "Cracked screen".into(),
            cost_estimate: Some(120.0),
        }
    }

    fn part(product_id: i64, quantity: i64, unit_cost: f64) -> RepairPartRequest {
        RepairPartRequest { product_id, quantity, unit_cost, name: String::new() }
    }

    async fn advance(state: &AppState, repair_id: i64, path: &[RepairStatus]) {
        for status in path {
            update_repair_status(
                state,
                repair_id,
                UpdateRepairStatusRequest { new_status: *status, final_cost: None, note: None },
                ACTOR,
            )
            .await
            .unwrap();
        }
    }

    /// Walks a fresh repair to `target` along the shortest legal path.
    async fn repair_in(state: &AppState, target: RepairStatus) -> i64 {
        use RepairStatus::*;
        let repair = create_repair(state, intake(), ACTOR).await.unwrap().repair;
        let path: &[RepairStatus] = match target {
            Received => &[],
            Diagnosing => &[Diagnosing],
            WaitingParts => &[Diagnosing, WaitingParts],
            Repairing => &[Diagnosing, Repairing],
            Ready => &[Diagnosing, Repairing, Ready],
            Delivered => &[Diagnosing, Repairing, Ready],
        };
        advance(state, repair.id, path).await;
        if target == Delivered {
            mark_delivered(state, repair.id, None, ACTOR).await.unwrap();
        }
        repair.id
    }

    #[tokio::test]
    async fn intake_starts_received() {
        let (state, mut rx) = test_support::state().await;
        let created = create_repair(&state, intake(), ACTOR).await.unwrap();

        assert_eq!(created.repair.status, RepairStatus::Received);
        assert!(created.repair.tracking_id.starts_with("RPR-"));
        assert_eq!(created.repair.cost_estimate, 120.0);

        let tracked = get_repair_by_tracking(&state.db_pool, &created.repair.tracking_id)
            .await
            .unwrap();
        assert_eq!(tracked.repair.id, created.repair.id);

        let events = test_support::drain(&mut rx);
        assert_eq!(events[0].action, AuditAction::RepairCreated);
    }

    #[tokio::test]
    async fn mark_delivered_requires_ready() {
        let (state, _rx) = test_support::state().await;

        for status in [
            RepairStatus::Received,
            RepairStatus::Diagnosing,
            RepairStatus::WaitingParts,
            RepairStatus::Repairing,
            RepairStatus::Delivered,
        ] {
            let repair_id = repair_in(&state, status).await;
            let before = test_support::count(&state, "finance_entries").await;

            let err = mark_delivered(&state, repair_id, None, ACTOR).await.unwrap_err();
            assert!(
                matches!(err, AppError::InvalidTransition { .. }),
                "delivering from {status} should fail"
            );
            assert_eq!(test_support::count(&state, "finance_entries").await, before);
        }
    }

    #[tokio::test]
    async fn status_table_is_enforced() {
        let (state, _rx) = test_support::state().await;
        let repair_id = repair_in(&state, RepairStatus::Received).await;

        let err = update_repair_status(
            &state,
            repair_id,
            UpdateRepairStatusRequest { new_status: RepairStatus::Ready, final_cost: None, note: None },
            ACTOR,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        // Delivered through the status endpoint still requires ready
        let err = update_repair_status(
            &state,
            repair_id,
            UpdateRepairStatusRequest { new_status: RepairStatus::Delivered, final_cost: None, note: None },
            ACTOR,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        let logs = test_support::count(&state, "repair_status_logs").await;
        assert_eq!(logs, 1);
    }

    #[tokio::test]
    async fn parts_consume_stock_and_accumulate_cost() {
        let (state, mut rx) = test_support::state().await;
        let screen = test_support::product(&state, "iPhone 13 screen", "part", 5, 60.0, 90.0).await;
        let battery = test_support::product(&state, "iPhone 13 battery", "part", 3, 20.0, 35.0).await;
        let repair_id = repair_in(&state, RepairStatus::Repairing).await;
        test_support::drain(&mut rx);

        let first = add_parts(&state, repair_id, vec![part(screen.id, 1, 60.0)], ACTOR).await.unwrap();
        assert_eq!(first.repair.cost_actual, 60.0);
        assert_eq!(first.parts[0].name, "iPhone 13 screen");

        let second = add_parts(
            &state,
            repair_id,
            vec![part(battery.id, 2, 20.0), part(screen.id, 1, 55.0)],
            ACTOR,
        )
        .await
        .unwrap();
        // Recomputed over every part, not just this call
        assert_eq!(second.repair.cost_actual, 155.0);
        assert_eq!(second.parts.len(), 3);

        assert_eq!(stock::get_product(&state.db_pool, screen.id).await.unwrap().quantity, 3);
        assert_eq!(stock::get_product(&state.db_pool, battery.id).await.unwrap().quantity, 1);

        let uses = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM stock_movements WHERE movement_type = 'repair_use' AND reference_id = ?",
        )
        .bind(repair_id.to_string())
        .fetch_one(&state.db_pool)
        .await
        .unwrap();
        assert_eq!(uses, 3);
        assert_eq!(test_support::drain(&mut rx).len(), 2);
    }

    #[tokio::test]
    async fn parts_shortage_rolls_back_the_whole_call() {
        let (state, _rx) = test_support::state().await;
        let screen = test_support::product(&state, "Screen", "part", 5, 60.0, 90.0).await;
        let battery = test_support::product(&state, "Battery", "part", 1, 20.0, 35.0).await;
        let repair_id = repair_in(&state, RepairStatus::Repairing).await;

        let err = add_parts(
            &state,
            repair_id,
            vec![part(screen.id, 1, 60.0), part(battery.id, 2, 20.0)],
            ACTOR,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { .. }));

        assert_eq!(stock::get_product(&state.db_pool, screen.id).await.unwrap().quantity, 5);
        assert_eq!(test_support::count(&state, "repair_parts").await, 0);
        assert_eq!(get_repair(&state.db_pool, repair_id).await.unwrap().repair.cost_actual, 0.0);
    }

    #[tokio::test]
    async fn delivered_repair_takes_no_parts() {
        let (state, _rx) = test_support::state().await;
        let screen = test_support::product(&state, "Screen", "part", 5, 60.0, 90.0).await;
        let repair_id = repair_in(&state, RepairStatus::Delivered).await;

        let err = add_parts(&state, repair_id, vec![part(screen.id, 1, 60.0)], ACTOR)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn delivery_books_final_cost_over_parts_cost() {
        let (state, _rx) = test_support::state().await;
        let screen = test_support::product(&state, "Screen", "part", 5, 60.0, 90.0).await;
        let repair_id = repair_in(&state, RepairStatus::Repairing).await;
        add_parts(&state, repair_id, vec![part(screen.id, 1, 60.0)], ACTOR).await.unwrap();
        update_repair_status(
            &state,
            repair_id,
            UpdateRepairStatusRequest {
                new_status: RepairStatus::Ready,
                final_cost: Some(150.0),
                note: Some("Tested".into()),
            },
            ACTOR,
        )
        .await
        .unwrap();

        let delivered = mark_delivered(&state, repair_id, Some("https://sig.example/1.png".into()), ACTOR)
            .await
            .unwrap();
        assert_eq!(delivered.repair.status, RepairStatus::Delivered);
        assert!(delivered.repair.delivered_at.is_some());
        assert_eq!(delivered.repair.signature_url.as_deref(), Some("https://sig.example/1.png"));

        let entries = finance::entries_for_reference(&state.db_pool, "repair", &repair_id.to_string())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_type, EntryType::Revenue);
        assert_eq!(entries[0].amount, 150.0);
    }

    #[tokio::test]
    async fn delivery_falls_back_to_parts_cost_and_skips_zero() {
        let (state, _rx) = test_support::state().await;
        let screen = test_support::product(&state, "Screen", "part", 5, 60.0, 90.0).await;

        let with_parts = repair_in(&state, RepairStatus::Repairing).await;
        add_parts(&state, with_parts, vec![part(screen.id, 2, 45.0)], ACTOR).await.unwrap();
        advance(&state, with_parts, &[RepairStatus::Ready]).await;
        mark_delivered(&state, with_parts, None, ACTOR).await.unwrap();
        let entries = finance::entries_for_reference(&state.db_pool, "repair", &with_parts.to_string())
            .await
            .unwrap();
        assert_eq!(entries[0].amount, 90.0);

        // Nothing billed: no finance entry at all
        let free = repair_in(&state, RepairStatus::Delivered).await;
        let entries = finance::entries_for_reference(&state.db_pool, "repair", &free.to_string())
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn status_endpoint_delivery_goes_through_mark_delivered() {
        let (state, _rx) = test_support::state().await;
        let repair_id = repair_in(&state, RepairStatus::Ready).await;

        let delivered = update_repair_status(
            &state,
            repair_id,
            UpdateRepairStatusRequest {
                new_status: RepairStatus::Delivered,
                final_cost: Some(80.0),
                note: None,
            },
            ACTOR,
        )
        .await
        .unwrap();
        assert_eq!(delivered.repair.status, RepairStatus::Delivered);
        assert_eq!(delivered.repair.final_cost, Some(80.0));

        let entries = finance::entries_for_reference(&state.db_pool, "repair", &repair_id.to_string())
            .await
            .unwrap();
        assert_eq!(entries[0].amount, 80.0);
    }

    #[tokio::test]
    async fn concurrent_status_updates_apply_once() {
        let (state, _rx) = test_support::state().await;
        let repair_id = repair_in(&state, RepairStatus::Received).await;
        let to_diagnosing = || UpdateRepairStatusRequest {
            new_status: RepairStatus::Diagnosing,
            final_cost: None,
            note: None,
        };

        let (a, b) = tokio::join!(
            update_repair_status(&state, repair_id, to_diagnosing(), ACTOR),
            update_repair_status(&state, repair_id, to_diagnosing(), ACTOR),
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::InvalidTransition { .. }))));
        assert_eq!(test_support::count(&state, "repair_status_logs").await, 2);
    }
}
