//! Supplier ordering and receiving.

use chrono::Utc;
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::audit::{AuditAction, AuditEvent};
use crate::dtos::purchase_order::{
    CreatePurchaseOrderRequest, CreateSupplierRequest, PurchaseOrderResponse,
};
use crate::error::{AppError, AppResult};
use crate::models::finance::EntryType;
use crate::models::product::MovementType;
use crate::models::purchase_order::{
    PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus, Supplier,
};
use crate::services::finance::{self, NewEntry};
use crate::services::stock::{self, MovementInput};
use crate::services::{document_number, is_valid_amount};
use crate::state::AppState;

const PO_COLUMNS: &str =
    "id, po_number, supplier_id, status, total_amount, notes, created_by, created_at, received_at";

// ==================== Suppliers ====================

pub async fn create_supplier(
    state: &AppState,
    req: CreateSupplierRequest,
    actor: i64,
) -> AppResult<Supplier> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Supplier name is required"));
    }

    let (_write, mut tx) = state.begin_write().await?;
    let supplier = sqlx::query_as::<_, Supplier>(
        "INSERT INTO suppliers (name, phone, email, created_at)
         VALUES (?, ?, ?, ?)
         RETURNING id, name, phone, email, created_at",
    )
    .bind(name)
    .bind(&req.phone)
    .bind(&req.email)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::conflict(format!("Supplier '{}' already exists", name))
        }
        other => AppError::from(other),
    })?;
    tx.commit().await?;

    state.audit.log(
        AuditEvent::new(AuditAction::SupplierCreated, "supplier", supplier.id, Some(actor))
            .new_values(json!(supplier)),
    );

    Ok(supplier)
}

pub async fn list_suppliers(pool: &SqlitePool) -> AppResult<Vec<Supplier>> {
    let suppliers = sqlx::query_as::<_, Supplier>(
        "SELECT id, name, phone, email, created_at FROM suppliers ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(suppliers)
}

// ==================== Purchase orders ====================

pub async fn create_po(
    state: &AppState,
    req: CreatePurchaseOrderRequest,
    actor: i64,
) -> AppResult<PurchaseOrderResponse> {
    if req.items.is_empty() {
        return Err(AppError::validation("Purchase order must contain at least one item"));
    }
    for item in &req.items {
        if item.quantity <= 0 {
            return Err(AppError::validation("Item quantity must be greater than 0"));
        }
        if !is_valid_amount(item.unit_cost) {
            return Err(AppError::validation("Item unit cost cannot be negative"));
        }
    }

    let total_amount: f64 = req
        .items
        .iter()
        .map(|item| item.unit_cost * item.quantity as f64)
        .sum();
    let status = if req.submit {
        PurchaseOrderStatus::Submitted
    } else {
        PurchaseOrderStatus::Draft
    };

    let (_write, mut tx) = state.begin_write().await?;

    let supplier_exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM suppliers WHERE id = ?")
        .bind(req.supplier_id)
        .fetch_one(&mut *tx)
        .await?;
    if supplier_exists == 0 {
        return Err(AppError::not_found("Supplier not found"));
    }
    for item in &req.items {
        stock::fetch_product(&mut tx, item.product_id).await?;
    }

    let purchase_order = sqlx::query_as::<_, PurchaseOrder>(&format!(
        "INSERT INTO purchase_orders (po_number, supplier_id, status, total_amount, notes, created_by, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         RETURNING {PO_COLUMNS}"
    ))
    .bind(document_number("PO"))
    .bind(req.supplier_id)
    .bind(status)
    .bind(total_amount)
    .bind(&req.notes)
    .bind(actor)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    for item in &req.items {
        sqlx::query(
            "INSERT INTO purchase_order_items (purchase_order_id, product_id, quantity, unit_cost, received_quantity)
             VALUES (?, ?, ?, ?, 0)",
        )
        .bind(purchase_order.id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.unit_cost)
        .execute(&mut *tx)
        .await?;
    }

    let items = fetch_items(&mut tx, purchase_order.id).await?;
    tx.commit().await?;

    info!(
        po_id = purchase_order.id,
        po_number = %purchase_order.po_number,
        total_amount,
        "Purchase order created"
    );
    state.audit.log(
        AuditEvent::new(AuditAction::PurchaseOrderCreated, "purchase_order", purchase_order.id, Some(actor))
            .new_values(json!({ "purchase_order": purchase_order, "items": items })),
    );

    Ok(PurchaseOrderResponse { purchase_order, items })
}

pub async fn submit_po(state: &AppState, po_id: i64, actor: i64) -> AppResult<PurchaseOrderResponse> {
    let (_write, mut tx) = state.begin_write().await?;

    let purchase_order = fetch_po(&mut tx, po_id).await?;
    if !purchase_order.status.can_transition_to(PurchaseOrderStatus::Submitted) {
        return Err(AppError::invalid_transition(
            "purchase_order",
            purchase_order.status,
            PurchaseOrderStatus::Submitted,
        ));
    }

    sqlx::query("UPDATE purchase_orders SET status = 'submitted' WHERE id = ? AND status = 'draft'")
        .bind(po_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    state.audit.log(
        AuditEvent::new(AuditAction::PurchaseOrderSubmitted, "purchase_order", po_id, Some(actor))
            .old_values(json!({ "status": purchase_order.status }))
            .new_values(json!({ "status": PurchaseOrderStatus::Submitted })),
    );

    get_po(&state.db_pool, po_id).await
}

/// Credits every line to stock and books the purchase cost. The status
/// claim makes a second call fail before any stock is touched.
pub async fn receive_po(state: &AppState, po_id: i64, actor: i64) -> AppResult<PurchaseOrderResponse> {
    let (_write, mut tx) = state.begin_write().await?;

    let purchase_order = fetch_po(&mut tx, po_id).await?;
    if !purchase_order.status.can_transition_to(PurchaseOrderStatus::Received) {
        warn!(po_id, status = %purchase_order.status, "Purchase order already received");
        return Err(AppError::invalid_transition(
            "purchase_order",
            purchase_order.status,
            PurchaseOrderStatus::Received,
        ));
    }

    let claimed = sqlx::query(
        "UPDATE purchase_orders SET status = 'received', received_at = ?
         WHERE id = ? AND status != 'received'",
    )
    .bind(Utc::now())
    .bind(po_id)
    .execute(&mut *tx)
    .await?;
    if claimed.rows_affected() == 0 {
        return Err(AppError::invalid_transition(
            "purchase_order",
            PurchaseOrderStatus::Received,
            PurchaseOrderStatus::Received,
        ));
    }

    let items = fetch_items(&mut tx, po_id).await?;
    let reference_id = po_id.to_string();
    for item in &items {
        stock::apply_movement(
            &mut tx,
            &MovementInput {
                product_id: item.product_id,
                change: item.quantity,
                movement_type: MovementType::Purchase,
                reference_id: Some(reference_id.clone()),
                note: Some(format!("Received on {}", purchase_order.po_number)),
            },
            actor,
        )
        .await?;
    }

    sqlx::query("UPDATE purchase_order_items SET received_quantity = quantity WHERE purchase_order_id = ?")
        .bind(po_id)
        .execute(&mut *tx)
        .await?;

    if purchase_order.total_amount > 0.0 {
        finance::record_entry(
            &mut tx,
            NewEntry {
                entry_type: EntryType::Purchase,
                amount: purchase_order.total_amount,
                reference_type: "purchase_order",
                reference_id,
                description: format!("Purchase order {}", purchase_order.po_number),
            },
            actor,
        )
        .await?;
    }

    tx.commit().await?;

    info!(
        po_id,
        po_number = %purchase_order.po_number,
        lines = items.len(),
        "Purchase order received"
    );
    state.audit.log(
        AuditEvent::new(AuditAction::PurchaseOrderReceived, "purchase_order", po_id, Some(actor))
            .old_values(json!({ "status": purchase_order.status }))
            .new_values(json!({
                "status": PurchaseOrderStatus::Received,
                "total_amount": purchase_order.total_amount,
                "items": items
                    .iter()
                    .map(|i| json!({ "product_id": i.product_id, "quantity": i.quantity }))
                    .collect::<Vec<_>>(),
            })),
    );

    get_po(&state.db_pool, po_id).await
}

pub async fn get_po(pool: &SqlitePool, po_id: i64) -> AppResult<PurchaseOrderResponse> {
    let mut conn = pool.acquire().await?;
    let purchase_order = fetch_po(&mut conn, po_id).await?;
    let items = fetch_items(&mut conn, po_id).await?;
    Ok(PurchaseOrderResponse { purchase_order, items })
}

pub async fn list_pos(
    pool: &SqlitePool,
    status: Option<PurchaseOrderStatus>,
    limit: i64,
) -> AppResult<Vec<PurchaseOrder>> {
    let rows = sqlx::query_as::<_, PurchaseOrder>(&format!(
        "SELECT {PO_COLUMNS} FROM purchase_orders
         WHERE (? IS NULL OR status = ?)
         ORDER BY created_at DESC, id DESC
         LIMIT ?"
    ))
    .bind(status)
    .bind(status)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

async fn fetch_po(conn: &mut SqliteConnection, po_id: i64) -> AppResult<PurchaseOrder> {
    sqlx::query_as::<_, PurchaseOrder>(&format!("SELECT {PO_COLUMNS} FROM purchase_orders WHERE id = ?"))
        .bind(po_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Purchase order not found"))
}

async fn fetch_items(conn: &mut SqliteConnection, po_id: i64) -> AppResult<Vec<PurchaseOrderItem>> {
    let items = sqlx::query_as::<_, PurchaseOrderItem>(
        "SELECT id, purchase_order_id, product_id, quantity, unit_cost, received_quantity
         FROM purchase_order_items WHERE purchase_order_id = ? ORDER BY id",
    )
    .bind(po_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}
