//! Stock ledger: the only code allowed to change `products.quantity`.
//!
//! A movement is applied as one conditional UPDATE (`quantity + change >= 0`)
//! followed by an append to `stock_movements`, both on the caller's
//! connection. A decrement that would go below zero matches no row and is
//! rejected with `InsufficientStock`; quantities are never clamped, so a
//! product's quantity always equals the sum of its movements.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::audit::{AuditAction, AuditEvent};
use crate::dtos::product::CreateProductRequest;
use crate::dtos::stock::{
    CreateMovementRequest, InventorySnapshot, ProductMovementHistory, ReconcileResponse,
    SlowMovingProduct, StockCount, StockMovementDetail, TypeDistribution, Variance,
};
use crate::error::{AppError, AppResult};
use crate::models::product::{InventorySnapshotRow, MovementType, Product, StockMovement};
use crate::services::{document_number, is_valid_amount};
use crate::state::AppState;

const PRODUCT_COLUMNS: &str = "id, name, product_type, quantity, low_stock_threshold,
    purchase_price, selling_price, is_active, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct MovementInput {
    pub product_id: i64,
    pub change: i64,
    pub movement_type: MovementType,
    pub reference_id: Option<String>,
    pub note: Option<String>,
}

// ==================== Ledger core ====================

/// Applies one signed quantity change and appends its movement record.
///
/// Runs on the caller's connection so workflows can include it in their
/// transaction. Nothing is written when the call fails.
pub async fn apply_movement(
    conn: &mut SqliteConnection,
    input: &MovementInput,
    actor: i64,
) -> AppResult<StockMovement> {
    if input.change == 0 {
        return Err(AppError::validation("Movement change cannot be 0"));
    }
    let requested = input
        .change
        .checked_neg()
        .ok_or_else(|| AppError::validation("Movement change is out of range"))?;

    let available = fetch_quantity(conn, input.product_id).await?;
    if available.checked_add(input.change).is_none() {
        return Err(AppError::validation("Movement change is out of range"));
    }

    let now = Utc::now();

    // Availability check and write in one statement
    let updated = sqlx::query_scalar::<_, i64>(
        "UPDATE products
         SET quantity = quantity + ?, updated_at = ?
         WHERE id = ? AND quantity + ? >= 0
         RETURNING quantity",
    )
    .bind(input.change)
    .bind(now)
    .bind(input.product_id)
    .bind(input.change)
    .fetch_optional(&mut *conn)
    .await?;

    if updated.is_none() {
        warn!(
            product_id = input.product_id,
            available,
            requested,
            movement_type = input.movement_type.as_str(),
            "Stock movement rejected"
        );
        return Err(AppError::InsufficientStock {
            product_id: input.product_id,
            available,
            requested,
        });
    }

    let movement = sqlx::query_as::<_, StockMovement>(
        "INSERT INTO stock_movements
         (product_id, change, movement_type, reference_id, note, created_by, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         RETURNING id, product_id, change, movement_type, reference_id, note, created_by, created_at",
    )
    .bind(input.product_id)
    .bind(input.change)
    .bind(input.movement_type)
    .bind(&input.reference_id)
    .bind(&input.note)
    .bind(actor)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    Ok(movement)
}

/// POST /stock/movements - a standalone movement in its own transaction.
pub async fn record_movement(
    state: &AppState,
    req: CreateMovementRequest,
    actor: i64,
) -> AppResult<StockMovement> {
    if req.movement_type == MovementType::Initial {
        return Err(AppError::validation(
            "'initial' movements are only created with the product",
        ));
    }

    let (_write, mut tx) = state.begin_write().await?;

    let before = fetch_quantity(&mut tx, req.product_id).await?;
    let movement = apply_movement(
        &mut tx,
        &MovementInput {
            product_id: req.product_id,
            change: req.change,
            movement_type: req.movement_type,
            reference_id: req.reference_id,
            note: req.note,
        },
        actor,
    )
    .await?;

    tx.commit().await?;

    state.audit.log(
        AuditEvent::new(AuditAction::StockMovementApplied, "product", movement.product_id, Some(actor))
            .old_values(json!({ "quantity": before }))
            .new_values(json!({
                "quantity": before + movement.change,
                "movement_id": movement.id,
                "movement_type": movement.movement_type,
                "change": movement.change,
            })),
    );

    Ok(movement)
}

async fn fetch_quantity(conn: &mut SqliteConnection, product_id: i64) -> AppResult<i64> {
    sqlx::query_scalar::<_, i64>("SELECT quantity FROM products WHERE id = ?")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product {} not found", product_id)))
}

// ==================== Products ====================

pub async fn create_product(
    state: &AppState,
    req: CreateProductRequest,
    actor: i64,
) -> AppResult<Product> {
    if req.name.trim().is_empty() {
        return Err(AppError::validation("Product name is required"));
    }
    if req.product_type.trim().is_empty() {
        return Err(AppError::validation("Product type is required"));
    }
    if !is_valid_amount(req.purchase_price) || !is_valid_amount(req.selling_price) {
        return Err(AppError::validation("Prices must be non-negative numbers"));
    }
    let threshold = req.low_stock_threshold.unwrap_or(5);
    let initial_quantity = req.initial_quantity.unwrap_or(0);
    if threshold < 0 || initial_quantity < 0 {
        return Err(AppError::validation(
            "Low stock threshold and initial quantity cannot be negative",
        ));
    }

    let (_write, mut tx) = state.begin_write().await?;
    let now = Utc::now();

    // Quantity starts at zero; opening stock goes through the ledger
    let product_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO products
         (name, product_type, quantity, low_stock_threshold, purchase_price, selling_price,
          is_active, created_at, updated_at)
         VALUES (?, ?, 0, ?, ?, ?, 1, ?, ?)
         RETURNING id",
    )
    .bind(req.name.trim())
    .bind(req.product_type.trim())
    .bind(threshold)
    .bind(req.purchase_price)
    .bind(req.selling_price)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    if initial_quantity > 0 {
        apply_movement(
            &mut tx,
            &MovementInput {
                product_id,
                change: initial_quantity,
                movement_type: MovementType::Initial,
                reference_id: None,
                note: Some("Opening stock".to_string()),
            },
            actor,
        )
        .await?;
    }

    let product = fetch_product(&mut tx, product_id).await?;
    tx.commit().await?;

    info!(product_id, name = %product.name, quantity = product.quantity, "Product created");
    state.audit.log(
        AuditEvent::new(AuditAction::ProductCreated, "product", product.id, Some(actor))
            .new_values(json!(product)),
    );

    Ok(product)
}

pub async fn set_product_active(
    state: &AppState,
    product_id: i64,
    is_active: bool,
    actor: i64,
) -> AppResult<Product> {
    let (_write, mut tx) = state.begin_write().await?;

    let before = fetch_product(&mut tx, product_id).await?;
    sqlx::query("UPDATE products SET is_active = ?, updated_at = ? WHERE id = ?")
        .bind(is_active)
        .bind(Utc::now())
        .bind(product_id)
        .execute(&mut *tx)
        .await?;
    let product = fetch_product(&mut tx, product_id).await?;

    tx.commit().await?;

    state.audit.log(
        AuditEvent::new(AuditAction::ProductActiveChanged, "product", product_id, Some(actor))
            .old_values(json!({ "is_active": before.is_active }))
            .new_values(json!({ "is_active": product.is_active })),
    );

    Ok(product)
}

pub(crate) async fn fetch_product(conn: &mut SqliteConnection, product_id: i64) -> AppResult<Product> {
    sqlx::query_as::<_, Product>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"))
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product {} not found", product_id)))
}

pub async fn get_product(pool: &SqlitePool, product_id: i64) -> AppResult<Product> {
    let mut conn = pool.acquire().await?;
    fetch_product(&mut conn, product_id).await
}

pub async fn list_products(pool: &SqlitePool) -> AppResult<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name"
    ))
    .fetch_all(pool)
    .await?;

    Ok(products)
}

// ==================== Reads ====================

pub async fn get_product_movements(
    pool: &SqlitePool,
    product_id: i64,
) -> AppResult<ProductMovementHistory> {
    let product = get_product(pool, product_id).await?;

    // Running balance in ledger order, returned newest first
    let movements = sqlx::query_as::<_, StockMovementDetail>(
        "SELECT * FROM (
            SELECT id, change, movement_type, reference_id, note, created_by, created_at,
                   SUM(change) OVER (ORDER BY created_at, id) AS running_balance
            FROM stock_movements
            WHERE product_id = ?
         )
         ORDER BY created_at DESC, id DESC",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    Ok(ProductMovementHistory {
        product_id: product.id,
        product_name: product.name,
        current_quantity: product.quantity,
        movements,
    })
}

/// Active products at or below their restock threshold.
pub async fn get_low_stock_products(pool: &SqlitePool) -> AppResult<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products
         WHERE is_active = 1 AND quantity <= low_stock_threshold
         ORDER BY quantity ASC, name ASC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(products)
}

/// Active products holding stock that have not sold within `days`.
pub async fn get_slow_moving_products(
    pool: &SqlitePool,
    days: i64,
) -> AppResult<Vec<SlowMovingProduct>> {
    if days <= 0 {
        return Err(AppError::validation("days must be greater than 0"));
    }
    let cutoff = Duration::try_days(days)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .ok_or_else(|| AppError::validation("days is out of range"))?;

    let products = sqlx::query_as::<_, SlowMovingProduct>(
        "SELECT p.id, p.name, p.product_type, p.quantity,
                (SELECT MAX(sm.created_at) FROM stock_movements sm
                 WHERE sm.product_id = p.id AND sm.movement_type = 'sale') AS last_sale_at
         FROM products p
         WHERE p.is_active = 1
           AND p.quantity > 0
           AND NOT EXISTS (
               SELECT 1 FROM stock_movements sm
               WHERE sm.product_id = p.id AND sm.movement_type = 'sale' AND sm.created_at >= ?
           )
         ORDER BY p.quantity DESC, p.name ASC",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    Ok(products)
}

// ==================== Snapshot ====================

/// Point-in-time capital per product type. `total_capital` and
/// `total_items` are summed from the distribution so they always reconcile.
pub async fn create_snapshot(state: &AppState, actor: i64) -> AppResult<InventorySnapshot> {
    let (_write, mut tx) = state.begin_write().await?;

    let distribution = sqlx::query_as::<_, TypeDistribution>(
        "SELECT product_type,
                CAST(COALESCE(SUM(purchase_price * quantity), 0) AS REAL) AS capital,
                COALESCE(SUM(quantity), 0) AS items,
                COUNT(*) AS product_count
         FROM products
         WHERE is_active = 1
         GROUP BY product_type
         ORDER BY product_type",
    )
    .fetch_all(&mut *tx)
    .await?;

    let total_capital: f64 = distribution.iter().map(|d| d.capital).sum();
    let total_items: i64 = distribution.iter().map(|d| d.items).sum();
    let distribution_json = serde_json::to_string(&distribution)
        .map_err(|e| AppError::internal(format!("Snapshot serialization failed: {e}")))?;

    let row = sqlx::query_as::<_, InventorySnapshotRow>(
        "INSERT INTO inventory_snapshots (total_capital, total_items, distribution, created_by, created_at)
         VALUES (?, ?, ?, ?, ?)
         RETURNING id, total_capital, total_items, distribution, created_by, created_at",
    )
    .bind(total_capital)
    .bind(total_items)
    .bind(&distribution_json)
    .bind(actor)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    state.audit.log(
        AuditEvent::new(AuditAction::SnapshotCreated, "inventory_snapshot", row.id, Some(actor))
            .new_values(json!({ "total_capital": total_capital, "total_items": total_items })),
    );

    Ok(InventorySnapshot {
        id: row.id,
        total_capital: row.total_capital,
        total_items: row.total_items,
        distribution,
        created_by: row.created_by,
        created_at: row.created_at,
    })
}

pub async fn list_snapshots(pool: &SqlitePool, limit: i64) -> AppResult<Vec<InventorySnapshot>> {
    let rows = sqlx::query_as::<_, InventorySnapshotRow>(
        "SELECT id, total_capital, total_items, distribution, created_by, created_at
         FROM inventory_snapshots
         ORDER BY created_at DESC, id DESC
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let distribution = serde_json::from_str(&row.distribution)
                .map_err(|e| AppError::internal(format!("Corrupt snapshot {}: {e}", row.id)))?;
            Ok(InventorySnapshot {
                id: row.id,
                total_capital: row.total_capital,
                total_items: row.total_items,
                distribution,
                created_by: row.created_by,
                created_at: row.created_at,
            })
        })
        .collect()
}

// ==================== Reconcile ====================

/// Applies a physical stock count. Every nonzero variance becomes one
/// `adjustment` movement; all adjustments share a count reference id.
pub async fn reconcile(
    state: &AppState,
    counts: Vec<StockCount>,
    actor: i64,
) -> AppResult<ReconcileResponse> {
    if counts.is_empty() {
        return Err(AppError::validation("At least one stock count is required"));
    }
    let mut seen = HashSet::new();
    for count in &counts {
        if count.actual_count < 0 {
            return Err(AppError::validation(format!(
                "Counted quantity for product {} cannot be negative",
                count.product_id
            )));
        }
        if !seen.insert(count.product_id) {
            return Err(AppError::validation(format!(
                "Product {} is counted more than once",
                count.product_id
            )));
        }
    }

    let reference_id = document_number("CNT");
    let (_write, mut tx) = state.begin_write().await?;

    let mut variances = Vec::with_capacity(counts.len());
    for count in &counts {
        let product = fetch_product(&mut tx, count.product_id).await?;
        let diff = count.actual_count - product.quantity;

        if diff != 0 {
            apply_movement(
                &mut tx,
                &MovementInput {
                    product_id: product.id,
                    change: diff,
                    movement_type: MovementType::Adjustment,
                    reference_id: Some(reference_id.clone()),
                    note: Some("Stock count variance".to_string()),
                },
                actor,
            )
            .await?;
        }

        variances.push(Variance {
            product_id: product.id,
            product_name: product.name,
            expected: product.quantity,
            actual: count.actual_count,
            diff,
        });
    }

    tx.commit().await?;

    let adjusted: Vec<&Variance> = variances.iter().filter(|v| v.diff != 0).collect();
    info!(reference_id = %reference_id, counted = variances.len(), adjusted = adjusted.len(), "Stock reconciled");
    for variance in &adjusted {
        state.audit.log(
            AuditEvent::new(AuditAction::StockReconciled, "product", variance.product_id, Some(actor))
                .old_values(json!({ "quantity": variance.expected }))
                .new_values(json!({
                    "quantity": variance.actual,
                    "diff": variance.diff,
                    "reference_id": reference_id,
                })),
        );
    }

    Ok(ReconcileResponse {
        adjusted_products: adjusted.len(),
        reference_id,
        variances,
    })
}
