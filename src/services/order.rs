//! Online checkout and point-of-sale orders.
//!
//! ```text
//! place_order ── pending ─┬─> confirmed ─> processing ─> shipped ─> delivered
//!                         └─> (any open status) ─> cancelled
//! place_order(pos) ────────────────────────────────────────────> delivered
//! process_return ─> cancelled, stock restored once
//! ```

use chrono::Utc;
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::audit::{AuditAction, AuditEvent};
use crate::dtos::order::{OrderItemRequest, OrderResponse, PlaceOrderRequest, UpdateOrderStatusRequest};
use crate::error::{AppError, AppResult};
use crate::models::finance::EntryType;
use crate::models::order::{Order, OrderItem, OrderStatus, OrderStatusLog};
use crate::models::product::MovementType;
use crate::services::finance::{self, NewEntry};
use crate::services::stock::{self, MovementInput};
use crate::services::{document_number, is_valid_amount};
use crate::state::AppState;

const ORDER_COLUMNS: &str = "id, order_number, status, total_amount, discount_amount, is_pos_sale,
    customer_name, customer_phone, customer_email, shipping_address, returned_at,
    created_by, created_at, updated_at";

/// A validated order line, priced and merged per product.
struct PricedLine {
    product_id: i64,
    quantity: i64,
    unit_price: f64,
}

/// Merges repeated product lines; conflicting explicit prices are rejected.
fn merge_lines(items: &[OrderItemRequest]) -> AppResult<Vec<OrderItemRequest>> {
    let mut merged: Vec<OrderItemRequest> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity <= 0 {
            return Err(AppError::validation("Quantity must be greater than 0"));
        }
        if let Some(price) = item.unit_price {
            if !is_valid_amount(price) {
                return Err(AppError::validation("Unit price cannot be negative"));
            }
        }

        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => {
                if existing.unit_price != item.unit_price {
                    return Err(AppError::validation(format!(
                        "Product {} appears with different prices",
                        item.product_id
                    )));
                }
                existing.quantity = existing
                    .quantity
                    .checked_add(item.quantity)
                    .ok_or_else(|| AppError::validation("Quantity is too large"))?;
            }
            None => merged.push(item.clone()),
        }
    }
    Ok(merged)
}

// ==================== Place Order ====================

pub async fn place_order(
    state: &AppState,
    req: PlaceOrderRequest,
    actor: i64,
) -> AppResult<OrderResponse> {
    if req.items.is_empty() {
        return Err(AppError::validation("Order must contain at least one item"));
    }
    if req.customer.name.trim().is_empty() {
        return Err(AppError::validation("Customer name is required"));
    }
    let discount_amount = req.discount_amount.unwrap_or(0.0);
    if !is_valid_amount(discount_amount) {
        return Err(AppError::validation("Discount cannot be negative"));
    }
    let lines = merge_lines(&req.items)?;

    let (_write, mut tx) = state.begin_write().await?;

    // Check every line before writing anything
    let mut priced = Vec::with_capacity(lines.len());
    for line in &lines {
        let product = stock::fetch_product(&mut tx, line.product_id).await?;
        if !product.is_active {
            return Err(AppError::validation(format!(
                "Product '{}' is not available for sale",
                product.name
            )));
        }
        if product.quantity < line.quantity {
            warn!(
                product_id = product.id,
                available = product.quantity,
                requested = line.quantity,
                "Order rejected: insufficient stock"
            );
            return Err(AppError::InsufficientStock {
                product_id: product.id,
                available: product.quantity,
                requested: line.quantity,
            });
        }
        priced.push(PricedLine {
            product_id: product.id,
            quantity: line.quantity,
            unit_price: line.unit_price.unwrap_or(product.selling_price),
        });
    }

    let subtotal: f64 = priced.iter().map(|l| l.quantity as f64 * l.unit_price).sum();
    if discount_amount > subtotal {
        return Err(AppError::validation("Discount cannot exceed the order subtotal"));
    }
    let total_amount = subtotal - discount_amount;
    let status = OrderStatus::initial(req.is_pos_sale);
    let now = Utc::now();

    let order = sqlx::query_as::<_, Order>(&format!(
        "INSERT INTO orders
         (order_number, status, total_amount, discount_amount, is_pos_sale, customer_name,
          customer_phone, customer_email, shipping_address, created_by, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(document_number("ORD"))
    .bind(status)
    .bind(total_amount)
    .bind(discount_amount)
    .bind(req.is_pos_sale)
    .bind(req.customer.name.trim())
    .bind(&req.customer.phone)
    .bind(&req.customer.email)
    .bind(&req.customer.address)
    .bind(actor)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    let reference_id = order.id.to_string();
    for line in &priced {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, quantity, unit_price) VALUES (?, ?, ?, ?)",
        )
        .bind(order.id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .execute(&mut *tx)
        .await?;

        // The conditional decrement re-checks availability inside the transaction
        stock::apply_movement(
            &mut tx,
            &MovementInput {
                product_id: line.product_id,
                change: -line.quantity,
                movement_type: MovementType::Sale,
                reference_id: Some(reference_id.clone()),
                note: Some(format!("Order {}", order.order_number)),
            },
            actor,
        )
        .await?;
    }

    insert_status_log(&mut tx, order.id, None, status, None, actor).await?;

    if total_amount > 0.0 {
        finance::record_entry(
            &mut tx,
            NewEntry {
                entry_type: EntryType::Revenue,
                amount: total_amount,
                reference_type: "order",
                reference_id: reference_id.clone(),
                description: format!("Sale {}", order.order_number),
            },
            actor,
        )
        .await?;
    }

    tx.commit().await?;

    info!(
        order_id = order.id,
        order_number = %order.order_number,
        total_amount,
        is_pos_sale = order.is_pos_sale,
        "Order placed"
    );

    let response = get_order(&state.db_pool, order.id).await?;
    state.audit.log(
        AuditEvent::new(AuditAction::OrderPlaced, "order", order.id, Some(actor)).new_values(json!({
            "order_number": response.order.order_number,
            "status": response.order.status,
            "total_amount": response.order.total_amount,
            "discount_amount": response.order.discount_amount,
            "is_pos_sale": response.order.is_pos_sale,
            "items": response.items,
        })),
    );

    Ok(response)
}

// ==================== Status Update ====================

/// Records a status change. Never touches stock.
pub async fn update_order_status(
    state: &AppState,
    order_id: i64,
    req: UpdateOrderStatusRequest,
    actor: i64,
) -> AppResult<OrderResponse> {
    let (_write, mut tx) = state.begin_write().await?;

    let order = fetch_order(&mut tx, order_id).await?;
    if !order.status.can_transition_to(req.new_status) {
        return Err(AppError::invalid_transition("order", order.status, req.new_status));
    }

    let result = sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
        .bind(req.new_status)
        .bind(Utc::now())
        .bind(order_id)
        .bind(order.status)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::invalid_transition("order", order.status, req.new_status));
    }

    insert_status_log(
        &mut tx,
        order_id,
        Some(order.status),
        req.new_status,
        req.note.as_deref(),
        actor,
    )
    .await?;

    tx.commit().await?;

    state.audit.log(
        AuditEvent::new(AuditAction::OrderStatusChanged, "order", order_id, Some(actor))
            .old_values(json!({ "status": order.status }))
            .new_values(json!({ "status": req.new_status, "note": req.note })),
    );

    get_order(&state.db_pool, order_id).await
}

// ==================== Return ====================

/// Restores every sold line to stock and cancels the order, once.
///
/// `returned_at` is the idempotency key: it is claimed with a conditional
/// UPDATE, so a repeated call fails before any stock is credited.
pub async fn process_return(
    state: &AppState,
    order_id: i64,
    reason: &str,
    actor: i64,
) -> AppResult<OrderResponse> {
    if reason.trim().is_empty() {
        return Err(AppError::validation("Return reason is required"));
    }

    let (_write, mut tx) = state.begin_write().await?;

    let order = fetch_order(&mut tx, order_id).await?;
    let now = Utc::now();

    let claimed = sqlx::query(
        "UPDATE orders SET status = 'cancelled', returned_at = ?, updated_at = ?
         WHERE id = ? AND returned_at IS NULL",
    )
    .bind(now)
    .bind(now)
    .bind(order_id)
    .execute(&mut *tx)
    .await?;
    if claimed.rows_affected() == 0 {
        return Err(AppError::invalid_transition("order", order.status, "returned"));
    }

    let items = fetch_items(&mut tx, order_id).await?;
    let reference_id = order_id.to_string();
    for item in &items {
        stock::apply_movement(
            &mut tx,
            &MovementInput {
                product_id: item.product_id,
                change: item.quantity,
                movement_type: MovementType::Return,
                reference_id: Some(reference_id.clone()),
                note: Some(reason.trim().to_string()),
            },
            actor,
        )
        .await?;
    }

    if order.status != OrderStatus::Cancelled {
        insert_status_log(
            &mut tx,
            order_id,
            Some(order.status),
            OrderStatus::Cancelled,
            Some(reason.trim()),
            actor,
        )
        .await?;
    }

    if order.total_amount > 0.0 {
        finance::record_entry(
            &mut tx,
            NewEntry {
                entry_type: EntryType::Expense,
                amount: order.total_amount,
                reference_type: "order",
                reference_id: reference_id.clone(),
                description: format!("Return {}: {}", order.order_number, reason.trim()),
            },
            actor,
        )
        .await?;
    }

    tx.commit().await?;

    info!(order_id, order_number = %order.order_number, items = items.len(), "Order returned");
    state.audit.log(
        AuditEvent::new(AuditAction::OrderReturned, "order", order_id, Some(actor))
            .old_values(json!({ "status": order.status }))
            .new_values(json!({
                "status": OrderStatus::Cancelled,
                "reason": reason.trim(),
                "restored": items
                    .iter()
                    .map(|i| json!({ "product_id": i.product_id, "quantity": i.quantity }))
                    .collect::<Vec<_>>(),
            })),
    );

    get_order(&state.db_pool, order_id).await
}

// ==================== Reads ====================

pub async fn get_order(pool: &SqlitePool, order_id: i64) -> AppResult<OrderResponse> {
    let mut conn = pool.acquire().await?;
    let order = fetch_order(&mut conn, order_id).await?;
    let items = fetch_items(&mut conn, order_id).await?;
    let status_history = sqlx::query_as::<_, OrderStatusLog>(
        "SELECT id, order_id, old_status, new_status, note, created_by, created_at
         FROM order_status_logs
         WHERE order_id = ?
         ORDER BY created_at ASC, id ASC",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(OrderResponse { order, items, status_history })
}

pub async fn list_orders(
    pool: &SqlitePool,
    status: Option<OrderStatus>,
    limit: i64,
) -> AppResult<Vec<Order>> {
    let orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders
         WHERE (? IS NULL OR status = ?)
         ORDER BY created_at DESC, id DESC
         LIMIT ?"
    ))
    .bind(status)
    .bind(status)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(orders)
}

async fn fetch_order(conn: &mut SqliteConnection, order_id: i64) -> AppResult<Order> {
    sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))
}

async fn fetch_items(conn: &mut SqliteConnection, order_id: i64) -> AppResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT id, order_id, product_id, quantity, unit_price
         FROM order_items WHERE order_id = ? ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

async fn insert_status_log(
    conn: &mut SqliteConnection,
    order_id: i64,
    old_status: Option<OrderStatus>,
    new_status: OrderStatus,
    note: Option<&str>,
    actor: i64,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO order_status_logs (order_id, old_status, new_status, note, created_by, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(order_id)
    .bind(old_status)
    .bind(new_status)
    .bind(note)
    .bind(actor)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}
