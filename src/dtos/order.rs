use serde::{Deserialize, Serialize};

use crate::models::order::{Order, OrderItem, OrderStatus, OrderStatusLog};

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub customer: CustomerInfo,
    #[serde(default)]
    pub is_pos_sale: bool,
    pub discount_amount: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Option<f64>, // Optional - uses selling_price if not provided
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub new_status: OrderStatus,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReturnOrderRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub status_history: Vec<OrderStatusLog>,
}
