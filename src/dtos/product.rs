// src/dtos/product.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub product_type: String,
    pub purchase_price: f64,
    pub selling_price: f64,
    pub low_stock_threshold: Option<i64>,
    pub initial_quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SetProductActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub product_type: String,
    pub quantity: i64,
    pub low_stock_threshold: i64,
    pub is_low_stock: bool,
    pub purchase_price: f64,
    pub selling_price: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Convert from Model to Response DTO
impl From<crate::models::product::Product> for ProductResponse {
    fn from(product: crate::models::product::Product) -> Self {
        Self {
            is_low_stock: product.quantity <= product.low_stock_threshold,
            id: product.id,
            name: product.name,
            product_type: product.product_type,
            quantity: product.quantity,
            low_stock_threshold: product.low_stock_threshold,
            purchase_price: product.purchase_price,
            selling_price: product.selling_price,
            is_active: product.is_active,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}
