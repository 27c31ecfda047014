pub mod audit;
pub mod finance;
pub mod order;
pub mod product;
pub mod purchase_order;
pub mod repair;
pub mod stock;
