//! Phone-store back office: inventory stock ledger with order, repair and
//! purchase-order workflows, a finance ledger and an audit trail.

pub mod audit;
pub mod auth;
pub mod config;
pub mod database;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
