//! Audit trail: before/after records of every mutating workflow call.
//!
//! ```text
//! workflow commit
//!   └─ AuditTrail::log() → mpsc → AuditWorker → audit_logs
//! ```
//!
//! Logging never fails the caller: a full or closed channel and a failed
//! insert are reported through `tracing` and dropped.

pub mod service;
pub mod types;
pub mod worker;

pub use service::{get_logs_for_entity, get_recent_logs, AuditTrail};
pub use types::{AuditAction, AuditEvent, AuditLog};
pub use worker::AuditWorker;
