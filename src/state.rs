// src/state.rs
use std::sync::Arc;

use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::audit::AuditTrail;
use crate::config::Config;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub audit: AuditTrail,
    pub config: Arc<Config>,
    write_gate: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, audit: AuditTrail, config: Config) -> Self {
        Self {
            db_pool,
            audit,
            config: Arc::new(config),
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Opens a write transaction.
    ///
    /// SQLite admits a single writer, and a deferred transaction that reads
    /// before it writes fails with SQLITE_BUSY when another writer got there
    /// first. All mutating workflows queue here instead; the guard must be
    /// held until the transaction commits or is dropped.
    pub async fn begin_write(
        &self,
    ) -> Result<(OwnedMutexGuard<()>, Transaction<'static, Sqlite>), AppError> {
        let guard = self.write_gate.clone().lock_owned().await;
        let tx = self.db_pool.begin().await?;
        Ok((guard, tx))
    }
}
