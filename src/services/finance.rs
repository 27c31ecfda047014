//! Append-only money ledger. Workflows write to it inside their own
//! transaction; it carries no business rules beyond amount validation.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::dtos::finance::FinanceSummary;
use crate::error::{AppError, AppResult};
use crate::models::finance::{EntryType, FinanceEntry};

#[derive(Debug, Clone)]
pub struct NewEntry {
    pub entry_type: EntryType,
    pub amount: f64,
    pub reference_type: &'static str,
    pub reference_id: String,
    pub description: String,
}

pub async fn record_entry(
    conn: &mut SqliteConnection,
    entry: NewEntry,
    actor: i64,
) -> AppResult<FinanceEntry> {
    if !entry.amount.is_finite() || entry.amount <= 0.0 {
        return Err(AppError::validation("Finance entry amount must be greater than 0"));
    }

    let row = sqlx::query_as::<_, FinanceEntry>(
        "INSERT INTO finance_entries
         (entry_type, amount, reference_type, reference_id, description, created_by, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         RETURNING id, entry_type, amount, reference_type, reference_id, description,
                   created_by, created_at",
    )
    .bind(entry.entry_type)
    .bind(entry.amount)
    .bind(entry.reference_type)
    .bind(&entry.reference_id)
    .bind(&entry.description)
    .bind(actor)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    Ok(row)
}

pub async fn list_entries(
    pool: &SqlitePool,
    entry_type: Option<EntryType>,
    limit: i64,
) -> AppResult<Vec<FinanceEntry>> {
    let rows = sqlx::query_as::<_, FinanceEntry>(
        "SELECT id, entry_type, amount, reference_type, reference_id, description,
                created_by, created_at
         FROM finance_entries
         WHERE (? IS NULL OR entry_type = ?)
         ORDER BY created_at DESC, id DESC
         LIMIT ?",
    )
    .bind(entry_type)
    .bind(entry_type)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn entries_for_reference(
    pool: &SqlitePool,
    reference_type: &str,
    reference_id: &str,
) -> AppResult<Vec<FinanceEntry>> {
    let rows = sqlx::query_as::<_, FinanceEntry>(
        "SELECT id, entry_type, amount, reference_type, reference_id, description,
                created_by, created_at
         FROM finance_entries
         WHERE reference_type = ? AND reference_id = ?
         ORDER BY id ASC",
    )
    .bind(reference_type)
    .bind(reference_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn summary(pool: &SqlitePool) -> AppResult<FinanceSummary> {
    let (revenue, expense, purchase) = sqlx::query_as::<_, (f64, f64, f64)>(
        "SELECT
            CAST(COALESCE(SUM(CASE WHEN entry_type = 'revenue' THEN amount END), 0) AS REAL),
            CAST(COALESCE(SUM(CASE WHEN entry_type = 'expense' THEN amount END), 0) AS REAL),
            CAST(COALESCE(SUM(CASE WHEN entry_type = 'purchase' THEN amount END), 0) AS REAL)
         FROM finance_entries",
    )
    .fetch_one(pool)
    .await?;

    Ok(FinanceSummary {
        revenue,
        expense,
        purchase,
        net: revenue - expense - purchase,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support;

    fn entry(entry_type: EntryType, amount: f64, reference_id: &str) -> NewEntry {
        NewEntry {
            entry_type,
            amount,
            reference_type: "order",
            reference_id: reference_id.to_string(),
            description: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn rejects_non_positive_amounts() {
        let (state, _rx) = test_support::state().await;
        let mut conn = state.db_pool.acquire().await.unwrap();

        let err = record_entry(&mut conn, entry(EntryType::Revenue, 0.0, "1"), 1).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        let err = record_entry(&mut conn, entry(EntryType::Revenue, f64::NAN, "1"), 1).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        drop(conn);

        assert_eq!(test_support::count(&state, "finance_entries").await, 0);
    }

    #[tokio::test]
    async fn summary_nets_expenses_and_purchases_against_revenue() {
        let (state, _rx) = test_support::state().await;
        let mut conn = state.db_pool.acquire().await.unwrap();
        record_entry(&mut conn, entry(EntryType::Revenue, 500.0, "1"), 1).await.unwrap();
        record_entry(&mut conn, entry(EntryType::Revenue, 250.0, "2"), 1).await.unwrap();
        record_entry(&mut conn, entry(EntryType::Expense, 100.0, "1"), 1).await.unwrap();
        record_entry(&mut conn, entry(EntryType::Purchase, 150.0, "3"), 1).await.unwrap();
        drop(conn);

        let totals = summary(&state.db_pool).await.unwrap();
        assert_eq!(
            totals,
            FinanceSummary { revenue: 750.0, expense: 100.0, purchase: 150.0, net: 500.0 }
        );

        let revenue = list_entries(&state.db_pool, Some(EntryType::Revenue), 10).await.unwrap();
        assert_eq!(revenue.len(), 2);
        assert_eq!(list_entries(&state.db_pool, None, 10).await.unwrap().len(), 4);
        assert_eq!(entries_for_reference(&state.db_pool, "order", "1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn summary_of_empty_ledger_is_zero() {
        let (state, _rx) = test_support::state().await;
        let totals = summary(&state.db_pool).await.unwrap();
        assert_eq!(totals.net, 0.0);
    }
}
