//! Repair financial reconciliation
//!
//! Recomputes a job's derived money fields from its parts, estimate and
//! deposit. Runs on the caller's connection, after the parts or deposit
//! change it follows, so the job never commits with a stale balance.

use rust_decimal::Decimal;
use shared::RepairFinancials;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, FromRow)]
struct JobMoney {
    estimated_cost: Decimal,
    deposit_paid: Decimal,
}

/// Recompute and persist `actual_cost` and `balance`. Idempotent.
pub async fn recompute(conn: &mut PgConnection, repair_job_id: Uuid) -> AppResult<RepairFinancials> {
    let job = sqlx::query_as::<_, JobMoney>(
        "SELECT estimated_cost, deposit_paid FROM repair_jobs WHERE id = $1",
    )
    .bind(repair_job_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Repair job".to_string()))?;

    let part_totals = sqlx::query_scalar::<_, Decimal>(
        "SELECT total_cost FROM repair_parts_used WHERE repair_job_id = $1",
    )
    .bind(repair_job_id)
    .fetch_all(&mut *conn)
    .await?;

    let financials = RepairFinancials::reconcile(part_totals, job.estimated_cost, job.deposit_paid);

    sqlx::query(
        r#"
        UPDATE repair_jobs
        SET actual_cost = $2, balance = $3, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(repair_job_id)
    .bind(financials.actual_cost)
    .bind(financials.balance)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(
        repair_job_id = %repair_job_id,
        parts_cost = %financials.parts_cost,
        actual_cost = %financials.actual_cost,
        balance = %financials.balance,
        "Repair financials reconciled"
    );

    Ok(financials)
}
