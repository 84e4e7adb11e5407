//! Financial reporting integration tests
//!
//! Properties covered:
//! - A repair with neither estimate nor actual cost is billed at its parts cost
//! - Income and parts cost are attributed to the assigned technician by day
//! - Abandoned repairs are reported like any other repair created in the period
//! - Expenses reduce net profit for their day

mod common;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use common::*;
use repair_shop_backend::services::ReportingService;
use rust_decimal::Decimal;
use shared::{DateRange, DAILY_QUOTA};
use sqlx::PgPool;
use uuid::Uuid;

/// A day nobody else writes to: random date in the 1990s
fn isolated_day() -> NaiveDate {
    let offset = (Uuid::new_v4().as_u128() % 3650) as i64;
    NaiveDate::from_ymd_opt(1990, 1, 1).unwrap() + Duration::days(offset)
}

async fn backdated_job(pool: &PgPool, user: Uuid, technician: Uuid, day: NaiveDate, status: &str) -> Uuid {
    let created_at = Utc.from_utc_datetime(&day.and_hms_opt(10, 0, 0).unwrap());
    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO repair_jobs (
            job_number, device_type, issue_description, status, technician_id,
            estimated_cost, actual_cost, deposit_paid, balance, created_by, created_at
        )
        VALUES ($1, 'Phone', 'Backdated job', $2::repair_status, $3, 0, 0, 0, 0, $4, $5)
        RETURNING id
        "#,
    )
    .bind(format!("RJ-TEST-{}", &Uuid::new_v4().simple().to_string()[..16]))
    .bind(status)
    .bind(technician)
    .bind(user)
    .bind(created_at)
    .fetch_one(pool)
    .await
    .expect("insert backdated job")
}

async fn external_part(pool: &PgPool, job_id: Uuid, user: Uuid, total: Decimal) {
    sqlx::query(
        r#"
        INSERT INTO repair_parts_used
            (repair_job_id, part_name, quantity, unit_cost, total_cost, created_by)
        VALUES ($1, 'Bought-in part', 1, $2, $2, $3)
        "#,
    )
    .bind(job_id)
    .bind(total)
    .bind(user)
    .execute(pool)
    .await
    .expect("insert part");
}

/// Parts-only repair: income = parts cost = 5000 for the technician that day
#[tokio::test]
async fn parts_only_repair_is_billed_at_parts_cost() {
    let Some(pool) = test_pool().await else { return };
    let clerk = seed_user(&pool, "Report Clerk").await;
    let technician = seed_user(&pool, "Report Technician").await;
    let day = isolated_day();

    let job = backdated_job(&pool, clerk, technician, day, "in_progress").await;
    external_part(&pool, job, clerk, Decimal::from(3000)).await;
    external_part(&pool, job, clerk, Decimal::from(2000)).await;

    let reporting = ReportingService::new(pool.clone(), DAILY_QUOTA);
    let report = reporting
        .build_report(DateRange::new(day, day).unwrap())
        .await
        .unwrap();

    let daily = report.daily.iter().find(|d| d.date == day).expect("day row");
    let tech = daily
        .technicians
        .iter()
        .find(|t| t.technician_id == Some(technician))
        .expect("technician row");
    assert_eq!(tech.technician_name, "Report Technician");
    assert_eq!(tech.income, Decimal::from(5000));
    assert_eq!(tech.parts_cost, Decimal::from(5000));
    assert_eq!(tech.gross_profit, Decimal::ZERO);
    assert_eq!(tech.quota_shortfall, DAILY_QUOTA);
    assert_eq!(tech.repair_count, 1);

    let line = report
        .details
        .repairs
        .iter()
        .find(|r| r.id == job)
        .expect("repair detail");
    assert_eq!(line.revenue, Decimal::from(5000));
}

/// Abandoned jobs are reported with the parts they consumed; expenses land
/// on their own day
#[tokio::test]
async fn abandoned_jobs_reported_and_expenses_counted() {
    let Some(pool) = test_pool().await else { return };
    let clerk = seed_user(&pool, "Report Clerk").await;
    let technician = seed_user(&pool, "Report Technician").await;
    let day = isolated_day();

    let abandoned = backdated_job(&pool, clerk, technician, day, "abandoned").await;
    external_part(&pool, abandoned, clerk, Decimal::from(800)).await;

    sqlx::query(
        "INSERT INTO expenses (category, description, amount, expense_date, user_id) VALUES ('rent', NULL, $1, $2, $3)",
    )
    .bind(Decimal::from(250))
    .bind(day)
    .bind(clerk)
    .execute(&pool)
    .await
    .unwrap();

    let report = ReportingService::new(pool.clone(), DAILY_QUOTA)
        .build_report(DateRange::new(day, day).unwrap())
        .await
        .unwrap();

    let line = report
        .details
        .repairs
        .iter()
        .find(|r| r.id == abandoned)
        .expect("abandoned repair detail");
    assert_eq!(line.parts_cost, Decimal::from(800));
    assert_eq!(line.revenue, Decimal::from(800));

    let daily = report.daily.iter().find(|d| d.date == day).expect("day row");
    let tech = daily
        .technicians
        .iter()
        .find(|t| t.technician_id == Some(technician))
        .expect("technician row");
    assert_eq!(tech.parts_cost, Decimal::from(800));
    assert_eq!(tech.repair_count, 1);
    assert!(daily.expenses >= Decimal::from(250));
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Reversed bounds are a validation error
    #[test]
    fn reversed_period_is_rejected() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 10);
        let end = NaiveDate::from_ymd_opt(2024, 3, 1);
        assert!(ReportingService::resolve_period(start, end).is_err());
    }

    /// Missing bounds default to the current month
    #[test]
    fn missing_bounds_default_to_current_month() {
        let period = ReportingService::resolve_period(None, None).unwrap();
        let today = Utc::now().date_naive();
        assert!(period.contains(today));
        assert!(period.days() >= 28);
    }
}
