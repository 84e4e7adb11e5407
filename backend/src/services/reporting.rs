//! Financial reporting over repairs, sales and expenses
//!
//! Rows are read in one repeatable-read, read-only transaction so the three
//! sources describe the same instant; aggregation is the pure
//! `shared::build_financial_report`.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    build_financial_report, DailyFinancials, DateRange, ExpenseReportRow, FinancialReport,
    RepairReportRow, SaleReportRow,
};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
    daily_quota: Decimal,
}

/// Flat CSV row for one day
#[derive(Debug, Serialize)]
pub struct DailyCsvRow {
    pub date: NaiveDate,
    pub income: Decimal,
    pub parts_cost: Decimal,
    pub gross_profit: Decimal,
    pub expenses: Decimal,
    pub net_profit: Decimal,
    pub quota_shortfall: Decimal,
    pub repairs: u32,
    pub sales: u32,
}

impl From<&DailyFinancials> for DailyCsvRow {
    fn from(day: &DailyFinancials) -> Self {
        Self {
            date: day.date,
            income: day.income,
            parts_cost: day.parts_cost,
            gross_profit: day.gross_profit,
            expenses: day.expenses,
            net_profit: day.net_profit,
            quota_shortfall: day.quota_shortfall,
            repairs: day.technicians.iter().map(|t| t.repair_count).sum(),
            sales: day.technicians.iter().map(|t| t.sale_count).sum(),
        }
    }
}

impl ReportingService {
    pub fn new(db: PgPool, daily_quota: Decimal) -> Self {
        Self { db, daily_quota }
    }

    /// Resolve request bounds; both default to the current UTC month
    pub fn resolve_period(start: Option<NaiveDate>, end: Option<NaiveDate>) -> AppResult<DateRange> {
        DateRange::resolve(start, end, Utc::now().date_naive())
            .map_err(|e| AppError::validation("endDate", e.to_string()))
    }

    /// Build the financial report for `period`
    pub async fn build_report(&self, period: DateRange) -> AppResult<FinancialReport> {
        let mut tx = self.db.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let from = period.start_of_day();
        let until = period.end_exclusive();

        let repairs = sqlx::query_as::<_, RepairReportRow>(
            r#"
            SELECT rj.id, rj.job_number, rj.created_at, rj.technician_id,
                   u.name AS technician_name, rj.actual_cost, rj.estimated_cost,
                   COALESCE(p.parts_cost, 0) AS parts_cost
            FROM repair_jobs rj
            LEFT JOIN users u ON u.id = rj.technician_id
            LEFT JOIN (
                SELECT repair_job_id, SUM(total_cost) AS parts_cost
                FROM repair_parts_used
                GROUP BY repair_job_id
            ) p ON p.repair_job_id = rj.id
            WHERE rj.created_at >= $1 AND rj.created_at < $2
            ORDER BY rj.created_at
            "#,
        )
        .bind(from)
        .bind(until)
        .fetch_all(&mut *tx)
        .await?;

        // Sale parts cost uses each item's current unit cost
        let sales = sqlx::query_as::<_, SaleReportRow>(
            r#"
            SELECT si.id, si.invoice_number, si.sale_date, si.user_id,
                   u.name AS user_name, si.total,
                   COALESCE(c.parts_cost, 0) AS parts_cost
            FROM sales_invoices si
            LEFT JOIN users u ON u.id = si.user_id
            LEFT JOIN (
                SELECT it.invoice_id, SUM(it.quantity * ii.unit_cost) AS parts_cost
                FROM sales_items it
                JOIN inventory_items ii ON ii.id = it.item_id
                GROUP BY it.invoice_id
            ) c ON c.invoice_id = si.id
            WHERE si.sale_date >= $1 AND si.sale_date < $2
            ORDER BY si.sale_date
            "#,
        )
        .bind(from)
        .bind(until)
        .fetch_all(&mut *tx)
        .await?;

        let expenses = sqlx::query_as::<_, ExpenseReportRow>(
            r#"
            SELECT id, category, description, amount, expense_date
            FROM expenses
            WHERE expense_date BETWEEN $1 AND $2
            ORDER BY expense_date
            "#,
        )
        .bind(period.start)
        .bind(period.end)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let report = build_financial_report(period, &repairs, &sales, &expenses, self.daily_quota);

        tracing::debug!(
            start = %period.start,
            end = %period.end,
            repairs = report.summary.repair_count,
            sales = report.summary.sale_count,
            net_profit = %report.summary.net_profit,
            "Financial report built"
        );

        Ok(report)
    }

    /// Export data to CSV format
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }

    /// Daily rows as CSV
    pub fn daily_csv(report: &FinancialReport) -> AppResult<String> {
        let rows: Vec<DailyCsvRow> = report.daily.iter().map(DailyCsvRow::from).collect();
        Self::export_to_csv(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_has_header_and_one_row_per_day() {
        let rows = vec![
            DailyCsvRow {
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                income: Decimal::new(120000, 2),
                parts_cost: Decimal::new(40000, 2),
                gross_profit: Decimal::new(80000, 2),
                expenses: Decimal::ZERO,
                net_profit: Decimal::new(80000, 2),
                quota_shortfall: Decimal::new(20000, 2),
                repairs: 2,
                sales: 1,
            },
        ];
        let csv = ReportingService::export_to_csv(&rows).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "date,income,parts_cost,gross_profit,expenses,net_profit,quota_shortfall,repairs,sales"
        );
        assert_eq!(lines[1], "2024-03-01,1200.00,400.00,800.00,0,800.00,200.00,2,1");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn reversed_period_rejected() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 10);
        let end = NaiveDate::from_ymd_opt(2024, 3, 1);
        assert!(ReportingService::resolve_period(start, end).is_err());
    }
}
