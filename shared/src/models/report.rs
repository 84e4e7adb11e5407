//! Financial report aggregation
//!
//! Replays repairs, sales and expenses for a period into per-day and
//! per-technician rollups. Pure: the backend loads the rows, this module
//! does the arithmetic.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::finance::effective_revenue;
use crate::types::DateRange;

/// Gross-profit target per technician per day
pub const DAILY_QUOTA: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// Label used for work without an assigned technician
pub const UNASSIGNED: &str = "Unassigned";

/// Repair row as loaded for reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct RepairReportRow {
    pub id: Uuid,
    pub job_number: String,
    pub created_at: DateTime<Utc>,
    pub technician_id: Option<Uuid>,
    pub technician_name: Option<String>,
    pub actual_cost: Decimal,
    pub estimated_cost: Decimal,
    pub parts_cost: Decimal,
}

/// Sale row as loaded for reporting; `parts_cost` uses the items' current
/// unit cost
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct SaleReportRow {
    pub id: Uuid,
    pub invoice_number: String,
    pub sale_date: DateTime<Utc>,
    pub user_id: Uuid,
    pub user_name: Option<String>,
    pub total: Decimal,
    pub parts_cost: Decimal,
}

/// Expense row as loaded for reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ExpenseReportRow {
    pub id: Uuid,
    pub category: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub expense_date: NaiveDate,
}

/// Per-repair detail line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReportLine {
    pub id: Uuid,
    pub job_number: String,
    pub date: NaiveDate,
    pub technician_id: Option<Uuid>,
    pub technician_name: String,
    pub revenue: Decimal,
    pub parts_cost: Decimal,
    pub gross_profit: Decimal,
}

/// Per-sale detail line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleReportLine {
    pub id: Uuid,
    pub invoice_number: String,
    pub date: NaiveDate,
    pub user_id: Uuid,
    pub user_name: String,
    pub revenue: Decimal,
    pub parts_cost: Decimal,
    pub gross_profit: Decimal,
}

/// One technician's figures for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianDay {
    pub technician_id: Option<Uuid>,
    pub technician_name: String,
    pub income: Decimal,
    pub parts_cost: Decimal,
    pub gross_profit: Decimal,
    pub quota_shortfall: Decimal,
    pub repair_count: u32,
    pub sale_count: u32,
}

/// One day of the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyFinancials {
    pub date: NaiveDate,
    pub income: Decimal,
    pub parts_cost: Decimal,
    pub gross_profit: Decimal,
    pub expenses: Decimal,
    pub net_profit: Decimal,
    pub quota_shortfall: Decimal,
    pub technicians: Vec<TechnicianDay>,
}

/// Period totals for one technician
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianSummary {
    pub technician_id: Option<Uuid>,
    pub technician_name: String,
    pub income: Decimal,
    pub parts_cost: Decimal,
    pub gross_profit: Decimal,
    pub quota_shortfall: Decimal,
    pub days_worked: u32,
    pub repair_count: u32,
    pub sale_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_revenue: Decimal,
    pub total_parts_cost: Decimal,
    pub total_expenses: Decimal,
    pub gross_profit: Decimal,
    pub net_profit: Decimal,
    pub total_quota_shortfall: Decimal,
    pub daily_quota: Decimal,
    pub repair_count: u32,
    pub sale_count: u32,
    pub technicians: Vec<TechnicianSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetails {
    pub repairs: Vec<RepairReportLine>,
    pub sales: Vec<SaleReportLine>,
    pub expenses: Vec<ExpenseReportRow>,
}

/// Full financial report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialReport {
    pub period: DateRange,
    pub daily: Vec<DailyFinancials>,
    pub summary: ReportSummary,
    pub details: ReportDetails,
}

#[derive(Default)]
struct TechAcc {
    income: Decimal,
    parts_cost: Decimal,
    repair_count: u32,
    sale_count: u32,
}

#[derive(Default)]
struct DayAcc {
    technicians: BTreeMap<Option<Uuid>, TechAcc>,
    expenses: Decimal,
}

/// Shortfall against the quota; work without a technician has no quota
pub fn quota_shortfall(technician_id: Option<Uuid>, gross_profit: Decimal, daily_quota: Decimal) -> Decimal {
    match technician_id {
        Some(_) => (daily_quota - gross_profit).max(Decimal::ZERO),
        None => Decimal::ZERO,
    }
}

/// Aggregate loaded rows into a report. Rows dated outside `period` are
/// ignored.
pub fn build_financial_report(
    period: DateRange,
    repairs: &[RepairReportRow],
    sales: &[SaleReportRow],
    expenses: &[ExpenseReportRow],
    daily_quota: Decimal,
) -> FinancialReport {
    let mut days: BTreeMap<NaiveDate, DayAcc> = BTreeMap::new();
    let mut names: HashMap<Option<Uuid>, String> = HashMap::new();
    names.insert(None, UNASSIGNED.to_string());

    let mut repair_lines = Vec::new();
    for repair in repairs {
        let date = repair.created_at.date_naive();
        if !period.contains(date) {
            continue;
        }
        let revenue = effective_revenue(
            Some(repair.actual_cost),
            repair.estimated_cost,
            repair.parts_cost,
        );
        let technician_name = match (repair.technician_id, &repair.technician_name) {
            (Some(_), Some(name)) => name.clone(),
            (Some(id), None) => id.to_string(),
            (None, _) => UNASSIGNED.to_string(),
        };
        names
            .entry(repair.technician_id)
            .or_insert_with(|| technician_name.clone());

        let acc = days
            .entry(date)
            .or_default()
            .technicians
            .entry(repair.technician_id)
            .or_default();
        acc.income += revenue;
        acc.parts_cost += repair.parts_cost;
        acc.repair_count += 1;

        repair_lines.push(RepairReportLine {
            id: repair.id,
            job_number: repair.job_number.clone(),
            date,
            technician_id: repair.technician_id,
            technician_name,
            revenue,
            parts_cost: repair.parts_cost,
            gross_profit: revenue - repair.parts_cost,
        });
    }

    let mut sale_lines = Vec::new();
    for sale in sales {
        let date = sale.sale_date.date_naive();
        if !period.contains(date) {
            continue;
        }
        let user_name = sale
            .user_name
            .clone()
            .unwrap_or_else(|| sale.user_id.to_string());
        names
            .entry(Some(sale.user_id))
            .or_insert_with(|| user_name.clone());

        let acc = days
            .entry(date)
            .or_default()
            .technicians
            .entry(Some(sale.user_id))
            .or_default();
        acc.income += sale.total;
        acc.parts_cost += sale.parts_cost;
        acc.sale_count += 1;

        sale_lines.push(SaleReportLine {
            id: sale.id,
            invoice_number: sale.invoice_number.clone(),
            date,
            user_id: sale.user_id,
            user_name,
            revenue: sale.total,
            parts_cost: sale.parts_cost,
            gross_profit: sale.total - sale.parts_cost,
        });
    }

    let mut expense_lines = Vec::new();
    for expense in expenses {
        if !period.contains(expense.expense_date) {
            continue;
        }
        days.entry(expense.expense_date).or_default().expenses += expense.amount;
        expense_lines.push(expense.clone());
    }

    let mut tech_totals: BTreeMap<Option<Uuid>, TechnicianSummary> = BTreeMap::new();
    let mut daily = Vec::with_capacity(days.len());

    for (date, day) in days {
        let mut technicians = Vec::with_capacity(day.technicians.len());
        for (technician_id, acc) in day.technicians {
            let gross_profit = acc.income - acc.parts_cost;
            let shortfall = quota_shortfall(technician_id, gross_profit, daily_quota);
            let technician_name = names
                .get(&technician_id)
                .cloned()
                .unwrap_or_else(|| UNASSIGNED.to_string());

            let total = tech_totals
                .entry(technician_id)
                .or_insert_with(|| TechnicianSummary {
                    technician_id,
                    technician_name: technician_name.clone(),
                    income: Decimal::ZERO,
                    parts_cost: Decimal::ZERO,
                    gross_profit: Decimal::ZERO,
                    quota_shortfall: Decimal::ZERO,
                    days_worked: 0,
                    repair_count: 0,
                    sale_count: 0,
                });
            total.income += acc.income;
            total.parts_cost += acc.parts_cost;
            total.gross_profit += gross_profit;
            total.quota_shortfall += shortfall;
            total.days_worked += 1;
            total.repair_count += acc.repair_count;
            total.sale_count += acc.sale_count;

            technicians.push(TechnicianDay {
                technician_id,
                technician_name,
                income: acc.income,
                parts_cost: acc.parts_cost,
                gross_profit,
                quota_shortfall: shortfall,
                repair_count: acc.repair_count,
                sale_count: acc.sale_count,
            });
        }
        technicians.sort_by(|a, b| a.technician_name.cmp(&b.technician_name));

        let income: Decimal = technicians.iter().map(|t| t.income).sum();
        let parts_cost: Decimal = technicians.iter().map(|t| t.parts_cost).sum();
        let quota_shortfall: Decimal = technicians.iter().map(|t| t.quota_shortfall).sum();
        let gross_profit = income - parts_cost;

        daily.push(DailyFinancials {
            date,
            income,
            parts_cost,
            gross_profit,
            expenses: day.expenses,
            net_profit: gross_profit - day.expenses,
            quota_shortfall,
            technicians,
        });
    }

    let total_revenue: Decimal = daily.iter().map(|d| d.income).sum();
    let total_parts_cost: Decimal = daily.iter().map(|d| d.parts_cost).sum();
    let total_expenses: Decimal = daily.iter().map(|d| d.expenses).sum();
    let total_quota_shortfall: Decimal = daily.iter().map(|d| d.quota_shortfall).sum();

    let mut technicians: Vec<TechnicianSummary> = tech_totals.into_values().collect();
    technicians.sort_by(|a, b| a.technician_name.cmp(&b.technician_name));

    FinancialReport {
        period,
        summary: ReportSummary {
            total_revenue,
            total_parts_cost,
            total_expenses,
            gross_profit: total_revenue - total_parts_cost,
            net_profit: total_revenue - total_parts_cost - total_expenses,
            total_quota_shortfall,
            daily_quota,
            repair_count: repair_lines.len() as u32,
            sale_count: sale_lines.len() as u32,
            technicians,
        },
        daily,
        details: ReportDetails {
            repairs: repair_lines,
            sales: sale_lines,
            expenses: expense_lines,
        },
    }
}
