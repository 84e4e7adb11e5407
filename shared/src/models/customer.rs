//! Customer and expense models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shop customer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Running total of invoice totals
    pub total_spent: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Operating expense
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: Uuid,
    pub category: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub expense_date: NaiveDate,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}
