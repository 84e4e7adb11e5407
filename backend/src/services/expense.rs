//! Operating expenses, the cost side of the financial report

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{DateRange, Expense};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::validation;

/// Expense service
#[derive(Clone)]
pub struct ExpenseService {
    db: PgPool,
}

/// Input for recording an expense
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpenseInput {
    #[validate(length(min = 1, max = 100), custom = "validation::required_text")]
    pub category: String,
    pub description: Option<String>,
    #[validate(custom = "validation::positive_money")]
    pub amount: Decimal,
    /// Defaults to today (UTC)
    pub expense_date: Option<NaiveDate>,
}

impl ExpenseService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_expense(&self, user_id: Uuid, input: CreateExpenseInput) -> AppResult<Expense> {
        input.validate()?;

        let expense = sqlx::query_as::<_, Expense>(
            r#"
            INSERT INTO expenses (category, description, amount, expense_date, user_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, category, description, amount, expense_date, user_id, created_at
            "#,
        )
        .bind(input.category.trim())
        .bind(&input.description)
        .bind(input.amount)
        .bind(input.expense_date.unwrap_or_else(|| Utc::now().date_naive()))
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(expense_id = %expense.id, amount = %expense.amount, "Expense recorded");
        Ok(expense)
    }

    pub async fn list_expenses(&self, range: DateRange) -> AppResult<Vec<Expense>> {
        let expenses = sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, category, description, amount, expense_date, user_id, created_at
            FROM expenses
            WHERE expense_date BETWEEN $1 AND $2
            ORDER BY expense_date DESC, created_at DESC
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        Ok(expenses)
    }
}
