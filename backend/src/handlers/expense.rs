//! HTTP handlers for expenses

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use shared::Expense;

use crate::error::AppResult;
use crate::handlers::DateRangeQuery;
use crate::middleware::CurrentUser;
use crate::services::expense::{CreateExpenseInput, ExpenseService};
use crate::AppState;

/// Expenses in a date range (default: current month)
pub async fn list_expenses(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<DateRangeQuery>,
) -> AppResult<Json<Vec<Expense>>> {
    current_user.0.require("expenses", "read")?;
    let range = query.resolve()?;
    let expenses = ExpenseService::new(state.db).list_expenses(range).await?;
    Ok(Json(expenses))
}

/// Record an expense
pub async fn create_expense(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateExpenseInput>,
) -> AppResult<(StatusCode, Json<Expense>)> {
    current_user.0.require("expenses", "write")?;
    let expense = ExpenseService::new(state.db)
        .create_expense(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(expense)))
}
