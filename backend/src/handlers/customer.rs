//! HTTP handlers for customers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::Customer;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::customer::{CreateCustomerInput, CustomerSearch, CustomerService};
use crate::AppState;

pub async fn list_customers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<CustomerSearch>,
) -> AppResult<Json<Vec<Customer>>> {
    current_user.0.require("customers", "read")?;
    let customers = CustomerService::new(state.db).list_customers(query).await?;
    Ok(Json(customers))
}

pub async fn create_customer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateCustomerInput>,
) -> AppResult<(StatusCode, Json<Customer>)> {
    current_user.0.require("customers", "write")?;
    let customer = CustomerService::new(state.db).create_customer(input).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(customer_id): Path<Uuid>,
) -> AppResult<Json<Customer>> {
    current_user.0.require("customers", "read")?;
    let customer = CustomerService::new(state.db).get_customer(customer_id).await?;
    Ok(Json(customer))
}
