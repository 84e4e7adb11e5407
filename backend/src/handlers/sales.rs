//! HTTP handlers for point-of-sale invoices

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::SalesInvoice;
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::DateRangeQuery;
use crate::middleware::CurrentUser;
use crate::services::sales::{CreateInvoiceRequest, InvoiceDetail, RecordPaymentInput, SalesService};
use crate::AppState;

/// List invoices in a date range (default: current month)
pub async fn list_invoices(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<DateRangeQuery>,
) -> AppResult<Json<Vec<SalesInvoice>>> {
    current_user.0.require("sales", "read")?;
    let range = query.resolve()?;
    let service = SalesService::new(state.db, state.notifications);
    let invoices = service.list_invoices(range).await?;
    Ok(Json(invoices))
}

/// Ring up a sale
pub async fn create_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<CreateInvoiceRequest>,
) -> AppResult<(StatusCode, Json<InvoiceDetail>)> {
    current_user.0.require("sales", "write")?;
    let input = request.normalize()?;
    let service = SalesService::new(state.db, state.notifications);
    let invoice = service.create_invoice(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// Invoice with lines and customer
pub async fn get_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<InvoiceDetail>> {
    current_user.0.require("sales", "read")?;
    let service = SalesService::new(state.db, state.notifications);
    let invoice = service.get_invoice(invoice_id).await?;
    Ok(Json(invoice))
}

/// Record a payment against an invoice
pub async fn record_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
    Json(input): Json<RecordPaymentInput>,
) -> AppResult<Json<SalesInvoice>> {
    current_user.0.require("sales", "write")?;
    let service = SalesService::new(state.db, state.notifications);
    let invoice = service.record_payment(invoice_id, input).await?;
    Ok(Json(invoice))
}
