//! Route definitions for the Repair Shop Management API

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - inventory and stock ledger
        .nest("/inventory", inventory_routes(state.clone()))
        // Protected routes - repair jobs and parts
        .nest("/repairs", repair_routes(state.clone()))
        // Protected routes - point of sale
        .nest("/sales", sales_routes(state.clone()))
        // Protected routes - customers
        .nest("/customers", customer_routes(state.clone()))
        // Protected routes - expenses
        .nest("/expenses", expense_routes(state.clone()))
        // Protected routes - notifications
        .nest("/notifications", notification_routes(state.clone()))
        // Protected routes - reports
        .nest("/reports", report_routes(state))
}

/// Inventory routes (protected)
fn inventory_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/items", get(handlers::list_items).post(handlers::create_item))
        .route(
            "/items/:item_id",
            get(handlers::get_item).put(handlers::update_item),
        )
        .route("/items/:item_id/adjust", post(handlers::adjust_stock))
        .route("/items/:item_id/transactions", get(handlers::item_transactions))
        .route("/items/:item_id/audit", get(handlers::audit_item))
        .route(
            "/transactions/:transaction_id/reverse",
            post(handlers::reverse_transaction),
        )
        .route("/low-stock", get(handlers::low_stock_items))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Repair routes (protected)
fn repair_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_jobs).post(handlers::create_job))
        .route("/:job_id", get(handlers::get_job))
        .route("/:job_id/status", put(handlers::update_status))
        .route("/:job_id/technician", put(handlers::assign_technician))
        .route("/:job_id/estimate", put(handlers::set_estimate))
        .route("/:job_id/deposit", put(handlers::set_deposit))
        .route(
            "/:job_id/parts",
            get(handlers::list_parts).post(handlers::add_part),
        )
        .route(
            "/:job_id/parts/:part_id",
            put(handlers::update_part).delete(handlers::remove_part),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Sales routes (protected)
fn sales_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_invoices).post(handlers::create_invoice))
        .route("/:invoice_id", get(handlers::get_invoice))
        .route("/:invoice_id/payments", post(handlers::record_payment))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Customer routes (protected)
fn customer_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_customers).post(handlers::create_customer))
        .route("/:customer_id", get(handlers::get_customer))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Expense routes (protected)
fn expense_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_expenses).post(handlers::create_expense))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Notification routes (protected)
fn notification_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_notifications))
        .route("/:notification_id/read", put(handlers::mark_as_read))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Report routes (protected)
fn report_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/financial", get(handlers::get_financial_report))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
