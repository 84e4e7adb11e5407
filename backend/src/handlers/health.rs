//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

/// Health check endpoint handler; 503 while the database is unreachable
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    // Check database connectivity
    let (status, db_status) = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => (StatusCode::OK, "connected"),
        Err(e) => {
            tracing::warn!("Health check database query failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "disconnected")
        }
    };

    (
        status,
        Json(HealthResponse {
            status: if status.is_success() { "healthy" } else { "degraded" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: db_status.to_string(),
        }),
    )
}
