//! Repair Shop Management - Backend
//!
//! Inventory, repair parts, point-of-sale invoicing and financial reporting
//! for a repair-and-retail shop, served over an axum JSON API.

use std::{sync::Arc, time::Duration};

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod validation;

pub use config::Config;
pub use error::{AppError, AppResult};

use services::NotificationService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
    pub notifications: NotificationService,
}

impl AppState {
    pub fn new(db: sqlx::PgPool, config: Config) -> Self {
        let notifications = NotificationService::new(db.clone(), &config.notifications);
        Self {
            db,
            config: Arc::new(config),
            notifications,
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Dropping a timed-out handler drops its open transaction, which rolls back
    let timeout = TimeoutLayer::new(Duration::from_secs(state.config.server.request_timeout_secs));

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Repair Shop Management API v1"
}
