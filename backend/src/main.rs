//! Repair Shop Management - Backend Server

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use repair_shop_backend::{create_app, AppState, Config};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::load().context("failed to load configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "rsm_server=debug,repair_shop_backend=debug,tower_http=debug,sqlx=warn".into()
    });
    if config.logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting Repair Shop Management Server");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .connect(&config.database.url)
        .await
        .context("failed to connect to database")?;

    tracing::info!("Database connection established");

    // Run migrations in development
    if config.is_development() {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid server.host {:?}", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);

    let app = create_app(AppState::new(db_pool, config));

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
