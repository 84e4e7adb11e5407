//! Database fixtures for integration tests
//!
//! Database-backed tests run only when `TEST_DATABASE_URL` points at a
//! scratch Postgres database; otherwise they return early.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use repair_shop_backend::config::NotificationConfig;
use repair_shop_backend::services::inventory::{CreateItemInput, InventoryService};
use repair_shop_backend::services::numbering::{generate_number, NumberGenerator};
use repair_shop_backend::services::NotificationService;
use rust_decimal::Decimal;
use shared::InventoryItem;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Connect and migrate, or `None` when no test database is configured
pub async fn test_pool() -> Option<PgPool> {
    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            eprintln!("TEST_DATABASE_URL not set; skipping database test");
            return None;
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    Some(pool)
}

pub fn notifications(pool: &PgPool) -> NotificationService {
    NotificationService::new(pool.clone(), &NotificationConfig::default())
}

pub async fn seed_user(pool: &PgPool, name: &str) -> Uuid {
    sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO users (name, email, role) VALUES ($1, $2, 'technician') RETURNING id",
    )
    .bind(name)
    .bind(format!("{}@test.local", Uuid::new_v4().simple()))
    .fetch_one(pool)
    .await
    .expect("seed user")
}

pub fn unique_sku() -> String {
    format!("T-{}", &Uuid::new_v4().simple().to_string()[..12].to_uppercase())
}

pub async fn seed_item(
    pool: &PgPool,
    user_id: Uuid,
    quantity: i32,
    reorder_level: i32,
    unit_cost: Decimal,
    selling_price: Decimal,
) -> InventoryItem {
    let input = CreateItemInput {
        name: format!("Test part {}", Uuid::new_v4().simple()),
        sku: unique_sku(),
        barcode: None,
        unit_cost,
        selling_price,
        initial_quantity: quantity,
        reorder_level,
        reorder_quantity: 10,
        category_id: None,
    };
    InventoryService::new(pool.clone(), notifications(pool))
        .create_item(user_id, input)
        .await
        .expect("seed item")
}

pub async fn item_quantity(pool: &PgPool, item_id: Uuid) -> i32 {
    sqlx::query_scalar::<_, i32>("SELECT quantity FROM inventory_items WHERE id = $1")
        .bind(item_id)
        .fetch_one(pool)
        .await
        .expect("item quantity")
}

pub async fn count(pool: &PgPool, sql: &str, id: Uuid) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("count query")
}

pub fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// A number no other test uses
pub fn unique_number(prefix: &str) -> String {
    format!("{}-TAKEN-{}", prefix, &Uuid::new_v4().simple().to_string()[..12].to_uppercase())
}

/// Hands out `taken` for the first `repeats` calls, then fresh numbers
pub fn repeating_generator(taken: String, repeats: usize) -> (NumberGenerator, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let generator: NumberGenerator = Arc::new(move |prefix: &str, now: DateTime<Utc>| {
        if counter.fetch_add(1, Ordering::SeqCst) < repeats {
            taken.clone()
        } else {
            generate_number(prefix, now)
        }
    });
    (generator, calls)
}
