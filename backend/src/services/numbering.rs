//! Document number generation for invoices and repair jobs
//!
//! Numbers are `PREFIX-YYYYMMDD-XXXXXXXX` with a random suffix. The unique
//! constraint in the database is the arbiter; callers insert inside a
//! savepoint and regenerate on collision, up to [`MAX_NUMBER_ATTEMPTS`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const MAX_NUMBER_ATTEMPTS: usize = 5;

pub const INVOICE_PREFIX: &str = "INV";
pub const REPAIR_JOB_PREFIX: &str = "RJ";

/// Generate a candidate document number
pub fn generate_number(prefix: &str, now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("{}-{}-{}", prefix, now.format("%Y%m%d"), suffix)
}

/// Source of candidate numbers; services hold one so it can be swapped
pub type NumberGenerator = Arc<dyn Fn(&str, DateTime<Utc>) -> String + Send + Sync>;

/// [`generate_number`] as a [`NumberGenerator`]
pub fn default_generator() -> NumberGenerator {
    Arc::new(generate_number)
}

/// Whether `err` is a unique violation on `constraint`
pub fn is_number_collision(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation() && db.constraint() == Some(constraint),
        _ => false,
    }
}
