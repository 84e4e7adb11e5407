//! Customer reference data

use serde::Deserialize;
use shared::Customer;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::validation;

/// Customer service
#[derive(Clone)]
pub struct CustomerService {
    db: PgPool,
}

/// Input for creating a customer
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerInput {
    #[validate(length(min = 1, max = 255), custom = "validation::required_text")]
    pub name: String,
    #[validate(custom = "validation::phone")]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerSearch {
    pub search: Option<String>,
}

impl CustomerService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_customer(&self, input: CreateCustomerInput) -> AppResult<Customer> {
        input.validate()?;

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (name, phone, email)
            VALUES ($1, $2, $3)
            RETURNING id, name, phone, email, total_spent, created_at
            "#,
        )
        .bind(input.name.trim())
        .bind(&input.phone)
        .bind(input.email.as_deref().map(str::to_lowercase))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(customer_id = %customer.id, "Customer created");
        Ok(customer)
    }

    pub async fn get_customer(&self, customer_id: Uuid) -> AppResult<Customer> {
        sqlx::query_as::<_, Customer>(
            "SELECT id, name, phone, email, total_spent, created_at FROM customers WHERE id = $1",
        )
        .bind(customer_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer".to_string()))
    }

    /// Customers matching name, phone or email
    pub async fn list_customers(&self, query: CustomerSearch) -> AppResult<Vec<Customer>> {
        let pattern = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, phone, email, total_spent, created_at
            FROM customers
            WHERE $1::TEXT IS NULL OR name ILIKE $1 OR phone ILIKE $1 OR email ILIKE $1
            ORDER BY name
            LIMIT 500
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.db)
        .await?;

        Ok(customers)
    }
}
