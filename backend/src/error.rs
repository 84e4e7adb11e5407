//! Error handling for the Repair Shop Management backend
//!
//! Typed errors raised by the services and their mapping to HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{SalesError, StockError, TransitionError};
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors (raised by the auth boundary)
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Conflicts
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    // Business logic errors
    #[error("Insufficient stock for {item_name}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: Uuid,
        item_name: String,
        available: i32,
        requested: i32,
    },

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // Storage errors
    #[error("Storage temporarily unavailable: {0}")]
    TransientStorage(String),

    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    // External service errors
    #[error("External service error: {0}")]
    ExternalService(String),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Insufficient stock for an item whose identity is known to the caller
    pub fn insufficient_stock(item_id: Uuid, item_name: &str, err: StockError) -> Self {
        match err {
            StockError::Insufficient {
                available,
                requested,
            } => AppError::InsufficientStock {
                item_id,
                item_name: item_name.to_string(),
                available,
                requested,
            },
            StockError::NonPositiveQuantity(_) => AppError::validation("quantity", err.to_string()),
            StockError::Overflow => AppError::validation("quantity", err.to_string()),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::TokenExpired | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::Validation { .. } | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateEntry(_) | AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::InsufficientStock { .. } | AppError::InvalidStateTransition(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::TransientStorage(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            AppError::DatabaseError(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::TransientStorage(_))
    }

    fn detail(&self) -> ErrorDetail {
        let (code, message, field, available) = match self {
            AppError::TokenExpired => ("TOKEN_EXPIRED", "Token has expired".to_string(), None, None),
            AppError::InvalidToken => ("INVALID_TOKEN", "Invalid token".to_string(), None, None),
            AppError::InsufficientPermissions => (
                "INSUFFICIENT_PERMISSIONS",
                "You do not have permission to perform this action".to_string(),
                None,
                None,
            ),
            AppError::Validation { field, message } => {
                ("VALIDATION_ERROR", message.clone(), Some(field.clone()), None)
            }
            AppError::ValidationError(msg) => ("VALIDATION_ERROR", msg.clone(), None, None),
            AppError::NotFound(resource) => ("NOT_FOUND", format!("{} not found", resource), None, None),
            AppError::DuplicateEntry(field) => (
                "DUPLICATE_ENTRY",
                format!("A record with this {} already exists", field),
                Some(field.clone()),
                None,
            ),
            AppError::Conflict { resource, message } => {
                ("CONFLICT", message.clone(), Some(resource.clone()), None)
            }
            AppError::InsufficientStock { available, .. } => {
                ("INSUFFICIENT_STOCK", self.to_string(), None, Some(*available))
            }
            AppError::InvalidStateTransition(msg) => {
                ("INVALID_STATE_TRANSITION", msg.clone(), None, None)
            }
            AppError::TransientStorage(_) => (
                "STORAGE_UNAVAILABLE",
                "Storage is temporarily unavailable, please retry".to_string(),
                None,
                None,
            ),
            AppError::DatabaseError(_) => {
                ("DATABASE_ERROR", "A database error occurred".to_string(), None, None)
            }
            AppError::ExternalService(msg) => (
                "EXTERNAL_SERVICE_ERROR",
                format!("External service error: {}", msg),
                None,
                None,
            ),
            AppError::Internal(_) => (
                "INTERNAL_ERROR",
                "An internal server error occurred".to_string(),
                None,
                None,
            ),
        };

        ErrorDetail {
            code: code.to_string(),
            message,
            field,
            available,
        }
    }
}

/// Unique violations become conflicts, connection trouble becomes transient
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::DuplicateEntry(unique_field(db.constraint()))
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => AppError::ValidationError(
                format!("Referenced record does not exist ({})", db.constraint().unwrap_or("foreign key")),
            ),
            // numeric_value_out_of_range, e.g. a job total past NUMERIC(12,2)
            sqlx::Error::Database(db) if db.code().as_deref() == Some("22003") => {
                AppError::ValidationError("Amount is too large to store".to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::TransientStorage(err.to_string())
            }
            _ => AppError::DatabaseError(err),
        }
    }
}

/// Map a unique constraint name to the field it guards
fn unique_field(constraint: Option<&str>) -> String {
    match constraint {
        Some("inventory_items_sku_key") => "sku".to_string(),
        Some("inventory_items_barcode_key") => "barcode".to_string(),
        Some("sales_invoices_invoice_number_key") => "invoice_number".to_string(),
        Some("repair_jobs_job_number_key") => "job_number".to_string(),
        Some(other) => other.to_string(),
        None => "value".to_string(),
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::InvalidStateTransition(err.to_string())
    }
}

impl From<SalesError> for AppError {
    fn from(err: SalesError) -> Self {
        let field = match err {
            SalesError::EmptyInvoice => "items",
            SalesError::NonPositiveQuantity { .. } => "quantity",
            SalesError::NegativePrice { .. } => "unitPrice",
            SalesError::NegativeDiscount | SalesError::DiscountExceedsSubtotal { .. } => "discount",
            SalesError::LineTotalTooLarge { .. } => "unitPrice",
            SalesError::SubtotalTooLarge => "items",
        };
        AppError::validation(field, err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut field_errors: Vec<_> = errors.field_errors().into_iter().collect();
        field_errors.sort_by_key(|(field, _)| *field);
        match field_errors.first() {
            Some((field, errs)) => {
                let message = errs
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", field));
                AppError::validation(field, message)
            }
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<i32>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_detail = self.detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!(code = %error_detail.code, "Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_maps_to_422_with_available() {
        let err = AppError::insufficient_stock(
            Uuid::nil(),
            "iPhone 12 screen",
            StockError::Insufficient {
                available: 2,
                requested: 5,
            },
        );
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let detail = err.detail();
        assert_eq!(detail.code, "INSUFFICIENT_STOCK");
        assert_eq!(detail.available, Some(2));
        assert!(detail.message.contains("available 2"));
    }

    #[test]
    fn pool_timeout_is_transient() {
        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn unique_constraint_names_map_to_fields() {
        assert_eq!(unique_field(Some("inventory_items_sku_key")), "sku");
        assert_eq!(unique_field(Some("sales_invoices_invoice_number_key")), "invoice_number");
        assert_eq!(unique_field(None), "value");
    }

    #[test]
    fn sales_errors_are_validation() {
        let err = AppError::from(SalesError::EmptyInvoice);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "items"));
    }
}
