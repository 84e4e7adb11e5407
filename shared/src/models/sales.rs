//! Point-of-sale invoice models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Sales invoice header
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct SalesInvoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer_id: Option<Uuid>,
    /// Cashier who rang up the sale
    pub user_id: Uuid,
    pub sale_date: DateTime<Utc>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub paid_amount: Decimal,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Invoice line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct SalesItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub item_id: Uuid,
    pub line_number: i32,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

/// Payment status derived from paid amount vs total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub fn from_amounts(paid_amount: Decimal, total: Decimal) -> Self {
        if paid_amount >= total {
            PaymentStatus::Paid
        } else if paid_amount > Decimal::ZERO {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Unpaid
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        }
    }
}

/// Invoice rule violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SalesError {
    #[error("invoice must contain at least one line")]
    EmptyInvoice,

    #[error("line {line}: quantity must be positive")]
    NonPositiveQuantity { line: usize },

    #[error("line {line}: unit price cannot be negative")]
    NegativePrice { line: usize },

    #[error("discount cannot be negative")]
    NegativeDiscount,

    #[error("discount {discount} exceeds subtotal {subtotal}")]
    DiscountExceedsSubtotal { discount: Decimal, subtotal: Decimal },

    #[error("line {line}: total is too large")]
    LineTotalTooLarge { line: usize },

    #[error("invoice subtotal is too large")]
    SubtotalTooLarge,
}

/// Priced line used for total computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl PricedLine {
    pub fn total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Invoice money fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl InvoiceTotals {
    /// Sales are untaxed at the counter
    pub const TAX: Decimal = Decimal::ZERO;

    /// `total = subtotal + tax - discount`, rejecting a discount larger than
    /// the subtotal.
    pub fn compute(lines: &[PricedLine], discount: Decimal) -> Result<Self, SalesError> {
        if lines.is_empty() {
            return Err(SalesError::EmptyInvoice);
        }
        for (idx, line) in lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(SalesError::NonPositiveQuantity { line: idx + 1 });
            }
            if line.unit_price < Decimal::ZERO {
                return Err(SalesError::NegativePrice { line: idx + 1 });
            }
            if crate::validation::checked_line_total(line.unit_price, line.quantity).is_err() {
                return Err(SalesError::LineTotalTooLarge { line: idx + 1 });
            }
        }
        if discount < Decimal::ZERO {
            return Err(SalesError::NegativeDiscount);
        }

        let subtotal: Decimal = lines.iter().map(PricedLine::total).sum();
        if !crate::validation::fits_money_column(subtotal) {
            return Err(SalesError::SubtotalTooLarge);
        }
        if discount > subtotal {
            return Err(SalesError::DiscountExceedsSubtotal { discount, subtotal });
        }

        let tax = Self::TAX;
        Ok(Self {
            subtotal,
            tax,
            discount,
            total: subtotal + tax - discount,
        })
    }

    pub fn payment_status(&self, paid_amount: Decimal) -> PaymentStatus {
        PaymentStatus::from_amounts(paid_amount, self.total)
    }
}
