//! Inventory and stock ledger models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A stocked item (shop stock or repair part)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub barcode: Option<String>,
    pub unit_cost: Decimal,
    pub selling_price: Decimal,
    pub quantity: i32,
    pub reorder_level: i32,
    pub reorder_quantity: i32,
    pub low_stock_alert: bool,
    pub is_active: bool,
    pub category_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable record of one quantity change
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct InventoryTransaction {
    pub id: Uuid,
    pub item_id: Uuid,
    /// Magnitude of the change, always positive
    pub quantity: i32,
    pub direction: StockDirection,
    pub reason: StockReason,
    /// Invoice or repair job that caused the movement
    pub reference_id: Option<Uuid>,
    pub user_id: Uuid,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl InventoryTransaction {
    /// Signed quantity delta of this movement
    pub fn signed_delta(&self) -> i32 {
        self.direction.signed(self.quantity)
    }
}

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "stock_direction"))]
pub enum StockDirection {
    #[serde(rename = "IN")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "IN"))]
    In,
    #[serde(rename = "OUT")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "OUT"))]
    Out,
}

impl StockDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockDirection::In => "IN",
            StockDirection::Out => "OUT",
        }
    }

    pub fn signed(&self, quantity: i32) -> i32 {
        match self {
            StockDirection::In => quantity,
            StockDirection::Out => -quantity,
        }
    }

    /// Direction that undoes a movement in this direction
    pub fn opposite(&self) -> Self {
        match self {
            StockDirection::In => StockDirection::Out,
            StockDirection::Out => StockDirection::In,
        }
    }
}

/// Why stock moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "stock_reason", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum StockReason {
    Purchase,
    Sale,
    RepairUse,
    Damage,
    Theft,
    Return,
    Adjustment,
}

impl StockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockReason::Purchase => "purchase",
            StockReason::Sale => "sale",
            StockReason::RepairUse => "repair_use",
            StockReason::Damage => "damage",
            StockReason::Theft => "theft",
            StockReason::Return => "return",
            StockReason::Adjustment => "adjustment",
        }
    }

    /// Manual corrections only; sale, repair and return movements are undone
    /// through their own documents
    pub fn is_reversible(&self) -> bool {
        matches!(
            self,
            StockReason::Purchase | StockReason::Damage | StockReason::Theft | StockReason::Adjustment
        )
    }
}

/// Stock rule violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(i32),

    #[error("insufficient stock: requested {requested}, available {available}")]
    Insufficient { available: i32, requested: i32 },

    #[error("stock quantity overflow")]
    Overflow,
}

/// Apply a movement to an on-hand quantity.
///
/// Never returns a negative quantity: an OUT movement larger than the
/// available stock is rejected with [`StockError::Insufficient`].
pub fn apply_stock_movement(
    current: i32,
    quantity: i32,
    direction: StockDirection,
) -> Result<i32, StockError> {
    if quantity <= 0 {
        return Err(StockError::NonPositiveQuantity(quantity));
    }

    match direction {
        StockDirection::In => current.checked_add(quantity).ok_or(StockError::Overflow),
        StockDirection::Out => {
            if current < quantity {
                Err(StockError::Insufficient {
                    available: current,
                    requested: quantity,
                })
            } else {
                Ok(current - quantity)
            }
        }
    }
}

/// Cached flag stored on the item
pub fn is_low_stock(quantity: i32, reorder_level: i32) -> bool {
    quantity <= reorder_level
}

/// Whether a low-stock notification is due; an empty shelf is reported
/// through the out-of-stock path rather than as "low".
pub fn should_notify_low_stock(quantity: i32, reorder_level: i32) -> bool {
    quantity > 0 && quantity <= reorder_level
}

/// Replay signed deltas into a balance
pub fn replay_balance<'a, I>(transactions: I) -> i64
where
    I: IntoIterator<Item = &'a InventoryTransaction>,
{
    transactions
        .into_iter()
        .map(|t| i64::from(t.signed_delta()))
        .sum()
}

/// Emitted by the ledger when an adjustment leaves an item at or below its
/// reorder level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockEvent {
    pub item_id: Uuid,
    pub item_name: String,
    pub sku: String,
    pub quantity: i32,
    pub reorder_level: i32,
}
