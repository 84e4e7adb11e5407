//! Inventory catalogue: item records and their administrative fields
//!
//! Quantities are never written here. Initial stock goes through the stock
//! ledger like every other movement.

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{is_low_stock, InventoryItem, StockDirection, StockReason};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::notification::NotificationService;
use crate::services::stock_ledger::{StockLedgerService, StockMovement};
use crate::validation;

/// Inventory service for managing the item catalogue
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
    notifications: NotificationService,
}

/// Input for creating an inventory item
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemInput {
    #[validate(length(min = 1, max = 255), custom = "validation::required_text")]
    pub name: String,
    #[validate(custom = "validation::sku")]
    pub sku: String,
    #[validate(custom = "validation::barcode")]
    pub barcode: Option<String>,
    #[serde(default)]
    #[validate(custom = "validation::money")]
    pub unit_cost: Decimal,
    #[serde(default)]
    #[validate(custom = "validation::money")]
    pub selling_price: Decimal,
    /// Opening stock, recorded as a purchase
    #[serde(default, alias = "quantity")]
    #[validate(range(min = 0, message = "Initial quantity cannot be negative"))]
    pub initial_quantity: i32,
    #[serde(default)]
    #[validate(range(min = 0, message = "Reorder level cannot be negative"))]
    pub reorder_level: i32,
    #[serde(default)]
    #[validate(range(min = 0, message = "Reorder quantity cannot be negative"))]
    pub reorder_quantity: i32,
    pub category_id: Option<Uuid>,
}

/// Administrative update. There is no quantity field: stock changes go
/// through the adjust endpoint.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemInput {
    #[validate(length(min = 1, max = 255), custom = "validation::required_text")]
    pub name: Option<String>,
    /// Empty string clears the barcode
    #[validate(custom = "validation::barcode_or_blank")]
    pub barcode: Option<String>,
    #[validate(custom = "validation::money")]
    pub unit_cost: Option<Decimal>,
    #[validate(custom = "validation::money")]
    pub selling_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub reorder_level: Option<i32>,
    #[validate(range(min = 0))]
    pub reorder_quantity: Option<i32>,
    pub is_active: Option<bool>,
    pub category_id: Option<Uuid>,
}

/// List filter
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFilter {
    /// Matches name, SKU or barcode
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub low_stock: bool,
    #[serde(default)]
    pub include_inactive: bool,
}

pub(crate) const ITEM_COLUMNS: &str = "id, name, sku, barcode, unit_cost, selling_price, quantity, \
     reorder_level, reorder_quantity, low_stock_alert, is_active, category_id, created_at, updated_at";

impl InventoryService {
    /// Create a new InventoryService instance
    pub fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    /// Create an item; opening stock is one `IN`/`purchase` ledger entry
    pub async fn create_item(&self, user_id: Uuid, input: CreateItemInput) -> AppResult<InventoryItem> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let item_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO inventory_items (
                name, sku, barcode, unit_cost, selling_price, quantity,
                reorder_level, reorder_quantity, low_stock_alert, category_id
            )
            VALUES ($1, $2, $3, $4, $5, 0, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(input.name.trim())
        .bind(&input.sku)
        .bind(&input.barcode)
        .bind(input.unit_cost)
        .bind(input.selling_price)
        .bind(input.reorder_level)
        .bind(input.reorder_quantity)
        .bind(is_low_stock(0, input.reorder_level))
        .bind(input.category_id)
        .fetch_one(&mut *tx)
        .await?;

        let low_stock = if input.initial_quantity > 0 {
            let movement = StockMovement {
                item_id,
                quantity: input.initial_quantity,
                direction: StockDirection::In,
                reason: StockReason::Purchase,
                user_id,
                reference_id: None,
                notes: Some("Initial stock".to_string()),
            };
            StockLedgerService::apply(&mut tx, &movement).await?.low_stock
        } else {
            None
        };

        let item = sqlx::query_as::<_, InventoryItem>(&format!(
            "SELECT {} FROM inventory_items WHERE id = $1",
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(item_id = %item.id, sku = %item.sku, quantity = item.quantity, "Inventory item created");
        self.notifications.low_stock_best_effort(low_stock.as_slice()).await;

        Ok(item)
    }

    /// Get an item by id
    pub async fn get_item(&self, item_id: Uuid) -> AppResult<InventoryItem> {
        sqlx::query_as::<_, InventoryItem>(&format!(
            "SELECT {} FROM inventory_items WHERE id = $1",
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))
    }

    /// List items
    pub async fn list_items(&self, filter: ItemFilter) -> AppResult<Vec<InventoryItem>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let items = sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            SELECT {}
            FROM inventory_items
            WHERE ($1::TEXT IS NULL OR name ILIKE $1 OR sku ILIKE $1 OR barcode ILIKE $1)
              AND ($2::UUID IS NULL OR category_id = $2)
              AND (NOT $3 OR low_stock_alert)
              AND ($4 OR is_active)
            ORDER BY name
            "#,
            ITEM_COLUMNS
        ))
        .bind(search)
        .bind(filter.category_id)
        .bind(filter.low_stock)
        .bind(filter.include_inactive)
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }

    /// Active items at or below their reorder level, emptiest first
    pub async fn low_stock_items(&self) -> AppResult<Vec<InventoryItem>> {
        let items = sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            SELECT {}
            FROM inventory_items
            WHERE is_active AND quantity <= reorder_level
            ORDER BY quantity ASC, name
            "#,
            ITEM_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }

    /// Update administrative fields
    pub async fn update_item(&self, item_id: Uuid, input: UpdateItemInput) -> AppResult<InventoryItem> {
        input.validate()?;

        let item = sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            UPDATE inventory_items
            SET name = COALESCE($2, name),
                barcode = CASE WHEN $3::text IS NULL THEN barcode ELSE NULLIF($3, '') END,
                unit_cost = COALESCE($4, unit_cost),
                selling_price = COALESCE($5, selling_price),
                reorder_level = COALESCE($6, reorder_level),
                reorder_quantity = COALESCE($7, reorder_quantity),
                is_active = COALESCE($8, is_active),
                category_id = COALESCE($9, category_id),
                low_stock_alert = quantity <= COALESCE($6, reorder_level),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.barcode.as_deref().map(str::trim))
        .bind(input.unit_cost)
        .bind(input.selling_price)
        .bind(input.reorder_level)
        .bind(input.reorder_quantity)
        .bind(input.is_active)
        .bind(input.category_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))?;

        tracing::info!(item_id = %item.id, "Inventory item updated");
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_input_accepts_quantity_alias() {
        let input: CreateItemInput = serde_json::from_str(
            r#"{"name":"Galaxy S21 battery","sku":"BAT-S21","quantity":12,"sellingPrice":"45.00"}"#,
        )
        .unwrap();
        assert_eq!(input.initial_quantity, 12);
        assert_eq!(input.selling_price, Decimal::new(4500, 2));
        assert!(input.validate().is_ok());
    }

    #[test]
    fn create_input_rejects_bad_sku_and_negative_stock() {
        let input: CreateItemInput =
            serde_json::from_str(r#"{"name":"Cable","sku":"x","initialQuantity":-1}"#).unwrap();
        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("sku"));
        assert!(fields.contains_key("initial_quantity"));
    }

    #[test]
    fn update_input_accepts_blank_barcode() {
        let clear: UpdateItemInput = serde_json::from_str(r#"{"barcode":""}"#).unwrap();
        assert!(clear.validate().is_ok());
        assert_eq!(clear.barcode.as_deref(), Some(""));

        let bad: UpdateItemInput = serde_json::from_str(r#"{"barcode":"123"}"#).unwrap();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn update_input_ignores_quantity() {
        let input: UpdateItemInput =
            serde_json::from_str(r#"{"quantity":999,"reorderLevel":4}"#).unwrap();
        assert_eq!(input.reorder_level, Some(4));
        assert!(input.name.is_none());
    }
}
