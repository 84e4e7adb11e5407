//! Stock ledger: the only writer of inventory quantities
//!
//! Every quantity change locks the item row, applies the movement with the
//! shared stock rules and appends one `inventory_transactions` row, all on the
//! caller's connection so the change commits or rolls back with the rest of
//! the caller's work.

use serde::{Deserialize, Serialize};
use shared::{
    apply_stock_movement, is_low_stock, replay_balance, should_notify_low_stock, InventoryTransaction,
    LowStockEvent, StockDirection, StockReason,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::notification::NotificationService;

/// Stock ledger service
#[derive(Clone)]
pub struct StockLedgerService {
    db: PgPool,
    notifications: NotificationService,
}

/// One requested quantity change
#[derive(Debug, Clone)]
pub struct StockMovement {
    pub item_id: Uuid,
    pub quantity: i32,
    pub direction: StockDirection,
    pub reason: StockReason,
    pub user_id: Uuid,
    pub reference_id: Option<Uuid>,
    pub notes: Option<String>,
}

impl StockMovement {
    /// Movement that undoes this one
    pub fn reversal(&self, user_id: Uuid) -> Self {
        Self {
            item_id: self.item_id,
            quantity: self.quantity,
            direction: self.direction.opposite(),
            reason: StockReason::Return,
            user_id,
            reference_id: self.reference_id,
            notes: Some("Reversal".to_string()),
        }
    }
}

/// Manual adjustment request; the acting user comes from the token
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockInput {
    pub quantity: i32,
    #[serde(rename = "type", alias = "direction")]
    pub direction: StockDirection,
    pub reason: StockReason,
    pub reference_id: Option<Uuid>,
    pub notes: Option<String>,
}

impl AdjustStockInput {
    pub fn into_movement(self, item_id: Uuid, user_id: Uuid) -> StockMovement {
        StockMovement {
            item_id,
            quantity: self.quantity,
            direction: self.direction,
            reason: self.reason,
            user_id,
            reference_id: self.reference_id,
            notes: self.notes.filter(|n| !n.trim().is_empty()),
        }
    }
}

/// Result of a committed (or pending, inside a transaction) adjustment
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustment {
    pub item_id: Uuid,
    pub previous_quantity: i32,
    pub new_quantity: i32,
    pub transaction: InventoryTransaction,
    /// To be delivered after the surrounding transaction commits
    #[serde(skip)]
    pub low_stock: Option<LowStockEvent>,
}

/// Stored quantity versus the replayed ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAudit {
    pub item_id: Uuid,
    pub stored_quantity: i32,
    pub replayed_quantity: i64,
    pub transaction_count: usize,
    pub consistent: bool,
}

/// Locked item row
#[derive(Debug, FromRow)]
struct LockedItem {
    id: Uuid,
    name: String,
    sku: String,
    quantity: i32,
    reorder_level: i32,
}

const TRANSACTION_COLUMNS: &str =
    "id, item_id, quantity, direction, reason, reference_id, user_id, notes, created_at";

impl StockLedgerService {
    /// Create a new StockLedgerService instance
    pub fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    /// Apply one movement on the caller's connection.
    ///
    /// The item row stays locked until the caller commits or rolls back.
    pub async fn apply(conn: &mut PgConnection, movement: &StockMovement) -> AppResult<StockAdjustment> {
        if movement.quantity <= 0 {
            return Err(AppError::validation("quantity", "Quantity must be greater than zero"));
        }

        let item = sqlx::query_as::<_, LockedItem>(
            r#"
            SELECT id, name, sku, quantity, reorder_level
            FROM inventory_items
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(movement.item_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))?;

        let new_quantity = apply_stock_movement(item.quantity, movement.quantity, movement.direction)
            .map_err(|e| AppError::insufficient_stock(item.id, &item.name, e))?;

        sqlx::query(
            r#"
            UPDATE inventory_items
            SET quantity = $2, low_stock_alert = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(item.id)
        .bind(new_quantity)
        .bind(is_low_stock(new_quantity, item.reorder_level))
        .execute(&mut *conn)
        .await?;

        let transaction = sqlx::query_as::<_, InventoryTransaction>(&format!(
            r#"
            INSERT INTO inventory_transactions
                (item_id, quantity, direction, reason, reference_id, user_id, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(item.id)
        .bind(movement.quantity)
        .bind(movement.direction)
        .bind(movement.reason)
        .bind(movement.reference_id)
        .bind(movement.user_id)
        .bind(&movement.notes)
        .fetch_one(&mut *conn)
        .await?;

        tracing::debug!(
            item_id = %item.id,
            direction = movement.direction.as_str(),
            reason = movement.reason.as_str(),
            quantity = movement.quantity,
            previous = item.quantity,
            new = new_quantity,
            "Stock movement applied"
        );

        let low_stock = should_notify_low_stock(new_quantity, item.reorder_level).then(|| LowStockEvent {
            item_id: item.id,
            item_name: item.name.clone(),
            sku: item.sku.clone(),
            quantity: new_quantity,
            reorder_level: item.reorder_level,
        });

        Ok(StockAdjustment {
            item_id: item.id,
            previous_quantity: item.quantity,
            new_quantity,
            transaction,
            low_stock,
        })
    }

    /// Standalone adjustment in its own transaction
    pub async fn adjust(&self, movement: StockMovement) -> AppResult<StockAdjustment> {
        let mut tx = self.db.begin().await?;
        let adjustment = Self::apply(&mut tx, &movement).await?;
        tx.commit().await?;

        tracing::info!(
            item_id = %adjustment.item_id,
            transaction_id = %adjustment.transaction.id,
            new_quantity = adjustment.new_quantity,
            "Stock adjusted"
        );

        self.notifications
            .low_stock_best_effort(adjustment.low_stock.as_slice())
            .await;

        Ok(adjustment)
    }

    /// Undo a manual transaction with an opposite-direction `return` movement.
    ///
    /// Each transaction can be reversed once. Sale and repair movements are
    /// undone through their invoice or job instead.
    pub async fn reverse(&self, transaction_id: Uuid, user_id: Uuid) -> AppResult<StockAdjustment> {
        let mut tx = self.db.begin().await?;

        let original = sqlx::query_as::<_, InventoryTransaction>(&format!(
            "SELECT {} FROM inventory_transactions WHERE id = $1 FOR UPDATE",
            TRANSACTION_COLUMNS
        ))
        .bind(transaction_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory transaction".to_string()))?;

        if !original.reason.is_reversible() {
            return Err(AppError::validation(
                "reason",
                format!("Transactions recorded for {} cannot be reversed", original.reason.as_str()),
            ));
        }

        let already_reversed = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM inventory_reversals WHERE original_transaction_id = $1)",
        )
        .bind(original.id)
        .fetch_one(&mut *tx)
        .await?;

        if already_reversed {
            return Err(AppError::Conflict {
                resource: "transaction".to_string(),
                message: "Transaction has already been reversed".to_string(),
            });
        }

        let movement = StockMovement {
            item_id: original.item_id,
            quantity: original.quantity,
            direction: original.direction,
            reason: original.reason,
            user_id: original.user_id,
            reference_id: original.reference_id,
            notes: original.notes,
        }
        .reversal(user_id);

        let adjustment = Self::apply(&mut tx, &movement).await?;

        sqlx::query(
            r#"
            INSERT INTO inventory_reversals (original_transaction_id, reversal_transaction_id, user_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(original.id)
        .bind(adjustment.transaction.id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            original_id = %original.id,
            transaction_id = %adjustment.transaction.id,
            new_quantity = adjustment.new_quantity,
            "Stock transaction reversed"
        );

        self.notifications
            .low_stock_best_effort(adjustment.low_stock.as_slice())
            .await;

        Ok(adjustment)
    }

    /// Audit trail for an item, newest first
    pub async fn transactions_for_item(&self, item_id: Uuid) -> AppResult<Vec<InventoryTransaction>> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM inventory_items WHERE id = $1)",
        )
        .bind(item_id)
        .fetch_one(&self.db)
        .await?;

        if !exists {
            return Err(AppError::NotFound("Inventory item".to_string()));
        }

        let transactions = sqlx::query_as::<_, InventoryTransaction>(&format!(
            r#"
            SELECT {}
            FROM inventory_transactions
            WHERE item_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(item_id)
        .fetch_all(&self.db)
        .await?;

        Ok(transactions)
    }

    /// Compare the stored quantity with the replayed ledger
    pub async fn verify_item_balance(&self, item_id: Uuid) -> AppResult<LedgerAudit> {
        let mut tx = self.db.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let stored_quantity = sqlx::query_scalar::<_, i32>(
            "SELECT quantity FROM inventory_items WHERE id = $1",
        )
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))?;

        let transactions = sqlx::query_as::<_, InventoryTransaction>(&format!(
            "SELECT {} FROM inventory_transactions WHERE item_id = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(item_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let replayed_quantity = replay_balance(&transactions);
        let consistent = replayed_quantity == i64::from(stored_quantity);
        if !consistent {
            tracing::warn!(
                item_id = %item_id,
                stored = stored_quantity,
                replayed = replayed_quantity,
                "Stock ledger mismatch"
            );
        }

        Ok(LedgerAudit {
            item_id,
            stored_quantity,
            replayed_quantity,
            transaction_count: transactions.len(),
            consistent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversal_flips_direction_and_marks_return() {
        let movement = StockMovement {
            item_id: Uuid::new_v4(),
            quantity: 3,
            direction: StockDirection::Out,
            reason: StockReason::Sale,
            user_id: Uuid::new_v4(),
            reference_id: Some(Uuid::new_v4()),
            notes: None,
        };
        let staff = Uuid::new_v4();
        let reversal = movement.reversal(staff);

        assert_eq!(reversal.direction, StockDirection::In);
        assert_eq!(reversal.reason, StockReason::Return);
        assert_eq!(reversal.quantity, 3);
        assert_eq!(reversal.reference_id, movement.reference_id);
        assert_eq!(reversal.user_id, staff);
    }

    #[test]
    fn adjust_input_reads_type_field() {
        let input: AdjustStockInput =
            serde_json::from_str(r#"{"quantity":5,"type":"OUT","reason":"damage","notes":" "}"#).unwrap();
        let (item, user) = (Uuid::new_v4(), Uuid::new_v4());
        let movement = input.into_movement(item, user);

        assert_eq!(movement.direction, StockDirection::Out);
        assert_eq!(movement.reason, StockReason::Damage);
        assert_eq!(movement.item_id, item);
        assert_eq!(movement.user_id, user);
        assert!(movement.notes.is_none());
    }
}
