//! Repair parts consumption
//!
//! Adding, changing and removing parts on a repair job. Each operation locks
//! the job row, moves stock through the ledger for stock-backed parts and
//! reconciles the job's money fields in the same transaction.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    part_total, LowStockEvent, RepairJob, RepairPartUsed, RepairStatus, StockDirection, StockReason,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::notification::NotificationService;
use crate::services::reconciliation;
use crate::services::repair::{fetch_job, lock_job, PART_COLUMNS};
use crate::services::stock_ledger::{StockLedgerService, StockMovement};
use crate::validation;

/// Repair parts service
#[derive(Clone)]
pub struct RepairPartsService {
    db: PgPool,
    notifications: NotificationService,
}

/// Add-part request as sent by clients: either `{itemId, quantity}` or
/// `{name, unitCost, quantity}`
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddPartRequest {
    #[serde(alias = "id", alias = "inventoryItemId")]
    pub item_id: Option<Uuid>,
    #[serde(alias = "partName", alias = "customName")]
    #[validate(length(max = 255))]
    pub name: Option<String>,
    #[validate(custom = "validation::money")]
    pub unit_cost: Option<Decimal>,
    #[validate(range(min = 1, message = "Quantity must be greater than zero"))]
    pub quantity: i32,
}

/// Where a part comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartSource {
    /// Consumed from tracked inventory at the item's selling price
    Stock { item_id: Uuid },
    /// Bought in for this job
    External { name: String, unit_cost: Decimal },
}

/// Normalized add-part input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPartInput {
    pub source: PartSource,
    pub quantity: i32,
}

impl AddPartRequest {
    /// Validate and collapse into one schema
    pub fn normalize(self) -> AppResult<AddPartInput> {
        self.validate()?;

        let source = match self.item_id {
            Some(item_id) => PartSource::Stock { item_id },
            None => {
                let name = self
                    .name
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| AppError::validation("name", "External parts need a name"))?;
                let unit_cost = self
                    .unit_cost
                    .filter(|c| *c > Decimal::ZERO)
                    .ok_or_else(|| {
                        AppError::validation("unitCost", "External parts need a positive unit cost")
                    })?;
                line_total(unit_cost, self.quantity)?;
                PartSource::External { name, unit_cost }
            }
        };

        Ok(AddPartInput {
            source,
            quantity: self.quantity,
        })
    }
}

/// Changes to an existing part
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePartInput {
    #[validate(range(min = 1, message = "Quantity must be greater than zero"))]
    pub quantity: Option<i32>,
    #[validate(custom = "validation::money")]
    pub unit_cost: Option<Decimal>,
    #[serde(alias = "name")]
    #[validate(length(min = 1, max = 255), custom = "validation::required_text")]
    pub custom_name: Option<String>,
}

/// Outcome of a parts mutation: the part and the reconciled job
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartChange {
    pub part: RepairPartUsed,
    pub job: RepairJob,
}

#[derive(Debug, FromRow)]
struct StockedPart {
    name: String,
    selling_price: Decimal,
    is_active: bool,
}

/// Parts can be added or edited only while a job is open
fn ensure_open(job: &RepairJob) -> AppResult<()> {
    if job.status.is_terminal() {
        Err(AppError::validation(
            "status",
            format!("Job is {}; parts can no longer be added or changed", job.status),
        ))
    } else {
        Ok(())
    }
}

/// Abandoned jobs give their parts back; collected jobs are settled
fn ensure_removable(job: &RepairJob) -> AppResult<()> {
    if job.status == RepairStatus::Collected {
        Err(AppError::validation(
            "status",
            format!("Job is {}; parts can no longer be removed", job.status),
        ))
    } else {
        Ok(())
    }
}

/// `unit_cost × quantity` as a validation error when it cannot be stored
fn line_total(unit_cost: Decimal, quantity: i32) -> AppResult<Decimal> {
    part_total(unit_cost, quantity).map_err(|msg| AppError::validation("unitCost", msg))
}

/// Stock movement for changing a consumed quantity from `old` to `new`
fn compensating_movement(
    item_id: Uuid,
    job_id: Uuid,
    user_id: Uuid,
    old: i32,
    new: i32,
) -> Option<StockMovement> {
    let (direction, reason, quantity) = match new - old {
        0 => return None,
        d if d > 0 => (StockDirection::Out, StockReason::RepairUse, d),
        d => (StockDirection::In, StockReason::Return, -d),
    };
    Some(StockMovement {
        item_id,
        quantity,
        direction,
        reason,
        user_id,
        reference_id: Some(job_id),
        notes: Some(format!("Repair part quantity {} -> {}", old, new)),
    })
}

async fn fetch_part(conn: &mut PgConnection, job_id: Uuid, part_id: Uuid) -> AppResult<RepairPartUsed> {
    sqlx::query_as::<_, RepairPartUsed>(&format!(
        "SELECT {} FROM repair_parts_used WHERE id = $1 AND repair_job_id = $2",
        PART_COLUMNS
    ))
    .bind(part_id)
    .bind(job_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Repair part".to_string()))
}

impl RepairPartsService {
    /// Create a new RepairPartsService instance
    pub fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    /// Add a part to a job
    pub async fn add_part(&self, job_id: Uuid, user_id: Uuid, input: AddPartInput) -> AppResult<PartChange> {
        if input.quantity <= 0 {
            return Err(AppError::validation("quantity", "Quantity must be greater than zero"));
        }

        let mut tx = self.db.begin().await?;
        let job = lock_job(&mut tx, job_id).await?;
        ensure_open(&job)?;

        let mut low_stock: Option<LowStockEvent> = None;
        let (item_id, part_name, unit_cost) = match &input.source {
            PartSource::Stock { item_id } => {
                let item = sqlx::query_as::<_, StockedPart>(
                    "SELECT name, selling_price, is_active FROM inventory_items WHERE id = $1 FOR UPDATE",
                )
                .bind(item_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))?;

                if !item.is_active {
                    return Err(AppError::validation("itemId", format!("{} is no longer stocked", item.name)));
                }

                let adjustment = StockLedgerService::apply(
                    &mut tx,
                    &StockMovement {
                        item_id: *item_id,
                        quantity: input.quantity,
                        direction: StockDirection::Out,
                        reason: StockReason::RepairUse,
                        user_id,
                        reference_id: Some(job_id),
                        notes: Some(format!("Used on repair {}", job.job_number)),
                    },
                )
                .await?;
                low_stock = adjustment.low_stock;

                (Some(*item_id), item.name, item.selling_price)
            }
            PartSource::External { name, unit_cost } => (None, name.clone(), *unit_cost),
        };
        let total_cost = line_total(unit_cost, input.quantity)?;

        let part = sqlx::query_as::<_, RepairPartUsed>(&format!(
            r#"
            INSERT INTO repair_parts_used
                (repair_job_id, item_id, part_name, quantity, unit_cost, total_cost, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            PART_COLUMNS
        ))
        .bind(job_id)
        .bind(item_id)
        .bind(&part_name)
        .bind(input.quantity)
        .bind(unit_cost)
        .bind(total_cost)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        reconciliation::recompute(&mut tx, job_id).await?;
        let job = fetch_job(&mut tx, job_id).await?;

        tx.commit().await?;

        tracing::info!(
            repair_job_id = %job_id,
            part_id = %part.id,
            stock_backed = part.is_stock_backed(),
            quantity = part.quantity,
            balance = %job.balance,
            "Repair part added"
        );
        self.notifications.low_stock_best_effort(low_stock.as_slice()).await;

        Ok(PartChange { part, job })
    }

    /// Remove a part, returning stock-backed units to inventory
    pub async fn remove_part(&self, job_id: Uuid, part_id: Uuid, user_id: Uuid) -> AppResult<PartChange> {
        let mut tx = self.db.begin().await?;
        let job = lock_job(&mut tx, job_id).await?;
        ensure_removable(&job)?;

        let part = fetch_part(&mut tx, job_id, part_id).await?;

        let mut low_stock = None;
        if let Some(item_id) = part.item_id {
            let adjustment = StockLedgerService::apply(
                &mut tx,
                &StockMovement {
                    item_id,
                    quantity: part.quantity,
                    direction: StockDirection::In,
                    reason: StockReason::Return,
                    user_id,
                    reference_id: Some(job_id),
                    notes: Some(format!("Removed from repair {}", job.job_number)),
                },
            )
            .await?;
            low_stock = adjustment.low_stock;
        }

        sqlx::query("DELETE FROM repair_parts_used WHERE id = $1")
            .bind(part_id)
            .execute(&mut *tx)
            .await?;

        reconciliation::recompute(&mut tx, job_id).await?;
        let job = fetch_job(&mut tx, job_id).await?;

        tx.commit().await?;

        tracing::info!(repair_job_id = %job_id, part_id = %part_id, balance = %job.balance, "Repair part removed");
        self.notifications.low_stock_best_effort(low_stock.as_slice()).await;

        Ok(PartChange { part, job })
    }

    /// Change quantity, unit cost or (external parts only) name
    pub async fn update_part(
        &self,
        job_id: Uuid,
        part_id: Uuid,
        user_id: Uuid,
        input: UpdatePartInput,
    ) -> AppResult<PartChange> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let job = lock_job(&mut tx, job_id).await?;
        ensure_open(&job)?;

        let current = fetch_part(&mut tx, job_id, part_id).await?;

        if input.custom_name.is_some() && current.is_stock_backed() {
            return Err(AppError::validation(
                "customName",
                "Stock-backed parts keep the inventory item name",
            ));
        }
        if let Some(unit_cost) = input.unit_cost {
            if !current.is_stock_backed() && unit_cost <= Decimal::ZERO {
                return Err(AppError::validation("unitCost", "External parts need a positive unit cost"));
            }
        }

        let quantity = input.quantity.unwrap_or(current.quantity);
        let unit_cost = input.unit_cost.unwrap_or(current.unit_cost);
        let part_name = input
            .custom_name
            .as_deref()
            .map(str::trim)
            .unwrap_or(&current.part_name)
            .to_string();
        let total_cost = line_total(unit_cost, quantity)?;

        let mut low_stock = None;
        if let Some(item_id) = current.item_id {
            if let Some(movement) = compensating_movement(item_id, job_id, user_id, current.quantity, quantity) {
                low_stock = StockLedgerService::apply(&mut tx, &movement).await?.low_stock;
            }
        }

        let part = sqlx::query_as::<_, RepairPartUsed>(&format!(
            r#"
            UPDATE repair_parts_used
            SET part_name = $2, quantity = $3, unit_cost = $4, total_cost = $5
            WHERE id = $1
            RETURNING {}
            "#,
            PART_COLUMNS
        ))
        .bind(part_id)
        .bind(&part_name)
        .bind(quantity)
        .bind(unit_cost)
        .bind(total_cost)
        .fetch_one(&mut *tx)
        .await?;

        reconciliation::recompute(&mut tx, job_id).await?;
        let job = fetch_job(&mut tx, job_id).await?;

        tx.commit().await?;

        tracing::info!(
            repair_job_id = %job_id,
            part_id = %part_id,
            old_quantity = current.quantity,
            new_quantity = part.quantity,
            balance = %job.balance,
            "Repair part updated"
        );
        self.notifications.low_stock_best_effort(low_stock.as_slice()).await;

        Ok(PartChange { part, job })
    }

    /// Parts on a job, oldest first
    pub async fn list_parts(&self, job_id: Uuid) -> AppResult<Vec<RepairPartUsed>> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM repair_jobs WHERE id = $1)")
            .bind(job_id)
            .fetch_one(&self.db)
            .await?;

        if !exists {
            return Err(AppError::NotFound("Repair job".to_string()));
        }

        let parts = sqlx::query_as::<_, RepairPartUsed>(&format!(
            "SELECT {} FROM repair_parts_used WHERE repair_job_id = $1 ORDER BY created_at, id",
            PART_COLUMNS
        ))
        .bind(job_id)
        .fetch_all(&self.db)
        .await?;

        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_request_normalizes_to_stock_source() {
        let item_id = Uuid::new_v4();
        let request: AddPartRequest =
            serde_json::from_str(&format!(r#"{{"itemId":"{}","quantity":2}}"#, item_id)).unwrap();
        let input = request.normalize().unwrap();
        assert_eq!(input.source, PartSource::Stock { item_id });
        assert_eq!(input.quantity, 2);
    }

    #[test]
    fn external_request_needs_name_and_positive_cost() {
        let request: AddPartRequest =
            serde_json::from_str(r#"{"name":"Flex cable","unitCost":"12.50","quantity":1}"#).unwrap();
        assert_eq!(
            request.normalize().unwrap().source,
            PartSource::External {
                name: "Flex cable".to_string(),
                unit_cost: Decimal::new(1250, 2)
            }
        );

        let no_name: AddPartRequest = serde_json::from_str(r#"{"unitCost":"5","quantity":1}"#).unwrap();
        assert!(matches!(no_name.normalize(), Err(AppError::Validation { ref field, .. }) if field == "name"));

        let free: AddPartRequest =
            serde_json::from_str(r#"{"name":"Screw","unitCost":"0","quantity":1}"#).unwrap();
        assert!(matches!(free.normalize(), Err(AppError::Validation { ref field, .. }) if field == "unitCost"));
    }

    #[test]
    fn external_line_total_must_be_storable() {
        let request: AddPartRequest =
            serde_json::from_str(r#"{"name":"Logic board","unitCost":"5000000","quantity":2000}"#).unwrap();
        let err = request.normalize().unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "unitCost"));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        let fits: AddPartRequest =
            serde_json::from_str(r#"{"name":"Logic board","unitCost":"5000000","quantity":1999}"#).unwrap();
        assert!(fits.normalize().is_ok());
    }

    #[test]
    fn zero_quantity_rejected() {
        let request: AddPartRequest =
            serde_json::from_str(&format!(r#"{{"itemId":"{}","quantity":0}}"#, Uuid::new_v4())).unwrap();
        assert!(request.normalize().is_err());
    }

    #[test]
    fn compensating_movement_follows_the_difference() {
        let (item, job, user) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let more = compensating_movement(item, job, user, 1, 3).unwrap();
        assert_eq!((more.direction, more.reason, more.quantity), (StockDirection::Out, StockReason::RepairUse, 2));

        let fewer = compensating_movement(item, job, user, 3, 1).unwrap();
        assert_eq!((fewer.direction, fewer.reason, fewer.quantity), (StockDirection::In, StockReason::Return, 2));
        assert_eq!(fewer.reference_id, Some(job));

        assert!(compensating_movement(item, job, user, 2, 2).is_none());
    }
}
