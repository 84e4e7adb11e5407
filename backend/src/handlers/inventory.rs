//! HTTP handlers for inventory and stock endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use shared::{InventoryItem, InventoryTransaction};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::inventory::{CreateItemInput, InventoryService, ItemFilter, UpdateItemInput};
use crate::services::stock_ledger::{AdjustStockInput, LedgerAudit, StockLedgerService};
use crate::AppState;

/// Response to a manual stock adjustment
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockResponse {
    pub success: bool,
    pub previous_quantity: i32,
    pub item: InventoryItem,
    pub transaction: InventoryTransaction,
}

/// List inventory items
pub async fn list_items(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ItemFilter>,
) -> AppResult<Json<Vec<InventoryItem>>> {
    current_user.0.require("inventory", "read")?;
    let service = InventoryService::new(state.db, state.notifications);
    let items = service.list_items(filter).await?;
    Ok(Json(items))
}

/// Create an inventory item with its opening stock
pub async fn create_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateItemInput>,
) -> AppResult<(StatusCode, Json<InventoryItem>)> {
    current_user.0.require("inventory", "write")?;
    let service = InventoryService::new(state.db, state.notifications);
    let item = service.create_item(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Get an inventory item
pub async fn get_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<InventoryItem>> {
    current_user.0.require("inventory", "read")?;
    let service = InventoryService::new(state.db, state.notifications);
    let item = service.get_item(item_id).await?;
    Ok(Json(item))
}

/// Update an item's administrative fields
pub async fn update_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UpdateItemInput>,
) -> AppResult<Json<InventoryItem>> {
    current_user.0.require("inventory", "write")?;
    let service = InventoryService::new(state.db, state.notifications);
    let item = service.update_item(item_id, input).await?;
    Ok(Json(item))
}

/// Manually adjust stock
pub async fn adjust_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<AdjustStockResponse>> {
    current_user.0.require("inventory", "adjust")?;
    let ledger = StockLedgerService::new(state.db.clone(), state.notifications.clone());
    let adjustment = ledger
        .adjust(input.into_movement(item_id, current_user.0.user_id))
        .await?;

    let item = InventoryService::new(state.db, state.notifications)
        .get_item(item_id)
        .await?;

    Ok(Json(AdjustStockResponse {
        success: true,
        previous_quantity: adjustment.previous_quantity,
        item,
        transaction: adjustment.transaction,
    }))
}

/// Reverse a recorded movement
pub async fn reverse_transaction(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transaction_id): Path<Uuid>,
) -> AppResult<Json<InventoryTransaction>> {
    current_user.0.require("inventory", "adjust")?;
    let ledger = StockLedgerService::new(state.db, state.notifications);
    let adjustment = ledger.reverse(transaction_id, current_user.0.user_id).await?;
    Ok(Json(adjustment.transaction))
}

/// Audit trail for an item, newest first
pub async fn item_transactions(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Vec<InventoryTransaction>>> {
    current_user.0.require("inventory", "read")?;
    let ledger = StockLedgerService::new(state.db, state.notifications);
    let transactions = ledger.transactions_for_item(item_id).await?;
    Ok(Json(transactions))
}

/// Stored quantity versus replayed ledger
pub async fn audit_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<LedgerAudit>> {
    current_user.0.require("inventory", "read")?;
    let ledger = StockLedgerService::new(state.db, state.notifications);
    let audit = ledger.verify_item_balance(item_id).await?;
    Ok(Json(audit))
}

/// Items at or below their reorder level
pub async fn low_stock_items(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<InventoryItem>>> {
    current_user.0.require("inventory", "read")?;
    let service = InventoryService::new(state.db, state.notifications);
    let items = service.low_stock_items().await?;
    Ok(Json(items))
}
