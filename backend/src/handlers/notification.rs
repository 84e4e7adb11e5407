//! HTTP handlers for in-app notifications

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use shared::Notification;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::AppState;

/// Query parameters for listing notifications
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotificationsQuery {
    #[serde(alias = "unread_only")]
    pub unread_only: Option<bool>,
}

/// Notifications addressed to the current user or shop-wide
pub async fn get_notifications(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListNotificationsQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    let notifications = state
        .notifications
        .list_for_user(current_user.0.user_id, query.unread_only.unwrap_or(false))
        .await?;
    Ok(Json(notifications))
}

/// Mark a notification as read
pub async fn mark_as_read(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(notification_id): Path<Uuid>,
) -> AppResult<Json<Notification>> {
    let notification = state
        .notifications
        .mark_read(current_user.0.user_id, notification_id)
        .await?;
    Ok(Json(notification))
}
