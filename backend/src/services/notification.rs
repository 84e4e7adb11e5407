//! Notification service for in-app notifications and the outbound webhook
//!
//! Notifications are side effects of committed operations. Callers use the
//! `*_best_effort` entry points, which log failures instead of returning
//! them, so a notification problem never fails a stock, parts or sale
//! operation.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use shared::{LowStockEvent, Notification, NotificationKind, RepairJob};
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::config::NotificationConfig;
use crate::error::{AppError, AppResult};

/// Notification service
#[derive(Clone)]
pub struct NotificationService {
    db: PgPool,
    webhook: Option<WebhookClient>,
}

/// Signed JSON webhook
#[derive(Clone)]
pub struct WebhookClient {
    url: String,
    secret: String,
    http_client: reqwest::Client,
}

/// Input for creating a notification
#[derive(Debug, Clone)]
pub struct CreateNotificationInput {
    /// `None` addresses all staff
    pub user_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub entity_type: Option<&'static str>,
    pub entity_id: Option<Uuid>,
}

/// Webhook body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload<'a> {
    event: &'static str,
    notification: &'a Notification,
}

/// base64(HMAC-SHA256(secret, body))
pub fn sign_payload(secret: &str, body: &[u8]) -> AppResult<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("Invalid webhook key: {}", e)))?;
    mac.update(body);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

impl WebhookClient {
    pub fn new(url: String, secret: String, timeout: Duration) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build webhook client: {}", e)))?;

        Ok(Self {
            url,
            secret,
            http_client,
        })
    }

    /// POST the notification with an `X-Signature` header
    pub async fn send(&self, notification: &Notification) -> AppResult<()> {
        let body = serde_json::to_vec(&WebhookPayload {
            event: notification.kind.as_str(),
            notification,
        })
        .map_err(|e| AppError::Internal(format!("Webhook serialization error: {}", e)))?;

        let response = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("X-Signature", sign_payload(&self.secret, &body)?)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Webhook request failed: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::ExternalService(format!(
                "Webhook responded with {}",
                response.status()
            )))
        }
    }
}

impl NotificationService {
    /// Create a new NotificationService instance
    pub fn new(db: PgPool, config: &NotificationConfig) -> Self {
        let timeout = Duration::from_secs(config.webhook_timeout_secs);
        let webhook = config.webhook().and_then(|(url, secret)| {
            WebhookClient::new(url.to_string(), secret.to_string(), timeout)
                .map_err(|e| tracing::warn!("Webhook disabled: {}", e))
                .ok()
        });

        Self { db, webhook }
    }

    /// Store a notification and hand it to the webhook when configured.
    ///
    /// Delivery runs on a spawned task, so a slow or unreachable endpoint
    /// never holds up the caller. A webhook failure is logged; the stored
    /// row is kept.
    pub async fn notify(&self, input: CreateNotificationInput) -> AppResult<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, kind, title, message, entity_type, entity_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, kind, title, message, entity_type, entity_id,
                      is_read, created_at, read_at
            "#,
        )
        .bind(input.user_id)
        .bind(input.kind)
        .bind(&input.title)
        .bind(&input.message)
        .bind(input.entity_type)
        .bind(input.entity_id)
        .fetch_one(&self.db)
        .await?;

        if let Some(webhook) = self.webhook.clone() {
            let pending = notification.clone();
            tokio::spawn(async move {
                if let Err(e) = webhook.send(&pending).await {
                    tracing::warn!(notification_id = %pending.id, "Webhook delivery failed: {}", e);
                }
            });
        }

        Ok(notification)
    }

    pub fn low_stock_input(event: &LowStockEvent) -> CreateNotificationInput {
        CreateNotificationInput {
            user_id: None,
            kind: NotificationKind::LowStock,
            title: format!("Low stock: {}", event.item_name),
            message: format!(
                "{} ({}) is down to {} unit(s); reorder level is {}",
                event.item_name, event.sku, event.quantity, event.reorder_level
            ),
            entity_type: Some("inventory_item"),
            entity_id: Some(event.item_id),
        }
    }

    pub fn device_ready_input(job: &RepairJob) -> CreateNotificationInput {
        let device = [job.device_brand.as_deref(), job.device_model.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let device = if device.is_empty() { job.device_type.clone() } else { device };
        CreateNotificationInput {
            user_id: None,
            kind: NotificationKind::DeviceReady,
            title: format!("Device ready: {}", job.job_number),
            message: format!(
                "{} for {} is ready for pickup. Balance due: {}",
                device,
                job.customer_name.as_deref().unwrap_or("walk-in customer"),
                job.balance
            ),
            entity_type: Some("repair_job"),
            entity_id: Some(job.id),
        }
    }

    pub fn new_assignment_input(job: &RepairJob, technician_id: Uuid) -> CreateNotificationInput {
        CreateNotificationInput {
            user_id: Some(technician_id),
            kind: NotificationKind::NewAssignment,
            title: format!("New repair assigned: {}", job.job_number),
            message: format!("{}: {}", job.device_type, job.issue_description),
            entity_type: Some("repair_job"),
            entity_id: Some(job.id),
        }
    }

    /// Fire-and-forget wrapper around [`NotificationService::notify`]
    pub async fn notify_best_effort(&self, input: CreateNotificationInput) {
        let kind = input.kind;
        if let Err(e) = self.notify(input).await {
            tracing::warn!(kind = kind.as_str(), "Failed to emit notification: {}", e);
        }
    }

    /// Emit one notification per low-stock event, best-effort
    pub async fn low_stock_best_effort(&self, events: &[LowStockEvent]) {
        for event in events {
            tracing::info!(item_id = %event.item_id, quantity = event.quantity, "Low stock");
            self.notify_best_effort(Self::low_stock_input(event)).await;
        }
    }

    /// Notifications visible to a user: addressed to them or shop-wide
    pub async fn list_for_user(&self, user_id: Uuid, unread_only: bool) -> AppResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, kind, title, message, entity_type, entity_id,
                   is_read, created_at, read_at
            FROM notifications
            WHERE (user_id = $1 OR user_id IS NULL)
              AND (NOT $2 OR is_read = FALSE)
            ORDER BY created_at DESC
            LIMIT 200
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_all(&self.db)
        .await?;

        Ok(notifications)
    }

    /// Mark a notification as read
    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND (user_id = $2 OR user_id IS NULL)
            RETURNING id, user_id, kind, title, message, entity_type, entity_id,
                      is_read, created_at, read_at
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification".to_string()))
    }
}
