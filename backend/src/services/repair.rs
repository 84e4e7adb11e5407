//! Repair job service: intake, status workflow, technician assignment and
//! the estimate/deposit fields that feed reconciliation

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{DateRange, RepairJob, RepairPartUsed, RepairStatus};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::notification::NotificationService;
use crate::services::numbering::{
    default_generator, is_number_collision, NumberGenerator, MAX_NUMBER_ATTEMPTS, REPAIR_JOB_PREFIX,
};
use crate::services::reconciliation;
use crate::validation;

/// Repair job service
#[derive(Clone)]
pub struct RepairService {
    db: PgPool,
    notifications: NotificationService,
    numbers: NumberGenerator,
}

/// Input for creating a repair job
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRepairInput {
    pub customer_id: Option<Uuid>,
    #[validate(length(max = 255))]
    pub customer_name: Option<String>,
    #[validate(custom = "validation::phone")]
    pub customer_phone: Option<String>,
    #[validate(length(min = 1, max = 100), custom = "validation::required_text")]
    pub device_type: String,
    #[validate(length(max = 100))]
    pub device_brand: Option<String>,
    #[validate(length(max = 100))]
    pub device_model: Option<String>,
    #[validate(length(max = 100))]
    pub serial_number: Option<String>,
    #[validate(custom = "validation::required_text")]
    pub issue_description: String,
    #[serde(default)]
    #[validate(custom = "validation::money")]
    pub estimated_cost: Decimal,
    #[serde(default)]
    #[validate(custom = "validation::money")]
    pub deposit_paid: Decimal,
    pub technician_id: Option<Uuid>,
}

/// Status change request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusInput {
    pub status: RepairStatus,
    pub diagnosis: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignTechnicianInput {
    pub technician_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetEstimateInput {
    #[validate(custom = "validation::money")]
    pub estimated_cost: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetDepositInput {
    #[serde(alias = "amount")]
    #[validate(custom = "validation::money")]
    pub deposit_paid: Decimal,
}

/// List filter
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairFilter {
    pub status: Option<RepairStatus>,
    pub technician_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Job with its parts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairJobDetail {
    #[serde(flatten)]
    pub job: RepairJob,
    pub parts: Vec<RepairPartUsed>,
    pub parts_cost: Decimal,
}

#[derive(Debug, FromRow)]
struct CustomerContact {
    name: String,
    phone: Option<String>,
}

pub(crate) const JOB_COLUMNS: &str = "id, job_number, customer_id, customer_name, customer_phone, \
     device_type, device_brand, device_model, serial_number, issue_description, diagnosis, status, \
     technician_id, estimated_cost, actual_cost, deposit_paid, balance, diagnosed_at, started_at, \
     completed_at, collected_at, created_by, created_at, updated_at";

pub(crate) const PART_COLUMNS: &str =
    "id, repair_job_id, item_id, part_name, quantity, unit_cost, total_cost, created_by, created_at";

/// Lock a job row for the rest of the caller's transaction
pub(crate) async fn lock_job(conn: &mut PgConnection, job_id: Uuid) -> AppResult<RepairJob> {
    sqlx::query_as::<_, RepairJob>(&format!(
        "SELECT {} FROM repair_jobs WHERE id = $1 FOR UPDATE",
        JOB_COLUMNS
    ))
    .bind(job_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Repair job".to_string()))
}

pub(crate) async fn fetch_job(conn: &mut PgConnection, job_id: Uuid) -> AppResult<RepairJob> {
    sqlx::query_as::<_, RepairJob>(&format!("SELECT {} FROM repair_jobs WHERE id = $1", JOB_COLUMNS))
        .bind(job_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Repair job".to_string()))
}

async fn ensure_active_user(conn: &mut PgConnection, user_id: Uuid, field: &str) -> AppResult<()> {
    let active = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND is_active)",
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    if active {
        Ok(())
    } else {
        Err(AppError::validation(field, "User does not exist or is inactive"))
    }
}

async fn insert_job(
    conn: &mut PgConnection,
    job_number: &str,
    input: &CreateRepairInput,
    contact: &Option<CustomerContact>,
    created_by: Uuid,
) -> Result<RepairJob, sqlx::Error> {
    let customer_name = input
        .customer_name
        .clone()
        .or_else(|| contact.as_ref().map(|c| c.name.clone()));
    let customer_phone = input
        .customer_phone
        .clone()
        .or_else(|| contact.as_ref().and_then(|c| c.phone.clone()));
    let balance = input.estimated_cost - input.deposit_paid;

    sqlx::query_as::<_, RepairJob>(&format!(
        r#"
        INSERT INTO repair_jobs (
            job_number, customer_id, customer_name, customer_phone, device_type, device_brand,
            device_model, serial_number, issue_description, technician_id, estimated_cost,
            actual_cost, deposit_paid, balance, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11, $12, $13, $14)
        RETURNING {}
        "#,
        JOB_COLUMNS
    ))
    .bind(job_number)
    .bind(input.customer_id)
    .bind(customer_name)
    .bind(customer_phone)
    .bind(input.device_type.trim())
    .bind(&input.device_brand)
    .bind(&input.device_model)
    .bind(&input.serial_number)
    .bind(input.issue_description.trim())
    .bind(input.technician_id)
    .bind(input.estimated_cost)
    .bind(input.deposit_paid)
    .bind(balance)
    .bind(created_by)
    .fetch_one(&mut *conn)
    .await
}

impl RepairService {
    /// Create a new RepairService instance
    pub fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self {
            db,
            notifications,
            numbers: default_generator(),
        }
    }

    /// Replace the job number generator
    pub fn with_number_generator(mut self, numbers: NumberGenerator) -> Self {
        self.numbers = numbers;
        self
    }

    /// Book a device in
    pub async fn create_job(&self, user_id: Uuid, input: CreateRepairInput) -> AppResult<RepairJob> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let contact = match input.customer_id {
            Some(customer_id) => Some(
                sqlx::query_as::<_, CustomerContact>("SELECT name, phone FROM customers WHERE id = $1")
                    .bind(customer_id)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Customer".to_string()))?,
            ),
            None => None,
        };

        if let Some(technician_id) = input.technician_id {
            ensure_active_user(&mut tx, technician_id, "technicianId").await?;
        }

        let mut attempt = 0;
        let job = loop {
            attempt += 1;
            let job_number = (self.numbers)(REPAIR_JOB_PREFIX, Utc::now());
            let mut savepoint = sqlx::Connection::begin(&mut *tx).await?;
            match insert_job(&mut savepoint, &job_number, &input, &contact, user_id).await {
                Ok(job) => {
                    savepoint.commit().await?;
                    break job;
                }
                Err(e) if is_number_collision(&e, "repair_jobs_job_number_key") => {
                    savepoint.rollback().await?;
                    tracing::warn!(attempt, job_number = %job_number, "Repair job number collision");
                    if attempt >= MAX_NUMBER_ATTEMPTS {
                        return Err(AppError::Conflict {
                            resource: "jobNumber".to_string(),
                            message: "Could not allocate a unique job number, please retry".to_string(),
                        });
                    }
                }
                Err(e) => return Err(e.into()),
            }
        };

        tx.commit().await?;

        tracing::info!(repair_job_id = %job.id, job_number = %job.job_number, "Repair job created");

        if let Some(technician_id) = job.technician_id {
            self.notifications
                .notify_best_effort(NotificationService::new_assignment_input(&job, technician_id))
                .await;
        }

        Ok(job)
    }

    /// Job with its parts
    pub async fn get_job(&self, job_id: Uuid) -> AppResult<RepairJobDetail> {
        let mut conn = self.db.acquire().await?;
        let job = fetch_job(&mut conn, job_id).await?;

        let parts = sqlx::query_as::<_, RepairPartUsed>(&format!(
            "SELECT {} FROM repair_parts_used WHERE repair_job_id = $1 ORDER BY created_at, id",
            PART_COLUMNS
        ))
        .bind(job_id)
        .fetch_all(&mut *conn)
        .await?;

        let parts_cost = parts.iter().map(|p| p.total_cost).sum();

        Ok(RepairJobDetail {
            job,
            parts,
            parts_cost,
        })
    }

    /// List jobs, newest first
    pub async fn list_jobs(&self, filter: RepairFilter) -> AppResult<Vec<RepairJob>> {
        let range = match (filter.start_date, filter.end_date) {
            (None, None) => None,
            (start, end) => Some(
                DateRange::resolve(start, end, Utc::now().date_naive())
                    .map_err(|e| AppError::validation("endDate", e.to_string()))?,
            ),
        };

        let jobs = sqlx::query_as::<_, RepairJob>(&format!(
            r#"
            SELECT {}
            FROM repair_jobs
            WHERE ($1::repair_status IS NULL OR status = $1)
              AND ($2::UUID IS NULL OR technician_id = $2)
              AND ($3::TIMESTAMPTZ IS NULL OR created_at >= $3)
              AND ($4::TIMESTAMPTZ IS NULL OR created_at < $4)
            ORDER BY created_at DESC
            "#,
            JOB_COLUMNS
        ))
        .bind(filter.status)
        .bind(filter.technician_id)
        .bind(range.map(|r| r.start_of_day()))
        .bind(range.map(|r| r.end_exclusive()))
        .fetch_all(&self.db)
        .await?;

        Ok(jobs)
    }

    /// Move a job along its workflow, stamping the matching timestamp
    pub async fn update_status(&self, job_id: Uuid, input: UpdateStatusInput) -> AppResult<RepairJob> {
        let mut tx = self.db.begin().await?;
        let current = lock_job(&mut tx, job_id).await?;
        let next = current.status.transition_to(input.status)?;

        let now = Some(Utc::now());
        let stamp = |target: RepairStatus, existing| if next == target { now } else { existing };

        let job = sqlx::query_as::<_, RepairJob>(&format!(
            r#"
            UPDATE repair_jobs
            SET status = $2,
                diagnosis = COALESCE($3, diagnosis),
                diagnosed_at = $4,
                started_at = $5,
                completed_at = $6,
                collected_at = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(job_id)
        .bind(next)
        .bind(&input.diagnosis)
        .bind(stamp(RepairStatus::Diagnosed, current.diagnosed_at))
        .bind(stamp(RepairStatus::InProgress, current.started_at))
        .bind(stamp(RepairStatus::Ready, current.completed_at))
        .bind(stamp(RepairStatus::Collected, current.collected_at))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            repair_job_id = %job.id,
            from = current.status.as_str(),
            to = next.as_str(),
            "Repair job status changed"
        );

        if next == RepairStatus::Ready {
            self.notifications
                .notify_best_effort(NotificationService::device_ready_input(&job))
                .await;
        }

        Ok(job)
    }

    /// Assign (or reassign) the technician
    pub async fn assign_technician(&self, job_id: Uuid, input: AssignTechnicianInput) -> AppResult<RepairJob> {
        let mut tx = self.db.begin().await?;
        let current = lock_job(&mut tx, job_id).await?;
        if current.status.is_terminal() {
            return Err(AppError::validation(
                "status",
                format!("Job is {}; a technician can no longer be assigned", current.status),
            ));
        }
        ensure_active_user(&mut tx, input.technician_id, "technicianId").await?;

        let job = sqlx::query_as::<_, RepairJob>(&format!(
            "UPDATE repair_jobs SET technician_id = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            JOB_COLUMNS
        ))
        .bind(job_id)
        .bind(input.technician_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(repair_job_id = %job.id, technician_id = %input.technician_id, "Technician assigned");

        if current.technician_id != Some(input.technician_id) {
            self.notifications
                .notify_best_effort(NotificationService::new_assignment_input(&job, input.technician_id))
                .await;
        }

        Ok(job)
    }

    /// Set the staff estimate and reconcile
    pub async fn set_estimate(&self, job_id: Uuid, input: SetEstimateInput) -> AppResult<RepairJob> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let current = lock_job(&mut tx, job_id).await?;
        if current.status.is_terminal() {
            return Err(AppError::validation(
                "status",
                format!("Job is {}; the estimate can no longer be changed", current.status),
            ));
        }

        sqlx::query("UPDATE repair_jobs SET estimated_cost = $2 WHERE id = $1")
            .bind(job_id)
            .bind(input.estimated_cost)
            .execute(&mut *tx)
            .await?;
        reconciliation::recompute(&mut tx, job_id).await?;
        let job = fetch_job(&mut tx, job_id).await?;

        tx.commit().await?;

        tracing::info!(repair_job_id = %job.id, estimated_cost = %job.estimated_cost, "Repair estimate set");
        Ok(job)
    }

    /// Record the deposit taken and reconcile
    pub async fn set_deposit(&self, job_id: Uuid, input: SetDepositInput) -> AppResult<RepairJob> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let current = lock_job(&mut tx, job_id).await?;
        if current.status == RepairStatus::Abandoned {
            return Err(AppError::validation("status", "Cannot take a deposit on an abandoned job"));
        }

        sqlx::query("UPDATE repair_jobs SET deposit_paid = $2 WHERE id = $1")
            .bind(job_id)
            .bind(input.deposit_paid)
            .execute(&mut *tx)
            .await?;
        reconciliation::recompute(&mut tx, job_id).await?;
        let job = fetch_job(&mut tx, job_id).await?;

        tx.commit().await?;

        tracing::info!(repair_job_id = %job.id, deposit_paid = %job.deposit_paid, balance = %job.balance, "Repair deposit set");
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_input_defaults_money_to_zero() {
        let input: CreateRepairInput = serde_json::from_str(
            r#"{"deviceType":"Phone","deviceBrand":"Apple","issueDescription":"Cracked screen"}"#,
        )
        .unwrap();
        assert_eq!(input.estimated_cost, Decimal::ZERO);
        assert_eq!(input.deposit_paid, Decimal::ZERO);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn create_input_rejects_blank_issue() {
        let input: CreateRepairInput =
            serde_json::from_str(r#"{"deviceType":"Laptop","issueDescription":"   "}"#).unwrap();
        assert!(input.validate().unwrap_err().field_errors().contains_key("issue_description"));
    }

    #[test]
    fn deposit_accepts_amount_alias() {
        let input: SetDepositInput = serde_json::from_str(r#"{"amount":"20.00"}"#).unwrap();
        assert_eq!(input.deposit_paid, Decimal::new(2000, 2));
    }

    #[test]
    fn status_input_uses_snake_case_values() {
        let input: UpdateStatusInput = serde_json::from_str(r#"{"status":"in_progress"}"#).unwrap();
        assert_eq!(input.status, RepairStatus::InProgress);
    }
}
