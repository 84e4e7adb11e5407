//! HTTP handlers for repair jobs and their parts

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{RepairJob, RepairPartUsed};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::repair::{
    AssignTechnicianInput, CreateRepairInput, RepairFilter, RepairJobDetail, RepairService,
    SetDepositInput, SetEstimateInput, UpdateStatusInput,
};
use crate::services::repair_parts::{AddPartRequest, PartChange, RepairPartsService, UpdatePartInput};
use crate::AppState;

/// List repair jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<RepairFilter>,
) -> AppResult<Json<Vec<RepairJob>>> {
    current_user.0.require("repairs", "read")?;
    let service = RepairService::new(state.db, state.notifications);
    let jobs = service.list_jobs(filter).await?;
    Ok(Json(jobs))
}

/// Book a device in
pub async fn create_job(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateRepairInput>,
) -> AppResult<(StatusCode, Json<RepairJob>)> {
    current_user.0.require("repairs", "write")?;
    let service = RepairService::new(state.db, state.notifications);
    let job = service.create_job(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// Job with its parts
pub async fn get_job(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<RepairJobDetail>> {
    current_user.0.require("repairs", "read")?;
    let service = RepairService::new(state.db, state.notifications);
    let job = service.get_job(job_id).await?;
    Ok(Json(job))
}

/// Change a job's status
pub async fn update_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(job_id): Path<Uuid>,
    Json(input): Json<UpdateStatusInput>,
) -> AppResult<Json<RepairJob>> {
    current_user.0.require("repairs", "write")?;
    let service = RepairService::new(state.db, state.notifications);
    let job = service.update_status(job_id, input).await?;
    Ok(Json(job))
}

/// Assign a technician
pub async fn assign_technician(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(job_id): Path<Uuid>,
    Json(input): Json<AssignTechnicianInput>,
) -> AppResult<Json<RepairJob>> {
    current_user.0.require("repairs", "assign")?;
    let service = RepairService::new(state.db, state.notifications);
    let job = service.assign_technician(job_id, input).await?;
    Ok(Json(job))
}

/// Set the estimate
pub async fn set_estimate(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(job_id): Path<Uuid>,
    Json(input): Json<SetEstimateInput>,
) -> AppResult<Json<RepairJob>> {
    current_user.0.require("repairs", "write")?;
    let service = RepairService::new(state.db, state.notifications);
    let job = service.set_estimate(job_id, input).await?;
    Ok(Json(job))
}

/// Record the deposit
pub async fn set_deposit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(job_id): Path<Uuid>,
    Json(input): Json<SetDepositInput>,
) -> AppResult<Json<RepairJob>> {
    current_user.0.require("repairs", "write")?;
    let service = RepairService::new(state.db, state.notifications);
    let job = service.set_deposit(job_id, input).await?;
    Ok(Json(job))
}

/// Parts on a job
pub async fn list_parts(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<Vec<RepairPartUsed>>> {
    current_user.0.require("repairs", "read")?;
    let service = RepairPartsService::new(state.db, state.notifications);
    let parts = service.list_parts(job_id).await?;
    Ok(Json(parts))
}

/// Add a stock-backed or external part
pub async fn add_part(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(job_id): Path<Uuid>,
    Json(request): Json<AddPartRequest>,
) -> AppResult<(StatusCode, Json<PartChange>)> {
    current_user.0.require("repairs", "write")?;
    let input = request.normalize()?;
    let service = RepairPartsService::new(state.db, state.notifications);
    let change = service.add_part(job_id, current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(change)))
}

/// Change a part
pub async fn update_part(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((job_id, part_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdatePartInput>,
) -> AppResult<Json<PartChange>> {
    current_user.0.require("repairs", "write")?;
    let service = RepairPartsService::new(state.db, state.notifications);
    let change = service
        .update_part(job_id, part_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(change))
}

/// Remove a part
pub async fn remove_part(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((job_id, part_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<PartChange>> {
    current_user.0.require("repairs", "write")?;
    let service = RepairPartsService::new(state.db, state.notifications);
    let change = service
        .remove_part(job_id, part_id, current_user.0.user_id)
        .await?;
    Ok(Json(change))
}
