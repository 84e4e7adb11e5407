//! Reporting handlers for the financial report and its CSV export

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::reporting::ReportingService;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    #[serde(alias = "start_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(alias = "end_date")]
    pub end_date: Option<NaiveDate>,
    pub format: Option<String>, // "json" or "csv"
}

/// Get the financial report
pub async fn get_financial_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    current_user.0.require("reports", "read")?;

    let period = ReportingService::resolve_period(query.start_date, query.end_date)?;
    let service = ReportingService::new(state.db, state.config.reporting.daily_quota);
    let report = service.build_report(period).await?;

    if query.format.as_deref() == Some("csv") {
        let csv = ReportingService::daily_csv(&report)?;
        let disposition = format!(
            "attachment; filename=\"financial_{}_{}.csv\"",
            period.start, period.end
        );
        Ok((
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            csv,
        )
            .into_response())
    } else {
        Ok(Json(report).into_response())
    }
}
