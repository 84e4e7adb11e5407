//! HTTP request handlers

use chrono::NaiveDate;
use serde::Deserialize;
use shared::DateRange;

use crate::error::AppResult;
use crate::services::ReportingService;

pub mod customer;
pub mod expense;
pub mod health;
pub mod inventory;
pub mod notification;
pub mod repair;
pub mod reporting;
pub mod sales;

pub use customer::*;
pub use expense::*;
pub use health::*;
pub use inventory::*;
pub use notification::*;
pub use repair::*;
pub use reporting::*;
pub use sales::*;

/// `?startDate=&endDate=` bounds, both defaulting to the current month
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeQuery {
    #[serde(alias = "start_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(alias = "end_date")]
    pub end_date: Option<NaiveDate>,
}

impl DateRangeQuery {
    pub fn resolve(&self) -> AppResult<DateRange> {
        ReportingService::resolve_period(self.start_date, self.end_date)
    }
}
