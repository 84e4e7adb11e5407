//! Repair job models and status machine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A device repair job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct RepairJob {
    pub id: Uuid,
    pub job_number: String,
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub device_type: String,
    pub device_brand: Option<String>,
    pub device_model: Option<String>,
    pub serial_number: Option<String>,
    pub issue_description: String,
    pub diagnosis: Option<String>,
    pub status: RepairStatus,
    pub technician_id: Option<Uuid>,
    pub estimated_cost: Decimal,
    /// Billable revenue, maintained by reconciliation
    pub actual_cost: Decimal,
    pub deposit_paid: Decimal,
    /// actual_cost - deposit_paid
    pub balance: Decimal,
    pub diagnosed_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub collected_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A part consumed by a repair job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct RepairPartUsed {
    pub id: Uuid,
    pub repair_job_id: Uuid,
    /// Set for stock-backed parts
    pub item_id: Option<Uuid>,
    pub part_name: String,
    pub quantity: i32,
    /// Price snapshot taken when the part was added
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl RepairPartUsed {
    pub fn is_stock_backed(&self) -> bool {
        self.item_id.is_some()
    }
}

/// Denormalized line total; fails when it would not fit the money column
pub fn part_total(unit_cost: Decimal, quantity: i32) -> Result<Decimal, &'static str> {
    crate::validation::checked_line_total(unit_cost, quantity)
}

/// Repair job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "repair_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum RepairStatus {
    Pending,
    Diagnosed,
    InProgress,
    Ready,
    Collected,
    Abandoned,
}

/// Rejected status change
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot move repair job from {from} to {to}")]
pub struct TransitionError {
    pub from: RepairStatus,
    pub to: RepairStatus,
}

impl RepairStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairStatus::Pending => "pending",
            RepairStatus::Diagnosed => "diagnosed",
            RepairStatus::InProgress => "in_progress",
            RepairStatus::Ready => "ready",
            RepairStatus::Collected => "collected",
            RepairStatus::Abandoned => "abandoned",
        }
    }

    /// Position on the main line; `None` for abandoned
    fn rank(&self) -> Option<u8> {
        match self {
            RepairStatus::Pending => Some(0),
            RepairStatus::Diagnosed => Some(1),
            RepairStatus::InProgress => Some(2),
            RepairStatus::Ready => Some(3),
            RepairStatus::Collected => Some(4),
            RepairStatus::Abandoned => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RepairStatus::Collected | RepairStatus::Abandoned)
    }

    /// Forward moves along the main line (steps may be skipped), or
    /// abandonment from any open status.
    pub fn can_transition_to(&self, next: RepairStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, _) => false,
        }
    }

    pub fn transition_to(&self, next: RepairStatus) -> Result<RepairStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError { from: *self, to: next })
        }
    }
}

impl std::fmt::Display for RepairStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RepairStatus; 6] = [
        RepairStatus::Pending,
        RepairStatus::Diagnosed,
        RepairStatus::InProgress,
        RepairStatus::Ready,
        RepairStatus::Collected,
        RepairStatus::Abandoned,
    ];

    #[test]
    fn main_line_moves_forward() {
        assert!(RepairStatus::Pending.can_transition_to(RepairStatus::Diagnosed));
        assert!(RepairStatus::Diagnosed.can_transition_to(RepairStatus::InProgress));
        assert!(RepairStatus::InProgress.can_transition_to(RepairStatus::Ready));
        assert!(RepairStatus::Ready.can_transition_to(RepairStatus::Collected));
        assert!(RepairStatus::Pending.can_transition_to(RepairStatus::InProgress));
    }

    #[test]
    fn backward_and_same_status_rejected() {
        assert!(!RepairStatus::Ready.can_transition_to(RepairStatus::InProgress));
        assert!(!RepairStatus::Diagnosed.can_transition_to(RepairStatus::Pending));
        assert!(!RepairStatus::Ready.can_transition_to(RepairStatus::Ready));
    }

    #[test]
    fn abandon_from_any_open_status() {
        for status in ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(status.can_transition_to(RepairStatus::Abandoned), "{status}");
        }
    }

    #[test]
    fn terminal_statuses_are_final() {
        for next in ALL {
            assert!(!RepairStatus::Collected.can_transition_to(next));
            assert!(!RepairStatus::Abandoned.can_transition_to(next));
        }
    }

    #[test]
    fn transition_error_names_both_statuses() {
        let err = RepairStatus::Collected
            .transition_to(RepairStatus::Ready)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot move repair job from collected to ready");
    }

    #[test]
    fn part_total_multiplies() {
        assert_eq!(part_total(Decimal::new(2500, 2), 3), Ok(Decimal::new(7500, 2)));
        assert!(part_total(Decimal::from(9_000_000_000i64), 2).is_err());
    }
}
