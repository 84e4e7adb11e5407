//! Repair financial reconciliation rules
//!
//! The revenue fallback chain lives here and only here: reconciliation and
//! reporting both call [`effective_revenue`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Billable revenue for a repair job.
///
/// Order of precedence:
/// 1. `actual_cost` when given and non-zero (stored value, reporting path)
/// 2. `estimated_cost` when positive (staff estimate)
/// 3. `parts_cost` (no estimate was ever set)
pub fn effective_revenue(
    actual_cost: Option<Decimal>,
    estimated_cost: Decimal,
    parts_cost: Decimal,
) -> Decimal {
    match actual_cost {
        Some(actual) if !actual.is_zero() => actual,
        _ if estimated_cost > Decimal::ZERO => estimated_cost,
        _ => parts_cost,
    }
}

/// Derived money fields persisted on a repair job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairFinancials {
    pub parts_cost: Decimal,
    pub actual_cost: Decimal,
    pub balance: Decimal,
}

impl RepairFinancials {
    /// Recompute from the job's parts, estimate and deposit
    pub fn reconcile<I>(part_totals: I, estimated_cost: Decimal, deposit_paid: Decimal) -> Self
    where
        I: IntoIterator<Item = Decimal>,
    {
        let parts_cost: Decimal = part_totals.into_iter().sum();
        let actual_cost = effective_revenue(None, estimated_cost, parts_cost);
        Self {
            parts_cost,
            actual_cost,
            balance: actual_cost - deposit_paid,
        }
    }
}
