//! Trailing average of variable spending
//!
//! The average is month-denominated: months without any variable expense
//! still count, so a quiet month pulls the typical figure down.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::classify::ClassifiedExpense;
use crate::models::{ProfileSettings, UnifiedExpenseType};
use crate::months::{months_between, MonthKey};

/// Longest automatic lookback
pub const MAX_LOOKBACK_MONTHS: u32 = 12;

/// Longest lookback a profile may request explicitly
pub const MAX_EXPLICIT_LOOKBACK_MONTHS: u32 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableAverage {
    pub lookback_months: u32,
    pub average: f64,
    /// Every month of the window, zero-filled
    pub by_month: BTreeMap<MonthKey, f64>,
    /// Part of the variable spending that went to family transfers, per month
    pub transfers_by_month: BTreeMap<MonthKey, f64>,
    /// Share of `average` coming from expenses flagged recurring
    pub recurring_average: f64,
    /// True while the window is shorter than a full year
    pub is_estimated: bool,
}

/// Lookback in months: the explicit setting clamped to 1..=120, else the
/// profile age clamped to 1..=12
pub fn lookback_months(settings: &ProfileSettings, today: NaiveDate) -> u32 {
    match settings.variable_months_lookback {
        Some(months) => months.clamp(1, MAX_EXPLICIT_LOOKBACK_MONTHS),
        None => months_between(settings.created_at, today).clamp(1, MAX_LOOKBACK_MONTHS),
    }
}

/// Average variable spend over the `lookback` months ending with `reference_month`
pub(crate) fn average_variable(
    classified: &[ClassifiedExpense<'_>],
    reference_month: MonthKey,
    lookback: u32,
) -> VariableAverage {
    let lookback = lookback.clamp(1, MAX_EXPLICIT_LOOKBACK_MONTHS);
    let first = reference_month.add_months(-(lookback as i64 - 1));

    let mut by_month: BTreeMap<MonthKey, f64> = first.range(lookback).map(|m| (m, 0.0)).collect();
    let mut transfers_by_month = by_month.clone();
    let mut recurring = 0.0;

    for c in classified
        .iter()
        .filter(|c| c.expense_type() == UnifiedExpenseType::Variable)
    {
        let month = c.effective_month();
        if let Some(total) = by_month.get_mut(&month) {
            *total += c.expense.amount;
            if c.expense.is_recurring() {
                recurring += c.expense.amount;
            }
            if c.classification.is_family_transfer {
                if let Some(transfers) = transfers_by_month.get_mut(&month) {
                    *transfers += c.expense.amount;
                }
            }
        }
    }

    let sum: f64 = by_month.values().sum();

    VariableAverage {
        lookback_months: lookback,
        average: sum / lookback as f64,
        by_month,
        transfers_by_month,
        recurring_average: recurring / lookback as f64,
        is_estimated: lookback < MAX_LOOKBACK_MONTHS,
    }
}
