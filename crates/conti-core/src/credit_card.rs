//! Credit-card booked / pending rollup
//!
//! Card charges are bucketed by their effective (posting) month. Charges
//! posting in the reference month or earlier are booked; later ones are
//! pending and feed forward-looking totals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classify::ClassifiedExpense;
use crate::models::UnifiedExpenseType;
use crate::months::MonthKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCardSummary {
    /// Posted this cycle (last month's purchases)
    pub booked: f64,
    /// Purchased but posting in a later cycle
    pub pending: f64,
    pub pending_count: usize,
    /// Totals by posting month
    pub by_month: BTreeMap<MonthKey, f64>,
}

impl CreditCardSummary {
    /// Charges posting in `month`
    pub fn posting_in(&self, month: MonthKey) -> f64 {
        self.by_month.get(&month).copied().unwrap_or(0.0)
    }
}

pub(crate) fn summarize_credit_card(
    classified: &[ClassifiedExpense<'_>],
    reference_month: MonthKey,
) -> CreditCardSummary {
    let mut by_month: BTreeMap<MonthKey, f64> = BTreeMap::new();
    let mut pending_count = 0;

    for c in classified
        .iter()
        .filter(|c| c.expense_type() == UnifiedExpenseType::CreditCard)
    {
        let month = c.effective_month();
        *by_month.entry(month).or_insert(0.0) += c.expense.amount;
        if month > reference_month {
            pending_count += 1;
        }
    }

    CreditCardSummary {
        booked: by_month.get(&reference_month).copied().unwrap_or(0.0),
        pending: by_month
            .range(reference_month.next()..)
            .map(|(_, amount)| amount)
            .sum(),
        pending_count,
        by_month,
    }
}
