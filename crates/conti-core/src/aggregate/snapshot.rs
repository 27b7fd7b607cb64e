//! Actual versus expected spending for a single month

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::unified::UnifiedExpensesResult;
use crate::classify::ClassifiedExpense;
use crate::models::UnifiedExpenseType;
use crate::months::MonthKey;

/// Paid spending bucketed by effective month
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyActuals {
    pub by_type: BTreeMap<UnifiedExpenseType, f64>,
    pub transfers: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySnapshot {
    pub month: MonthKey,
    /// Zero-filled for every type
    pub actual_by_type: BTreeMap<UnifiedExpenseType, f64>,
    pub actual_total: f64,
    pub transfers: f64,
    pub expense_count: usize,
    /// The typical month: `grand_total_monthly`
    pub expected: f64,
    /// Negative once the month overshoots
    pub remaining: f64,
}

/// Unpaid entries are left out; they have not been spent yet
pub(crate) fn actuals_by_month(
    classified: &[ClassifiedExpense<'_>],
) -> BTreeMap<MonthKey, MonthlyActuals> {
    let mut months: BTreeMap<MonthKey, MonthlyActuals> = BTreeMap::new();
    for c in classified.iter().filter(|c| c.expense.is_paid()) {
        let actuals = months.entry(c.effective_month()).or_default();
        *actuals.by_type.entry(c.expense_type()).or_insert(0.0) += c.expense.amount;
        if c.classification.is_family_transfer {
            actuals.transfers += c.expense.amount;
        }
        actuals.count += 1;
    }
    months
}

impl UnifiedExpensesResult {
    pub fn snapshot(&self, month: MonthKey) -> MonthlySnapshot {
        let mut actual_by_type: BTreeMap<UnifiedExpenseType, f64> = UnifiedExpenseType::all()
            .iter()
            .map(|t| (*t, 0.0))
            .collect();
        let (transfers, expense_count) = match self.monthly_actuals(month) {
            Some(actuals) => {
                for (expense_type, amount) in &actuals.by_type {
                    actual_by_type.insert(*expense_type, *amount);
                }
                (actuals.transfers, actuals.count)
            }
            None => (0.0, 0),
        };

        let actual_total: f64 = actual_by_type.values().sum();
        let expected = self.grand_total_monthly();

        MonthlySnapshot {
            month,
            actual_by_type,
            actual_total,
            transfers,
            expense_count,
            expected,
            remaining: expected - actual_total,
        }
    }

    /// Snapshot of the reference month
    pub fn current_snapshot(&self) -> MonthlySnapshot {
        self.snapshot(self.reference_month())
    }
}

#[cfg(test)]
mod tests {
    use crate::aggregate::UnifiedExpenses;
    use crate::config::AggregatorConfig;
    use crate::models::{BillType, ProfileSettings, UnifiedExpenseType};
    use crate::months::MonthKey;
    use crate::test_utils::{bill, card_expense, date, expense};

    #[test]
    fn test_snapshot_remaining_against_typical_month() {
        let engine = UnifiedExpenses::new(AggregatorConfig::embedded().unwrap()).unwrap();
        let mut settings = ProfileSettings::new(date(2025, 1, 1));
        settings.variable_months_lookback = Some(2);

        let expenses = vec![
            expense("f1", 300.0, date(2026, 2, 10), "Esselunga"),
            expense("f2", 100.0, date(2026, 3, 3), "Esselunga"),
            expense("t1", 50.0, date(2026, 3, 5), "Bonifico mamma"),
            // Posts in April
            card_expense("c1", 40.0, date(2026, 3, 8), "Decathlon"),
        ];
        let result = engine.compute(&expenses, &settings, date(2026, 3, 20));

        // Variable average over Feb..Mar: (300 + 150) / 2
        assert_eq!(result.grand_total_monthly(), 225.0);

        let march = result.current_snapshot();
        assert_eq!(march.month, MonthKey::new(2026, 3).unwrap());
        assert_eq!(march.actual_by_type[&UnifiedExpenseType::Variable], 150.0);
        assert_eq!(march.actual_by_type[&UnifiedExpenseType::CreditCard], 0.0);
        assert_eq!(march.transfers, 50.0);
        assert_eq!(march.expense_count, 2);
        assert_eq!(march.remaining, 75.0);

        let april = result.snapshot(MonthKey::new(2026, 4).unwrap());
        assert_eq!(april.actual_by_type[&UnifiedExpenseType::CreditCard], 40.0);
        assert_eq!(april.remaining, 185.0);
    }

    #[test]
    fn test_unpaid_bill_not_counted_as_spent() {
        let engine = UnifiedExpenses::new(AggregatorConfig::embedded().unwrap()).unwrap();
        let mut gas = bill("b1", 120.0, date(2026, 3, 15), BillType::Gas, "Hera", None);
        gas.is_paid = Some(false);

        let settings = ProfileSettings::new(date(2025, 1, 1));
        let result = engine.compute(&[gas], &settings, date(2026, 3, 20));
        let march = result.current_snapshot();
        assert_eq!(march.actual_total, 0.0);
        assert_eq!(march.expense_count, 0);
    }
}
