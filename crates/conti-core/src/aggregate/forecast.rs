//! Month-by-month budget forecast
//!
//! Projects each month of the horizon from what is already known: fixed
//! obligations until their last installment, the bill rollup, the variable
//! average, card charges posting that month, future-dated expenses and the
//! next occurrences of recurring ones.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::unified::UnifiedExpensesResult;
use crate::classify::ClassifiedExpense;
use crate::grouping::GroupSummary;
use crate::matching::normalize_name;
use crate::models::{Expense, UnifiedExpenseType};
use crate::months::{add_months_clamped, MonthKey};

/// A variable expense expected on a future date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledItem {
    /// Source expense id; projected occurrences append `#YYYY-MM`
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub date: NaiveDate,
    /// Projected from a recurring expense rather than entered ahead
    pub recurring: bool,
}

/// Scheduling parameters
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScheduleWindow {
    pub today: NaiveDate,
    /// Last month of the forecast horizon
    pub last_month: MonthKey,
    /// A recurring series silent for longer than this is not projected
    pub active_grace_months: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetForecastMonth {
    pub month: MonthKey,
    pub loans: f64,
    pub subscriptions: f64,
    pub fixed: f64,
    pub bills: f64,
    pub bills_estimated: bool,
    pub variable: f64,
    pub credit_card: f64,
    /// Future-dated entries
    pub scheduled: f64,
    /// Projected occurrences of recurring expenses
    pub recurring: f64,
    pub scheduled_items: Vec<ScheduledItem>,
    pub total: f64,
    /// Income minus total, when the profile declares an income
    pub balance: Option<f64>,
}

/// Variable expenses dated after today, plus one occurrence per month of
/// every recurring series from its latest entry to the end of the horizon.
/// Loans and subscriptions are left to their groups.
pub(crate) fn scheduled_items(
    classified: &[ClassifiedExpense<'_>],
    window: ScheduleWindow,
) -> Vec<ScheduledItem> {
    let variable: Vec<&Expense> = classified
        .iter()
        .filter(|c| c.expense_type() == UnifiedExpenseType::Variable)
        .map(|c| c.expense)
        .collect();

    let mut items: Vec<ScheduledItem> = variable
        .iter()
        .filter(|e| e.date > window.today)
        .map(|e| ScheduledItem {
            id: e.id.clone(),
            description: e.description.clone(),
            amount: e.amount,
            date: e.date,
            recurring: false,
        })
        .collect();

    let mut latest_by_series: BTreeMap<String, &Expense> = BTreeMap::new();
    for &expense in variable.iter().filter(|e| e.is_recurring()) {
        let latest = latest_by_series.entry(series_key(expense)).or_insert(expense);
        if (expense.date, &expense.id) > (latest.date, &latest.id) {
            *latest = expense;
        }
    }

    let reference_month = MonthKey::of(window.today);
    for (series, latest) in latest_by_series {
        let silent_for = MonthKey::of(latest.date).months_until(reference_month);
        if silent_for > window.active_grace_months as i64 {
            debug!("Recurring {} silent for {} months, not projected", series, silent_for);
            continue;
        }

        let before = items.len();
        items.extend(
            (1..)
                .map(|step: u32| add_months_clamped(latest.date, step))
                .take_while(|date| MonthKey::of(*date) <= window.last_month)
                .filter(|date| *date > window.today)
                .map(|date| ScheduledItem {
                    id: format!("{}#{}", latest.id, MonthKey::of(date)),
                    description: latest.description.clone(),
                    amount: latest.amount,
                    date,
                    recurring: true,
                }),
        );
        debug!(
            "Recurring {}: {:.2} projected {} times",
            series,
            latest.amount,
            items.len() - before
        );
    }

    items.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
    items
}

/// Case-insensitive series name: provider, else the normalized description
fn series_key(expense: &Expense) -> String {
    expense
        .provider_name()
        .map(str::to_string)
        .unwrap_or_else(|| normalize_name(&expense.description))
        .to_lowercase()
}

fn due_in(groups: &[GroupSummary], month: MonthKey) -> f64 {
    groups
        .iter()
        .filter(|g| g.applies_in(month))
        .map(|g| g.monthly_amount)
        .sum()
}

impl UnifiedExpensesResult {
    /// One entry per month of the forecast horizon, starting with the reference month
    pub fn budget_forecast(&self) -> Vec<BudgetForecastMonth> {
        self.bill_months()
            .iter()
            .map(|bills| {
                let month = bills.month;
                let loans = due_in(self.loans(), month);
                let subscriptions = due_in(self.subscriptions(), month);
                let fixed = loans + subscriptions;
                // Recurring spend is projected item by item instead
                let variable =
                    (self.variable_average() - self.variable().recurring_average).max(0.0);
                let credit_card = self.credit_card().posting_in(month);

                let scheduled_items: Vec<ScheduledItem> = self
                    .scheduled()
                    .iter()
                    .filter(|item| month.contains(item.date))
                    .cloned()
                    .collect();
                let sum_where = |recurring: bool| -> f64 {
                    scheduled_items
                        .iter()
                        .filter(|i| i.recurring == recurring)
                        .map(|i| i.amount)
                        .sum()
                };
                let scheduled = sum_where(false);
                let recurring = sum_where(true);

                let total = fixed + bills.total + variable + credit_card + scheduled + recurring;

                BudgetForecastMonth {
                    month,
                    loans,
                    subscriptions,
                    fixed,
                    bills: bills.total,
                    bills_estimated: bills.is_estimated,
                    variable,
                    credit_card,
                    scheduled,
                    recurring,
                    scheduled_items,
                    total,
                    balance: self.monthly_income().map(|income| income - total),
                }
            })
            .collect()
    }
}
