//! Aggregation engine and its sealed result

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::forecast::{scheduled_items, ScheduleWindow, ScheduledItem};
use super::snapshot::{actuals_by_month, MonthlyActuals};
use crate::bills::{
    forecast_bills, BillForecast, ForecastWindow, MonthlyBillForecast, ProviderForecast,
};
use crate::classify::{ClassifiedExpense, ExpenseClassifier};
use crate::config::AggregatorConfig;
use crate::credit_card::{summarize_credit_card, CreditCardSummary};
use crate::error::Result;
use crate::grouping::{
    group_loans, group_subscriptions, group_transfers, monthly_transfers, GroupSummary,
    GroupingRules, LoanSummary, MonthlyTransfer, SubscriptionSummary, TransferSummary,
};
use crate::models::{Expense, ProfileSettings, UnifiedExpenseType};
use crate::months::MonthKey;
use crate::variable::{average_variable, lookback_months, VariableAverage};

/// Count and sum of the expenses in one bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeTotal {
    pub count: usize,
    pub amount: f64,
}

/// Everything the dashboard and the assistant need for one reference date.
///
/// Only [`UnifiedExpenses::compute`] produces values of this type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedExpensesResult {
    reference_date: NaiveDate,
    monthly_income: Option<f64>,
    type_totals: BTreeMap<UnifiedExpenseType, TypeTotal>,
    loans: Vec<LoanSummary>,
    subscriptions: Vec<SubscriptionSummary>,
    transfers: Vec<TransferSummary>,
    monthly_transfers: Vec<MonthlyTransfer>,
    bills: BillForecast,
    variable: VariableAverage,
    credit_card: CreditCardSummary,
    scheduled: Vec<ScheduledItem>,
    monthly_actuals: BTreeMap<MonthKey, MonthlyActuals>,
    total_loans_monthly: f64,
    total_subscriptions_monthly: f64,
    total_monthly_fixed: f64,
    grand_total_monthly: f64,
    grand_total_with_credit_card: f64,
}

impl UnifiedExpensesResult {
    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    pub fn reference_month(&self) -> MonthKey {
        MonthKey::of(self.reference_date)
    }

    pub fn monthly_income(&self) -> Option<f64> {
        self.monthly_income
    }

    pub fn type_total(&self, expense_type: UnifiedExpenseType) -> TypeTotal {
        self.type_totals
            .get(&expense_type)
            .copied()
            .unwrap_or_default()
    }

    pub fn type_totals(&self) -> &BTreeMap<UnifiedExpenseType, TypeTotal> {
        &self.type_totals
    }

    pub fn loans(&self) -> &[LoanSummary] {
        &self.loans
    }

    pub fn subscriptions(&self) -> &[SubscriptionSummary] {
        &self.subscriptions
    }

    pub fn transfers(&self) -> &[TransferSummary] {
        &self.transfers
    }

    pub fn monthly_transfers(&self) -> &[MonthlyTransfer] {
        &self.monthly_transfers
    }

    pub fn bill_forecast(&self) -> &BillForecast {
        &self.bills
    }

    pub fn bill_providers(&self) -> &[ProviderForecast] {
        &self.bills.providers
    }

    /// Month-by-month bills across the forecast horizon
    pub fn bill_months(&self) -> &[MonthlyBillForecast] {
        &self.bills.months
    }

    pub fn variable(&self) -> &VariableAverage {
        &self.variable
    }

    pub fn credit_card(&self) -> &CreditCardSummary {
        &self.credit_card
    }

    /// Variable expenses dated after the reference date
    pub fn scheduled(&self) -> &[ScheduledItem] {
        &self.scheduled
    }

    pub(crate) fn monthly_actuals(&self, month: MonthKey) -> Option<&MonthlyActuals> {
        self.monthly_actuals.get(&month)
    }

    pub fn total_loans_monthly(&self) -> f64 {
        self.total_loans_monthly
    }

    pub fn total_subscriptions_monthly(&self) -> f64 {
        self.total_subscriptions_monthly
    }

    /// Active loans plus active subscriptions
    pub fn total_monthly_fixed(&self) -> f64 {
        self.total_monthly_fixed
    }

    pub fn monthly_bills_estimate(&self) -> f64 {
        self.bills.monthly_estimate
    }

    pub fn variable_average(&self) -> f64 {
        self.variable.average
    }

    /// Fixed + variable average + bills estimate
    pub fn grand_total_monthly(&self) -> f64 {
        self.grand_total_monthly
    }

    /// Grand total plus card charges still to post
    pub fn grand_total_with_credit_card(&self) -> f64 {
        self.grand_total_with_credit_card
    }

    pub fn is_estimated_bills(&self) -> bool {
        self.bills.is_estimated_bills
    }

    pub fn is_estimated_variable(&self) -> bool {
        self.variable.is_estimated
    }
}

/// The aggregation engine.
///
/// Compiles the configured rules once and remembers the last result, so
/// repeated calls with an unchanged dataset return the same `Arc`.
pub struct UnifiedExpenses {
    config: AggregatorConfig,
    classifier: ExpenseClassifier,
    cache: Mutex<Option<(String, Arc<UnifiedExpensesResult>)>>,
}

impl UnifiedExpenses {
    pub fn new(config: AggregatorConfig) -> Result<Self> {
        let classifier = ExpenseClassifier::new(&config)?;
        Ok(Self {
            config,
            classifier,
            cache: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Aggregate `expenses` as seen on `today`
    pub fn compute(
        &self,
        expenses: &[Expense],
        settings: &ProfileSettings,
        today: NaiveDate,
    ) -> Arc<UnifiedExpensesResult> {
        let mut ordered: Vec<&Expense> = expenses
            .iter()
            .filter(|e| {
                if e.amount.is_finite() {
                    true
                } else {
                    warn!("Skipping expense {} with non-finite amount", e.id);
                    false
                }
            })
            .collect();
        ordered.sort_by(|a, b| canonical_order(a, b));

        let fingerprint = fingerprint(&ordered, settings, today);

        // Held across the computation so concurrent callers share one result
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let (Some(fp), Some((cached_fp, cached))) = (fingerprint.as_deref(), cache.as_ref()) {
            if fp == cached_fp.as_str() {
                debug!("Aggregation cache hit ({} expenses)", ordered.len());
                return Arc::clone(cached);
            }
        }
        debug!("Aggregation cache miss ({} expenses)", ordered.len());

        let result = Arc::new(self.assemble(&ordered, settings, today));
        if let Some(fp) = fingerprint {
            *cache = Some((fp, Arc::clone(&result)));
        }
        result
    }

    fn assemble(
        &self,
        ordered: &[&Expense],
        settings: &ProfileSettings,
        today: NaiveDate,
    ) -> UnifiedExpensesResult {
        let reference_month = MonthKey::of(today);
        let classified = self.classifier.classify_all(ordered, today);

        let rules = GroupingRules {
            reference_month,
            active_grace_months: self.config.fixed_active_grace_months,
        };
        let loans = group_loans(&classified, &self.classifier, rules);
        let subscriptions = group_subscriptions(&classified, rules);
        let transfers = group_transfers(&classified, rules);

        let horizon_months = self.config.forecast_horizon_months.max(1);
        let bills = forecast_bills(
            &classified,
            ForecastWindow {
                reference_month,
                horizon_months,
                default_frequency_months: self.config.default_bill_frequency_months,
            },
        );
        let variable = average_variable(
            &classified,
            reference_month,
            lookback_months(settings, today),
        );
        let credit_card = summarize_credit_card(&classified, reference_month);

        let total_loans_monthly = active_monthly(&loans);
        let total_subscriptions_monthly = active_monthly(&subscriptions);
        let total_monthly_fixed = total_loans_monthly + total_subscriptions_monthly;
        let grand_total_monthly = total_monthly_fixed + variable.average + bills.monthly_estimate;
        let grand_total_with_credit_card = grand_total_monthly + credit_card.pending;

        info!(
            "Aggregated {} expenses for {}: fixed {:.2}, variable {:.2}, bills {:.2}, total {:.2}",
            ordered.len(),
            reference_month,
            total_monthly_fixed,
            variable.average,
            bills.monthly_estimate,
            grand_total_monthly
        );

        UnifiedExpensesResult {
            reference_date: today,
            monthly_income: settings.monthly_income.filter(|i| i.is_finite()),
            type_totals: type_totals(&classified),
            monthly_transfers: monthly_transfers(&classified),
            scheduled: scheduled_items(
                &classified,
                ScheduleWindow {
                    today,
                    last_month: reference_month.add_months(horizon_months as i64 - 1),
                    active_grace_months: self.config.fixed_active_grace_months,
                },
            ),
            monthly_actuals: actuals_by_month(&classified),
            loans,
            subscriptions,
            transfers,
            bills,
            variable,
            credit_card,
            total_loans_monthly,
            total_subscriptions_monthly,
            total_monthly_fixed,
            grand_total_monthly,
            grand_total_with_credit_card,
        }
    }
}

/// Date, then id, then amount
fn canonical_order(a: &Expense, b: &Expense) -> Ordering {
    a.date
        .cmp(&b.date)
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| a.amount.total_cmp(&b.amount))
}

/// SHA-256 over the canonically ordered input; None if it cannot be serialized
fn fingerprint(
    ordered: &[&Expense],
    settings: &ProfileSettings,
    today: NaiveDate,
) -> Option<String> {
    let payload = serde_json::to_vec(&(ordered, settings, today)).ok()?;
    Some(hex::encode(Sha256::digest(&payload)))
}

fn active_monthly(groups: &[GroupSummary]) -> f64 {
    groups
        .iter()
        .filter(|g| g.is_active)
        .map(|g| g.monthly_amount)
        .sum()
}

fn type_totals(classified: &[ClassifiedExpense<'_>]) -> BTreeMap<UnifiedExpenseType, TypeTotal> {
    let mut totals: BTreeMap<UnifiedExpenseType, TypeTotal> = UnifiedExpenseType::all()
        .iter()
        .map(|t| (*t, TypeTotal::default()))
        .collect();
    for c in classified {
        if let Some(total) = totals.get_mut(&c.expense_type()) {
            total.count += 1;
            total.amount += c.expense.amount;
        }
    }
    totals
}
