//! Utility bill estimation and forecasting
//!
//! Infers each provider's billing cycle from the most recent bill's period,
//! projects future due dates across the forecast horizon, and assembles one
//! rollup per month that merges actual, pending and forecast figures.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::ClassifiedExpense;
use crate::matching::normalize_name;
use crate::models::{BillDetails, BillType, Expense};
use crate::months::{add_months_clamped, MonthKey};

/// Billing cycle in months for a period length in days
pub fn frequency_for_days(days: i64) -> u32 {
    match days {
        d if d <= 35 => 1,
        d if d <= 65 => 2,
        d if d <= 95 => 3,
        d if d <= 190 => 6,
        _ => 12,
    }
}

/// Billing cycle of a bill, falling back to `default_months` without period dates.
/// Never below one month.
pub fn infer_frequency_months(bill: Option<&BillDetails>, default_months: u32) -> u32 {
    bill.and_then(BillDetails::period_days)
        .map(frequency_for_days)
        .unwrap_or(default_months)
        .max(1)
}

/// Projection of one provider's future bills
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderForecast {
    pub bill_type: BillType,
    pub provider: String,
    /// Mean of all paid bills; recurs at every projected due date
    pub average_amount: f64,
    pub frequency_months: u32,
    pub bill_count: usize,
    pub last_bill_date: NaiveDate,
    pub projected_due_dates: Vec<NaiveDate>,
}

impl ProviderForecast {
    /// Average spread over the billing cycle
    pub fn monthly_equivalent(&self) -> f64 {
        self.average_amount / self.frequency_months.max(1) as f64
    }
}

/// Where a bill figure comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    /// Paid
    Actual,
    /// Entered but not yet paid
    Pending,
    /// Projected from the provider's cycle
    Forecast,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillForecastItem {
    pub bill_type: BillType,
    pub provider: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub status: BillStatus,
}

/// Bills of one calendar month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBillForecast {
    pub month: MonthKey,
    pub actual: f64,
    pub pending: f64,
    pub forecast: f64,
    pub total: f64,
    pub items: Vec<BillForecastItem>,
    /// True when any figure in the month is projected rather than entered
    pub is_estimated: bool,
}

/// Everything the bill stage contributes to the unified result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillForecast {
    pub providers: Vec<ProviderForecast>,
    pub months: Vec<MonthlyBillForecast>,
    /// Σ provider average ÷ cycle length
    pub monthly_estimate: f64,
    pub is_estimated_bills: bool,
}

/// Forecast window parameters
#[derive(Debug, Clone, Copy)]
pub(crate) struct ForecastWindow {
    pub reference_month: MonthKey,
    pub horizon_months: u32,
    pub default_frequency_months: u32,
}

impl ForecastWindow {
    pub fn months(&self) -> impl Iterator<Item = MonthKey> {
        self.reference_month.range(self.horizon_months.max(1))
    }

    pub fn start(&self) -> NaiveDate {
        self.reference_month.first_day()
    }

    pub fn end(&self) -> NaiveDate {
        self.reference_month
            .add_months(self.horizon_months.max(1) as i64 - 1)
            .last_day()
    }
}

/// (bill type, lower-cased provider)
type ProviderKey = (BillType, String);

struct BillRecord<'a> {
    expense: &'a Expense,
    bill_type: BillType,
    provider: String,
    date: NaiveDate,
}

impl BillRecord<'_> {
    fn key(&self) -> ProviderKey {
        (self.bill_type, self.provider.to_lowercase())
    }

    fn item(&self, status: BillStatus) -> BillForecastItem {
        BillForecastItem {
            bill_type: self.bill_type,
            provider: self.provider.clone(),
            amount: self.expense.amount,
            date: self.date,
            status,
        }
    }
}

fn bill_record<'a>(c: &ClassifiedExpense<'a>) -> BillRecord<'a> {
    let expense = c.expense;
    let bill_type = expense
        .bill
        .as_ref()
        .and_then(|b| b.bill_type)
        .or_else(|| expense.category.bill_type())
        .unwrap_or(BillType::Other);
    let provider = expense
        .provider_name()
        .map(str::to_string)
        .or_else(|| Some(normalize_name(&expense.description)).filter(|n| !n.is_empty()))
        .unwrap_or_else(|| bill_type.as_str().to_string());
    let date = expense
        .bill
        .as_ref()
        .and_then(|b| b.due_date)
        .unwrap_or(expense.date);

    BillRecord {
        expense,
        bill_type,
        provider,
        date,
    }
}

/// Build provider projections and the month-by-month bill rollup
pub(crate) fn forecast_bills(
    classified: &[ClassifiedExpense<'_>],
    window: ForecastWindow,
) -> BillForecast {
    let mut by_provider: BTreeMap<ProviderKey, Vec<BillRecord<'_>>> = BTreeMap::new();
    for c in classified.iter().filter(|c| c.classification.is_utility_bill) {
        let record = bill_record(c);
        by_provider.entry(record.key()).or_default().push(record);
    }

    let providers: Vec<(ProviderKey, ProviderForecast)> = by_provider
        .iter()
        .filter_map(|(key, records)| {
            project_provider(records, window).map(|forecast| (key.clone(), forecast))
        })
        .collect();

    let months: Vec<MonthlyBillForecast> = window
        .months()
        .map(|month| assemble_month(month, &by_provider, &providers))
        .collect();

    let monthly_estimate = providers.iter().map(|(_, p)| p.monthly_equivalent()).sum();
    let is_estimated_bills = months.iter().any(|m| m.is_estimated);

    BillForecast {
        providers: providers.into_iter().map(|(_, p)| p).collect(),
        months,
        monthly_estimate,
        is_estimated_bills,
    }
}

/// None when the provider has no paid bill to extrapolate from
fn project_provider(
    records: &[BillRecord<'_>],
    window: ForecastWindow,
) -> Option<ProviderForecast> {
    let paid: Vec<&BillRecord<'_>> = records.iter().filter(|r| r.expense.is_paid()).collect();
    if paid.is_empty() {
        return None;
    }

    let average_amount = paid.iter().map(|r| r.expense.amount).sum::<f64>() / paid.len() as f64;

    // Projections start from the latest paid bill; unpaid entries are
    // already-known future cycles and are reported as pending instead
    let last = paid
        .iter()
        .max_by(|a, b| a.date.cmp(&b.date).then_with(|| a.expense.id.cmp(&b.expense.id)))?;
    let frequency_months =
        infer_frequency_months(last.expense.bill.as_ref(), window.default_frequency_months);

    let (start, end) = (window.start(), window.end());
    let projected_due_dates: Vec<NaiveDate> = (1..)
        .map(|step: u32| add_months_clamped(last.date, step.saturating_mul(frequency_months)))
        .take_while(|date| *date <= end)
        .filter(|date| *date >= start)
        .collect();

    debug!(
        "Bill forecast {} {}: avg {:.2} every {} months, {} projected dates",
        last.bill_type,
        last.provider,
        average_amount,
        frequency_months,
        projected_due_dates.len()
    );

    Some(ProviderForecast {
        bill_type: last.bill_type,
        provider: last.provider.clone(),
        average_amount,
        frequency_months,
        bill_count: paid.len(),
        last_bill_date: last.date,
        projected_due_dates,
    })
}

/// Per provider: actual beats pending beats forecast, never more than one kind
fn assemble_month(
    month: MonthKey,
    by_provider: &BTreeMap<ProviderKey, Vec<BillRecord<'_>>>,
    providers: &[(ProviderKey, ProviderForecast)],
) -> MonthlyBillForecast {
    let mut items = Vec::new();

    for (key, records) in by_provider {
        let in_month: Vec<&BillRecord<'_>> =
            records.iter().filter(|r| month.contains(r.date)).collect();
        let paid: Vec<_> = in_month.iter().filter(|r| r.expense.is_paid()).collect();
        let pending: Vec<_> = in_month.iter().filter(|r| !r.expense.is_paid()).collect();

        if !paid.is_empty() {
            items.extend(paid.iter().map(|r| r.item(BillStatus::Actual)));
        } else if !pending.is_empty() {
            items.extend(pending.iter().map(|r| r.item(BillStatus::Pending)));
        } else if let Some((_, forecast)) = providers.iter().find(|(k, _)| k == key) {
            if let Some(due) = forecast
                .projected_due_dates
                .iter()
                .find(|d| month.contains(**d))
            {
                items.push(BillForecastItem {
                    bill_type: forecast.bill_type,
                    provider: forecast.provider.clone(),
                    amount: forecast.average_amount,
                    date: *due,
                    status: BillStatus::Forecast,
                });
            }
        }
    }

    let sum_of = |status: BillStatus| -> f64 {
        items
            .iter()
            .filter(|i| i.status == status)
            .map(|i| i.amount)
            .sum()
    };
    let actual = sum_of(BillStatus::Actual);
    let pending = sum_of(BillStatus::Pending);
    let forecast = sum_of(BillStatus::Forecast);
    let is_estimated = items.iter().any(|i| i.status == BillStatus::Forecast);

    MonthlyBillForecast {
        month,
        actual,
        pending,
        forecast,
        total: actual + pending + forecast,
        items,
        is_estimated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ExpenseClassifier;
    use crate::config::AggregatorConfig;
    use crate::test_utils::{bill, date};

    fn period(days: i64) -> Option<BillDetails> {
        let start = date(2026, 1, 1);
        Some(BillDetails {
            period_start: Some(start),
            period_end: Some(start + chrono::Duration::days(days)),
            ..Default::default()
        })
    }

    fn run(expenses: &[Expense], today: NaiveDate, horizon: u32) -> BillForecast {
        let config = AggregatorConfig::embedded().unwrap();
        let classifier = ExpenseClassifier::new(&config).unwrap();
        let refs: Vec<&Expense> = expenses.iter().collect();
        let classified = classifier.classify_all(&refs, today);
        forecast_bills(
            &classified,
            ForecastWindow {
                reference_month: MonthKey::of(today),
                horizon_months: horizon,
                default_frequency_months: 2,
            },
        )
    }

    #[test]
    fn test_frequency_breakpoints() {
        assert_eq!(infer_frequency_months(period(40).as_ref(), 2), 2);
        assert_eq!(infer_frequency_months(period(36).as_ref(), 2), 2);
        assert_eq!(infer_frequency_months(period(35).as_ref(), 2), 1);
        assert_eq!(infer_frequency_months(period(96).as_ref(), 2), 6);
        assert_eq!(infer_frequency_months(period(65).as_ref(), 2), 2);
        assert_eq!(infer_frequency_months(period(95).as_ref(), 2), 3);
        assert_eq!(infer_frequency_months(period(190).as_ref(), 2), 6);
        assert_eq!(infer_frequency_months(period(191).as_ref(), 2), 12);
    }

    #[test]
    fn test_missing_period_defaults_to_bimonthly() {
        assert_eq!(infer_frequency_months(None, 2), 2);
        assert_eq!(infer_frequency_months(Some(&BillDetails::default()), 2), 2);
    }

    #[test]
    fn test_zero_default_frequency_is_monthly() {
        assert_eq!(infer_frequency_months(None, 0), 1);

        let config = AggregatorConfig::embedded().unwrap();
        let classifier = ExpenseClassifier::new(&config).unwrap();
        let gas = bill("g1", 60.0, date(2026, 1, 15), BillType::Gas, "Hera", None);
        let refs = vec![&gas];
        let classified = classifier.classify_all(&refs, date(2026, 2, 1));
        let result = forecast_bills(
            &classified,
            ForecastWindow {
                reference_month: MonthKey::new(2026, 2).unwrap(),
                horizon_months: 3,
                default_frequency_months: 0,
            },
        );

        let provider = &result.providers[0];
        assert_eq!(provider.frequency_months, 1);
        assert_eq!(
            provider.projected_due_dates,
            vec![date(2026, 2, 15), date(2026, 3, 15), date(2026, 4, 15)]
        );
    }

    #[test]
    fn test_average_and_projection() {
        let expenses = vec![
            bill("e1", 100.0, date(2025, 11, 10), BillType::Electricity, "Enel", None),
            bill("e2", 140.0, date(2026, 1, 10), BillType::Electricity, "Enel", None),
        ];
        let result = run(&expenses, date(2026, 2, 15), 6);

        assert_eq!(result.providers.len(), 1);
        let enel = &result.providers[0];
        assert_eq!(enel.average_amount, 120.0);
        assert_eq!(enel.frequency_months, 2);
        assert_eq!(enel.last_bill_date, date(2026, 1, 10));
        // Window Feb..Jul 2026
        assert_eq!(
            enel.projected_due_dates,
            vec![date(2026, 3, 10), date(2026, 5, 10), date(2026, 7, 10)]
        );
        assert_eq!(result.monthly_estimate, 60.0);

        let march = &result.months[1];
        assert_eq!(march.month, MonthKey::new(2026, 3).unwrap());
        assert_eq!(march.forecast, 120.0);
        assert!(march.is_estimated);
        assert!(result.is_estimated_bills);

        let february = &result.months[0];
        assert_eq!(february.total, 0.0);
        assert!(!february.is_estimated);
    }

    #[test]
    fn test_actual_bill_suppresses_forecast() {
        let expenses = vec![
            bill("g1", 80.0, date(2026, 1, 5), BillType::Gas, "Hera", None),
            // Paid in the month the cycle projects to
            bill("g2", 95.0, date(2026, 3, 20), BillType::Gas, "Hera", None),
        ];
        // Reference March: projection from g2 lands in May, none in March
        let result = run(&expenses, date(2026, 3, 25), 3);
        let march = &result.months[0];
        assert_eq!(march.actual, 95.0);
        assert_eq!(march.forecast, 0.0);
        assert_eq!(march.items.len(), 1);
        assert!(!march.is_estimated);
    }

    #[test]
    fn test_actual_bill_wins_over_projection_in_same_month() {
        // Projections start after the latest paid bill, so an actual and a
        // projected date only share a month when the month is assembled
        // against an older projection
        let paid = bill("e3", 110.0, date(2026, 3, 4), BillType::Electricity, "Enel", None);
        let record = BillRecord {
            expense: &paid,
            bill_type: BillType::Electricity,
            provider: "Enel".to_string(),
            date: paid.date,
        };
        let key = record.key();
        let by_provider = BTreeMap::from([(key.clone(), vec![record])]);
        let projection = ProviderForecast {
            bill_type: BillType::Electricity,
            provider: "Enel".to_string(),
            average_amount: 95.0,
            frequency_months: 2,
            bill_count: 1,
            last_bill_date: date(2026, 1, 10),
            projected_due_dates: vec![date(2026, 3, 10), date(2026, 5, 10)],
        };

        let march = assemble_month(
            MonthKey::new(2026, 3).unwrap(),
            &by_provider,
            &[(key, projection)],
        );
        assert_eq!(march.items.len(), 1);
        assert_eq!(march.items[0].status, BillStatus::Actual);
        assert_eq!(march.actual, 110.0);
        assert_eq!(march.forecast, 0.0);
        assert_eq!(march.total, 110.0);
        assert!(!march.is_estimated);
    }

    #[test]
    fn test_pending_bill_suppresses_projected_forecast() {
        let paid = bill("w1", 60.0, date(2026, 1, 10), BillType::Water, "Acea", None);
        // Entered for the cycle the projection lands on (March 10)
        let mut next = bill("w2", 70.0, date(2026, 3, 2), BillType::Water, "Acea", None);
        next.is_paid = Some(false);

        let result = run(&[paid, next], date(2026, 3, 1), 2);
        assert_eq!(
            result.providers[0].projected_due_dates,
            vec![date(2026, 3, 10)]
        );

        let march = &result.months[0];
        assert_eq!(march.pending, 70.0);
        assert_eq!(march.forecast, 0.0);
        assert_eq!(march.total, 70.0);
        assert_eq!(march.items.len(), 1);
        assert!(!march.is_estimated);
    }

    #[test]
    fn test_no_paid_bills_no_forecast() {
        let mut pending = bill("p1", 50.0, date(2026, 3, 3), BillType::Internet, "Fastweb", None);
        pending.is_paid = Some(false);
        let result = run(&[pending], date(2026, 3, 5), 12);

        assert!(result.providers.is_empty());
        assert_eq!(result.months[0].pending, 50.0);
        assert!(result.months.iter().all(|m| m.forecast == 0.0));
        assert!(!result.is_estimated_bills);
        assert_eq!(result.monthly_estimate, 0.0);
    }

    #[test]
    fn test_providers_keyed_by_type_and_provider() {
        let expenses = vec![
            bill("a", 100.0, date(2026, 1, 10), BillType::Electricity, "Enel", None),
            bill("b", 70.0, date(2026, 1, 12), BillType::Gas, "Enel", None),
            bill("c", 40.0, date(2026, 1, 15), BillType::Gas, "ENEL", None),
        ];
        let result = run(&expenses, date(2026, 2, 1), 12);
        assert_eq!(result.providers.len(), 2);
        let gas = result
            .providers
            .iter()
            .find(|p| p.bill_type == BillType::Gas)
            .unwrap();
        assert_eq!(gas.average_amount, 55.0);
        assert_eq!(gas.bill_count, 2);
    }

    #[test]
    fn test_horizon_end_is_inclusive() {
        let expenses = vec![bill(
            "q",
            300.0,
            date(2026, 1, 31),
            BillType::Waste,
            "Tari",
            Some((date(2025, 10, 1), date(2025, 12, 31))),
        )];
        // Quarterly; horizon Jan..Apr 2026 ends on Apr 30
        let result = run(&expenses, date(2026, 1, 31), 4);
        let provider = &result.providers[0];
        assert_eq!(provider.frequency_months, 3);
        assert_eq!(provider.projected_due_dates, vec![date(2026, 4, 30)]);
    }
}
