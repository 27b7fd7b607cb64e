//! Loan, subscription and transfer grouping
//!
//! Collapses individual installments, subscription charges and family
//! transfers into one summary per lender / service / recipient.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::{ClassifiedExpense, ExpenseClassifier};
use crate::matching::normalize_name;
use crate::models::UnifiedExpenseType;
use crate::months::MonthKey;

/// One lender, service or recipient with its monthly-equivalent cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    /// Case-insensitive grouping key
    pub key: String,
    pub name: String,
    pub count: usize,
    pub total_amount: f64,
    pub monthly_amount: f64,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    /// Inclusive months between first and last occurrence
    pub active_months: u32,
    /// Explicit installment count carried by the records
    pub installments: Option<u32>,
    pub remaining_installments: Option<u32>,
    /// Last month an installment is due, when the count is known
    pub projected_end: Option<MonthKey>,
    pub is_active: bool,
}

pub type LoanSummary = GroupSummary;
pub type SubscriptionSummary = GroupSummary;
pub type TransferSummary = GroupSummary;

impl GroupSummary {
    /// Whether the obligation still applies in `month`
    pub fn applies_in(&self, month: MonthKey) -> bool {
        self.is_active && self.projected_end.map_or(true, |end| month <= end)
    }
}

/// Transfers of one calendar month, by recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTransfer {
    pub month: MonthKey,
    pub by_recipient: BTreeMap<String, f64>,
    pub total: f64,
}

/// Grouping rules shared by every kind of summary
#[derive(Debug, Clone, Copy)]
pub(crate) struct GroupingRules {
    pub reference_month: MonthKey,
    pub active_grace_months: u32,
}

/// Group loan installments by lender
pub(crate) fn group_loans(
    classified: &[ClassifiedExpense<'_>],
    classifier: &ExpenseClassifier,
    rules: GroupingRules,
) -> Vec<LoanSummary> {
    group_by(
        classified
            .iter()
            .filter(|c| c.expense_type() == UnifiedExpenseType::FixedLoan),
        |c| {
            c.expense
                .provider_name()
                .map(str::to_string)
                .or_else(|| classifier.loan_provider(c.expense))
                .unwrap_or_else(|| normalize_name(&c.expense.description))
        },
        rules,
    )
}

/// Group subscription charges by service
pub(crate) fn group_subscriptions(
    classified: &[ClassifiedExpense<'_>],
    rules: GroupingRules,
) -> Vec<SubscriptionSummary> {
    group_by(
        classified
            .iter()
            .filter(|c| c.expense_type() == UnifiedExpenseType::FixedSub),
        |c| {
            c.expense
                .provider_name()
                .map(str::to_string)
                .unwrap_or_else(|| normalize_name(&c.expense.description))
        },
        rules,
    )
}

/// Group family transfers by recipient
pub(crate) fn group_transfers(
    classified: &[ClassifiedExpense<'_>],
    rules: GroupingRules,
) -> Vec<TransferSummary> {
    group_by(
        classified.iter().filter(|c| c.classification.is_family_transfer),
        |c| c.classification.recipient.clone().unwrap_or_default(),
        rules,
    )
}

/// Roll family transfers up per month, oldest first
pub(crate) fn monthly_transfers(classified: &[ClassifiedExpense<'_>]) -> Vec<MonthlyTransfer> {
    let mut by_month: BTreeMap<MonthKey, BTreeMap<String, f64>> = BTreeMap::new();
    for c in classified.iter().filter(|c| c.classification.is_family_transfer) {
        let recipient = c.classification.recipient.clone().unwrap_or_default();
        *by_month
            .entry(c.effective_month())
            .or_default()
            .entry(recipient)
            .or_insert(0.0) += c.expense.amount;
    }

    by_month
        .into_iter()
        .map(|(month, by_recipient)| MonthlyTransfer {
            month,
            total: by_recipient.values().sum(),
            by_recipient,
        })
        .collect()
}

fn group_by<'a, 'e: 'a, I, K>(items: I, key_of: K, rules: GroupingRules) -> Vec<GroupSummary>
where
    I: Iterator<Item = &'a ClassifiedExpense<'e>>,
    K: Fn(&ClassifiedExpense<'e>) -> String,
{
    let mut groups: BTreeMap<String, (String, Vec<&'a ClassifiedExpense<'e>>)> = BTreeMap::new();
    for item in items {
        let name = key_of(item);
        groups
            .entry(name.to_lowercase())
            .or_insert_with(|| (name, Vec::new()))
            .1
            .push(item);
    }

    groups
        .into_iter()
        .filter_map(|(key, (name, members))| summarize(key, name, &members, rules))
        .collect()
}

fn summarize(
    key: String,
    name: String,
    members: &[&ClassifiedExpense<'_>],
    rules: GroupingRules,
) -> Option<GroupSummary> {
    let first_date = members.iter().map(|c| c.classification.effective_date).min()?;
    let last_date = members.iter().map(|c| c.classification.effective_date).max()?;
    let total_amount: f64 = members.iter().map(|c| c.expense.amount).sum();

    let first_month = MonthKey::of(first_date);
    let last_month = MonthKey::of(last_date);
    let active_months = first_month.span_inclusive(last_month);

    let installments = members
        .iter()
        .filter_map(|c| c.expense.installments)
        .filter(|n| *n > 0)
        .max();

    // A single financed purchase spreads over its installment count. Once
    // the payments themselves are recorded, the observed span applies.
    let single_purchase = members
        .iter()
        .all(|c| c.classification.effective_date == first_date);
    let divisor = match installments {
        Some(n) if single_purchase => n,
        _ => active_months.max(1),
    };
    let monthly_amount = total_amount / divisor as f64;

    let projected_end = installments.map(|n| first_month.add_months(n as i64 - 1));
    let remaining_installments = installments.map(|n| {
        let elapsed = first_month.months_until(rules.reference_month).max(0) as u32 + 1;
        n.saturating_sub(elapsed)
    });

    let is_active = match projected_end {
        Some(end) => rules.reference_month <= end,
        None => {
            last_month.months_until(rules.reference_month) <= rules.active_grace_months as i64
        }
    };

    debug!(
        "Group {}: {} records, total {:.2}, monthly {:.2} over {} months (active: {})",
        name,
        members.len(),
        total_amount,
        monthly_amount,
        divisor,
        is_active
    );

    Some(GroupSummary {
        key,
        name,
        count: members.len(),
        total_amount,
        monthly_amount,
        first_date,
        last_date,
        active_months,
        installments,
        remaining_installments,
        projected_end,
        is_active,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AggregatorConfig;
    use crate::models::Expense;
    use crate::test_utils::{date, expense, monthly_series};

    fn setup(today: NaiveDate) -> (ExpenseClassifier, GroupingRules) {
        let config = AggregatorConfig::embedded().unwrap();
        (
            ExpenseClassifier::new(&config).unwrap(),
            GroupingRules {
                reference_month: MonthKey::of(today),
                active_grace_months: config.fixed_active_grace_months,
            },
        )
    }

    fn classify<'a>(
        classifier: &ExpenseClassifier,
        expenses: &'a [Expense],
        today: NaiveDate,
    ) -> Vec<ClassifiedExpense<'a>> {
        let refs: Vec<&Expense> = expenses.iter().collect();
        classifier.classify_all(&refs, today)
    }

    #[test]
    fn test_loan_monthly_amount_over_span() {
        let today = date(2025, 12, 20);
        let (classifier, rules) = setup(today);
        let expenses =
            monthly_series("auto", 100.0, date(2025, 1, 10), 12, "Rata auto Findomestic");
        let classified = classify(&classifier, &expenses, today);

        let loans = group_loans(&classified, &classifier, rules);
        assert_eq!(loans.len(), 1);
        let loan = &loans[0];
        assert_eq!(loan.name, "Findomestic");
        assert_eq!(loan.count, 12);
        assert_eq!(loan.total_amount, 1200.0);
        assert_eq!(loan.active_months, 12);
        assert_eq!(loan.monthly_amount, 100.0);
        assert!(loan.is_active);
    }

    #[test]
    fn test_single_occurrence_group() {
        let today = date(2026, 3, 20);
        let (classifier, rules) = setup(today);
        let expenses = vec![expense("p1", 89.0, date(2026, 3, 2), "Prestito Agos")];
        let classified = classify(&classifier, &expenses, today);

        let loans = group_loans(&classified, &classifier, rules);
        assert_eq!(loans.len(), 1);
        assert_eq!(loans[0].monthly_amount, 89.0);
        assert_eq!(loans[0].active_months, 1);
    }

    #[test]
    fn test_installment_count_overrides_span() {
        let today = date(2026, 3, 20);
        let (classifier, rules) = setup(today);
        let mut purchase = expense("k1", 1200.0, date(2026, 1, 5), "Divano Klarna");
        purchase.installments = Some(12);
        let expenses = vec![purchase];
        let classified = classify(&classifier, &expenses, today);

        let loans = group_loans(&classified, &classifier, rules);
        let loan = &loans[0];
        assert_eq!(loan.monthly_amount, 100.0);
        assert_eq!(loan.remaining_installments, Some(9));
        assert_eq!(loan.projected_end, MonthKey::new(2026, 12));
        assert!(loan.applies_in(MonthKey::new(2026, 12).unwrap()));
        assert!(!loan.applies_in(MonthKey::new(2027, 1).unwrap()));
    }

    #[test]
    fn test_installment_rows_use_observed_span() {
        let today = date(2026, 3, 20);
        let (classifier, rules) = setup(today);
        let expenses: Vec<Expense> = (1..=3)
            .map(|n| {
                let mut row = expense(
                    &format!("r{}", n),
                    100.0,
                    date(2026, n, 5),
                    &format!("Rata Findomestic {}/12", n),
                );
                row.installments = Some(12);
                row
            })
            .collect();
        let classified = classify(&classifier, &expenses, today);

        let loans = group_loans(&classified, &classifier, rules);
        assert_eq!(loans.len(), 1);
        let loan = &loans[0];
        assert_eq!(loan.name, "Findomestic");
        assert_eq!(loan.total_amount, 300.0);
        assert_eq!(loan.monthly_amount, 100.0);
        assert_eq!(loan.remaining_installments, Some(9));
        assert_eq!(loan.projected_end, MonthKey::new(2026, 12));
        assert!(loan.is_active);
    }

    #[test]
    fn test_grouping_key_is_case_insensitive() {
        let today = date(2026, 3, 20);
        let (classifier, rules) = setup(today);
        let mut a = expense("a", 50.0, date(2026, 2, 1), "mutuo");
        a.provider = Some("Intesa".to_string());
        let mut b = expense("b", 50.0, date(2026, 3, 1), "mutuo");
        b.provider = Some("INTESA".to_string());
        let expenses = vec![a, b];
        let classified = classify(&classifier, &expenses, today);

        let loans = group_loans(&classified, &classifier, rules);
        assert_eq!(loans.len(), 1);
        assert_eq!(loans[0].key, "intesa");
        assert_eq!(loans[0].count, 2);
        assert_eq!(loans[0].monthly_amount, 50.0);
    }

    #[test]
    fn test_stale_subscription_inactive() {
        let today = date(2026, 6, 20);
        let (classifier, rules) = setup(today);
        let expenses = monthly_series("nf", 12.99, date(2025, 10, 3), 3, "Netflix");
        let classified = classify(&classifier, &expenses, today);

        let subs = group_subscriptions(&classified, rules);
        assert_eq!(subs.len(), 1);
        // Last charge December, reference June: beyond the 2-month grace
        assert!(!subs[0].is_active);
    }

    #[test]
    fn test_transfers_grouped_and_rolled_up() {
        let today = date(2026, 3, 20);
        let (classifier, rules) = setup(today);
        let expenses = vec![
            expense("t1", 200.0, date(2026, 2, 1), "Bonifico mamma"),
            expense("t2", 150.0, date(2026, 3, 1), "bonifico MAMMA"),
            expense("t3", 80.0, date(2026, 3, 9), "ricarica moglie"),
            expense("v1", 30.0, date(2026, 3, 9), "Esselunga"),
        ];
        let classified = classify(&classifier, &expenses, today);

        let transfers = group_transfers(&classified, rules);
        assert_eq!(transfers.len(), 2);
        let mamma = transfers.iter().find(|t| t.name == "Mamma").unwrap();
        assert_eq!(mamma.total_amount, 350.0);
        assert_eq!(mamma.monthly_amount, 175.0);

        let monthly = monthly_transfers(&classified);
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[1].month, MonthKey::new(2026, 3).unwrap());
        assert_eq!(monthly[1].total, 230.0);
        assert_eq!(monthly[1].by_recipient["Moglie"], 80.0);
    }
}
