//! Expense classification
//!
//! Assigns every expense exactly one [`UnifiedExpenseType`] through a priority
//! chain (first match wins):
//!
//! 1. Bill metadata or a utility category tag -> `utility_bill`
//! 2. Loan category or loan pattern -> `fixed_loan`
//! 3. Subscription category or subscription pattern -> `fixed_sub`
//! 4. Paid by credit card -> `credit_card`
//! 5. Anything else -> `variable`
//!
//! Family transfers are flagged on top of the `variable` bucket, never as a
//! type of their own.

use chrono::NaiveDate;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::debug;

use crate::bills::infer_frequency_months;
use crate::config::AggregatorConfig;
use crate::error::Result;
use crate::matching::{matcher_for, normalize_name, NameMatcher};
use crate::models::{Expense, ExpenseCategory, PaymentMethod, UnifiedExpenseType};
use crate::months::{add_months_clamped, MonthKey};

/// Outcome of classifying one expense
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub expense_type: UnifiedExpenseType,
    pub is_utility_bill: bool,
    pub is_loan_payment: bool,
    pub is_subscription: bool,
    pub is_family_transfer: bool,
    /// Card charge already posted as of the reference month
    pub is_credit_card_booked: bool,
    /// Canonical recipient of a family transfer
    pub recipient: Option<String>,
    /// Billing cycle inferred from the bill's own period
    pub bill_frequency_months: Option<u32>,
    /// Date used for monthly bucketing (shifted for card charges)
    pub effective_date: NaiveDate,
}

impl Classification {
    pub fn effective_month(&self) -> MonthKey {
        MonthKey::of(self.effective_date)
    }
}

/// An expense together with its classification, valid for one aggregation pass
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedExpense<'a> {
    pub expense: &'a Expense,
    pub classification: Classification,
}

impl ClassifiedExpense<'_> {
    pub fn expense_type(&self) -> UnifiedExpenseType {
        self.classification.expense_type
    }

    pub fn effective_month(&self) -> MonthKey {
        self.classification.effective_month()
    }
}

/// Compiled classification rules
pub struct ExpenseClassifier {
    loan_pattern: Option<Regex>,
    subscription_pattern: Option<Regex>,
    recipients: Box<dyn NameMatcher>,
    loan_providers: Box<dyn NameMatcher>,
    default_bill_frequency: u32,
}

impl ExpenseClassifier {
    /// Compile the configured keyword lists
    pub fn new(config: &AggregatorConfig) -> Result<Self> {
        let loan_words: Vec<String> = config
            .loan_keywords
            .iter()
            .cloned()
            .chain(config.loan_providers.iter().flat_map(|p| p.spellings()))
            .collect();

        Ok(Self {
            loan_pattern: keyword_pattern(&loan_words)?,
            subscription_pattern: keyword_pattern(&config.subscription_keywords)?,
            recipients: matcher_for(config, &config.recipients),
            loan_providers: matcher_for(config, &config.loan_providers),
            default_bill_frequency: config.default_bill_frequency_months,
        })
    }

    /// Classify one expense. Total: always yields exactly one type.
    ///
    /// `today` only decides whether a card charge counts as booked.
    pub fn classify(&self, expense: &Expense, today: NaiveDate) -> Classification {
        let text = searchable_text(expense);

        let is_utility_bill = expense.bill.as_ref().is_some_and(|b| b.is_populated())
            || expense.category.bill_type().is_some();
        let is_loan_payment = expense.category == ExpenseCategory::Loan
            || self.loan_pattern.as_ref().is_some_and(|re| re.is_match(&text));
        let is_subscription = expense.category == ExpenseCategory::Subscription
            || self
                .subscription_pattern
                .as_ref()
                .is_some_and(|re| re.is_match(&text));
        let is_card = expense.payment_method == Some(PaymentMethod::CreditCard);

        let expense_type = if is_utility_bill {
            UnifiedExpenseType::UtilityBill
        } else if is_loan_payment {
            UnifiedExpenseType::FixedLoan
        } else if is_subscription {
            UnifiedExpenseType::FixedSub
        } else if is_card {
            UnifiedExpenseType::CreditCard
        } else {
            UnifiedExpenseType::Variable
        };

        let effective_date = if expense_type == UnifiedExpenseType::CreditCard {
            credit_card_effective_date(expense)
        } else {
            expense.date
        };

        let recipient = if expense_type == UnifiedExpenseType::Variable {
            self.family_recipient(expense)
        } else {
            None
        };

        let bill_frequency_months = if is_utility_bill {
            Some(infer_frequency_months(
                expense.bill.as_ref(),
                self.default_bill_frequency,
            ))
        } else {
            None
        };

        let classification = Classification {
            expense_type,
            is_utility_bill,
            is_loan_payment,
            is_subscription,
            is_family_transfer: recipient.is_some(),
            is_credit_card_booked: expense_type == UnifiedExpenseType::CreditCard
                && MonthKey::of(effective_date) <= MonthKey::of(today),
            recipient,
            bill_frequency_months,
            effective_date,
        };

        debug!(
            "Classified {} ({:.2}) as {}",
            expense.id, expense.amount, classification.expense_type
        );

        classification
    }

    pub fn classify_all<'a>(
        &self,
        expenses: &[&'a Expense],
        today: NaiveDate,
    ) -> Vec<ClassifiedExpense<'a>> {
        expenses
            .iter()
            .map(|expense| ClassifiedExpense {
                expense,
                classification: self.classify(expense, today),
            })
            .collect()
    }

    /// Canonical lender for a loan payment, if the text names a known one
    pub fn loan_provider(&self, expense: &Expense) -> Option<String> {
        self.loan_providers
            .find(&searchable_text(expense))
            .map(str::to_string)
    }

    /// Recipient of a family transfer. An explicit `false` flag overrides
    /// any keyword hit.
    fn family_recipient(&self, expense: &Expense) -> Option<String> {
        if expense.is_family_transfer == Some(false) {
            return None;
        }

        let matched = expense
            .provider
            .as_deref()
            .and_then(|p| self.recipients.find(p))
            .or_else(|| self.recipients.find(&expense.description))
            .map(str::to_string);

        let flagged = expense.is_family_transfer == Some(true)
            || expense.category == ExpenseCategory::Family;

        match matched {
            Some(name) => Some(name),
            None if flagged => Some(
                expense
                    .provider_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| normalize_name(&expense.description)),
            ),
            None => None,
        }
    }
}

/// Statements post one month in arrears unless the posting date is known
pub fn credit_card_effective_date(expense: &Expense) -> NaiveDate {
    expense
        .booked_date
        .unwrap_or_else(|| add_months_clamped(expense.date, 1))
}

fn searchable_text(expense: &Expense) -> String {
    match expense.provider.as_deref() {
        Some(provider) => format!("{} {}", expense.description, provider),
        None => expense.description.clone(),
    }
}

/// Case-insensitive alternation of escaped keywords; None when the list is empty
fn keyword_pattern(keywords: &[String]) -> Result<Option<Regex>> {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(regex::escape)
        .collect();

    if alternatives.is_empty() {
        return Ok(None);
    }

    let pattern = RegexBuilder::new(&alternatives.join("|"))
        .case_insensitive(true)
        .build()?;
    Ok(Some(pattern))
}
