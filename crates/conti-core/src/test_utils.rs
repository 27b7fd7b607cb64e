//! Test utilities for conti-core
//!
//! Expense builders shared by the unit tests and, through the `test-utils`
//! feature, by downstream integration tests.

use chrono::NaiveDate;

use crate::models::{BillDetails, BillType, Expense, ExpenseCategory, PaymentMethod};

/// Shorthand for a calendar date; panics on an invalid date
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap_or_else(|| panic!("invalid test date {}-{}-{}", year, month, day))
}

/// A plain expense with every optional field unset
pub fn expense(id: &str, amount: f64, date: NaiveDate, description: &str) -> Expense {
    Expense {
        id: id.to_string(),
        amount,
        date,
        description: description.to_string(),
        category: ExpenseCategory::Other,
        bill: None,
        provider: None,
        payment_method: None,
        booked_date: None,
        is_family_transfer: None,
        is_paid: None,
        is_recurring: None,
        installments: None,
    }
}

/// An expense paid by credit card
pub fn card_expense(id: &str, amount: f64, date: NaiveDate, description: &str) -> Expense {
    Expense {
        payment_method: Some(PaymentMethod::CreditCard),
        ..expense(id, amount, date, description)
    }
}

/// A paid utility bill with an optional billing period
pub fn bill(
    id: &str,
    amount: f64,
    date: NaiveDate,
    bill_type: BillType,
    provider: &str,
    period: Option<(NaiveDate, NaiveDate)>,
) -> Expense {
    Expense {
        bill: Some(BillDetails {
            bill_type: Some(bill_type),
            provider: Some(provider.to_string()),
            period_start: period.map(|(start, _)| start),
            period_end: period.map(|(_, end)| end),
            consumption: None,
            due_date: None,
        }),
        ..expense(id, amount, date, provider)
    }
}

/// Monthly installments of `amount` starting at `first`, one per month
pub fn monthly_series(
    prefix: &str,
    amount: f64,
    first: NaiveDate,
    count: u32,
    description: &str,
) -> Vec<Expense> {
    (0..count)
        .map(|i| {
            expense(
                &format!("{}-{}", prefix, i),
                amount,
                crate::months::add_months_clamped(first, i),
                description,
            )
        })
        .collect()
}
