//! Conti Core Library
//!
//! Monthly financial aggregation for the Conti family budget:
//! - Expense classification into five mutually exclusive buckets
//! - Loan, subscription and family-transfer grouping
//! - Utility bill frequency inference and forecasting
//! - Month-denominated variable-expense averaging
//! - Credit-card booked/pending tracking
//! - Unified, memoized monthly totals with budget forecast and snapshots
//! - Template variables for the budgeting assistant

pub mod aggregate;
pub mod bills;
pub mod classify;
pub mod config;
pub mod context;
pub mod credit_card;
pub mod error;
pub mod grouping;
pub mod matching;
pub mod models;
pub mod months;
pub mod variable;

/// Expense fixtures for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use aggregate::{
    BudgetForecastMonth, MonthlySnapshot, ScheduledItem, TypeTotal, UnifiedExpenses,
    UnifiedExpensesResult,
};
pub use bills::{BillForecast, BillStatus, MonthlyBillForecast, ProviderForecast};
pub use classify::{Classification, ExpenseClassifier};
pub use config::{AggregatorConfig, MatchStrategy, NamedAliases};
pub use context::AssistantContext;
pub use credit_card::CreditCardSummary;
pub use error::{Error, Result};
pub use grouping::{
    GroupSummary, LoanSummary, MonthlyTransfer, SubscriptionSummary, TransferSummary,
};
pub use matching::NameMatcher;
pub use models::{Expense, ProfileSettings, UnifiedExpenseType};
pub use months::MonthKey;
pub use variable::VariableAverage;
