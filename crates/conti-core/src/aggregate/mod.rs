//! Unified result assembly
//!
//! Runs classification, grouping, bill forecasting and averaging over one
//! canonical snapshot of the input and combines them into a single
//! [`UnifiedExpensesResult`].

mod forecast;
mod snapshot;
mod unified;

pub use forecast::{BudgetForecastMonth, ScheduledItem};
pub use snapshot::{MonthlyActuals, MonthlySnapshot};
pub use unified::{TypeTotal, UnifiedExpenses, UnifiedExpensesResult};
