//! Domain models for Conti

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An expense row as stored by the persistence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    /// Currency units, positive = money spent
    pub amount: f64,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: ExpenseCategory,
    /// Utility bill metadata (provider, billing period, consumption)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bill: Option<BillDetails>,
    /// Explicit provider, lender or recipient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    /// Date a credit-card charge posted to the statement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booked_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_family_transfer: Option<bool>,
    /// Absent means paid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_paid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_recurring: Option<bool>,
    /// Number of installments a financed purchase is split into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installments: Option<u32>,
}

impl Expense {
    pub fn is_paid(&self) -> bool {
        self.is_paid.unwrap_or(true)
    }

    pub fn is_recurring(&self) -> bool {
        self.is_recurring.unwrap_or(false)
    }

    /// Provider name, preferring the bill metadata over the generic field
    pub fn provider_name(&self) -> Option<&str> {
        self.bill
            .as_ref()
            .and_then(|b| b.provider.as_deref())
            .or(self.provider.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

/// Parse a JSON array of expenses as returned by the data layer
///
/// Every expense needs a non-empty id; it breaks ties in the canonical order.
pub fn parse_expenses(json: &str) -> Result<Vec<Expense>> {
    let expenses: Vec<Expense> = serde_json::from_str(json)?;
    if let Some(pos) = expenses.iter().position(|e| e.id.trim().is_empty()) {
        return Err(Error::InvalidData(format!(
            "Expense at index {} has an empty id",
            pos
        )));
    }
    Ok(expenses)
}

/// Utility bill metadata attached to an expense
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bill_type: Option<BillType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_end: Option<NaiveDate>,
    /// Metered consumption (kWh, Smc, m³...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumption: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

impl BillDetails {
    /// Whether the metadata carries anything that identifies a bill
    pub fn is_populated(&self) -> bool {
        self.provider.as_deref().is_some_and(|p| !p.trim().is_empty())
            || self.period_start.is_some()
            || self.period_end.is_some()
            || self.bill_type.is_some()
    }

    /// Length of the billing period in days, when both ends are known
    pub fn period_days(&self) -> Option<i64> {
        match (self.period_start, self.period_end) {
            (Some(start), Some(end)) => Some((end - start).num_days()),
            _ => None,
        }
    }
}

/// Expense category tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Groceries,
    Dining,
    Transport,
    Health,
    Shopping,
    Entertainment,
    Home,
    Education,
    Travel,
    Family,
    Loan,
    Subscription,
    Electricity,
    Gas,
    Water,
    Internet,
    Phone,
    Waste,
    Heating,
    #[default]
    #[serde(other)]
    Other,
}

impl ExpenseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groceries => "groceries",
            Self::Dining => "dining",
            Self::Transport => "transport",
            Self::Health => "health",
            Self::Shopping => "shopping",
            Self::Entertainment => "entertainment",
            Self::Home => "home",
            Self::Education => "education",
            Self::Travel => "travel",
            Self::Family => "family",
            Self::Loan => "loan",
            Self::Subscription => "subscription",
            Self::Electricity => "electricity",
            Self::Gas => "gas",
            Self::Water => "water",
            Self::Internet => "internet",
            Self::Phone => "phone",
            Self::Waste => "waste",
            Self::Heating => "heating",
            Self::Other => "other",
        }
    }

    /// The bill type a category tag stands for, if it is a utility category
    pub fn bill_type(&self) -> Option<BillType> {
        match self {
            Self::Electricity => Some(BillType::Electricity),
            Self::Gas => Some(BillType::Gas),
            Self::Water => Some(BillType::Water),
            Self::Internet => Some(BillType::Internet),
            Self::Phone => Some(BillType::Phone),
            Self::Waste => Some(BillType::Waste),
            Self::Heating => Some(BillType::Heating),
            _ => None,
        }
    }
}

impl std::str::FromStr for ExpenseCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "groceries" | "spesa" => Ok(Self::Groceries),
            "dining" | "ristoranti" => Ok(Self::Dining),
            "transport" | "trasporti" => Ok(Self::Transport),
            "health" | "salute" => Ok(Self::Health),
            "shopping" => Ok(Self::Shopping),
            "entertainment" | "svago" => Ok(Self::Entertainment),
            "home" | "casa" => Ok(Self::Home),
            "education" | "istruzione" => Ok(Self::Education),
            "travel" | "viaggi" => Ok(Self::Travel),
            "family" | "famiglia" => Ok(Self::Family),
            "loan" | "prestito" => Ok(Self::Loan),
            "subscription" | "abbonamento" => Ok(Self::Subscription),
            "electricity" | "luce" => Ok(Self::Electricity),
            "gas" => Ok(Self::Gas),
            "water" | "acqua" => Ok(Self::Water),
            "internet" => Ok(Self::Internet),
            "phone" | "telefono" => Ok(Self::Phone),
            "waste" | "rifiuti" => Ok(Self::Waste),
            "heating" | "riscaldamento" => Ok(Self::Heating),
            "other" | "altro" => Ok(Self::Other),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

impl std::fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metered utility services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillType {
    Electricity,
    Gas,
    Water,
    Internet,
    Phone,
    Waste,
    Heating,
    Other,
}

impl BillType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electricity => "electricity",
            Self::Gas => "gas",
            Self::Water => "water",
            Self::Internet => "internet",
            Self::Phone => "phone",
            Self::Waste => "waste",
            Self::Heating => "heating",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for BillType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an expense was paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    DebitCard,
    /// Posts to the card statement one month in arrears
    CreditCard,
    BankTransfer,
    DirectDebit,
    #[serde(other)]
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::DebitCard => "debit_card",
            Self::CreditCard => "credit_card",
            Self::BankTransfer => "bank_transfer",
            Self::DirectDebit => "direct_debit",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cash" | "contanti" => Ok(Self::Cash),
            "debit_card" | "bancomat" => Ok(Self::DebitCard),
            "credit_card" | "carta_di_credito" => Ok(Self::CreditCard),
            "bank_transfer" | "bonifico" => Ok(Self::BankTransfer),
            "direct_debit" | "rid" | "sdd" => Ok(Self::DirectDebit),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown payment method: {}", s)),
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The mutually exclusive bucket every expense lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnifiedExpenseType {
    Variable,
    FixedLoan,
    FixedSub,
    UtilityBill,
    CreditCard,
}

impl UnifiedExpenseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Variable => "variable",
            Self::FixedLoan => "fixed_loan",
            Self::FixedSub => "fixed_sub",
            Self::UtilityBill => "utility_bill",
            Self::CreditCard => "credit_card",
        }
    }

    pub fn all() -> &'static [UnifiedExpenseType] {
        &[
            Self::Variable,
            Self::FixedLoan,
            Self::FixedSub,
            Self::UtilityBill,
            Self::CreditCard,
        ]
    }
}

impl std::fmt::Display for UnifiedExpenseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-user settings that shape the aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSettings {
    /// When the profile was created; drives lookback auto-scaling
    pub created_at: NaiveDate,
    /// Explicit variable-expense lookback in months
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_months_lookback: Option<u32>,
    /// Net monthly household income, used for forecast balances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_income: Option<f64>,
}

impl ProfileSettings {
    pub fn new(created_at: NaiveDate) -> Self {
        Self {
            created_at,
            variable_months_lookback: None,
            monthly_income: None,
        }
    }
}
