//! Assistant Context
//!
//! Flattens a unified result into template variables for the budgeting
//! assistant's prompts:
//! - Monthly totals and their estimate flags
//! - Active loans and subscriptions
//! - Family transfers by recipient
//! - Upcoming bills within the forecast horizon

use std::collections::HashMap;

use crate::aggregate::UnifiedExpensesResult;
use crate::bills::BillStatus;
use crate::grouping::GroupSummary;

/// Upper bound on listed groups and bills, keeps prompts short
const MAX_LISTED: usize = 10;

/// Template variables for prompt rendering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantContext {
    vars: HashMap<&'static str, String>,
}

impl AssistantContext {
    pub fn from_result(result: &UnifiedExpensesResult) -> Self {
        let mut vars = HashMap::new();

        vars.insert("reference_month", result.reference_month().to_string());
        vars.insert("grand_total_monthly", money(result.grand_total_monthly()));
        vars.insert(
            "grand_total_with_credit_card",
            money(result.grand_total_with_credit_card()),
        );
        vars.insert("total_monthly_fixed", money(result.total_monthly_fixed()));
        vars.insert("total_loans_monthly", money(result.total_loans_monthly()));
        vars.insert(
            "total_subscriptions_monthly",
            money(result.total_subscriptions_monthly()),
        );
        vars.insert("variable_average", money(result.variable_average()));
        vars.insert(
            "variable_lookback_months",
            result.variable().lookback_months.to_string(),
        );
        vars.insert("monthly_bills_estimate", money(result.monthly_bills_estimate()));
        vars.insert("credit_card_booked", money(result.credit_card().booked));
        vars.insert("credit_card_pending", money(result.credit_card().pending));
        vars.insert("is_estimated_bills", result.is_estimated_bills().to_string());
        vars.insert(
            "is_estimated_variable",
            result.is_estimated_variable().to_string(),
        );

        if let Some(income) = result.monthly_income() {
            vars.insert("monthly_income", money(income));
            vars.insert("monthly_balance", money(income - result.grand_total_monthly()));
        }

        if let Some(loans) = list_active(result.loans()) {
            vars.insert("loans", loans);
        }
        if let Some(subscriptions) = list_active(result.subscriptions()) {
            vars.insert("subscriptions", subscriptions);
        }

        if !result.transfers().is_empty() {
            let transfers = result
                .transfers()
                .iter()
                .take(MAX_LISTED)
                .map(|t| {
                    format!(
                        "{}: {} total, {}/month",
                        t.name,
                        money(t.total_amount),
                        money(t.monthly_amount)
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            vars.insert("transfers", transfers);
        }

        let upcoming: Vec<String> = result
            .bill_months()
            .iter()
            .flat_map(|m| m.items.iter())
            .filter(|item| item.status != BillStatus::Actual)
            .take(MAX_LISTED)
            .map(|item| {
                let marker = match item.status {
                    BillStatus::Forecast => " (estimated)",
                    _ => "",
                };
                format!(
                    "{} {} {}: {}{}",
                    item.date,
                    item.bill_type,
                    item.provider,
                    money(item.amount),
                    marker
                )
            })
            .collect();
        if !upcoming.is_empty() {
            vars.insert("upcoming_bills", upcoming.join("\n"));
        }

        Self { vars }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Variables ready for prompt rendering
    pub fn to_template_vars(&self) -> HashMap<&'static str, String> {
        self.vars.clone()
    }
}

fn money(amount: f64) -> String {
    format!("{:.2}", amount)
}

fn list_active(groups: &[GroupSummary]) -> Option<String> {
    let lines: Vec<String> = groups
        .iter()
        .filter(|g| g.is_active)
        .take(MAX_LISTED)
        .map(|g| match g.remaining_installments {
            Some(remaining) => format!(
                "{}: {}/month, {} installments left",
                g.name,
                money(g.monthly_amount),
                remaining
            ),
            None => format!("{}: {}/month", g.name, money(g.monthly_amount)),
        })
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}
