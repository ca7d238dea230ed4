// 📊 Financial Summary - dashboard totals and expense breakdown

use crate::db::{Transaction, TransactionType};
use serde::Serialize;
use std::collections::HashMap;

pub const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub total_balance: f64,
    pub total_income: f64,
    pub total_expenses: f64,
    /// Largest spend first
    pub expenses_by_category: Vec<CategoryTotal>,
    pub recent_transactions: Vec<Transaction>,
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl FinancialSummary {
    /// Build the dashboard overview from transactions listed newest first
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut total_income = 0.0;
        let mut total_expenses = 0.0;
        let mut by_category: HashMap<&str, (f64, usize)> = HashMap::new();

        for tx in transactions {
            match tx.transaction_type {
                TransactionType::Income => total_income += tx.amount.abs(),
                TransactionType::Expense => {
                    total_expenses += tx.amount.abs();
                    let entry = by_category.entry(tx.category.as_str()).or_insert((0.0, 0));
                    entry.0 += tx.amount.abs();
                    entry.1 += 1;
                }
            }
        }

        let mut expenses_by_category: Vec<CategoryTotal> = by_category
            .into_iter()
            .map(|(category, (total, count))| CategoryTotal {
                category: category.to_string(),
                total: round_cents(total),
                count,
            })
            .collect();
        // Ties broken by name so the output is stable
        expenses_by_category.sort_by(|a, b| {
            b.total
                .total_cmp(&a.total)
                .then_with(|| a.category.cmp(&b.category))
        });

        FinancialSummary {
            total_balance: round_cents(total_income - total_expenses),
            total_income: round_cents(total_income),
            total_expenses: round_cents(total_expenses),
            expenses_by_category,
            recent_transactions: transactions.iter().take(RECENT_LIMIT).cloned().collect(),
        }
    }
}
