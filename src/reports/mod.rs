// 📊 Report Generators - Balance sheet, income statement, trial balance
// All three consume the validation engine's strict gate (no report without
// 100% entity coverage and a defect-free book) and the entity catalog (per-
// entity filtering). Sign conventions: the book stores liability, equity,
// and income balances as credits (negative); reports flip them for display
// while asset and expense balances show as-is.

pub mod balance_sheet;
pub mod income_statement;
pub mod trial_balance;

pub use balance_sheet::{generate_balance_sheet, BalanceSheet, BalanceSheetLine};
pub use income_statement::{generate_income_statement, IncomeStatement, IncomeStatementLine};
pub use trial_balance::{generate_trial_balance, TrialBalance, TrialBalanceLine};

use crate::entity_map::EntityCatalog;

/// Display label for an optional entity scope
pub(crate) fn entity_label(catalog: &EntityCatalog, entity_key: Option<&str>) -> String {
    match entity_key {
        Some(key) => catalog
            .entity(key)
            .map(|e| e.label.clone())
            .unwrap_or_else(|| key.to_string()),
        None => "Consolidated".to_string(),
    }
}
