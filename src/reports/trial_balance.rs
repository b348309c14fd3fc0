// Trial balance: every account with a balance, split into debit and credit
// columns. Asset/expense accounts are debit-normal; liability, equity, and
// income are credit-normal (stored negative). An account on the wrong side
// of zero lands in the opposite column as a contra balance.

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::book::{AccountClass, LedgerBook};
use crate::config::LedgerConfig;
use crate::entity_map::EntityCatalog;
use crate::validate::validate_for_reporting;

use super::entity_label;

// ============================================================================
// REPORT MODEL
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialBalanceLine {
    pub account_guid: String,
    pub account_name: String,
    pub classification: AccountClass,

    /// Exactly one of debit/credit is non-zero
    pub debit: f64,
    pub credit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialBalance {
    pub as_of_date: NaiveDate,
    pub entity_label: String,
    pub lines: Vec<TrialBalanceLine>,
}

impl TrialBalance {
    pub fn total_debits(&self) -> f64 {
        self.lines.iter().map(|l| l.debit).sum()
    }

    pub fn total_credits(&self) -> f64 {
        self.lines.iter().map(|l| l.credit).sum()
    }

    pub fn imbalance(&self) -> f64 {
        self.total_debits() - self.total_credits()
    }

    pub fn is_balanced(&self, tolerance: f64) -> bool {
        self.imbalance().abs() <= tolerance
    }

    // ========================================================================
    // RENDERING
    // ========================================================================

    pub fn to_text(&self) -> String {
        let mut lines = Vec::new();
        lines.push("=".repeat(86));
        lines.push(format!("TRIAL BALANCE - {}", self.entity_label));
        lines.push(format!("As of {}", self.as_of_date));
        lines.push("=".repeat(86));
        lines.push(format!(
            "{:<50} {:>16} {:>16}",
            "Account", "Debit", "Credit"
        ));
        lines.push("-".repeat(86));

        for line in &self.lines {
            lines.push(format!(
                "{:<50} {:>16} {:>16}",
                line.account_name,
                if line.debit != 0.0 { format!("{:.2}", line.debit) } else { String::new() },
                if line.credit != 0.0 { format!("{:.2}", line.credit) } else { String::new() },
            ));
        }

        lines.push("-".repeat(86));
        lines.push(format!(
            "{:<50} {:>16.2} {:>16.2}",
            "TOTALS",
            self.total_debits(),
            self.total_credits()
        ));
        lines.join("\n")
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["account", "type", "debit", "credit"])?;
        for line in &self.lines {
            let debit = format!("{:.2}", line.debit);
            let credit = format!("{:.2}", line.credit);
            writer.write_record([
                line.account_name.as_str(),
                line.classification.as_str(),
                debit.as_str(),
                credit.as_str(),
            ])?;
        }
        let bytes = writer.into_inner()?;
        Ok(String::from_utf8(bytes)?)
    }
}

// ============================================================================
// GENERATION
// ============================================================================

/// Place a raw balance into the debit or credit column for its class
fn assign_debit_credit(balance: f64, classification: AccountClass) -> (f64, f64) {
    let debit_normal =
        classification == AccountClass::Asset || classification == AccountClass::Expense;

    if debit_normal {
        if balance >= 0.0 {
            (balance, 0.0)
        } else {
            (0.0, -balance)
        }
    } else if balance <= 0.0 {
        (0.0, -balance)
    } else {
        (balance, 0.0)
    }
}

/// Generate a trial balance as of a date. Strict validation runs first.
pub fn generate_trial_balance(
    book: &LedgerBook,
    catalog: &EntityCatalog,
    config: &LedgerConfig,
    entity_key: Option<&str>,
    as_of_date: NaiveDate,
) -> Result<TrialBalance> {
    validate_for_reporting(book, catalog, config)?;

    let balances = book.account_balances(Some(as_of_date))?;

    let mut trial = TrialBalance {
        as_of_date,
        entity_label: entity_label(catalog, entity_key),
        lines: Vec::new(),
    };

    for account in book.accounts()? {
        if let Some(entity) = entity_key {
            if catalog.resolve(&account.guid, &account.full_name) != entity {
                continue;
            }
        }

        let balance = balances.get(&account.guid).copied().unwrap_or(0.0);
        if config.is_zero(balance) {
            continue;
        }

        let classification = account.classify();
        let (debit, credit) = assign_debit_credit(balance, classification);

        trial.lines.push(TrialBalanceLine {
            account_guid: account.guid.clone(),
            account_name: account.full_name.clone(),
            classification,
            debit,
            credit,
        });
    }

    trial.lines.sort_by(|a, b| a.account_name.cmp(&b.account_name));

    Ok(trial)
}

// ============================================================================
// TESTS
// ============================================================================
