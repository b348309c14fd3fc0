// Income statement: revenue and expense activity over a period.
// Period balances only - point-in-time balances never enter this report.
// Income is stored as credits (negative); display flips it.

use anyhow::{bail, Result};
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
pub struct IncomeStatementLine {
    pub account_guid: String,
    pub account_name: String,

    /// Display amount - income already sign-flipped to positive
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomeStatement {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub entity_label: String,
    pub income: Vec<IncomeStatementLine>,
    pub expenses: Vec<IncomeStatementLine>,
}

impl IncomeStatement {
    pub fn total_income(&self) -> f64 {
        self.income.iter().map(|l| l.amount).sum()
    }

    pub fn total_expenses(&self) -> f64 {
        self.expenses.iter().map(|l| l.amount).sum()
    }

    pub fn net_income(&self) -> f64 {
        self.total_income() - self.total_expenses()
    }

    pub fn net_income_label(&self) -> &'static str {
        if self.net_income() >= 0.0 {
            "NET INCOME"
        } else {
            "NET LOSS"
        }
    }

    // ========================================================================
    // RENDERING
    // ========================================================================

    pub fn to_text(&self) -> String {
        let mut lines = Vec::new();
        lines.push("=".repeat(70));
        lines.push(format!("INCOME STATEMENT - {}", self.entity_label));
        lines.push(format!("Period {} to {}", self.from_date, self.to_date));
        lines.push("=".repeat(70));

        for (title, section, total) in [
            ("INCOME", &self.income, self.total_income()),
            ("EXPENSES", &self.expenses, self.total_expenses()),
        ] {
            lines.push(String::new());
            lines.push(title.to_string());
            lines.push("-".repeat(70));
            for line in section {
                lines.push(format!("{:<52} {:>15.2}", line.account_name, line.amount));
            }
            lines.push(format!("{:<52} {:>15.2}", format!("TOTAL {}", title), total));
        }

        lines.push(String::new());
        lines.push("=".repeat(70));
        lines.push(format!(
            "{:<52} {:>15.2}",
            self.net_income_label(),
            self.net_income()
        ));
        lines.join("\n")
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["section", "account", "amount"])?;
        for (section, section_lines) in [("INCOME", &self.income), ("EXPENSES", &self.expenses)] {
            for line in section_lines {
                let amount = format!("{:.2}", line.amount);
                writer.write_record([section, line.account_name.as_str(), amount.as_str()])?;
            }
        }
        let net = format!("{:.2}", self.net_income());
        writer.write_record([self.net_income_label(), "", net.as_str()])?;
        let bytes = writer.into_inner()?;
        Ok(String::from_utf8(bytes)?)
    }
}

// ============================================================================
// GENERATION
// ============================================================================

/// Generate an income statement over from_date..=to_date, for one entity or
/// consolidated. Strict validation runs first.
pub fn generate_income_statement(
    book: &LedgerBook,
    catalog: &EntityCatalog,
    config: &LedgerConfig,
    entity_key: Option<&str>,
    from_date: NaiveDate,
    to_date: NaiveDate,
) -> Result<IncomeStatement> {
    if from_date > to_date {
        bail!(
            "from_date ({}) must be on or before to_date ({})",
            from_date,
            to_date
        );
    }

    validate_for_reporting(book, catalog, config)?;

    let period_balances = book.period_balances(from_date, to_date)?;

    let mut statement = IncomeStatement {
        from_date,
        to_date,
        entity_label: entity_label(catalog, entity_key),
        income: Vec::new(),
        expenses: Vec::new(),
    };

    for account in book.accounts()? {
        if let Some(entity) = entity_key {
            if catalog.resolve(&account.guid, &account.full_name) != entity {
                continue;
            }
        }

        let classification = account.classify();
        if classification != AccountClass::Income && classification != AccountClass::Expense {
            continue;
        }

        let balance = period_balances.get(&account.guid).copied().unwrap_or(0.0);
        if config.is_zero(balance) {
            continue;
        }

        match classification {
            AccountClass::Income => statement.income.push(IncomeStatementLine {
                account_guid: account.guid.clone(),
                account_name: account.full_name.clone(),
                amount: -balance, // credits flip to positive revenue
            }),
            AccountClass::Expense => statement.expenses.push(IncomeStatementLine {
                account_guid: account.guid.clone(),
                account_name: account.full_name.clone(),
                amount: balance,
            }),
            _ => unreachable!(),
        }
    }

    statement.income.sort_by(|a, b| a.account_name.cmp(&b.account_name));
    statement.expenses.sort_by(|a, b| a.account_name.cmp(&b.account_name));

    Ok(statement)
}

// ============================================================================
// TESTS
// ============================================================================
