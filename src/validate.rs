// 🔍 Validation Engine - Book integrity with two-tier severity
// One pass over all accounts and all transactions, producing a severity-
// tagged problem list:
//   - transaction imbalance        -> always an error
//   - data-integrity read defects  -> one aggregate error, never fatal
//   - entity-mapping coverage gaps -> warning, error in strict mode
//   - suspense accounts w/ balance -> warning in any mode
//
// Strict mode exists because report generation requires 100% entity coverage
// to guarantee that per-entity reports sum to the total book balances.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::book::{Account, LedgerBook};
use crate::config::LedgerConfig;
use crate::entity_map::EntityCatalog;

// ============================================================================
// PROBLEMS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
        }
    }
}

/// A single validation issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationProblem {
    pub severity: Severity,
    pub message: String,

    /// Additional context (e.g. transaction GUID and date)
    pub context: Option<String>,
}

impl std::fmt::Display for ValidationProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.context {
            Some(context) => write!(f, "[{}] {} (Context: {})", self.severity.as_str(), self.message, context),
            None => write!(f, "[{}] {}", self.severity.as_str(), self.message),
        }
    }
}

// ============================================================================
// VALIDATION RESULT
// ============================================================================

/// Ordered list of problems found in one validation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub problems: Vec<ValidationProblem>,
}

impl ValidationResult {
    pub fn new() -> Self {
        ValidationResult { problems: Vec::new() }
    }

    pub fn add_error(&mut self, message: String, context: Option<String>) {
        self.problems.push(ValidationProblem {
            severity: Severity::Error,
            message,
            context,
        });
    }

    pub fn add_warning(&mut self, message: String, context: Option<String>) {
        self.problems.push(ValidationProblem {
            severity: Severity::Warning,
            message,
            context,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.problems.iter().any(|p| p.severity == Severity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.problems.iter().any(|p| p.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.problems.iter().filter(|p| p.severity == Severity::Error).count()
    }

    pub fn warning_count(&self) -> usize {
        self.problems.iter().filter(|p| p.severity == Severity::Warning).count()
    }

    pub fn summary(&self) -> String {
        if self.problems.is_empty() {
            "Validation passed with no issues".to_string()
        } else if self.has_errors() {
            format!(
                "Validation FAILED with {} error(s), {} warning(s)",
                self.error_count(),
                self.warning_count()
            )
        } else {
            format!("Validation passed (with {} warning(s))", self.warning_count())
        }
    }

    // ========================================================================
    // RENDERING
    // ========================================================================

    pub fn to_text(&self) -> String {
        let mut lines = Vec::new();
        for problem in &self.problems {
            lines.push(problem.to_string());
        }
        lines.push(self.summary());
        lines.join("\n")
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.problems)?)
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["severity", "message", "context"])?;
        for problem in &self.problems {
            writer.write_record([
                problem.severity.as_str(),
                problem.message.as_str(),
                problem.context.as_deref().unwrap_or(""),
            ])?;
        }
        let bytes = writer.into_inner()?;
        Ok(String::from_utf8(bytes)?)
    }
}

// ============================================================================
// VALIDATION PASSES
// ============================================================================

/// Validate the whole book: account coverage + transaction balance.
///
/// `strict` escalates entity-coverage gaps from warning to error; it is the
/// mode required before any report generation.
pub fn validate_book(
    book: &LedgerBook,
    catalog: &EntityCatalog,
    config: &LedgerConfig,
    strict: bool,
) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    validate_accounts(book, catalog, config, strict, &mut result)?;
    validate_transactions(book, config, &mut result)?;

    Ok(result)
}

/// Account pass: entity coverage and suspense buckets.
fn validate_accounts(
    book: &LedgerBook,
    catalog: &EntityCatalog,
    config: &LedgerConfig,
    strict: bool,
    result: &mut ValidationResult,
) -> Result<()> {
    let accounts = book.accounts()?;

    let mut unmapped_count = 0usize;
    let mut suspense_accounts: Vec<&Account> = Vec::new();

    for account in &accounts {
        if !catalog.is_explicitly_mapped(&account.guid, &account.full_name) {
            unmapped_count += 1;
        }
        if account.is_suspense_account() {
            suspense_accounts.push(account);
        }
    }

    // Coverage gaps accumulate into ONE aggregate problem
    if unmapped_count > 0 {
        if strict {
            result.add_error(
                format!(
                    "{} account(s) have no entity mapping. All accounts must be \
                     mapped to entities before generating reports. Use the \
                     entity-scan or entity-remap commands to identify and map them.",
                    unmapped_count
                ),
                None,
            );
        } else {
            result.add_warning(
                format!(
                    "{} account(s) have no entity mapping. Use the entity-scan \
                     command to identify them.",
                    unmapped_count
                ),
                None,
            );
        }
    }

    // Suspense buckets ("Imbalance-USD", "Orphan-USD") should hold zero;
    // a non-zero balance is a warning regardless of mode
    if !suspense_accounts.is_empty() {
        let balances = book.account_balances(None)?;
        for account in suspense_accounts {
            let balance = balances.get(&account.guid).copied().unwrap_or(0.0);
            if !config.is_zero(balance) {
                result.add_warning(
                    format!(
                        "Suspense account '{}' has a non-zero balance: {:.2}",
                        account.full_name, balance
                    ),
                    Some(format!("GUID: {}", account.guid)),
                );
            }
        }
    }

    Ok(())
}

/// Transaction pass: double-entry balance plus read defects.
fn validate_transactions(
    book: &LedgerBook,
    config: &LedgerConfig,
    result: &mut ValidationResult,
) -> Result<()> {
    let scan = book.scan_transactions()?;

    for tx in &scan.transactions {
        if !tx.is_balanced(config.numeric_tolerance) {
            result.add_error(
                format!(
                    "Unbalanced transaction: '{}' (imbalance: {:.4})",
                    tx.description,
                    tx.total_value()
                ),
                Some(format!("GUID: {}, Date: {}", tx.guid, tx.post_date)),
            );
        }
    }

    // Unreadable records were already collected by the access layer; they
    // become one aggregate data-integrity error here
    if scan.has_defects() {
        let mut details: Vec<String> = scan
            .defects
            .iter()
            .map(|d| format!("{} '{}': {}", d.tx_guid, d.description, d.detail))
            .collect();
        details.sort();
        result.add_error(
            format!(
                "{} transaction(s) could not be read (data-integrity defect): {}",
                scan.defects.len(),
                details.join("; ")
            ),
            None,
        );
    }

    Ok(())
}

/// List every account that is not deliberately mapped to an entity
/// (the entity-scan command).
pub fn scan_unmapped_accounts(book: &LedgerBook, catalog: &EntityCatalog) -> Result<Vec<Account>> {
    Ok(book
        .accounts()?
        .into_iter()
        .filter(|a| !catalog.is_explicitly_mapped(&a.guid, &a.full_name))
        .collect())
}

/// The single gate in front of every report generator.
///
/// Runs strict validation; any remaining error aborts with a fatal
/// configuration error. A warnings-only result passes through.
pub fn validate_for_reporting(
    book: &LedgerBook,
    catalog: &EntityCatalog,
    config: &LedgerConfig,
) -> Result<ValidationResult> {
    let result = validate_book(book, catalog, config, true)?;

    if result.has_errors() {
        bail!(
            "Strict validation FAILED with {} error(s). Cannot generate reports \
             until all errors are resolved:\n{}",
            result.error_count(),
            result.to_text()
        );
    }

    Ok(result)
}

// ============================================================================
// TESTS
// ============================================================================
