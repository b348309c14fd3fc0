// 🩹 Repair Tooling - Low-level fixes for mangled book files
// Some export tools write empty-string reconcile_date fields into split
// rows, which breaks date parsing in every downstream reader. Diagnose
// counts the damage; repair NULLs the empty fields after taking a backup.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use crate::book::{AccessMode, LedgerBook};

/// Result of one repair operation.
#[derive(Debug, Clone)]
pub struct RepairResult {
    pub success: bool,
    pub items_fixed: usize,
    pub backup_path: Option<PathBuf>,
    pub message: String,
}

/// Count splits with an empty reconcile_date and list the affected
/// transaction descriptions.
pub fn diagnose_empty_reconcile_dates(book: &LedgerBook) -> Result<(usize, Vec<String>)> {
    let conn = book.connection();

    let count: usize = conn
        .query_row(
            "SELECT COUNT(*) FROM splits WHERE reconcile_date = ''",
            [],
            |row| row.get::<_, i64>(0),
        )
        .context("Failed to count empty reconcile_date fields")? as usize;

    let mut stmt = conn
        .prepare(
            "SELECT DISTINCT COALESCE(t.description, '(no description)')
             FROM splits s
             LEFT JOIN transactions t ON t.guid = s.tx_guid
             WHERE s.reconcile_date = ''
             ORDER BY 1",
        )
        .context("Failed to query affected transactions")?;

    let descriptions = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("Failed to read affected transactions")?
        .collect::<std::result::Result<Vec<String>, _>>()
        .context("Failed to decode affected transactions")?;

    Ok((count, descriptions))
}

/// NULL every empty reconcile_date field, backup first.
///
/// No-op (success, zero fixed) when the book is already clean.
pub fn repair_empty_reconcile_dates(book: &mut LedgerBook) -> Result<RepairResult> {
    if book.mode() == AccessMode::ReadOnly {
        bail!("Book is open read-only; cannot repair");
    }

    let (count, _) = diagnose_empty_reconcile_dates(book)?;
    if count == 0 {
        return Ok(RepairResult {
            success: true,
            items_fixed: 0,
            backup_path: None,
            message: "No empty reconcile_date fields found; nothing to repair".to_string(),
        });
    }

    // Backup before touching anything
    let backup_path = match book.path() {
        Some(_) => Some(book.create_backup()?),
        None => None,
    };

    let fixed = book
        .connection()
        .execute("UPDATE splits SET reconcile_date = NULL WHERE reconcile_date = ''", [])
        .context("Failed to repair reconcile_date fields")?;

    Ok(RepairResult {
        success: true,
        items_fixed: fixed,
        backup_path,
        message: format!("Repaired {} split(s) with empty reconcile_date", fixed),
    })
}

// ============================================================================
// TESTS
// ============================================================================
