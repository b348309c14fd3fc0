// 📸 Snapshot & Diff - What did that external tool change?
// Captures the full book state (accounts, transactions, read defects) with a
// SHA-256 content fingerprint, persists it as JSON, and diffs two captures
// to show exactly which records an outside utility added, removed, or
// altered.

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

use crate::book::LedgerBook;

// ============================================================================
// SNAPSHOT MODEL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub guid: String,
    pub full_name: String,
    pub account_type: String,
    pub commodity_symbol: String,
    pub parent_guid: Option<String>,
    pub is_placeholder: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSnapshot {
    pub guid: String,
    pub description: String,

    /// None when the record was unreadable
    pub post_date: Option<String>,

    pub split_count: usize,

    /// (account guid, value) pairs in original order
    pub splits: Vec<(String, f64)>,

    /// Read-defect detail when the record was unreadable
    pub error: Option<String>,
}

/// Complete snapshot of one book's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub captured_at: String,

    /// SHA-256 over the canonical account/transaction content
    pub fingerprint: String,

    pub accounts: BTreeMap<String, AccountSnapshot>,
    pub transactions: BTreeMap<String, TransactionSnapshot>,
    pub error_count: usize,
}

impl BookSnapshot {
    /// Capture the current state, including unreadable records as errored
    /// entries
    pub fn capture(book: &LedgerBook) -> Result<Self> {
        let mut accounts = BTreeMap::new();
        for account in book.accounts()? {
            accounts.insert(
                account.guid.clone(),
                AccountSnapshot {
                    guid: account.guid,
                    full_name: account.full_name,
                    account_type: account.account_type,
                    commodity_symbol: account.commodity_symbol,
                    parent_guid: account.parent_guid,
                    is_placeholder: account.is_placeholder,
                },
            );
        }

        let scan = book.scan_transactions()?;
        let mut transactions = BTreeMap::new();
        for tx in &scan.transactions {
            transactions.insert(
                tx.guid.clone(),
                TransactionSnapshot {
                    guid: tx.guid.clone(),
                    description: tx.description.clone(),
                    post_date: Some(tx.post_date.clone()),
                    split_count: tx.splits.len(),
                    splits: tx
                        .splits
                        .iter()
                        .map(|s| (s.account_guid.clone(), s.value))
                        .collect(),
                    error: None,
                },
            );
        }
        for defect in &scan.defects {
            transactions.insert(
                defect.tx_guid.clone(),
                TransactionSnapshot {
                    guid: defect.tx_guid.clone(),
                    description: defect.description.clone(),
                    post_date: None,
                    split_count: 0,
                    splits: Vec::new(),
                    error: Some(defect.detail.clone()),
                },
            );
        }

        let mut snapshot = BookSnapshot {
            captured_at: Local::now().to_rfc3339(),
            fingerprint: String::new(),
            accounts,
            transactions,
            error_count: scan.defects.len(),
        };
        snapshot.fingerprint = snapshot.compute_fingerprint()?;

        Ok(snapshot)
    }

    /// SHA-256 over the canonical JSON of accounts + transactions (the
    /// timestamp stays out, so identical content fingerprints identically)
    fn compute_fingerprint(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&self.accounts)?);
        hasher.update(serde_json::to_vec(&self.transactions)?);
        Ok(format!("{:x}", hasher.finalize()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize snapshot")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid snapshot JSON: {}", path.display()))
    }
}

// ============================================================================
// DIFF
// ============================================================================

/// Differences between two snapshots, keyed by GUID.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotDiff {
    pub added_accounts: Vec<String>,
    pub removed_accounts: Vec<String>,
    pub changed_accounts: Vec<String>,
    pub added_transactions: Vec<String>,
    pub removed_transactions: Vec<String>,
    pub changed_transactions: Vec<String>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added_accounts.is_empty()
            && self.removed_accounts.is_empty()
            && self.changed_accounts.is_empty()
            && self.added_transactions.is_empty()
            && self.removed_transactions.is_empty()
            && self.changed_transactions.is_empty()
    }

    pub fn format_text(&self) -> String {
        if self.is_empty() {
            return "No differences found.".to_string();
        }

        let mut lines = Vec::new();
        for (label, guids) in [
            ("Added accounts", &self.added_accounts),
            ("Removed accounts", &self.removed_accounts),
            ("Changed accounts", &self.changed_accounts),
            ("Added transactions", &self.added_transactions),
            ("Removed transactions", &self.removed_transactions),
            ("Changed transactions", &self.changed_transactions),
        ] {
            if !guids.is_empty() {
                lines.push(format!("{} ({}):", label, guids.len()));
                for guid in guids {
                    lines.push(format!("  - {}", guid));
                }
            }
        }
        lines.join("\n")
    }
}

/// Compare two snapshots taken before and after an external operation
pub fn diff_snapshots(before: &BookSnapshot, after: &BookSnapshot) -> SnapshotDiff {
    let mut diff = SnapshotDiff::default();

    for (guid, account) in &after.accounts {
        match before.accounts.get(guid) {
            None => diff.added_accounts.push(guid.clone()),
            Some(previous) if previous != account => diff.changed_accounts.push(guid.clone()),
            Some(_) => {}
        }
    }
    for guid in before.accounts.keys() {
        if !after.accounts.contains_key(guid) {
            diff.removed_accounts.push(guid.clone());
        }
    }

    for (guid, tx) in &after.transactions {
        match before.transactions.get(guid) {
            None => diff.added_transactions.push(guid.clone()),
            Some(previous) if previous != tx => diff.changed_transactions.push(guid.clone()),
            Some(_) => {}
        }
    }
    for guid in before.transactions.keys() {
        if !after.transactions.contains_key(guid) {
            diff.removed_transactions.push(guid.clone());
        }
    }

    diff
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::fixtures::*;
    use crate::book::AccessMode;

    fn sample_book() -> LedgerBook {
        let book = memory_book(AccessMode::ReadWrite);
        insert_account(&book, "chk", "Checking", "BANK", None, false);
        insert_account(&book, "food", "Food", "EXPENSE", None, false);
        insert_transaction(
            &book,
            "tx1",
            "2025-01-15 10:59:00",
            "Groceries",
            &[("food", 42.0), ("chk", -42.0)],
        );
        book
    }

    #[test]
    fn test_capture_and_fingerprint_stability() {
        let book = sample_book();

        let first = BookSnapshot::capture(&book).unwrap();
        let second = BookSnapshot::capture(&book).unwrap();

        assert_eq!(first.accounts.len(), 2);
        assert_eq!(first.transactions.len(), 1);
        assert_eq!(first.error_count, 0);
        // Same content, same fingerprint, regardless of capture time
        assert_eq!(first.fingerprint, second.fingerprint);

        println!("✅ Capture/fingerprint test passed");
    }

    #[test]
    fn test_capture_includes_defective_records() {
        let book = sample_book();
        insert_transaction(&book, "tx-bad", "mangled", "Broken date", &[("chk", 1.0)]);

        let snapshot = BookSnapshot::capture(&book).unwrap();

        assert_eq!(snapshot.error_count, 1);
        let bad = &snapshot.transactions["tx-bad"];
        assert!(bad.error.is_some());
        assert!(bad.post_date.is_none());

        println!("✅ Defective record capture test passed");
    }

    #[test]
    fn test_diff_detects_external_changes() {
        let book = sample_book();
        let before = BookSnapshot::capture(&book).unwrap();

        // External tool appends a split and adds a transaction
        book.connection()
            .execute(
                "INSERT INTO splits (guid, tx_guid, account_guid, value_num, value_denom)
                 VALUES ('new-split', 'tx1', 'chk', 500, 100)",
                [],
            )
            .unwrap();
        insert_transaction(
            &book,
            "tx2",
            "2025-02-01 10:59:00",
            "New one",
            &[("food", 5.0), ("chk", -5.0)],
        );

        let after = BookSnapshot::capture(&book).unwrap();
        let diff = diff_snapshots(&before, &after);

        assert!(!diff.is_empty());
        assert_eq!(diff.changed_transactions, vec!["tx1"]);
        assert_eq!(diff.added_transactions, vec!["tx2"]);
        assert!(diff.removed_transactions.is_empty());
        assert_ne!(before.fingerprint, after.fingerprint);

        let text = diff.format_text();
        assert!(text.contains("Changed transactions (1):"));

        println!("✅ Snapshot diff test passed");
    }

    #[test]
    fn test_save_load_round_trip() {
        let book = sample_book();
        let snapshot = BookSnapshot::capture(&book).unwrap();

        let path = std::env::temp_dir().join("entity-ledger-snapshot-test.json");
        snapshot.save(&path).unwrap();
        let loaded = BookSnapshot::load(&path).unwrap();

        assert_eq!(loaded.fingerprint, snapshot.fingerprint);
        assert_eq!(loaded.transactions.len(), 1);
        assert!(diff_snapshots(&snapshot, &loaded).is_empty());

        let _ = std::fs::remove_file(path);

        println!("✅ Snapshot round-trip test passed");
    }
}
