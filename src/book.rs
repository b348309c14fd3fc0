// 📒 Ledger Access Layer - GnuCash SQLite book
// Stable interface over the GnuCash database schema: accounts with full-name
// paths, transactions with splits, balances, split appends, and backups.
//
// Unreadable records surface as typed ReadDefect values, never as exceptions
// and never silently skipped - the validation engine reports them in
// aggregate while everything readable keeps flowing.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ============================================================================
// ACCOUNT
// ============================================================================

/// Broad classification of a GnuCash account type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountClass {
    /// Asset-like: ASSET, BANK, CASH, STOCK, MUTUAL, RECEIVABLE
    Asset,
    /// Liability-like: LIABILITY, PAYABLE, CREDIT
    Liability,
    Equity,
    Income,
    Expense,
    Unknown,
}

impl AccountClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountClass::Asset => "ASSET",
            AccountClass::Liability => "LIABILITY",
            AccountClass::Equity => "EQUITY",
            AccountClass::Income => "INCOME",
            AccountClass::Expense => "EXPENSE",
            AccountClass::Unknown => "OTHER",
        }
    }
}

/// Representation of a GnuCash account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Stable identifier (32-char hex in GnuCash books)
    pub guid: String,

    /// Leaf name (last path segment)
    pub name: String,

    /// Colon-separated full path, e.g. "Assets:Checking:Main"
    pub full_name: String,

    /// Raw GnuCash account type (e.g. "ASSET", "LIABILITY", "EQUITY")
    pub account_type: String,

    /// Currency code or commodity ticker (e.g. "USD")
    pub commodity_symbol: String,

    /// GUID of the parent account, absent for top-level accounts
    pub parent_guid: Option<String>,

    /// Organizational node carrying no direct balance by convention
    pub is_placeholder: bool,
}

impl Account {
    /// Classify the raw GnuCash type into a broad reporting class
    pub fn classify(&self) -> AccountClass {
        match self.account_type.as_str() {
            "ASSET" | "BANK" | "CASH" | "STOCK" | "MUTUAL" | "RECEIVABLE" => AccountClass::Asset,
            "LIABILITY" | "PAYABLE" | "CREDIT" => AccountClass::Liability,
            "EQUITY" => AccountClass::Equity,
            "INCOME" => AccountClass::Income,
            "EXPENSE" => AccountClass::Expense,
            _ => AccountClass::Unknown,
        }
    }

    /// Check if this is an auto-generated suspense bucket
    /// ("Imbalance-USD", "Orphan-USD", ...)
    pub fn is_suspense_account(&self) -> bool {
        let lower = self.full_name.to_lowercase();
        lower.starts_with("imbalance") || lower.starts_with("orphan")
    }
}

// ============================================================================
// TRANSACTION & SPLITS
// ============================================================================

/// One signed line item of a transaction against a single account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Split {
    pub account_guid: String,

    /// Signed value in the transaction currency (debit-positive)
    pub value: f64,

    pub memo: Option<String>,
}

/// Representation of a GnuCash transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub guid: String,

    /// Post date normalized to YYYY-MM-DD
    pub post_date: String,

    pub description: String,

    pub splits: Vec<Split>,
}

impl Transaction {
    /// Sum of all split values - zero (within tolerance) when healthy
    pub fn total_value(&self) -> f64 {
        self.splits.iter().map(|s| s.value).sum()
    }

    /// Check the double-entry invariant within tolerance
    pub fn is_balanced(&self, tolerance: f64) -> bool {
        self.total_value().abs() <= tolerance
    }
}

/// A record the access layer could not turn into a Transaction.
///
/// Defects are data, not errors: scanning continues past them and the
/// validation engine reports them in one aggregate problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadDefect {
    pub tx_guid: String,
    pub description: String,
    pub detail: String,
}

/// Outcome of one full pass over the book's transactions.
#[derive(Debug, Clone, Default)]
pub struct TransactionScan {
    /// Readable transactions, ordered by post date
    pub transactions: Vec<Transaction>,

    /// Records that could not be read (corrupt date, unreadable split)
    pub defects: Vec<ReadDefect>,
}

impl TransactionScan {
    pub fn has_defects(&self) -> bool {
        !self.defects.is_empty()
    }
}

// ============================================================================
// LEDGER BOOK
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// Connection to a GnuCash SQLite book.
///
/// One book per run; the underlying connection is released on drop.
pub struct LedgerBook {
    conn: Connection,
    path: Option<PathBuf>,
    mode: AccessMode,
}

impl LedgerBook {
    /// Open a book file in the given mode
    pub fn open(path: &Path, mode: AccessMode) -> Result<Self> {
        if !path.exists() {
            bail!("Ledger book file not found: {}", path.display());
        }

        let conn = match mode {
            AccessMode::ReadOnly => Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .with_context(|| format!("Failed to open book read-only: {}", path.display()))?,
            AccessMode::ReadWrite => Connection::open(path)
                .with_context(|| format!("Failed to open book read-write: {}", path.display()))?,
        };

        Ok(LedgerBook {
            conn,
            path: Some(path.to_path_buf()),
            mode,
        })
    }

    /// Wrap an existing connection (in-memory fixture books, tests)
    pub fn from_connection(conn: Connection, mode: AccessMode) -> Self {
        LedgerBook {
            conn,
            path: None,
            mode,
        }
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Raw connection for maintenance tooling (repair)
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Enumerate all non-ROOT accounts with full-name paths built from the
    /// parent chain
    pub fn accounts(&self) -> Result<Vec<Account>> {
        struct RawAccount {
            guid: String,
            name: String,
            account_type: String,
            commodity: String,
            parent_guid: Option<String>,
            placeholder: bool,
        }

        let mut stmt = self
            .conn
            .prepare(
                "SELECT a.guid, a.name, a.account_type, a.parent_guid, a.placeholder,
                        COALESCE(c.mnemonic, '') AS mnemonic
                 FROM accounts a
                 LEFT JOIN commodities c ON c.guid = a.commodity_guid
                 ORDER BY a.name",
            )
            .context("Failed to query accounts table")?;

        let rows = stmt
            .query_map([], |row| {
                Ok(RawAccount {
                    guid: row.get(0)?,
                    name: row.get(1)?,
                    account_type: row.get(2)?,
                    parent_guid: row.get(3)?,
                    placeholder: row.get::<_, i64>(4)? != 0,
                    commodity: row.get(5)?,
                })
            })
            .context("Failed to read account rows")?;

        let mut raw: HashMap<String, RawAccount> = HashMap::new();
        for row in rows {
            let account = row.context("Failed to decode account row")?;
            raw.insert(account.guid.clone(), account);
        }

        // Root accounts (type ROOT) exist only to anchor the tree; they are
        // excluded from the result and from full-name paths.
        let mut accounts = Vec::new();
        for account in raw.values() {
            if account.account_type == "ROOT" {
                continue;
            }

            // Walk the parent chain to build the colon path
            let mut segments = vec![account.name.clone()];
            let mut cursor = account.parent_guid.clone();
            while let Some(parent_guid) = cursor {
                match raw.get(&parent_guid) {
                    Some(parent) if parent.account_type != "ROOT" => {
                        segments.push(parent.name.clone());
                        cursor = parent.parent_guid.clone();
                    }
                    _ => break,
                }
            }
            segments.reverse();

            // A parent that is the ROOT account counts as "no parent"
            let parent_guid = account.parent_guid.as_ref().and_then(|p| match raw.get(p) {
                Some(parent) if parent.account_type != "ROOT" => Some(p.clone()),
                _ => None,
            });

            accounts.push(Account {
                guid: account.guid.clone(),
                name: account.name.clone(),
                full_name: segments.join(":"),
                account_type: account.account_type.clone(),
                commodity_symbol: account.commodity.clone(),
                parent_guid,
                is_placeholder: account.placeholder,
            });
        }

        accounts.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(accounts)
    }

    /// Look up a single account by GUID
    pub fn account_by_guid(&self, guid: &str) -> Result<Option<Account>> {
        Ok(self.accounts()?.into_iter().find(|a| a.guid == guid))
    }

    /// One full pass over the book's transactions.
    ///
    /// Rows with a missing/unparseable post date or an unreadable split
    /// become ReadDefect entries; everything else is returned ordered by
    /// post date.
    pub fn scan_transactions(&self) -> Result<TransactionScan> {
        let mut scan = TransactionScan::default();

        let mut tx_stmt = self
            .conn
            .prepare("SELECT guid, post_date, description FROM transactions")
            .context("Failed to query transactions table")?;

        let mut split_stmt = self
            .conn
            .prepare(
                "SELECT account_guid, value_num, value_denom, memo
                 FROM splits WHERE tx_guid = ?1",
            )
            .context("Failed to prepare splits query")?;

        let tx_rows = tx_stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })
            .context("Failed to read transaction rows")?;

        for tx_row in tx_rows {
            let (guid, raw_date, description) = tx_row.context("Failed to decode transaction row")?;
            let description = description.unwrap_or_else(|| "(No description)".to_string());

            // Post date first: a corrupt date is the classic defect in
            // externally-mangled books
            let post_date = match raw_date.as_deref().and_then(parse_post_date) {
                Some(date) => date,
                None => {
                    scan.defects.push(ReadDefect {
                        tx_guid: guid,
                        description,
                        detail: format!(
                            "Invalid or missing post date: {:?}",
                            raw_date.unwrap_or_default()
                        ),
                    });
                    continue;
                }
            };

            // Splits: NULL account references or value fields make the whole
            // transaction unreadable
            let split_rows = split_stmt
                .query_map(params![guid], |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                })
                .context("Failed to read split rows")?;

            let mut splits = Vec::new();
            let mut split_defect: Option<String> = None;

            for split_row in split_rows {
                let (account_guid, value_num, value_denom, memo) =
                    split_row.context("Failed to decode split row")?;

                match (account_guid, value_num, value_denom) {
                    (Some(account_guid), Some(num), Some(denom)) if denom != 0 => {
                        splits.push(Split {
                            account_guid,
                            value: num as f64 / denom as f64,
                            memo: memo.filter(|m| !m.is_empty()),
                        });
                    }
                    (account_guid, num, denom) => {
                        split_defect = Some(format!(
                            "Unreadable split (account: {:?}, value: {:?}/{:?})",
                            account_guid, num, denom
                        ));
                        break;
                    }
                }
            }

            if let Some(detail) = split_defect {
                scan.defects.push(ReadDefect {
                    tx_guid: guid,
                    description,
                    detail,
                });
                continue;
            }

            scan.transactions.push(Transaction {
                guid,
                post_date,
                description,
                splits,
            });
        }

        scan.transactions
            .sort_by(|a, b| a.post_date.cmp(&b.post_date).then(a.guid.cmp(&b.guid)));

        Ok(scan)
    }

    /// Point-in-time balances for every account.
    ///
    /// Sums split values over readable transactions with
    /// post_date <= as_of_date (all transactions when None). Every account
    /// appears in the result, zero balances included.
    pub fn account_balances(&self, as_of_date: Option<NaiveDate>) -> Result<HashMap<String, f64>> {
        let mut balances: HashMap<String, f64> = HashMap::new();
        for account in self.accounts()? {
            balances.insert(account.guid, 0.0);
        }

        let scan = self.scan_transactions()?;
        for tx in &scan.transactions {
            if let Some(cutoff) = as_of_date {
                match NaiveDate::parse_from_str(&tx.post_date, "%Y-%m-%d") {
                    Ok(date) if date > cutoff => continue,
                    Ok(_) => {}
                    Err(_) => continue,
                }
            }

            for split in &tx.splits {
                *balances.entry(split.account_guid.clone()).or_insert(0.0) += split.value;
            }
        }

        Ok(balances)
    }

    /// Period balances: sum of split values for transactions with
    /// date_from <= post_date <= date_to (income statement ranges)
    pub fn period_balances(
        &self,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> Result<HashMap<String, f64>> {
        let mut balances: HashMap<String, f64> = HashMap::new();
        for account in self.accounts()? {
            balances.insert(account.guid, 0.0);
        }

        let scan = self.scan_transactions()?;
        for tx in &scan.transactions {
            let date = match NaiveDate::parse_from_str(&tx.post_date, "%Y-%m-%d") {
                Ok(date) => date,
                Err(_) => continue,
            };
            if date < date_from || date > date_to {
                continue;
            }

            for split in &tx.splits {
                *balances.entry(split.account_guid.clone()).or_insert(0.0) += split.value;
            }
        }

        Ok(balances)
    }

    /// Append new splits to existing transactions, committed as one SQL
    /// transaction.
    ///
    /// Values are stored at cent precision (denominator 100), matching the
    /// common currency fraction. Refuses in read-only mode.
    pub fn append_splits(&mut self, new_splits: &[NewSplit]) -> Result<()> {
        if self.mode == AccessMode::ReadOnly {
            bail!("Book is open read-only; cannot append splits");
        }

        let sql_tx = self
            .conn
            .transaction()
            .context("Failed to begin SQL transaction")?;

        for split in new_splits {
            let value_num = (split.value * 100.0).round() as i64;

            sql_tx
                .execute(
                    "INSERT INTO splits (
                        guid, tx_guid, account_guid, memo, action,
                        reconcile_state, reconcile_date,
                        value_num, value_denom, quantity_num, quantity_denom
                    ) VALUES (?1, ?2, ?3, ?4, '', 'n', NULL, ?5, 100, ?5, 100)",
                    params![
                        uuid::Uuid::new_v4().simple().to_string(),
                        split.tx_guid,
                        split.account_guid,
                        split.memo,
                        value_num,
                    ],
                )
                .with_context(|| {
                    format!("Failed to insert split for transaction {}", split.tx_guid)
                })?;
        }

        sql_tx.commit().context("Failed to commit split inserts")?;
        Ok(())
    }

    /// Create a timestamped copy of the book file next to the original
    pub fn create_backup(&self) -> Result<PathBuf> {
        let path = match &self.path {
            Some(path) => path,
            None => bail!("Book has no file path; cannot create backup"),
        };

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "book".to_string());
        let backup_path = path.with_file_name(format!("{}.backup_{}", file_name, timestamp));

        std::fs::copy(path, &backup_path)
            .with_context(|| format!("Could not create backup: {}", backup_path.display()))?;

        Ok(backup_path)
    }
}

/// A split waiting to be written into an existing transaction.
#[derive(Debug, Clone)]
pub struct NewSplit {
    pub tx_guid: String,
    pub account_guid: String,
    pub value: f64,
    pub memo: String,
}

// ============================================================================
// DATE PARSING
// ============================================================================

/// Normalize a raw GnuCash post_date to YYYY-MM-DD.
///
/// Accepts "YYYY-MM-DD HH:MM:SS" (current schema), "YYYYMMDDHHMMSS" (older
/// books), and bare "YYYY-MM-DD". Anything else is a data-integrity defect.
fn parse_post_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let candidate = if raw.len() >= 10 && raw.as_bytes()[4] == b'-' {
        raw.get(..10)?.to_string()
    } else if raw.len() >= 8 && raw.chars().take(8).all(|c| c.is_ascii_digit()) {
        format!("{}-{}-{}", &raw[..4], &raw[4..6], &raw[6..8])
    } else {
        return None;
    };

    NaiveDate::parse_from_str(&candidate, "%Y-%m-%d")
        .ok()
        .map(|_| candidate)
}

/// Parse a user-supplied YYYY-MM-DD date argument
pub fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format: '{}'. Expected YYYY-MM-DD.", date_str))
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

/// Shared in-memory fixture books for the engine tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Minimal GnuCash schema in an in-memory database
    pub fn memory_book(mode: AccessMode) -> LedgerBook {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn);
        LedgerBook::from_connection(conn, mode)
    }

    /// Same schema in a throwaway file, for tests that exercise backups
    pub fn file_book(file_name: &str) -> LedgerBook {
        let path = std::env::temp_dir().join(file_name);
        let _ = std::fs::remove_file(&path);
        let conn = Connection::open(&path).unwrap();
        init_schema(&conn);
        LedgerBook {
            conn,
            path: Some(path),
            mode: AccessMode::ReadWrite,
        }
    }

    fn init_schema(conn: &Connection) {
        conn.execute_batch(
            "CREATE TABLE commodities (
                guid TEXT PRIMARY KEY,
                namespace TEXT NOT NULL,
                mnemonic TEXT NOT NULL
            );
            CREATE TABLE accounts (
                guid TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                account_type TEXT NOT NULL,
                commodity_guid TEXT,
                parent_guid TEXT,
                placeholder INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE transactions (
                guid TEXT PRIMARY KEY,
                currency_guid TEXT,
                num TEXT,
                post_date TEXT,
                enter_date TEXT,
                description TEXT
            );
            CREATE TABLE splits (
                guid TEXT PRIMARY KEY,
                tx_guid TEXT NOT NULL,
                account_guid TEXT,
                memo TEXT,
                action TEXT,
                reconcile_state TEXT,
                reconcile_date TEXT,
                value_num INTEGER,
                value_denom INTEGER,
                quantity_num INTEGER,
                quantity_denom INTEGER
            );
            INSERT INTO commodities (guid, namespace, mnemonic)
                VALUES ('usd-guid', 'CURRENCY', 'USD');
            INSERT INTO accounts (guid, name, account_type, commodity_guid, parent_guid)
                VALUES ('root-guid', 'Root Account', 'ROOT', NULL, NULL);",
        )
        .unwrap();
    }

    pub fn insert_account(
        book: &LedgerBook,
        guid: &str,
        name: &str,
        account_type: &str,
        parent_guid: Option<&str>,
        placeholder: bool,
    ) {
        book.conn
            .execute(
                "INSERT INTO accounts (guid, name, account_type, commodity_guid, parent_guid, placeholder)
                 VALUES (?1, ?2, ?3, 'usd-guid', ?4, ?5)",
                params![guid, name, account_type, parent_guid.unwrap_or("root-guid"), placeholder as i64],
            )
            .unwrap();
    }

    /// Insert a transaction with splits given as (account_guid, value) pairs
    pub fn insert_transaction(
        book: &LedgerBook,
        guid: &str,
        post_date: &str,
        description: &str,
        splits: &[(&str, f64)],
    ) {
        book.conn
            .execute(
                "INSERT INTO transactions (guid, currency_guid, post_date, description)
                 VALUES (?1, 'usd-guid', ?2, ?3)",
                params![guid, post_date, description],
            )
            .unwrap();

        for (i, (account_guid, value)) in splits.iter().enumerate() {
            book.conn
                .execute(
                    "INSERT INTO splits (guid, tx_guid, account_guid, reconcile_state,
                                         value_num, value_denom, quantity_num, quantity_denom)
                     VALUES (?1, ?2, ?3, 'n', ?4, 100, ?4, 100)",
                    params![
                        format!("{}-s{}", guid, i),
                        guid,
                        account_guid,
                        (value * 100.0).round() as i64,
                    ],
                )
                .unwrap();
        }
    }

    /// Insert a split row with NULL value fields (unreadable split defect)
    pub fn insert_corrupt_split(book: &LedgerBook, tx_guid: &str, split_guid: &str) {
        book.conn
            .execute(
                "INSERT INTO splits (guid, tx_guid, account_guid, value_num, value_denom)
                 VALUES (?1, ?2, NULL, NULL, NULL)",
                params![split_guid, tx_guid],
            )
            .unwrap();
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn sample_book() -> LedgerBook {
        let book = memory_book(AccessMode::ReadWrite);

        insert_account(&book, "assets", "Assets", "ASSET", None, true);
        insert_account(&book, "checking", "Checking", "BANK", Some("assets"), false);
        insert_account(&book, "expenses", "Expenses", "EXPENSE", None, true);
        insert_account(&book, "food", "Food", "EXPENSE", Some("expenses"), false);

        insert_transaction(
            &book,
            "tx1",
            "2025-01-15 10:59:00",
            "Groceries",
            &[("food", 42.50), ("checking", -42.50)],
        );

        book
    }

    #[test]
    fn test_accounts_full_name_paths() {
        let book = sample_book();
        let accounts = book.accounts().unwrap();

        assert_eq!(accounts.len(), 4); // ROOT excluded

        let checking = accounts.iter().find(|a| a.guid == "checking").unwrap();
        assert_eq!(checking.full_name, "Assets:Checking");
        assert_eq!(checking.parent_guid.as_deref(), Some("assets"));
        assert_eq!(checking.classify(), AccountClass::Asset);
        assert!(!checking.is_placeholder);

        let assets = accounts.iter().find(|a| a.guid == "assets").unwrap();
        assert_eq!(assets.full_name, "Assets");
        assert!(assets.parent_guid.is_none()); // ROOT parent counts as none
        assert!(assets.is_placeholder);

        let looked_up = book.account_by_guid("food").unwrap().unwrap();
        assert_eq!(looked_up.full_name, "Expenses:Food");
        assert!(book.account_by_guid("nope").unwrap().is_none());

        println!("✅ Full-name path test passed");
    }

    #[test]
    fn test_scan_transactions_normalizes_dates() {
        let book = sample_book();
        let scan = book.scan_transactions().unwrap();

        assert_eq!(scan.transactions.len(), 1);
        assert!(!scan.has_defects());

        let tx = &scan.transactions[0];
        assert_eq!(tx.post_date, "2025-01-15");
        assert_eq!(tx.splits.len(), 2);
        assert!((tx.splits[0].value.abs() - 42.50).abs() < 1e-9);
        assert!(tx.is_balanced(0.01));

        println!("✅ Scan/date normalization test passed");
    }

    #[test]
    fn test_scan_compact_date_format() {
        let book = memory_book(AccessMode::ReadOnly);
        insert_account(&book, "a", "A", "ASSET", None, false);
        insert_transaction(&book, "tx1", "20241231235959", "Old-format date", &[("a", 1.0)]);

        let scan = book.scan_transactions().unwrap();
        assert_eq!(scan.transactions[0].post_date, "2024-12-31");

        println!("✅ Compact date format test passed");
    }

    #[test]
    fn test_scan_collects_defects_and_continues() {
        let book = sample_book();

        // Corrupt date
        insert_transaction(&book, "tx-bad-date", "garbage", "Mangled by export tool", &[("food", 1.0)]);
        // Unreadable split
        book.conn
            .execute(
                "INSERT INTO transactions (guid, post_date, description)
                 VALUES ('tx-bad-split', '2025-02-01 10:59:00', 'Null split')",
                [],
            )
            .unwrap();
        insert_corrupt_split(&book, "tx-bad-split", "bad-split-1");

        let scan = book.scan_transactions().unwrap();

        assert_eq!(scan.transactions.len(), 1); // only the healthy one
        assert_eq!(scan.defects.len(), 2);
        assert!(scan.defects.iter().any(|d| d.tx_guid == "tx-bad-date"));
        assert!(scan.defects.iter().any(|d| d.tx_guid == "tx-bad-split"));

        println!("✅ Defect collection test passed");
    }

    #[test]
    fn test_account_balances_as_of_date() {
        let book = sample_book();
        insert_transaction(
            &book,
            "tx2",
            "2025-03-01 10:59:00",
            "Later groceries",
            &[("food", 10.0), ("checking", -10.0)],
        );

        let all = book.account_balances(None).unwrap();
        assert!((all["food"] - 52.50).abs() < 1e-9);
        assert!((all["checking"] + 52.50).abs() < 1e-9);

        let cutoff = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let early = book.account_balances(Some(cutoff)).unwrap();
        assert!((early["food"] - 42.50).abs() < 1e-9);

        println!("✅ Balance as-of-date test passed");
    }

    #[test]
    fn test_period_balances() {
        let book = sample_book();
        insert_transaction(
            &book,
            "tx2",
            "2025-03-01 10:59:00",
            "March spending",
            &[("food", 10.0), ("checking", -10.0)],
        );

        let march = book
            .period_balances(
                NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            )
            .unwrap();

        assert!((march["food"] - 10.0).abs() < 1e-9);
        assert!((march["checking"] + 10.0).abs() < 1e-9);

        println!("✅ Period balance test passed");
    }

    #[test]
    fn test_append_splits_and_read_only_refusal() {
        let mut book = sample_book();

        book.append_splits(&[
            NewSplit {
                tx_guid: "tx1".to_string(),
                account_guid: "checking".to_string(),
                value: 5.0,
                memo: "test split".to_string(),
            },
        ])
        .unwrap();

        let scan = book.scan_transactions().unwrap();
        assert_eq!(scan.transactions[0].splits.len(), 3);

        let mut read_only = memory_book(AccessMode::ReadOnly);
        let err = read_only
            .append_splits(&[NewSplit {
                tx_guid: "tx1".to_string(),
                account_guid: "checking".to_string(),
                value: 5.0,
                memo: String::new(),
            }])
            .unwrap_err();
        assert!(err.to_string().contains("read-only"));

        println!("✅ Append/read-only test passed");
    }

    #[test]
    fn test_parse_date_helper() {
        assert!(parse_date("2025-06-30").is_ok());
        assert!(parse_date("06/30/2025").is_err());
        assert!(parse_date("").is_err());

        println!("✅ parse_date helper test passed");
    }
}
