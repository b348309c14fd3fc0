// 🔧 Balancing Workflow - Corrective splits for cross-entity debts
// Consumes the cross-entity analysis, filters down to the mechanically
// fixable transactions (2 splits, 2 entities, opposite imbalances), groups
// them for batch human approval, and injects the two clearing-account splits
// that zero out each transaction.
//
// Preconditions are checked before ANY mutation: every involved entity needs
// both clearing accounts, and the two entity imbalances must cancel. A
// one-sided fix would leave the ledger transiently unbalanced, so the whole
// run fails fast with an actionable listing instead. Mutations commit per
// group; a timestamped backup precedes the first mutating group.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;
use std::path::PathBuf;

use crate::book::{AccountClass, LedgerBook, NewSplit};
use crate::config::LedgerConfig;
use crate::cross_entity::{analyze_cross_entity, CrossEntityAnalysis, CrossEntityTransaction};
use crate::entity_map::EntityCatalog;

/// Human-approval ergonomics limit, not a business rule
pub const MAX_GROUP_SIZE: usize = 9;

/// Account-path prefix used to pick a group's representative account
const EXPENSE_PREFIX: &str = "Expenses:";

// ============================================================================
// EQUITY (CLEARING) ACCOUNTS
// ============================================================================

/// The two clearing accounts of one entity: "Money In" (due-from) and
/// "Money Out" (due-to).
#[derive(Debug, Clone, Default)]
pub struct EquityAccounts {
    pub entity_key: String,
    pub money_in_guid: Option<String>,
    pub money_out_guid: Option<String>,
    pub money_in_name: Option<String>,
    pub money_out_name: Option<String>,
}

impl EquityAccounts {
    pub fn has_both_accounts(&self) -> bool {
        self.money_in_guid.is_some() && self.money_out_guid.is_some()
    }
}

/// Find each entity's clearing accounts by scanning equity-classified
/// accounts for "money in" / "money out" in the full name.
pub fn find_equity_accounts(
    book: &LedgerBook,
    catalog: &EntityCatalog,
) -> Result<HashMap<String, EquityAccounts>> {
    let mut equity_accounts: HashMap<String, EquityAccounts> = HashMap::new();
    for entity in catalog.entities() {
        equity_accounts.insert(
            entity.key.clone(),
            EquityAccounts {
                entity_key: entity.key.clone(),
                ..EquityAccounts::default()
            },
        );
    }

    for account in book.accounts()? {
        if account.classify() != AccountClass::Equity {
            continue;
        }

        let entity_key = match catalog.match_account(&account.guid, &account.full_name) {
            Some(key) => key.to_string(),
            None => continue,
        };
        let slot = match equity_accounts.get_mut(&entity_key) {
            Some(slot) => slot,
            None => continue,
        };

        // Expected pattern: "Equity:<Entity>:Money In (<Other>)" etc.
        let lower = account.full_name.to_lowercase();
        if lower.contains("money in") {
            slot.money_in_guid = Some(account.guid.clone());
            slot.money_in_name = Some(account.full_name.clone());
        } else if lower.contains("money out") {
            slot.money_out_guid = Some(account.guid.clone());
            slot.money_out_name = Some(account.full_name.clone());
        }
    }

    Ok(equity_accounts)
}

// ============================================================================
// FIXABLE TRANSACTIONS
// ============================================================================

/// Optional narrowing filters for a balancing run.
#[derive(Debug, Clone, Default)]
pub struct FixableFilters {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub entity: Option<String>,
}

/// A transaction is fixable iff it has exactly 2 splits, exactly 2 distinct
/// entities, a significant imbalance, no structural entity involved, and it
/// passes the optional filters.
pub fn identify_fixable(
    analysis: &CrossEntityAnalysis,
    catalog: &EntityCatalog,
    config: &LedgerConfig,
    filters: &FixableFilters,
) -> Vec<CrossEntityTransaction> {
    let mut fixable = Vec::new();

    for tx in &analysis.cross_entity_transactions {
        if tx.splits_info.len() != 2 {
            continue;
        }
        if tx.entities_involved.len() != 2 {
            continue;
        }
        if !tx.has_significant_imbalance(config.numeric_tolerance) {
            continue;
        }
        if tx.entities_involved.iter().any(|e| catalog.is_structural(e)) {
            continue;
        }
        if let Some(from) = filters.date_from {
            if tx.post_date < from {
                continue;
            }
        }
        if let Some(to) = filters.date_to {
            if tx.post_date > to {
                continue;
            }
        }
        if let Some(entity) = &filters.entity {
            if !tx.entities_involved.contains(entity) {
                continue;
            }
        }

        fixable.push(tx.clone());
    }

    fixable
}

// ============================================================================
// GROUPING
// ============================================================================

/// Batch of similar fixable transactions presented for one approval.
#[derive(Debug, Clone)]
pub struct TransactionGroup {
    /// Sorted pair of entity keys
    pub entity_pair: (String, String),

    /// Representative account: first expense-path split, else the first
    /// split's account, else "(unknown)"
    pub account_name: String,

    /// Date-ordered transactions, at most MAX_GROUP_SIZE
    pub transactions: Vec<CrossEntityTransaction>,
}

impl TransactionGroup {
    pub fn display_name(&self) -> String {
        let leaf = self
            .account_name
            .rsplit(':')
            .next()
            .unwrap_or(&self.account_name);
        format!("{} <-> {} / {}", self.entity_pair.0, self.entity_pair.1, leaf)
    }
}

/// Group fixable transactions by (entity pair, representative account),
/// date-sort each group, and chunk to MAX_GROUP_SIZE preserving date order.
pub fn group_transactions(fixable: Vec<CrossEntityTransaction>) -> Vec<TransactionGroup> {
    let mut buckets: BTreeMap<((String, String), String), Vec<CrossEntityTransaction>> =
        BTreeMap::new();

    for tx in fixable {
        let mut entities: Vec<&String> = tx.entities_involved.iter().collect();
        entities.sort();
        let entity_pair = (entities[0].clone(), entities[1].clone());

        let account_name = tx
            .splits_info
            .iter()
            .find(|s| s.account_name.starts_with(EXPENSE_PREFIX))
            .map(|s| s.account_name.clone())
            .or_else(|| tx.splits_info.first().map(|s| s.account_name.clone()))
            .unwrap_or_else(|| "(unknown)".to_string());

        buckets.entry((entity_pair, account_name)).or_default().push(tx);
    }

    let mut groups = Vec::new();
    for ((entity_pair, account_name), mut txns) in buckets {
        txns.sort_by(|a, b| a.post_date.cmp(&b.post_date));

        for chunk in txns.chunks(MAX_GROUP_SIZE) {
            groups.push(TransactionGroup {
                entity_pair: entity_pair.clone(),
                account_name: account_name.clone(),
                transactions: chunk.to_vec(),
            });
        }
    }

    groups
}

/// Format one group for a yes/no approval prompt
pub fn format_group_for_approval(group: &TransactionGroup) -> String {
    let mut lines = Vec::new();
    lines.push(format!("\nGroup: {}", group.display_name()));
    lines.push(format!("Transactions: {}", group.transactions.len()));
    lines.push("-".repeat(72));
    lines.push(format!("{:<12} {:>12}  {:<40}", "Date", "Amount", "Description"));
    lines.push("-".repeat(72));

    for tx in &group.transactions {
        lines.push(format!(
            "{:<12} {:>12.2}  {:<40}",
            tx.post_date.to_string(),
            tx.max_entity_imbalance(),
            tx.description
        ));
    }
    lines.push("-".repeat(72));

    lines.join("\n")
}

// ============================================================================
// PRECONDITIONS
// ============================================================================

/// Verify every involved entity has both clearing accounts and every
/// transaction's two entity amounts cancel each other.
///
/// Any violation fails the whole run before a single mutation, with an
/// actionable listing of what is missing.
pub fn check_preconditions(
    groups: &[TransactionGroup],
    equity_map: &HashMap<String, EquityAccounts>,
    config: &LedgerConfig,
) -> Result<()> {
    let mut involved: BTreeSet<&str> = BTreeSet::new();
    let mut problems: Vec<String> = Vec::new();

    for group in groups {
        for tx in &group.transactions {
            for entity in &tx.entities_involved {
                involved.insert(entity.as_str());
            }

            let amounts: Vec<f64> = tx.entity_amounts.values().copied().collect();
            if amounts.len() == 2 && (amounts[0] + amounts[1]).abs() > config.numeric_tolerance {
                problems.push(format!(
                    "  - transaction {} '{}': entity imbalances do not cancel ({:+.2} / {:+.2})",
                    tx.tx_guid, tx.description, amounts[0], amounts[1]
                ));
            }
        }
    }

    for entity in involved {
        match equity_map.get(entity) {
            None => problems.push(format!("  - {}: no equity accounts found", entity)),
            Some(equity) => {
                if equity.money_in_guid.is_none() {
                    problems.push(format!("  - {}: missing 'Money In' account", entity));
                }
                if equity.money_out_guid.is_none() {
                    problems.push(format!("  - {}: missing 'Money Out' account", entity));
                }
            }
        }
    }

    if !problems.is_empty() {
        bail!(
            "Balancing preconditions not met; no changes were made.\n{}\n\
             Required account pattern for each entity:\n\
             \x20 Equity:<EntityName>:Money In (<OtherEntity>)\n\
             \x20 Equity:<EntityName>:Money Out (<OtherEntity>)",
            problems.join("\n")
        );
    }

    Ok(())
}

// ============================================================================
// CORRECTIVE SPLITS
// ============================================================================

/// Build the two corrective splits for one fixable transaction.
///
/// The net-positive entity owes: its "Money In" account takes a credit of
/// -amount (value came in from the other entity). The net-negative entity is
/// owed: its "Money Out" account takes a debit of +amount. Each entity's net
/// contribution drops to zero, the transaction total stays at zero, and the
/// original splits are untouched.
pub fn compute_corrective_splits(
    tx: &CrossEntityTransaction,
    equity_map: &HashMap<String, EquityAccounts>,
) -> Result<Vec<NewSplit>> {
    if tx.entity_amounts.len() != 2 {
        bail!(
            "Transaction {} involves {} entities, expected 2",
            tx.tx_guid,
            tx.entity_amounts.len()
        );
    }

    let mut iter = tx.entity_amounts.iter();
    let (first_key, first_amount) = iter.next().map(|(k, v)| (k.as_str(), *v)).unwrap_or(("", 0.0));
    let (second_key, second_amount) = iter.next().map(|(k, v)| (k.as_str(), *v)).unwrap_or(("", 0.0));

    let (owing_key, owing_amount, owed_key) = if first_amount > 0.0 {
        (first_key, first_amount, second_key)
    } else {
        (second_key, second_amount, first_key)
    };

    if owing_amount <= 0.0 {
        bail!(
            "Transaction {} has no net-positive entity; nothing to balance",
            tx.tx_guid
        );
    }

    let owing = equity_map
        .get(owing_key)
        .filter(|e| e.has_both_accounts())
        .ok_or_else(|| anyhow::anyhow!("Missing clearing accounts for entity '{}'", owing_key))?;
    let owed = equity_map
        .get(owed_key)
        .filter(|e| e.has_both_accounts())
        .ok_or_else(|| anyhow::anyhow!("Missing clearing accounts for entity '{}'", owed_key))?;

    let amount = owing_amount.abs();

    Ok(vec![
        NewSplit {
            tx_guid: tx.tx_guid.clone(),
            account_guid: owing.money_in_guid.clone().unwrap_or_default(),
            value: -amount,
            memo: format!("Inter-entity balance: {} - added by entity-ledger", owed_key),
        },
        NewSplit {
            tx_guid: tx.tx_guid.clone(),
            account_guid: owed.money_out_guid.clone().unwrap_or_default(),
            value: amount,
            memo: format!("Inter-entity balance: {} - added by entity-ledger", owing_key),
        },
    ])
}

// ============================================================================
// WORKFLOW
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalMode {
    /// Preview only: walks every group, performs no mutation
    DryRun,
    /// Apply every group without prompting
    AutoApprove,
    /// Ask y/n per group on stdin
    Interactive,
}

/// Outcome of one balancing run.
#[derive(Debug, Clone)]
pub struct BalanceOutcome {
    pub fixed_count: usize,
    pub failed_count: usize,
    pub backup_path: Option<PathBuf>,
}

/// Process groups with approval and write corrective splits per group.
///
/// Each approved group commits independently; a failed save is reported,
/// excluded from the fixed count, and later groups still run.
pub fn balance_groups(
    book: &mut LedgerBook,
    groups: &[TransactionGroup],
    equity_map: &HashMap<String, EquityAccounts>,
    mode: ApprovalMode,
) -> Result<BalanceOutcome> {
    let mut outcome = BalanceOutcome {
        fixed_count: 0,
        failed_count: 0,
        backup_path: None,
    };

    for (i, group) in groups.iter().enumerate() {
        println!("{}", format_group_for_approval(group));

        let approved = match mode {
            ApprovalMode::DryRun => {
                println!("[DRY RUN] Auto-processing group {}/{}", i + 1, groups.len());
                true
            }
            ApprovalMode::AutoApprove => true,
            ApprovalMode::Interactive => confirm(&format!(
                "Balance these {} transaction(s)? ({}/{})",
                group.transactions.len(),
                i + 1,
                groups.len()
            )),
        };

        if !approved {
            println!("Skipped group {}/{}", i + 1, groups.len());
            continue;
        }

        let mut group_splits = Vec::new();
        let mut group_failed = 0usize;
        for tx in &group.transactions {
            match compute_corrective_splits(tx, equity_map) {
                Ok(splits) => group_splits.extend(splits),
                Err(e) => {
                    eprintln!("Cannot balance transaction {}: {}", tx.tx_guid, e);
                    group_failed += 1;
                }
            }
        }

        if mode == ApprovalMode::DryRun {
            for split in &group_splits {
                println!(
                    "[DRY RUN] Would add split: {} = {:+.2} ({})",
                    split.account_guid, split.value, split.memo
                );
            }
            outcome.fixed_count += group.transactions.len() - group_failed;
            outcome.failed_count += group_failed;
            continue;
        }

        // Backup once, before the first group that actually mutates
        if outcome.backup_path.is_none() {
            let backup = book.create_backup()?;
            println!("Backup created: {}", backup.display());
            outcome.backup_path = Some(backup);
        }

        // One SQL transaction per group
        match book.append_splits(&group_splits) {
            Ok(()) => {
                println!("Saved changes for group {}/{}", i + 1, groups.len());
                outcome.fixed_count += group.transactions.len() - group_failed;
                outcome.failed_count += group_failed;
            }
            Err(e) => {
                eprintln!("Error saving group {}/{}: {}", i + 1, groups.len(), e);
                outcome.failed_count += group.transactions.len();
            }
        }
    }

    Ok(outcome)
}

/// Full balancing workflow: analyze, filter, group, check preconditions,
/// then process groups with approval.
pub fn run_balance_workflow(
    book: &mut LedgerBook,
    catalog: &EntityCatalog,
    config: &LedgerConfig,
    filters: &FixableFilters,
    mode: ApprovalMode,
) -> Result<BalanceOutcome> {
    println!("Analyzing cross-entity transactions...");
    let analysis = analyze_cross_entity(book, catalog, config, None)?;

    let fixable = identify_fixable(&analysis, catalog, config, filters);
    if fixable.is_empty() {
        println!("No fixable transactions found.");
        println!("(Looking for 2-split cross-entity transactions with imbalances)");
        return Ok(BalanceOutcome {
            fixed_count: 0,
            failed_count: 0,
            backup_path: None,
        });
    }
    println!("Found {} fixable transaction(s)", fixable.len());

    let equity_map = find_equity_accounts(book, catalog)?;
    let groups = group_transactions(fixable);
    println!("Created {} group(s) for approval", groups.len());

    check_preconditions(&groups, &equity_map, config)?;

    balance_groups(book, &groups, &equity_map, mode)
}

/// Blocking y/n prompt on stdin; defaults to yes
fn confirm(prompt: &str) -> bool {
    print!("{} [Y/n] ", prompt);
    let _ = std::io::stdout().flush();

    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    let answer = answer.trim().to_lowercase();
    answer.is_empty() || answer == "y" || answer == "yes"
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::fixtures::*;
    use crate::book::AccessMode;
    use crate::entity_map::{EntityCatalog, EntityKind};

    fn test_catalog() -> EntityCatalog {
        let mut catalog = EntityCatalog::new();
        catalog.add_entity("alpha", "Alpha LLC", EntityKind::Business).unwrap();
        catalog.add_entity("beta", "Beta LLC", EntityKind::Business).unwrap();
        catalog.set_patterns("alpha", vec![r"(?i)alpha".to_string()]).unwrap();
        catalog.set_patterns("beta", vec![r"(?i)beta".to_string()]).unwrap();
        // Clearing accounts mention BOTH entity names ("Equity:Beta:Money In
        // (Alpha)"), so they are pinned explicitly, as a real catalog would
        catalog.add_account_mapping("alpha-in", "alpha").unwrap();
        catalog.add_account_mapping("alpha-out", "alpha").unwrap();
        catalog.add_account_mapping("beta-in", "beta").unwrap();
        catalog.add_account_mapping("beta-out", "beta").unwrap();
        catalog
    }

    /// Book where alpha's expenses ride on beta's card, with clearing
    /// accounts provisioned for both entities
    fn provisioned_book(book: crate::book::LedgerBook) -> crate::book::LedgerBook {
        insert_account(&book, "alpha-exp", "Expenses:Alpha:Supplies", "EXPENSE", None, false);
        insert_account(&book, "beta-card", "Liabilities:Beta Card", "CREDIT", None, false);
        insert_account(&book, "alpha-in", "Equity:Alpha:Money In (Beta)", "EQUITY", None, false);
        insert_account(&book, "alpha-out", "Equity:Alpha:Money Out (Beta)", "EQUITY", None, false);
        insert_account(&book, "beta-in", "Equity:Beta:Money In (Alpha)", "EQUITY", None, false);
        insert_account(&book, "beta-out", "Equity:Beta:Money Out (Alpha)", "EQUITY", None, false);
        book
    }

    fn analysis_for(book: &crate::book::LedgerBook, catalog: &EntityCatalog) -> CrossEntityAnalysis {
        crate::cross_entity::analyze_cross_entity(book, catalog, &LedgerConfig::new(), None).unwrap()
    }

    #[test]
    fn test_find_equity_accounts() {
        let book = provisioned_book(memory_book(AccessMode::ReadOnly));
        let catalog = test_catalog();

        let equity_map = find_equity_accounts(&book, &catalog).unwrap();

        let alpha = &equity_map["alpha"];
        assert!(alpha.has_both_accounts());
        assert_eq!(alpha.money_in_guid.as_deref(), Some("alpha-in"));
        assert_eq!(alpha.money_out_guid.as_deref(), Some("alpha-out"));
        assert!(equity_map["beta"].has_both_accounts());

        println!("✅ Equity account discovery test passed");
    }

    #[test]
    fn test_identify_fixable_filters() {
        let book = provisioned_book(memory_book(AccessMode::ReadOnly));
        // Fixable: 2 splits, 2 entities, significant imbalance
        insert_transaction(
            &book,
            "tx-fixable",
            "2025-01-10 10:59:00",
            "Shared swipe",
            &[("alpha-exp", 50.0), ("beta-card", -50.0)],
        );
        // 3 splits: not fixable
        insert_transaction(
            &book,
            "tx-three",
            "2025-01-11 10:59:00",
            "Three splits",
            &[("alpha-exp", 30.0), ("alpha-exp", 20.0), ("beta-card", -50.0)],
        );

        let catalog = test_catalog();
        let config = LedgerConfig::new();
        let analysis = analysis_for(&book, &catalog);

        let fixable = identify_fixable(&analysis, &catalog, &config, &FixableFilters::default());
        assert_eq!(fixable.len(), 1);
        assert_eq!(fixable[0].tx_guid, "tx-fixable");

        // Entity filter excludes non-participants
        let filters = FixableFilters {
            entity: Some("alpha".to_string()),
            ..FixableFilters::default()
        };
        assert_eq!(identify_fixable(&analysis, &catalog, &config, &filters).len(), 1);

        let filters = FixableFilters {
            date_from: Some(chrono::NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()),
            ..FixableFilters::default()
        };
        assert!(identify_fixable(&analysis, &catalog, &config, &filters).is_empty());

        println!("✅ Fixable identification test passed");
    }

    #[test]
    fn test_structural_entities_excluded_from_fixable() {
        let book = memory_book(AccessMode::ReadOnly);
        insert_account(&book, "alpha-exp", "Expenses:Alpha:Misc", "EXPENSE", None, false);
        insert_account(&book, "shared", "Shared Bucket", "BANK", None, false);

        let mut catalog = test_catalog();
        // Map the shared bucket to a structural bookkeeping entity
        catalog.add_entity("holding", "Holding Bucket", EntityKind::Structural).unwrap();
        catalog.add_account_mapping("shared", "holding").unwrap();

        insert_transaction(
            &book,
            "tx1",
            "2025-01-10 10:59:00",
            "Alpha vs bucket",
            &[("alpha-exp", 40.0), ("shared", -40.0)],
        );

        let config = LedgerConfig::new();
        let analysis = analysis_for(&book, &catalog);
        assert_eq!(analysis.total_cross_entity_transactions(), 1);

        let fixable = identify_fixable(&analysis, &catalog, &config, &FixableFilters::default());
        assert!(fixable.is_empty());

        println!("✅ Structural exclusion test passed");
    }

    #[test]
    fn test_grouping_chunks_and_order() {
        let book = provisioned_book(memory_book(AccessMode::ReadOnly));
        // 12 fixable transactions in one (pair, account) bucket -> 9 + 3
        for i in 0..12 {
            insert_transaction(
                &book,
                &format!("tx-{:02}", i),
                &format!("2025-01-{:02} 10:59:00", i + 1),
                "Swipe",
                &[("alpha-exp", 10.0 + i as f64), ("beta-card", -(10.0 + i as f64))],
            );
        }

        let catalog = test_catalog();
        let config = LedgerConfig::new();
        let analysis = analysis_for(&book, &catalog);
        let fixable = identify_fixable(&analysis, &catalog, &config, &FixableFilters::default());
        assert_eq!(fixable.len(), 12);

        let groups = group_transactions(fixable.clone());
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.transactions.len() <= MAX_GROUP_SIZE));
        assert_eq!(groups[0].transactions.len(), 9);
        assert_eq!(groups[1].transactions.len(), 3);
        assert_eq!(groups[0].entity_pair, ("alpha".to_string(), "beta".to_string()));
        assert_eq!(groups[0].account_name, "Expenses:Alpha:Supplies");

        // Concatenating the chunks reproduces the date-sorted fixable list
        let mut expected: Vec<_> = fixable.iter().map(|t| t.tx_guid.clone()).collect();
        expected.sort();
        let concatenated: Vec<_> = groups
            .iter()
            .flat_map(|g| g.transactions.iter().map(|t| t.tx_guid.clone()))
            .collect();
        assert_eq!(concatenated, expected); // guids were minted in date order

        println!("✅ Grouping test passed");
    }

    #[test]
    fn test_preconditions_fail_without_clearing_accounts() {
        let book = memory_book(AccessMode::ReadOnly);
        insert_account(&book, "alpha-exp", "Expenses:Alpha:Misc", "EXPENSE", None, false);
        insert_account(&book, "beta-card", "Liabilities:Beta Card", "CREDIT", None, false);
        insert_transaction(
            &book,
            "tx1",
            "2025-01-10 10:59:00",
            "Swipe",
            &[("alpha-exp", 25.0), ("beta-card", -25.0)],
        );

        let catalog = test_catalog();
        let config = LedgerConfig::new();
        let analysis = analysis_for(&book, &catalog);
        let fixable = identify_fixable(&analysis, &catalog, &config, &FixableFilters::default());
        let groups = group_transactions(fixable);
        let equity_map = find_equity_accounts(&book, &catalog).unwrap();

        let err = check_preconditions(&groups, &equity_map, &config).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("alpha: missing 'Money In' account"));
        assert!(message.contains("beta: missing 'Money Out' account"));
        assert!(message.contains("no changes were made"));

        println!("✅ Precondition failure test passed");
    }

    #[test]
    fn test_corrective_splits_two_entity_swipe() {
        // alpha owes beta $50: alpha +50 (expense), beta -50 (card)
        let book = provisioned_book(memory_book(AccessMode::ReadOnly));
        insert_transaction(
            &book,
            "tx1",
            "2025-01-10 10:59:00",
            "Alpha owes beta",
            &[("alpha-exp", 50.0), ("beta-card", -50.0)],
        );

        let catalog = test_catalog();
        let analysis = analysis_for(&book, &catalog);
        let equity_map = find_equity_accounts(&book, &catalog).unwrap();

        let splits = compute_corrective_splits(&analysis.cross_entity_transactions[0], &equity_map)
            .unwrap();
        assert_eq!(splits.len(), 2);

        // Owing alpha's Money In is credited -50, owed beta's Money Out is
        // debited +50
        let plus = splits.iter().find(|s| s.value > 0.0).unwrap();
        let minus = splits.iter().find(|s| s.value < 0.0).unwrap();
        assert_eq!(minus.account_guid, "alpha-in");
        assert!((minus.value + 50.0).abs() < 1e-9);
        assert_eq!(plus.account_guid, "beta-out");
        assert!((plus.value - 50.0).abs() < 1e-9);

        // Four-split transaction sums to zero
        let original_total = analysis.cross_entity_transactions[0].entity_total();
        let new_total: f64 = splits.iter().map(|s| s.value).sum();
        assert!((original_total + new_total).abs() < 1e-9);

        // And each entity's net contribution is zeroed out
        let tx = &analysis.cross_entity_transactions[0];
        let alpha_after = tx.entity_amounts["alpha"] + minus.value;
        let beta_after = tx.entity_amounts["beta"] + plus.value;
        assert!(alpha_after.abs() < 1e-9);
        assert!(beta_after.abs() < 1e-9);

        println!("✅ Corrective splits test passed");
    }

    #[test]
    fn test_balance_workflow_end_to_end() {
        let mut book = provisioned_book(file_book("entity-ledger-balance-test.db"));
        insert_transaction(
            &book,
            "tx1",
            "2025-01-10 10:59:00",
            "Swipe one",
            &[("alpha-exp", 50.0), ("beta-card", -50.0)],
        );
        insert_transaction(
            &book,
            "tx2",
            "2025-01-12 10:59:00",
            "Swipe two",
            &[("alpha-exp", 20.0), ("beta-card", -20.0)],
        );

        let catalog = test_catalog();
        let config = LedgerConfig::new();

        let outcome = run_balance_workflow(
            &mut book,
            &catalog,
            &config,
            &FixableFilters::default(),
            ApprovalMode::AutoApprove,
        )
        .unwrap();

        assert_eq!(outcome.fixed_count, 2);
        assert_eq!(outcome.failed_count, 0);
        let backup = outcome.backup_path.expect("backup created before mutation");
        assert!(backup.exists());

        // Both transactions now carry four splits and net to zero
        let scan = book.scan_transactions().unwrap();
        for tx in &scan.transactions {
            assert_eq!(tx.splits.len(), 4);
            assert!(tx.is_balanced(config.numeric_tolerance));
        }

        // Re-running finds nothing left to fix: the clearing splits resolve
        // to the same entities and cancel the per-entity imbalances
        let analysis = analysis_for(&book, &catalog);
        let fixable = identify_fixable(&analysis, &catalog, &config, &FixableFilters::default());
        assert!(fixable.is_empty());

        let _ = std::fs::remove_file(backup);
        if let Some(path) = book.path() {
            let path = path.to_path_buf();
            drop(book);
            let _ = std::fs::remove_file(path);
        }

        println!("✅ End-to-end balancing test passed");
    }

    #[test]
    fn test_dry_run_makes_no_changes() {
        let mut book = provisioned_book(memory_book(AccessMode::ReadWrite));
        insert_transaction(
            &book,
            "tx1",
            "2025-01-10 10:59:00",
            "Swipe",
            &[("alpha-exp", 50.0), ("beta-card", -50.0)],
        );

        let catalog = test_catalog();
        let config = LedgerConfig::new();

        let outcome = run_balance_workflow(
            &mut book,
            &catalog,
            &config,
            &FixableFilters::default(),
            ApprovalMode::DryRun,
        )
        .unwrap();

        assert_eq!(outcome.fixed_count, 1);
        assert!(outcome.backup_path.is_none());

        let scan = book.scan_transactions().unwrap();
        assert_eq!(scan.transactions[0].splits.len(), 2); // untouched

        println!("✅ Dry-run test passed");
    }
}
