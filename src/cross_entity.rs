// ⚖️ Cross-Entity Analyzer - Transactions that straddle entities
// Walks all transactions, finds the ones whose splits resolve to more than
// one entity (the shared-credit-card case), computes each entity's net
// signed contribution, and reduces pairwise flows into "who owes whom"
// inter-entity balances.
//
// Splits that resolve to no entity are excluded from the entity set: they
// neither trigger false cross-entity detection nor distort imbalance totals.

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::book::LedgerBook;
use crate::config::LedgerConfig;
use crate::entity_map::EntityCatalog;

// ============================================================================
// DERIVED TYPES
// ============================================================================

/// One split of a cross-entity transaction, flattened for display and
/// grouping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitAttribution {
    /// Resolved entity, None when the split is unattributable
    pub entity: Option<String>,

    /// Full account path of the split's account
    pub account_name: String,

    pub value: f64,
}

/// A transaction whose splits touch two or more entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossEntityTransaction {
    pub tx_guid: String,
    pub description: String,
    pub post_date: NaiveDate,

    /// Distinct entities touched by attributable splits
    pub entities_involved: BTreeSet<String>,

    /// Net signed amount per entity (positive = received value)
    pub entity_amounts: BTreeMap<String, f64>,

    /// All splits of the source transaction, in original order
    pub splits_info: Vec<SplitAttribution>,
}

impl CrossEntityTransaction {
    /// Sum over all entity amounts - matches the raw split sum when every
    /// split was attributable
    pub fn entity_total(&self) -> f64 {
        self.entity_amounts.values().sum()
    }

    pub fn is_balanced_per_entity(&self, tolerance: f64) -> bool {
        self.entity_total().abs() <= tolerance
    }

    /// Largest absolute per-entity amount - the size of the inter-entity
    /// debt this transaction represents
    pub fn max_entity_imbalance(&self) -> f64 {
        self.entity_amounts
            .values()
            .map(|v| v.abs())
            .fold(0.0, f64::max)
    }

    pub fn has_significant_imbalance(&self, tolerance: f64) -> bool {
        self.max_entity_imbalance() > tolerance
    }
}

/// Net balance between one ordered pair of entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterEntityBalance {
    /// Entity that owes money
    pub from_entity: String,

    /// Entity that is owed money
    pub to_entity: String,

    /// Net amount owed (always positive)
    pub amount: f64,

    /// Number of transactions contributing to this balance
    pub transaction_count: usize,
}

// ============================================================================
// ANALYSIS
// ============================================================================

/// Complete analysis of cross-entity transactions in one book.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrossEntityAnalysis {
    pub cross_entity_transactions: Vec<CrossEntityTransaction>,

    /// Global net imbalance per entity, accumulated over all cross-entity
    /// transactions
    pub entity_imbalances: BTreeMap<String, f64>,

    /// Pairwise balances, one per (from, to) pair with a significant flow
    pub inter_entity_balances: Vec<InterEntityBalance>,

    pub as_of_date: Option<NaiveDate>,
}

impl CrossEntityAnalysis {
    pub fn total_cross_entity_transactions(&self) -> usize {
        self.cross_entity_transactions.len()
    }

    /// Entities whose accumulated imbalance exceeds tolerance
    pub fn entities_with_imbalances(&self, tolerance: f64) -> Vec<&str> {
        self.entity_imbalances
            .iter()
            .filter(|(_, amount)| amount.abs() > tolerance)
            .map(|(entity, _)| entity.as_str())
            .collect()
    }

    /// Cross-entity transactions touching the given entity
    pub fn transactions_for_entity(&self, entity_key: &str) -> Vec<&CrossEntityTransaction> {
        self.cross_entity_transactions
            .iter()
            .filter(|tx| tx.entities_involved.contains(entity_key))
            .collect()
    }

    // ========================================================================
    // RENDERING
    // ========================================================================

    /// Human-readable summary: counts, per-entity imbalances, who owes whom
    pub fn format_summary(&self) -> String {
        let mut lines = Vec::new();
        lines.push("=".repeat(80));
        lines.push("CROSS-ENTITY TRANSACTION ANALYSIS".to_string());
        lines.push("=".repeat(80));
        lines.push(String::new());

        if let Some(date) = self.as_of_date {
            lines.push(format!("Analysis Date: {}", date));
            lines.push(String::new());
        }

        lines.push(format!(
            "Total Cross-Entity Transactions: {}",
            self.total_cross_entity_transactions()
        ));
        lines.push(String::new());

        lines.push("-".repeat(80));
        lines.push("ENTITY IMBALANCES FROM CROSS-ENTITY TRANSACTIONS".to_string());
        lines.push("-".repeat(80));

        if self.entity_imbalances.is_empty() {
            lines.push("No entity imbalances detected.".to_string());
        } else {
            lines.push(format!("{:<30} {:>15} {:<20}", "Entity", "Imbalance", "Status"));
            for (entity, imbalance) in &self.entity_imbalances {
                if imbalance.abs() > 0.01 {
                    let status = if *imbalance > 0.0 { "Owes others" } else { "Owed by others" };
                    lines.push(format!("{:<30} {:>15.2} {:<20}", entity, imbalance, status));
                }
            }
        }
        lines.push(String::new());

        if !self.inter_entity_balances.is_empty() {
            lines.push("-".repeat(80));
            lines.push("INTER-ENTITY BALANCES (Who Owes Whom)".to_string());
            lines.push("-".repeat(80));
            lines.push(format!(
                "{:<25} {:<25} {:>15} {:>8}",
                "From Entity", "To Entity", "Amount", "Txns"
            ));

            let mut balances: Vec<&InterEntityBalance> = self.inter_entity_balances.iter().collect();
            balances.sort_by(|a, b| b.amount.partial_cmp(&a.amount).unwrap_or(std::cmp::Ordering::Equal));
            for balance in balances {
                lines.push(format!(
                    "{:<25} {:<25} {:>15.2} {:>8}",
                    balance.from_entity, balance.to_entity, balance.amount, balance.transaction_count
                ));
            }
            lines.push(String::new());
        }

        lines.push("=".repeat(80));
        lines.join("\n")
    }

    /// Detail listing, largest per-transaction imbalance first
    pub fn format_detail(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!(
            "{:<12} {:>12}  {:<28} {}",
            "Date", "Imbalance", "Entities", "Description"
        ));
        lines.push("-".repeat(100));

        let mut transactions: Vec<&CrossEntityTransaction> =
            self.cross_entity_transactions.iter().collect();
        transactions.sort_by(|a, b| {
            b.max_entity_imbalance()
                .partial_cmp(&a.max_entity_imbalance())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for tx in transactions {
            let entities = tx
                .entities_involved
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(" / ");
            lines.push(format!(
                "{:<12} {:>12.2}  {:<28} {}",
                tx.post_date.to_string(),
                tx.max_entity_imbalance(),
                entities,
                tx.description
            ));
        }

        lines.join("\n")
    }

    /// Two-column listing of the exactly-2-split transactions (the common
    /// shared-card-swipe case), sorted by the trailing path segment of the
    /// second account - usually the discriminating part of a deep path
    pub fn format_two_split_listing(&self) -> String {
        let mut rows: Vec<(&CrossEntityTransaction, &SplitAttribution, &SplitAttribution)> = self
            .cross_entity_transactions
            .iter()
            .filter(|tx| tx.splits_info.len() == 2)
            .map(|tx| (tx, &tx.splits_info[0], &tx.splits_info[1]))
            .collect();

        rows.sort_by(|a, b| leaf_name(&a.2.account_name).cmp(leaf_name(&b.2.account_name)));

        let mut lines = Vec::new();
        lines.push(format!(
            "{:<12} {:>12}  {:<30} {:<30}",
            "Date", "Amount", "First Account", "Second Account"
        ));
        lines.push("-".repeat(90));
        for (tx, first, second) in rows {
            lines.push(format!(
                "{:<12} {:>12.2}  {:<30} {:<30}",
                tx.post_date.to_string(),
                first.value.abs(),
                leaf_name(&first.account_name),
                leaf_name(&second.account_name),
            ));
        }

        lines.join("\n")
    }
}

/// Trailing segment of a colon path
fn leaf_name(full_name: &str) -> &str {
    full_name.rsplit(':').next().unwrap_or(full_name)
}

// ============================================================================
// ANALYZER
// ============================================================================

/// Analyze all transactions for cross-entity splits.
///
/// Transactions are optionally filtered to post_date <= as_of_date. Each
/// split is resolved through the catalog's partial matcher; unattributable
/// splits stay out of the entity set. Read defects were already surfaced by
/// validation and are ignored here.
pub fn analyze_cross_entity(
    book: &LedgerBook,
    catalog: &EntityCatalog,
    config: &LedgerConfig,
    as_of_date: Option<NaiveDate>,
) -> Result<CrossEntityAnalysis> {
    let mut analysis = CrossEntityAnalysis {
        as_of_date,
        ..CrossEntityAnalysis::default()
    };

    // Account lookup: guid -> (full name, resolved entity or None)
    let mut account_lookup: HashMap<String, (String, Option<String>)> = HashMap::new();
    for account in book.accounts()? {
        let entity = catalog
            .match_account(&account.guid, &account.full_name)
            .map(|k| k.to_string());
        account_lookup.insert(account.guid.clone(), (account.full_name, entity));
    }

    // Directed flows: (from=net-negative entity, to=net-positive entity)
    let mut flows: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();

    let scan = book.scan_transactions()?;
    for tx in &scan.transactions {
        let post_date = match NaiveDate::parse_from_str(&tx.post_date, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => continue,
        };
        if let Some(cutoff) = as_of_date {
            if post_date > cutoff {
                continue;
            }
        }

        let mut entity_amounts: BTreeMap<String, f64> = BTreeMap::new();
        let mut entities_in_tx: BTreeSet<String> = BTreeSet::new();
        let mut splits_info = Vec::new();

        for split in &tx.splits {
            let (account_name, entity) = match account_lookup.get(&split.account_guid) {
                Some((name, entity)) => (name.clone(), entity.clone()),
                None => (format!("(unknown account {})", split.account_guid), None),
            };

            if let Some(entity_key) = &entity {
                entities_in_tx.insert(entity_key.clone());
                *entity_amounts.entry(entity_key.clone()).or_insert(0.0) += split.value;
            }

            splits_info.push(SplitAttribution {
                entity,
                account_name,
                value: split.value,
            });
        }

        if entities_in_tx.len() < 2 {
            continue;
        }

        // Accumulate global per-entity imbalances
        for (entity, amount) in &entity_amounts {
            *analysis.entity_imbalances.entry(entity.clone()).or_insert(0.0) += amount;
        }

        // A positive entity received value from each negative entity
        for (entity, amount) in &entity_amounts {
            for (other_entity, other_amount) in &entity_amounts {
                if entity != other_entity && *amount > 0.0 && *other_amount < 0.0 {
                    flows
                        .entry((other_entity.clone(), entity.clone()))
                        .or_default()
                        .push(*amount);
                }
            }
        }

        analysis.cross_entity_transactions.push(CrossEntityTransaction {
            tx_guid: tx.guid.clone(),
            description: tx.description.clone(),
            post_date,
            entities_involved: entities_in_tx,
            entity_amounts,
            splits_info,
        });
    }

    // Reduce flows to one balance per pair, keeping significant ones only
    for ((from_entity, to_entity), amounts) in flows {
        let total: f64 = amounts.iter().sum();
        if total > config.numeric_tolerance {
            analysis.inter_entity_balances.push(InterEntityBalance {
                from_entity,
                to_entity,
                amount: total,
                transaction_count: amounts.len(),
            });
        }
    }

    Ok(analysis)
}

// ============================================================================
// TESTS
// ============================================================================
