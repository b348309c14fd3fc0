// Entity Ledger - Core Library
// Validation, entity resolution, and cross-entity balancing for multi-entity
// GnuCash books. Exposes all modules for use in the CLI and tests.

pub mod balance_xacts;
pub mod book;
pub mod config;
pub mod cross_entity;
pub mod entity_map;
pub mod repair;
pub mod reports;
pub mod snapshot;
pub mod validate;

// Re-export commonly used types
pub use balance_xacts::{
    find_equity_accounts, group_transactions, identify_fixable, run_balance_workflow,
    ApprovalMode, BalanceOutcome, EquityAccounts, FixableFilters, TransactionGroup,
};
pub use book::{
    parse_date, AccessMode, Account, AccountClass, LedgerBook, NewSplit, ReadDefect, Split,
    Transaction, TransactionScan,
};
pub use config::LedgerConfig;
pub use cross_entity::{
    analyze_cross_entity, CrossEntityAnalysis, CrossEntityTransaction, InterEntityBalance,
    SplitAttribution,
};
pub use entity_map::{
    EntityCatalog, EntityDefinition, EntityKind, DEFAULT_ENTITY_KEY, PLACEHOLDER_ENTITY_KEY,
};
pub use repair::{diagnose_empty_reconcile_dates, repair_empty_reconcile_dates, RepairResult};
pub use reports::{
    generate_balance_sheet, generate_income_statement, generate_trial_balance, BalanceSheet,
    IncomeStatement, TrialBalance,
};
pub use snapshot::{diff_snapshots, BookSnapshot, SnapshotDiff};
pub use validate::{
    scan_unmapped_accounts, validate_book, validate_for_reporting, Severity, ValidationProblem,
    ValidationResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
