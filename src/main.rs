// Entity Ledger CLI - validate, analyze, and balance multi-entity books
// Hand-rolled argument dispatch; every command takes -f BOOK and most take
// -m MAP (entity catalog JSON, default entity-map.json).

use anyhow::{bail, Context, Result};
use std::env;
use std::path::{Path, PathBuf};

use entity_ledger::{
    analyze_cross_entity, diagnose_empty_reconcile_dates, diff_snapshots,
    generate_balance_sheet, generate_income_statement, generate_trial_balance, parse_date,
    repair_empty_reconcile_dates, run_balance_workflow, scan_unmapped_accounts, validate_book,
    AccessMode, ApprovalMode, BookSnapshot, EntityCatalog, FixableFilters, LedgerBook,
    LedgerConfig,
};

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() || args[0] == "help" || args[0] == "--help" {
        print_usage();
        return;
    }

    let command = args[0].clone();
    let rest = &args[1..];

    let outcome = match command.as_str() {
        "validate" => cmd_validate(rest),
        "entity-scan" => cmd_entity_scan(rest),
        "entity-remap" => cmd_entity_remap(rest),
        "entity-list" => cmd_entity_list(rest),
        "analyze" => cmd_analyze(rest),
        "balance" => cmd_balance(rest),
        "balance-sheet" => cmd_balance_sheet(rest),
        "income-statement" => cmd_income_statement(rest),
        "trial-balance" => cmd_trial_balance(rest),
        "repair" => cmd_repair(rest),
        "snapshot" => cmd_snapshot(rest),
        "diff" => cmd_diff(rest),
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(2);
        }
    };

    match outcome {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("entity-ledger {}", entity_ledger::VERSION);
    println!();
    println!("Usage: entity-ledger <command> [options]");
    println!();
    println!("Commands:");
    println!("  validate          Validate book integrity and entity coverage");
    println!("                      -f BOOK [-m MAP] [--strict] [--format text|json|csv]");
    println!("  entity-scan       List accounts with no entity mapping");
    println!("                      -f BOOK [-m MAP]");
    println!("  entity-remap      Regenerate the account->entity map from the book");
    println!("                      -f BOOK [-m MAP] [-o OUT]");
    println!("  entity-list       Show entity definitions in the catalog");
    println!("                      [-m MAP]");
    println!("  analyze           Analyze cross-entity transactions");
    println!("                      -f BOOK [-m MAP] [--as-of DATE] [--entity KEY]");
    println!("                      [--detail] [--two-split]");
    println!("  balance           Balance 2-split cross-entity transactions");
    println!("                      -f BOOK [-m MAP] [--dry-run] [--yes] [--entity KEY]");
    println!("                      [--from DATE] [--to DATE]");
    println!("  balance-sheet     Balance sheet (strict validation enforced)");
    println!("                      -f BOOK [-m MAP] [--entity KEY] [--as-of DATE] [--csv]");
    println!("  income-statement  Income statement for a period");
    println!("                      -f BOOK [-m MAP] [--entity KEY] --from DATE --to DATE [--csv]");
    println!("  trial-balance     Trial balance with debit/credit columns");
    println!("                      -f BOOK [-m MAP] [--entity KEY] [--as-of DATE] [--csv]");
    println!("  repair            Diagnose (default) or fix empty reconcile dates");
    println!("                      -f BOOK [--apply]");
    println!("  snapshot          Capture book state to JSON");
    println!("                      -f BOOK -o OUT.json");
    println!("  diff              Compare two snapshots");
    println!("                      BEFORE.json AFTER.json");
}

// ============================================================================
// ARGUMENT HELPERS
// ============================================================================

fn flag_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

fn book_path(args: &[String]) -> Result<PathBuf> {
    match flag_value(args, "-f").or_else(|| flag_value(args, "--file")) {
        Some(path) => Ok(PathBuf::from(path)),
        None => bail!("Missing required -f BOOK argument"),
    }
}

fn map_path(args: &[String]) -> PathBuf {
    flag_value(args, "-m")
        .or_else(|| flag_value(args, "--map"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("entity-map.json"))
}

fn load_catalog(args: &[String]) -> Result<EntityCatalog> {
    let path = map_path(args);
    let catalog = EntityCatalog::load(&path)?;
    if catalog.explicit_mapping_count() == 0 && catalog.pattern_count() == 0 {
        eprintln!(
            "Note: entity catalog {} has no mappings; accounts will fall through to the default entity",
            path.display()
        );
    }
    Ok(catalog)
}

fn as_of_or_today(args: &[String]) -> Result<chrono::NaiveDate> {
    match flag_value(args, "--as-of") {
        Some(raw) => parse_date(&raw),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

fn cmd_validate(args: &[String]) -> Result<i32> {
    let book = LedgerBook::open(&book_path(args)?, AccessMode::ReadOnly)?;
    let catalog = load_catalog(args)?;
    let config = LedgerConfig::new();
    let strict = has_flag(args, "--strict");

    let result = validate_book(&book, &catalog, &config, strict)?;

    match flag_value(args, "--format").as_deref() {
        Some("json") => println!("{}", result.to_json()?),
        Some("csv") => print!("{}", result.to_csv()?),
        _ => println!("{}", result.to_text()),
    }

    Ok(if result.has_errors() { 1 } else { 0 })
}

fn cmd_entity_scan(args: &[String]) -> Result<i32> {
    let book = LedgerBook::open(&book_path(args)?, AccessMode::ReadOnly)?;
    let catalog = load_catalog(args)?;

    let unmapped = scan_unmapped_accounts(&book, &catalog)?;
    if unmapped.is_empty() {
        println!("✓ All accounts are mapped to entities");
        return Ok(0);
    }

    println!("{} account(s) with no entity mapping:", unmapped.len());
    for account in &unmapped {
        println!("  {}  {}", account.guid, account.full_name);
    }
    println!();
    println!("Run 'entity-ledger entity-remap -f <book>' to regenerate the map.");

    Ok(0)
}

fn cmd_entity_remap(args: &[String]) -> Result<i32> {
    let book = LedgerBook::open(&book_path(args)?, AccessMode::ReadOnly)?;
    let mut catalog = load_catalog(args)?;

    let accounts = book.accounts()?;
    let assigned = catalog.remap(&accounts);
    println!("Assigned {} account(s) across the account tree", assigned);

    let out_path = flag_value(args, "-o")
        .map(PathBuf::from)
        .unwrap_or_else(|| map_path(args));
    catalog.save(&out_path)?;
    println!("✓ Entity map saved to {}", out_path.display());

    Ok(0)
}

fn cmd_entity_list(args: &[String]) -> Result<i32> {
    let catalog = load_catalog(args)?;

    println!("{:<20} {:<30} {:<12}", "Key", "Label", "Kind");
    println!("{}", "-".repeat(62));
    for entity in catalog.entities() {
        let kind = match entity.kind {
            entity_ledger::EntityKind::Individual => "individual",
            entity_ledger::EntityKind::Business => "business",
            entity_ledger::EntityKind::Structural => "structural",
        };
        println!("{:<20} {:<30} {:<12}", entity.key, entity.label, kind);
    }
    println!();
    println!(
        "{} explicit mapping(s), {} pattern(s); default entity: {}",
        catalog.explicit_mapping_count(),
        catalog.pattern_count(),
        catalog.default_entity()
    );

    Ok(0)
}

fn cmd_analyze(args: &[String]) -> Result<i32> {
    let book = LedgerBook::open(&book_path(args)?, AccessMode::ReadOnly)?;
    let catalog = load_catalog(args)?;
    let config = LedgerConfig::new();

    let as_of = match flag_value(args, "--as-of") {
        Some(raw) => Some(parse_date(&raw)?),
        None => None,
    };

    let analysis = analyze_cross_entity(&book, &catalog, &config, as_of)?;

    println!("{}", analysis.format_summary());
    if let Some(entity) = flag_value(args, "--entity") {
        let involving = analysis.transactions_for_entity(&entity);
        println!();
        println!(
            "{} cross-entity transaction(s) involve '{}':",
            involving.len(),
            entity
        );
        for tx in involving {
            println!(
                "  {}  {:>12.2}  {}",
                tx.post_date,
                tx.max_entity_imbalance(),
                tx.description
            );
        }
    }
    if has_flag(args, "--detail") {
        println!();
        println!("{}", analysis.format_detail());
    }
    if has_flag(args, "--two-split") {
        println!();
        println!("{}", analysis.format_two_split_listing());
    }

    Ok(0)
}

fn cmd_balance(args: &[String]) -> Result<i32> {
    let dry_run = has_flag(args, "--dry-run");
    let mode = if dry_run {
        ApprovalMode::DryRun
    } else if has_flag(args, "--yes") {
        ApprovalMode::AutoApprove
    } else {
        ApprovalMode::Interactive
    };

    let access = if dry_run { AccessMode::ReadOnly } else { AccessMode::ReadWrite };
    let mut book = LedgerBook::open(&book_path(args)?, access)?;
    let catalog = load_catalog(args)?;
    let config = LedgerConfig::new();

    let filters = FixableFilters {
        date_from: flag_value(args, "--from").map(|d| parse_date(&d)).transpose()?,
        date_to: flag_value(args, "--to").map(|d| parse_date(&d)).transpose()?,
        entity: flag_value(args, "--entity"),
    };

    let outcome = run_balance_workflow(&mut book, &catalog, &config, &filters, mode)?;

    println!();
    println!(
        "Done: {} transaction(s) fixed, {} failed",
        outcome.fixed_count, outcome.failed_count
    );
    if let Some(backup) = &outcome.backup_path {
        println!("Backup: {}", backup.display());
    }

    Ok(if outcome.failed_count > 0 { 1 } else { 0 })
}

fn cmd_balance_sheet(args: &[String]) -> Result<i32> {
    let book = LedgerBook::open(&book_path(args)?, AccessMode::ReadOnly)?;
    let catalog = load_catalog(args)?;
    let config = LedgerConfig::new();

    let entity = flag_value(args, "--entity");
    let sheet = generate_balance_sheet(
        &book,
        &catalog,
        &config,
        entity.as_deref(),
        as_of_or_today(args)?,
    )?;

    if has_flag(args, "--csv") {
        print!("{}", sheet.to_csv()?);
    } else {
        println!("{}", sheet.to_text());
    }

    Ok(0)
}

fn cmd_income_statement(args: &[String]) -> Result<i32> {
    let book = LedgerBook::open(&book_path(args)?, AccessMode::ReadOnly)?;
    let catalog = load_catalog(args)?;
    let config = LedgerConfig::new();

    let from = flag_value(args, "--from").context("Missing required --from DATE")?;
    let to = flag_value(args, "--to").context("Missing required --to DATE")?;

    let entity = flag_value(args, "--entity");
    let statement = generate_income_statement(
        &book,
        &catalog,
        &config,
        entity.as_deref(),
        parse_date(&from)?,
        parse_date(&to)?,
    )?;

    if has_flag(args, "--csv") {
        print!("{}", statement.to_csv()?);
    } else {
        println!("{}", statement.to_text());
    }

    Ok(0)
}

fn cmd_trial_balance(args: &[String]) -> Result<i32> {
    let book = LedgerBook::open(&book_path(args)?, AccessMode::ReadOnly)?;
    let catalog = load_catalog(args)?;
    let config = LedgerConfig::new();

    let entity = flag_value(args, "--entity");
    let trial = generate_trial_balance(
        &book,
        &catalog,
        &config,
        entity.as_deref(),
        as_of_or_today(args)?,
    )?;

    if has_flag(args, "--csv") {
        print!("{}", trial.to_csv()?);
    } else {
        println!("{}", trial.to_text());
    }

    Ok(0)
}

fn cmd_repair(args: &[String]) -> Result<i32> {
    let path = book_path(args)?;

    if !has_flag(args, "--apply") {
        let book = LedgerBook::open(&path, AccessMode::ReadOnly)?;
        let (count, descriptions) = diagnose_empty_reconcile_dates(&book)?;
        if count == 0 {
            println!("✓ No empty reconcile_date fields found");
        } else {
            println!("{} split(s) with empty reconcile_date in:", count);
            for description in descriptions {
                println!("  - {}", description);
            }
            println!();
            println!("Run again with --apply to repair (a backup is taken first).");
        }
        return Ok(0);
    }

    let mut book = LedgerBook::open(&path, AccessMode::ReadWrite)?;
    let result = repair_empty_reconcile_dates(&mut book)?;
    println!("{}", result.message);
    if let Some(backup) = &result.backup_path {
        println!("Backup: {}", backup.display());
    }

    Ok(0)
}

fn cmd_snapshot(args: &[String]) -> Result<i32> {
    let book = LedgerBook::open(&book_path(args)?, AccessMode::ReadOnly)?;
    let out = flag_value(args, "-o").context("Missing required -o OUT.json argument")?;

    let snapshot = BookSnapshot::capture(&book)?;
    snapshot.save(Path::new(&out))?;

    println!(
        "✓ Snapshot saved: {} account(s), {} transaction(s), {} error(s)",
        snapshot.accounts.len(),
        snapshot.transactions.len(),
        snapshot.error_count
    );
    println!("Fingerprint: {}", snapshot.fingerprint);

    Ok(0)
}

fn cmd_diff(args: &[String]) -> Result<i32> {
    let positional: Vec<&String> = args.iter().filter(|a| !a.starts_with('-')).collect();
    if positional.len() != 2 {
        bail!("Usage: entity-ledger diff BEFORE.json AFTER.json");
    }

    let before = BookSnapshot::load(Path::new(positional[0]))?;
    let after = BookSnapshot::load(Path::new(positional[1]))?;

    let diff = diff_snapshots(&before, &after);
    println!("{}", diff.format_text());

    Ok(if diff.is_empty() { 0 } else { 1 })
}
