//! `opslog migrate` command implementation
//!
//! Connects to a store, plans the backfill, applies it (or only reports it
//! under `--dry-run`), and prints a summary. The exit code is nonzero when
//! any symbol version failed to migrate.

use crate::error::{CliError, Result};
use colored::Colorize;
use opslog_core::migrate::{MigrationRunner, PlanAction};
use opslog_core::{AuditLogger, LocalStore};
use std::path::PathBuf;

/// Execute the migration
pub async fn run(
    uri: String,
    library: String,
    dry_run: bool,
    migration_user: String,
    audit_log: PathBuf,
) -> Result<()> {
    println!(
        "{} Migrating library '{}' at {}",
        "→".cyan(),
        library.bold(),
        uri
    );
    println!("  Migration user: {}", migration_user);
    println!("  Audit log: {}", audit_log.display());
    if dry_run {
        println!("  {}", "DRY RUN - no changes will be made".yellow().bold());
    }
    println!();

    let audit = AuditLogger::new(&audit_log, true)?;
    let store = LocalStore::open_uri(&uri, &library)?;

    let report = MigrationRunner::new(&store, &audit, &migration_user)
        .dry_run(dry_run)
        .run()
        .await?;

    if dry_run {
        for entry in &report.plan {
            let action = match entry.action {
                PlanAction::Tag => "would tag".yellow(),
                PlanAction::Skip => "skip".bright_black(),
            };
            println!(
                "  {} {}@v{}",
                action,
                entry.symbol,
                entry.version
            );
        }
        if !report.plan.is_empty() {
            println!();
        }
    }

    let summary = &report.summary;
    println!("{}", "Migration summary:".bold());
    println!("  Symbols examined:  {}", summary.symbols);
    println!("  Versions examined: {}", summary.versions);
    if dry_run {
        println!("  Would tag:         {}", summary.tagged);
    } else {
        println!("  Tagged:            {}", summary.tagged);
    }
    println!("  Skipped:           {}", summary.skipped);
    println!("  Failed:            {}", summary.failed());

    if !summary.failures.is_empty() {
        println!();
        println!("{}", "Failures:".red().bold());
        for failure in &summary.failures {
            match failure.version {
                Some(version) => {
                    println!("  {} {}@v{}: {}", "✗".red(), failure.symbol, version, failure.error)
                }
                None => println!("  {} {}: {}", "✗".red(), failure.symbol, failure.error),
            }
        }
        return Err(CliError::MigrationFailed(summary.failed()));
    }

    println!();
    if dry_run {
        println!("{} Dry run complete, no changes were made", "✓".green());
    } else {
        println!("{} Migration complete", "✓".green());
    }

    Ok(())
}
