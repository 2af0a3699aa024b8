//! `opslog log` command implementation
//!
//! Read-only views over the audit log file.

use crate::error::{CliError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use colored::Colorize;
use opslog_core::{AuditLogger, LogFilter, OperationKind};
use std::path::PathBuf;

/// Flag values for `opslog log list`
#[derive(Debug)]
pub struct ListArgs {
    pub audit_log: PathBuf,
    pub limit: usize,
    pub actor: Option<String>,
    pub operation: Option<String>,
    pub library: Option<String>,
    pub symbol: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
}

/// List audit records matching the given filters, oldest first
pub async fn list(args: ListArgs) -> Result<()> {
    if !args.audit_log.exists() {
        println!(
            "{} No audit log found at '{}'",
            "→".cyan(),
            args.audit_log.display()
        );
        return Ok(());
    }

    let filter = build_filter(&args)?;
    let logger = AuditLogger::new(&args.audit_log, false)?;
    let outcome = logger.read_logs(args.limit, Some(&filter))?;

    if outcome.records.is_empty() {
        println!("{} No matching audit records", "→".cyan());
    } else {
        println!(
            "{} Showing {} most recent matching record(s):",
            "→".cyan(),
            outcome.records.len()
        );
        println!();

        for record in &outcome.records {
            let ts = record
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Micros, true);
            println!(
                "{} {} {}",
                record.operation.as_str().bold(),
                record.actor.cyan(),
                ts.dimmed()
            );
            println!("  {} {}", "Library:".bright_black(), record.library);
            if !record.symbols.is_empty() {
                println!(
                    "  {} {}",
                    "Symbols:".bright_black(),
                    record.symbols.join(", ")
                );
            }
            if let Some(ref metadata) = record.metadata {
                println!("  {} {}", "Context:".bright_black(), metadata);
            }
        }
    }

    if outcome.malformed_lines > 0 {
        println!();
        println!(
            "{} {} malformed line(s) skipped",
            "⚠".yellow(),
            outcome.malformed_lines
        );
    }

    Ok(())
}

fn build_filter(args: &ListArgs) -> Result<LogFilter> {
    let mut filter = LogFilter::new();

    if let Some(ref actor) = args.actor {
        filter = filter.actor(actor);
    }
    if let Some(ref operation) = args.operation {
        let kind: OperationKind = operation
            .parse()
            .map_err(CliError::InvalidArgument)?;
        filter = filter.operation(kind);
    }
    if let Some(ref library) = args.library {
        filter = filter.library(library);
    }
    if let Some(ref symbol) = args.symbol {
        filter = filter.symbol(symbol);
    }
    if let Some(ref since) = args.since {
        filter = filter.since(parse_instant(since)?);
    }
    if let Some(ref until) = args.until {
        filter = filter.until(parse_instant(until)?);
    }

    Ok(filter)
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            CliError::invalid_argument(format!(
                "'{}' is not an RFC 3339 timestamp (e.g. 2026-01-15T00:00:00Z): {}",
                s, e
            ))
        })
}
