//! opslog CLI Library
//!
//! Command-line surface for the opslog audit system:
//!
//! - **Migration**: backfill audit metadata onto pre-existing symbol
//!   versions (`opslog migrate`)
//! - **Log Inspection**: query the audit log (`opslog log list`)

pub mod commands;
pub mod error;

// Re-export commonly used types
pub use error::{CliError, Result};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// opslog - actor attribution and operation logging for versioned data stores
#[derive(Parser, Debug)]
#[command(name = "opslog")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Backfill audit metadata onto existing symbol versions
    Migrate {
        /// Store connection URI (e.g. "file:///data/stores" or "mem://")
        uri: String,

        /// Library to migrate
        library: String,

        /// Report the plan without making changes
        #[arg(long)]
        dry_run: bool,

        /// User ID attributed to migrated versions
        #[arg(long, default_value = opslog_core::migrate::DEFAULT_MIGRATION_USER)]
        migration_user: String,

        /// Audit log recording the migration
        #[arg(long, env = "OPSLOG_AUDIT_LOG", default_value = "audit.log")]
        audit_log: PathBuf,
    },

    /// Inspect the audit log
    Log {
        #[command(subcommand)]
        command: LogCommand,
    },
}

/// Audit log subcommands
#[derive(Subcommand, Debug)]
pub enum LogCommand {
    /// List audit records, oldest first
    List {
        /// Audit log to read
        #[arg(long, env = "OPSLOG_AUDIT_LOG", default_value = "audit.log")]
        audit_log: PathBuf,

        /// Maximum number of records to show (most recent)
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Only records by this actor
        #[arg(long)]
        actor: Option<String>,

        /// Only records of this operation kind (e.g. "write", "migrate")
        #[arg(long)]
        operation: Option<String>,

        /// Only records for this library
        #[arg(long)]
        library: Option<String>,

        /// Only records touching this symbol
        #[arg(long)]
        symbol: Option<String>,

        /// Only records at or after this instant (RFC 3339)
        #[arg(long)]
        since: Option<String>,

        /// Only records at or before this instant (RFC 3339)
        #[arg(long)]
        until: Option<String>,
    },
}
