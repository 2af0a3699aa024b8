//! opslog CLI - Main entry point

use clap::Parser;
use opslog_cli::{commands, Cli, Commands, LogCommand};
use opslog_common::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logging from the environment; --verbose wins over the
    // quiet default but not over an explicit OPSLOG_LOG_LEVEL.
    let mut log_config = LogConfig::from_env().unwrap_or_else(|_| {
        LogConfig::builder()
            .output(LogOutput::Console)
            .log_file_prefix("opslog".to_string())
            .build()
    });
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    } else if std::env::var_os("OPSLOG_LOG_LEVEL").is_none() {
        log_config.level = LogLevel::Warn;
    }

    // The CLI still works without logging
    let _ = init_logging(&log_config);

    // Execute command
    let result = execute_command(cli).await;

    // Handle result
    if let Err(e) = result {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: Cli) -> opslog_cli::Result<()> {
    match cli.command {
        Commands::Migrate {
            uri,
            library,
            dry_run,
            migration_user,
            audit_log,
        } => commands::migrate::run(uri, library, dry_run, migration_user, audit_log).await,

        Commands::Log { command } => match command {
            LogCommand::List {
                audit_log,
                limit,
                actor,
                operation,
                library,
                symbol,
                since,
                until,
            } => {
                commands::log::list(commands::log::ListArgs {
                    audit_log,
                    limit,
                    actor,
                    operation,
                    library,
                    symbol,
                    since,
                    until,
                })
                .await
            }
        },
    }
}
