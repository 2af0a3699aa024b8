//! Example demonstrating audited store usage.
//!
//! This example shows how to:
//! - Set up a durable audit logger
//! - Wrap a versioned store so every operation requires a user_id
//! - Observe rejected calls leaving no trace
//! - Query the audit log back
//!
//! # Running the Example
//!
//! ```bash
//! cargo run --example audited_usage
//! ```

use opslog_core::{
    AuditLogger, AuditedLibrary, LocalStore, LogFilter, WriteOptions, WritePayload,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter("info")
        .init();

    info!("=== opslog Audited Store Example ===");

    // ========================================================================
    // 1. Audit Logger Setup
    // ========================================================================

    info!("1. Setting up audit logging...");

    let log_dir = tempfile::tempdir()?;
    let audit = Arc::new(AuditLogger::new(
        log_dir.path().join("audit.log"),
        true,
    )?);
    info!(path = %audit.path().display(), "Audit logger initialized");

    // ========================================================================
    // 2. Wrapping a Store
    // ========================================================================

    info!("2. Creating audited library...");

    let store = LocalStore::in_memory("demo_library");
    let lib = AuditedLibrary::new(store, Arc::clone(&audit));

    // ========================================================================
    // 3. Attributed Operations
    // ========================================================================

    info!("3. Writing data (requires user_id)...");

    lib.write(
        "stock_AAPL",
        json!([{"price": 187.2, "volume": 4100}]),
        WriteOptions::default(),
        "alice.smith",
    )
    .await?;
    info!("Data written by alice.smith");

    // A missing actor is rejected before the store or the log is touched
    let rejected = lib
        .write("stock_GOOGL", json!([]), WriteOptions::default(), "")
        .await;
    info!(error = %rejected.unwrap_err(), "Write without user_id rejected");

    // Batch calls produce a single record listing every symbol
    lib.write_batch(
        vec![
            WritePayload::new("stock_MSFT", json!([{"price": 402.1}])),
            WritePayload::new("stock_NVDA", json!([{"price": 118.9}])),
        ],
        WriteOptions::default(),
        "bob.jones",
    )
    .await?;

    // ========================================================================
    // 4. Querying the Log
    // ========================================================================

    info!("4. Reading the audit trail back...");

    let outcome = audit.read_logs(10, None)?;
    for record in &outcome.records {
        info!(
            actor = %record.actor,
            operation = %record.operation,
            symbols = ?record.symbols,
            "audit record"
        );
    }

    let by_alice = audit.read_logs(10, Some(&LogFilter::new().actor("alice.smith")))?;
    info!(count = by_alice.records.len(), "records by alice.smith");

    Ok(())
}
