//! opslog Core Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Actor attribution and durable operation logging for versioned data
//! stores.
//!
//! # Overview
//!
//! Three pieces, stacked on top of any engine implementing
//! [`store::VersionedStore`]:
//!
//! - **Audit Logger** ([`logger::AuditLogger`]): a thread-safe, append-only
//!   JSON-lines log. Every accepted append is flushed to disk before the
//!   call returns; readers never observe a torn line.
//! - **Enforcement Wrapper** ([`library::AuditedLibrary`]): exposes the
//!   store's operations with a mandatory `user_id`, writing one audit
//!   record per operation *before* the engine is invoked.
//! - **Migration Runner** ([`migrate::MigrationRunner`]): backfills audit
//!   metadata onto symbol versions that predate enforcement, with a
//!   dry-run mode and per-entry failure tolerance.
//!
//! # Example
//!
//! ```no_run
//! use opslog_core::{AuditLogger, AuditedLibrary, LocalStore, WriteOptions};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> opslog_core::Result<()> {
//! let audit = Arc::new(AuditLogger::new("audit.log", true)?);
//! let store = LocalStore::in_memory("my_lib");
//! let lib = AuditedLibrary::new(store, audit);
//!
//! lib.write("AAPL", json!([1, 2, 3]), WriteOptions::default(), "alice")
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod library;
pub mod logger;
pub mod migrate;
pub mod record;
pub mod store;

// Re-export commonly used types
pub use error::{AuditError, Result};
pub use library::AuditedLibrary;
pub use logger::{AuditLogger, LogFilter, LogReadOutcome};
pub use migrate::{MigrationReport, MigrationRunner, MigrationSummary};
pub use record::{AuditRecord, OperationKind};
pub use store::{
    AppendOptions, LocalStore, StoreError, UpdateOptions, VersionedItem, VersionedStore,
    WriteOptions, WritePayload,
};
