//! Enforcement wrapper
//!
//! [`AuditedLibrary`] fronts a [`VersionedStore`] and refuses every
//! operation that arrives without an actor identity. Once validation
//! passes, the audit record is appended and flushed *before* the engine is
//! invoked, so an operation can never execute unlogged even if the process
//! dies between logging and completion. A record therefore marks an
//! *attempt*: when the engine fails after logging, the record stays in
//! place and the error propagates unchanged. No second "failed" record is
//! written.

use crate::error::{AuditError, Result};
use crate::logger::AuditLogger;
use crate::record::{AuditRecord, OperationKind};
use crate::store::{
    AppendOptions, UpdateOptions, VersionInfo, VersionedItem, VersionedStore, WriteOptions,
    WritePayload,
};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

/// A versioned store handle with mandatory actor attribution
///
/// Every operation takes the engine's native arguments plus `user_id`.
/// Batch operations emit a single record listing every affected symbol.
pub struct AuditedLibrary<S> {
    store: S,
    audit: Arc<AuditLogger>,
    library: String,
}

impl<S: VersionedStore> AuditedLibrary<S> {
    pub fn new(store: S, audit: Arc<AuditLogger>) -> Self {
        let library = store.library_name().to_string();
        Self {
            store,
            audit,
            library,
        }
    }

    /// The wrapped engine, for operations that need no attribution
    /// (version enumeration, library introspection)
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn library_name(&self) -> &str {
        &self.library
    }

    /// Validate the actor and durably log the attempt. Nothing is written
    /// and the engine is never reached when validation fails.
    fn log_attempt(
        &self,
        user_id: &str,
        operation: OperationKind,
        symbols: Vec<String>,
        metadata: JsonValue,
    ) -> Result<()> {
        if user_id.trim().is_empty() {
            return Err(AuditError::ActorRequired { operation });
        }
        let record = AuditRecord::new(user_id, operation, symbols, &self.library, Some(metadata));
        self.audit.append(&record)
    }

    pub async fn write(
        &self,
        symbol: &str,
        data: JsonValue,
        options: WriteOptions,
        user_id: &str,
    ) -> Result<VersionedItem> {
        self.log_attempt(
            user_id,
            OperationKind::Write,
            vec![symbol.to_string()],
            json!({
                "prune_previous_versions": options.prune_previous_versions,
                "staged": options.staged,
            }),
        )?;
        Ok(self.store.write(symbol, data, options).await?)
    }

    pub async fn read(
        &self,
        symbol: &str,
        as_of: Option<u64>,
        user_id: &str,
    ) -> Result<VersionedItem> {
        self.log_attempt(
            user_id,
            OperationKind::Read,
            vec![symbol.to_string()],
            json!({ "as_of": as_of }),
        )?;
        Ok(self.store.read(symbol, as_of).await?)
    }

    pub async fn update(
        &self,
        symbol: &str,
        data: JsonValue,
        options: UpdateOptions,
        user_id: &str,
    ) -> Result<VersionedItem> {
        self.log_attempt(
            user_id,
            OperationKind::Update,
            vec![symbol.to_string()],
            json!({
                "upsert": options.upsert,
                "prune_previous_versions": options.prune_previous_versions,
            }),
        )?;
        Ok(self.store.update(symbol, data, options).await?)
    }

    pub async fn append(
        &self,
        symbol: &str,
        data: JsonValue,
        options: AppendOptions,
        user_id: &str,
    ) -> Result<VersionedItem> {
        self.log_attempt(
            user_id,
            OperationKind::Append,
            vec![symbol.to_string()],
            json!({ "prune_previous_versions": options.prune_previous_versions }),
        )?;
        Ok(self.store.append(symbol, data, options).await?)
    }

    pub async fn delete(
        &self,
        symbol: &str,
        versions: Option<&[u64]>,
        user_id: &str,
    ) -> Result<()> {
        self.log_attempt(
            user_id,
            OperationKind::Delete,
            vec![symbol.to_string()],
            json!({
                "versions": match versions {
                    Some(v) => json!(v),
                    None => json!("all"),
                },
            }),
        )?;
        Ok(self.store.delete(symbol, versions).await?)
    }

    /// One audit record for the whole batch, `symbols` listing every
    /// payload in order
    pub async fn write_batch(
        &self,
        payloads: Vec<WritePayload>,
        options: WriteOptions,
        user_id: &str,
    ) -> Result<Vec<VersionedItem>> {
        let symbols: Vec<String> = payloads.iter().map(|p| p.symbol.clone()).collect();
        self.log_attempt(
            user_id,
            OperationKind::WriteBatch,
            symbols,
            json!({
                "count": payloads.len(),
                "prune_previous_versions": options.prune_previous_versions,
            }),
        )?;
        Ok(self.store.write_batch(payloads, options).await?)
    }

    pub async fn read_batch(
        &self,
        symbols: &[String],
        user_id: &str,
    ) -> Result<Vec<VersionedItem>> {
        self.log_attempt(
            user_id,
            OperationKind::ReadBatch,
            symbols.to_vec(),
            json!({ "count": symbols.len() }),
        )?;
        Ok(self.store.read_batch(symbols).await?)
    }

    /// The metadata payload itself is not logged; only the version selector
    /// goes into the record.
    pub async fn write_metadata(
        &self,
        symbol: &str,
        as_of: Option<u64>,
        metadata: JsonValue,
        user_id: &str,
    ) -> Result<VersionedItem> {
        self.log_attempt(
            user_id,
            OperationKind::WriteMetadata,
            vec![symbol.to_string()],
            json!({ "as_of": as_of }),
        )?;
        Ok(self.store.write_metadata(symbol, as_of, metadata).await?)
    }

    pub async fn read_metadata(
        &self,
        symbol: &str,
        as_of: Option<u64>,
        user_id: &str,
    ) -> Result<VersionedItem> {
        self.log_attempt(
            user_id,
            OperationKind::ReadMetadata,
            vec![symbol.to_string()],
            json!({ "as_of": as_of }),
        )?;
        Ok(self.store.read_metadata(symbol, as_of).await?)
    }

    /// Version enumeration carries no payload and needs no attribution
    pub async fn list_versions(&self, symbol: &str) -> Result<Vec<VersionInfo>> {
        Ok(self.store.list_versions(symbol).await?)
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for AuditedLibrary<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditedLibrary")
            .field("store", &self.store)
            .field("library", &self.library)
            .finish()
    }
}
