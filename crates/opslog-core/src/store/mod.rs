//! Versioned-store capability set
//!
//! The audit layer does not know any concrete engine. It is written against
//! [`VersionedStore`], the capability set every wrapped store must expose:
//! single and batch reads/writes, metadata access, and version enumeration.
//! The engine's own concurrency and versioning discipline is inherited
//! unchanged.

pub mod local;

pub use local::LocalStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by a storage engine
///
/// The enforcement wrapper passes these through to callers unwrapped.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Symbol '{0}' not found")]
    SymbolNotFound(String),

    #[error("Version {version} of symbol '{symbol}' not found")]
    VersionNotFound { symbol: String, version: u64 },

    #[error("Cannot append to symbol '{0}': existing payload is not an appendable sequence")]
    NotAppendable(String),

    #[error("Store I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store state is corrupt: {0}")]
    Corrupt(String),

    #[error("Unsupported store URI '{0}'. Expected 'mem://' or 'file://<path>'.")]
    UnsupportedUri(String),
}

/// A versioned item returned by store operations
///
/// Metadata-only operations leave `data` unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedItem {
    pub symbol: String,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}

/// One symbol's payload in a batch write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WritePayload {
    pub symbol: String,
    pub data: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}

impl WritePayload {
    pub fn new(symbol: impl Into<String>, data: JsonValue) -> Self {
        Self {
            symbol: symbol.into(),
            data,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Version descriptor from `list_versions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

/// Options for `write` and `write_batch`
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Drop prior versions once the new one is committed
    pub prune_previous_versions: bool,
    /// Stage the write instead of committing it as the live version
    pub staged: bool,
}

/// Options for `update`
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Create the symbol when it does not exist
    pub upsert: bool,
    pub prune_previous_versions: bool,
}

/// Options for `append`
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendOptions {
    pub prune_previous_versions: bool,
}

/// Capability set of a versioned data store
///
/// `as_of: None` addresses the latest version throughout.
#[async_trait]
pub trait VersionedStore: Send + Sync {
    /// Name of the library this handle is bound to
    fn library_name(&self) -> &str;

    /// Write a new version of `symbol`
    async fn write(
        &self,
        symbol: &str,
        data: JsonValue,
        options: WriteOptions,
    ) -> StoreResult<VersionedItem>;

    /// Read a version of `symbol`
    async fn read(&self, symbol: &str, as_of: Option<u64>) -> StoreResult<VersionedItem>;

    /// Replace the payload of `symbol` with a new version
    async fn update(
        &self,
        symbol: &str,
        data: JsonValue,
        options: UpdateOptions,
    ) -> StoreResult<VersionedItem>;

    /// Append rows to `symbol`, producing a new version
    async fn append(
        &self,
        symbol: &str,
        data: JsonValue,
        options: AppendOptions,
    ) -> StoreResult<VersionedItem>;

    /// Delete a symbol entirely, or only the given versions
    async fn delete(&self, symbol: &str, versions: Option<&[u64]>) -> StoreResult<()>;

    /// Write several symbols in one call
    async fn write_batch(
        &self,
        payloads: Vec<WritePayload>,
        options: WriteOptions,
    ) -> StoreResult<Vec<VersionedItem>>;

    /// Read the latest version of several symbols in one call
    async fn read_batch(&self, symbols: &[String]) -> StoreResult<Vec<VersionedItem>>;

    /// Replace the metadata of a version; the engine's own versioning
    /// semantics decide whether this mints a new version
    async fn write_metadata(
        &self,
        symbol: &str,
        as_of: Option<u64>,
        metadata: JsonValue,
    ) -> StoreResult<VersionedItem>;

    /// Read a version's metadata without its payload
    async fn read_metadata(&self, symbol: &str, as_of: Option<u64>) -> StoreResult<VersionedItem>;

    /// Enumerate all symbols in the library
    async fn list_symbols(&self) -> StoreResult<Vec<String>>;

    /// Enumerate all versions of `symbol`, oldest first
    async fn list_versions(&self, symbol: &str) -> StoreResult<Vec<VersionInfo>>;
}
