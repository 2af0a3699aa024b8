//! Local reference engine
//!
//! A small file-backed (or purely in-memory) implementation of
//! [`VersionedStore`], used by the CLI and the test suites. One JSON state
//! file per library; every mutating call persists by writing a temp file
//! and renaming it over the old state, so a crashed writer never leaves a
//! half-written store behind.

use super::{
    AppendOptions, StoreError, StoreResult, UpdateOptions, VersionInfo, VersionedItem,
    VersionedStore, WriteOptions, WritePayload,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredVersion {
    version: u64,
    created_at: DateTime<Utc>,
    data: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<JsonValue>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    symbols: BTreeMap<String, Vec<StoredVersion>>,
}

/// File-backed versioned store for a single library
pub struct LocalStore {
    library: String,
    persist_path: Option<PathBuf>,
    state: Mutex<StoreState>,
}

impl LocalStore {
    /// Open a store from a connection URI: `mem://` for a volatile store,
    /// `file://<dir>` for one persisted under `<dir>/<library>.json`.
    pub fn open_uri(uri: &str, library: &str) -> StoreResult<Self> {
        if uri == "mem://" {
            return Ok(Self::in_memory(library));
        }

        let parsed = Url::parse(uri).map_err(|_| StoreError::UnsupportedUri(uri.to_string()))?;
        if parsed.scheme() != "file" {
            return Err(StoreError::UnsupportedUri(uri.to_string()));
        }

        // file:///abs/dir carries the whole path; file://rel/dir parses the
        // first segment as a host and the rest as the path.
        let dir = match parsed.host_str() {
            Some(host) if !host.is_empty() => {
                let mut dir = PathBuf::from(host);
                let rest = parsed.path().trim_start_matches('/');
                if !rest.is_empty() {
                    dir.push(rest);
                }
                dir
            }
            _ => PathBuf::from(parsed.path()),
        };

        if dir.as_os_str().is_empty() {
            return Err(StoreError::UnsupportedUri(uri.to_string()));
        }

        Self::open(dir, library)
    }

    /// Open the library persisted under `dir`, creating it when absent
    pub fn open(dir: impl Into<PathBuf>, library: &str) -> StoreResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let persist_path = dir.join(format!("{}.json", library));

        let state = if persist_path.exists() {
            let contents = std::fs::read_to_string(&persist_path)?;
            serde_json::from_str(&contents).map_err(|e| {
                StoreError::Corrupt(format!(
                    "Failed to parse store state at '{}': {}",
                    persist_path.display(),
                    e
                ))
            })?
        } else {
            StoreState::default()
        };

        debug!(library = %library, path = %persist_path.display(), "opened local store");

        Ok(Self {
            library: library.to_string(),
            persist_path: Some(persist_path),
            state: Mutex::new(state),
        })
    }

    /// Volatile store, nothing touches disk
    pub fn in_memory(library: &str) -> Self {
        Self {
            library: library.to_string(),
            persist_path: None,
            state: Mutex::new(StoreState::default()),
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Corrupt("store lock poisoned".to_string()))
    }

    fn persist(&self, state: &StoreState) -> StoreResult<()> {
        let Some(ref path) = self.persist_path else {
            return Ok(());
        };
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(state).map_err(|e| {
            StoreError::Corrupt(format!("Failed to encode store state: {}", e))
        })?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn resolve<'a>(
        state: &'a StoreState,
        symbol: &str,
        as_of: Option<u64>,
    ) -> StoreResult<&'a StoredVersion> {
        let versions = state
            .symbols
            .get(symbol)
            .ok_or_else(|| StoreError::SymbolNotFound(symbol.to_string()))?;
        match as_of {
            None => versions
                .last()
                .ok_or_else(|| StoreError::SymbolNotFound(symbol.to_string())),
            Some(v) => versions
                .iter()
                .find(|sv| sv.version == v)
                .ok_or(StoreError::VersionNotFound {
                    symbol: symbol.to_string(),
                    version: v,
                }),
        }
    }

    fn push_version(
        state: &mut StoreState,
        symbol: &str,
        data: JsonValue,
        metadata: Option<JsonValue>,
        prune: bool,
    ) -> VersionedItem {
        let versions = state.symbols.entry(symbol.to_string()).or_default();
        let version = versions.last().map_or(0, |sv| sv.version + 1);
        if prune {
            versions.clear();
        }
        versions.push(StoredVersion {
            version,
            created_at: Utc::now(),
            data,
            metadata: metadata.clone(),
        });
        VersionedItem {
            symbol: symbol.to_string(),
            version,
            data: None,
            metadata,
        }
    }

    /// Backing file of this store, if persistent
    pub fn persist_path(&self) -> Option<&Path> {
        self.persist_path.as_deref()
    }
}

#[async_trait]
impl VersionedStore for LocalStore {
    fn library_name(&self) -> &str {
        &self.library
    }

    async fn write(
        &self,
        symbol: &str,
        data: JsonValue,
        options: WriteOptions,
    ) -> StoreResult<VersionedItem> {
        let mut state = self.lock()?;
        let item = Self::push_version(
            &mut state,
            symbol,
            data,
            None,
            options.prune_previous_versions,
        );
        self.persist(&state)?;
        Ok(item)
    }

    async fn read(&self, symbol: &str, as_of: Option<u64>) -> StoreResult<VersionedItem> {
        let state = self.lock()?;
        let stored = Self::resolve(&state, symbol, as_of)?;
        Ok(VersionedItem {
            symbol: symbol.to_string(),
            version: stored.version,
            data: Some(stored.data.clone()),
            metadata: stored.metadata.clone(),
        })
    }

    async fn update(
        &self,
        symbol: &str,
        data: JsonValue,
        options: UpdateOptions,
    ) -> StoreResult<VersionedItem> {
        let mut state = self.lock()?;
        if !state.symbols.contains_key(symbol) && !options.upsert {
            return Err(StoreError::SymbolNotFound(symbol.to_string()));
        }
        let item = Self::push_version(
            &mut state,
            symbol,
            data,
            None,
            options.prune_previous_versions,
        );
        self.persist(&state)?;
        Ok(item)
    }

    async fn append(
        &self,
        symbol: &str,
        data: JsonValue,
        options: AppendOptions,
    ) -> StoreResult<VersionedItem> {
        let mut state = self.lock()?;
        let combined = {
            let latest = Self::resolve(&state, symbol, None)?;
            match (&latest.data, &data) {
                (JsonValue::Array(existing), JsonValue::Array(incoming)) => {
                    let mut rows = existing.clone();
                    rows.extend(incoming.iter().cloned());
                    JsonValue::Array(rows)
                }
                _ => return Err(StoreError::NotAppendable(symbol.to_string())),
            }
        };
        let item = Self::push_version(
            &mut state,
            symbol,
            combined,
            None,
            options.prune_previous_versions,
        );
        self.persist(&state)?;
        Ok(item)
    }

    async fn delete(&self, symbol: &str, versions: Option<&[u64]>) -> StoreResult<()> {
        let mut state = self.lock()?;
        match versions {
            None => {
                state
                    .symbols
                    .remove(symbol)
                    .ok_or_else(|| StoreError::SymbolNotFound(symbol.to_string()))?;
            }
            Some(to_remove) => {
                let stored = state
                    .symbols
                    .get_mut(symbol)
                    .ok_or_else(|| StoreError::SymbolNotFound(symbol.to_string()))?;
                for v in to_remove {
                    if !stored.iter().any(|sv| sv.version == *v) {
                        return Err(StoreError::VersionNotFound {
                            symbol: symbol.to_string(),
                            version: *v,
                        });
                    }
                }
                stored.retain(|sv| !to_remove.contains(&sv.version));
                if stored.is_empty() {
                    state.symbols.remove(symbol);
                }
            }
        }
        self.persist(&state)?;
        Ok(())
    }

    async fn write_batch(
        &self,
        payloads: Vec<WritePayload>,
        options: WriteOptions,
    ) -> StoreResult<Vec<VersionedItem>> {
        let mut state = self.lock()?;
        let mut items = Vec::with_capacity(payloads.len());
        for payload in payloads {
            items.push(Self::push_version(
                &mut state,
                &payload.symbol,
                payload.data,
                payload.metadata,
                options.prune_previous_versions,
            ));
        }
        self.persist(&state)?;
        Ok(items)
    }

    async fn read_batch(&self, symbols: &[String]) -> StoreResult<Vec<VersionedItem>> {
        let state = self.lock()?;
        let mut items = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let stored = Self::resolve(&state, symbol, None)?;
            items.push(VersionedItem {
                symbol: symbol.clone(),
                version: stored.version,
                data: Some(stored.data.clone()),
                metadata: stored.metadata.clone(),
            });
        }
        Ok(items)
    }

    async fn write_metadata(
        &self,
        symbol: &str,
        as_of: Option<u64>,
        metadata: JsonValue,
    ) -> StoreResult<VersionedItem> {
        // Metadata-only updates patch the addressed version in place; this
        // engine does not mint a data version for them.
        let mut state = self.lock()?;
        let version = Self::resolve(&state, symbol, as_of)?.version;
        let versions = state
            .symbols
            .get_mut(symbol)
            .ok_or_else(|| StoreError::SymbolNotFound(symbol.to_string()))?;
        let stored = versions
            .iter_mut()
            .find(|sv| sv.version == version)
            .ok_or(StoreError::VersionNotFound {
                symbol: symbol.to_string(),
                version,
            })?;
        stored.metadata = Some(metadata.clone());
        self.persist(&state)?;
        Ok(VersionedItem {
            symbol: symbol.to_string(),
            version,
            data: None,
            metadata: Some(metadata),
        })
    }

    async fn read_metadata(&self, symbol: &str, as_of: Option<u64>) -> StoreResult<VersionedItem> {
        let state = self.lock()?;
        let stored = Self::resolve(&state, symbol, as_of)?;
        Ok(VersionedItem {
            symbol: symbol.to_string(),
            version: stored.version,
            data: None,
            metadata: stored.metadata.clone(),
        })
    }

    async fn list_symbols(&self) -> StoreResult<Vec<String>> {
        let state = self.lock()?;
        Ok(state.symbols.keys().cloned().collect())
    }

    async fn list_versions(&self, symbol: &str) -> StoreResult<Vec<VersionInfo>> {
        let state = self.lock()?;
        let versions = state
            .symbols
            .get(symbol)
            .ok_or_else(|| StoreError::SymbolNotFound(symbol.to_string()))?;
        Ok(versions
            .iter()
            .map(|sv| VersionInfo {
                version: sv.version,
                created_at: sv.created_at,
            })
            .collect())
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("library", &self.library)
            .field("persist_path", &self.persist_path)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_assigns_sequential_versions() {
        let store = LocalStore::in_memory("lib");

        let v0 = store
            .write("AAPL", json!([1]), WriteOptions::default())
            .await
            .unwrap();
        let v1 = store
            .write("AAPL", json!([2]), WriteOptions::default())
            .await
            .unwrap();

        assert_eq!(v0.version, 0);
        assert_eq!(v1.version, 1);

        let versions = store.list_versions("AAPL").await.unwrap();
        assert_eq!(versions.len(), 2);
    }

    #[tokio::test]
    async fn test_read_as_of() {
        let store = LocalStore::in_memory("lib");
        store
            .write("S", json!("first"), WriteOptions::default())
            .await
            .unwrap();
        store
            .write("S", json!("second"), WriteOptions::default())
            .await
            .unwrap();

        let latest = store.read("S", None).await.unwrap();
        assert_eq!(latest.data, Some(json!("second")));

        let old = store.read("S", Some(0)).await.unwrap();
        assert_eq!(old.data, Some(json!("first")));

        let missing = store.read("S", Some(9)).await;
        assert!(matches!(
            missing,
            Err(StoreError::VersionNotFound { version: 9, .. })
        ));
    }

    #[tokio::test]
    async fn test_update_requires_symbol_unless_upsert() {
        let store = LocalStore::in_memory("lib");

        let err = store
            .update("missing", json!(1), UpdateOptions::default())
            .await;
        assert!(matches!(err, Err(StoreError::SymbolNotFound(_))));

        let item = store
            .update(
                "missing",
                json!(1),
                UpdateOptions {
                    upsert: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(item.version, 0);
    }

    #[tokio::test]
    async fn test_append_concatenates_rows() {
        let store = LocalStore::in_memory("lib");
        store
            .write("S", json!([1, 2]), WriteOptions::default())
            .await
            .unwrap();

        store
            .append("S", json!([3]), AppendOptions::default())
            .await
            .unwrap();

        let item = store.read("S", None).await.unwrap();
        assert_eq!(item.data, Some(json!([1, 2, 3])));
        assert_eq!(item.version, 1);
    }

    #[tokio::test]
    async fn test_append_rejects_non_sequence() {
        let store = LocalStore::in_memory("lib");
        store
            .write("S", json!({"a": 1}), WriteOptions::default())
            .await
            .unwrap();

        let err = store.append("S", json!([1]), AppendOptions::default()).await;
        assert!(matches!(err, Err(StoreError::NotAppendable(_))));
    }

    #[tokio::test]
    async fn test_delete_specific_versions() {
        let store = LocalStore::in_memory("lib");
        store.write("S", json!(0), WriteOptions::default()).await.unwrap();
        store.write("S", json!(1), WriteOptions::default()).await.unwrap();
        store.write("S", json!(2), WriteOptions::default()).await.unwrap();

        store.delete("S", Some(&[0, 2])).await.unwrap();
        let versions = store.list_versions("S").await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version, 1);

        let err = store.delete("S", Some(&[7])).await;
        assert!(matches!(err, Err(StoreError::VersionNotFound { .. })));

        store.delete("S", None).await.unwrap();
        assert!(store.list_symbols().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_metadata_patches_in_place() {
        let store = LocalStore::in_memory("lib");
        store.write("S", json!([1]), WriteOptions::default()).await.unwrap();
        store.write("S", json!([2]), WriteOptions::default()).await.unwrap();

        store
            .write_metadata("S", Some(0), json!({"tag": true}))
            .await
            .unwrap();

        // No new version minted, payloads untouched
        assert_eq!(store.list_versions("S").await.unwrap().len(), 2);
        let v0 = store.read("S", Some(0)).await.unwrap();
        assert_eq!(v0.data, Some(json!([1])));
        assert_eq!(v0.metadata, Some(json!({"tag": true})));
        let v1 = store.read_metadata("S", Some(1)).await.unwrap();
        assert_eq!(v1.metadata, None);
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = TempDir::new().unwrap();

        {
            let store = LocalStore::open(dir.path(), "mylib").unwrap();
            store
                .write("AAPL", json!([1, 2]), WriteOptions::default())
                .await
                .unwrap();
            store
                .write_metadata("AAPL", None, json!({"note": "x"}))
                .await
                .unwrap();
        }

        let reopened = LocalStore::open(dir.path(), "mylib").unwrap();
        let item = reopened.read("AAPL", None).await.unwrap();
        assert_eq!(item.data, Some(json!([1, 2])));
        assert_eq!(item.metadata, Some(json!({"note": "x"})));
    }

    #[tokio::test]
    async fn test_open_uri_schemes() {
        let mem = LocalStore::open_uri("mem://", "lib").unwrap();
        assert!(mem.persist_path().is_none());

        let dir = TempDir::new().unwrap();
        let uri = format!("file://{}", dir.path().display());
        let file = LocalStore::open_uri(&uri, "lib").unwrap();
        assert!(file.persist_path().is_some());

        assert!(matches!(
            LocalStore::open_uri("lmdb:///somewhere", "lib"),
            Err(StoreError::UnsupportedUri(_))
        ));
        assert!(matches!(
            LocalStore::open_uri("not a uri", "lib"),
            Err(StoreError::UnsupportedUri(_))
        ));
    }

    #[tokio::test]
    async fn test_write_batch_and_read_batch() {
        let store = LocalStore::in_memory("lib");
        let items = store
            .write_batch(
                vec![
                    WritePayload::new("sym1", json!([1])),
                    WritePayload::new("sym2", json!([2])),
                ],
                WriteOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(items.len(), 2);

        let back = store
            .read_batch(&["sym1".to_string(), "sym2".to_string()])
            .await
            .unwrap();
        assert_eq!(back[0].data, Some(json!([1])));
        assert_eq!(back[1].data, Some(json!([2])));
    }
}
