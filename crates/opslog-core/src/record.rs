//! Audit record model and wire format
//!
//! One record per attempted operation, serialized as a single JSON object
//! per log line. Records are immutable once constructed; nothing in this
//! crate rewrites or deletes them.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Operation kinds recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Write,
    Read,
    Update,
    Append,
    Delete,
    WriteBatch,
    ReadBatch,
    WriteMetadata,
    ReadMetadata,
    /// Backfill tag applied by the migration runner
    Migrate,
    /// Summary entry left by a migration dry run
    DryRun,
}

impl OperationKind {
    /// Convert to string representation
    pub fn as_str(&self) -> &str {
        match self {
            OperationKind::Write => "write",
            OperationKind::Read => "read",
            OperationKind::Update => "update",
            OperationKind::Append => "append",
            OperationKind::Delete => "delete",
            OperationKind::WriteBatch => "write_batch",
            OperationKind::ReadBatch => "read_batch",
            OperationKind::WriteMetadata => "write_metadata",
            OperationKind::ReadMetadata => "read_metadata",
            OperationKind::Migrate => "migrate",
            OperationKind::DryRun => "dry_run",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "write" => Ok(OperationKind::Write),
            "read" => Ok(OperationKind::Read),
            "update" => Ok(OperationKind::Update),
            "append" => Ok(OperationKind::Append),
            "delete" => Ok(OperationKind::Delete),
            "write_batch" => Ok(OperationKind::WriteBatch),
            "read_batch" => Ok(OperationKind::ReadBatch),
            "write_metadata" => Ok(OperationKind::WriteMetadata),
            "read_metadata" => Ok(OperationKind::ReadMetadata),
            "migrate" => Ok(OperationKind::Migrate),
            "dry_run" => Ok(OperationKind::DryRun),
            _ => Err(format!("Unknown operation kind: {}", s)),
        }
    }
}

/// A single audit log entry
///
/// `metadata` carries operation context (flags, counts, version selectors),
/// never payload values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// UTC instant of the attempt, microsecond precision
    #[serde(with = "iso8601_micros")]
    pub timestamp: DateTime<Utc>,

    /// User ID or system ID performing the operation
    pub actor: String,

    /// Operation kind
    pub operation: OperationKind,

    /// Affected symbols; empty only for library-level operations
    pub symbols: Vec<String>,

    /// Library name
    pub library: String,

    /// Operation context (object or null)
    #[serde(default)]
    pub metadata: Option<JsonValue>,
}

impl AuditRecord {
    /// Create a record stamped with the current UTC time.
    ///
    /// The timestamp is truncated to microseconds so a record round-trips
    /// through its wire encoding field-for-field.
    pub fn new(
        actor: impl Into<String>,
        operation: OperationKind,
        symbols: Vec<String>,
        library: impl Into<String>,
        metadata: Option<JsonValue>,
    ) -> Self {
        Self {
            timestamp: truncate_to_micros(Utc::now()),
            actor: actor.into(),
            operation,
            symbols,
            library: library.into(),
            metadata,
        }
    }
}

fn truncate_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    let micros = ts.nanosecond() / 1_000;
    // with_nanosecond only fails for values >= 2_000_000_000
    ts.with_nanosecond(micros * 1_000).unwrap_or(ts)
}

/// Fixed ISO-8601 UTC encoding with microsecond precision,
/// e.g. `2026-08-07T09:15:42.123456Z`.
mod iso8601_micros {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_kind_as_str() {
        assert_eq!(OperationKind::Write.as_str(), "write");
        assert_eq!(OperationKind::WriteBatch.as_str(), "write_batch");
        assert_eq!(OperationKind::Migrate.as_str(), "migrate");
    }

    #[test]
    fn test_operation_kind_round_trip() {
        for kind in [
            OperationKind::Write,
            OperationKind::Read,
            OperationKind::Update,
            OperationKind::Append,
            OperationKind::Delete,
            OperationKind::WriteBatch,
            OperationKind::ReadBatch,
            OperationKind::WriteMetadata,
            OperationKind::ReadMetadata,
            OperationKind::Migrate,
            OperationKind::DryRun,
        ] {
            assert_eq!(kind.as_str().parse::<OperationKind>().unwrap(), kind);
        }
        assert!("drop_table".parse::<OperationKind>().is_err());
    }

    #[test]
    fn test_record_serde_round_trip() {
        let record = AuditRecord::new(
            "alice",
            OperationKind::Write,
            vec!["AAPL".to_string()],
            "my_lib",
            Some(json!({"prune_previous_versions": false})),
        );

        let line = serde_json::to_string(&record).unwrap();
        let parsed: AuditRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_timestamp_encoding_is_fixed_width_micros() {
        let record = AuditRecord::new("bob", OperationKind::Read, vec![], "lib", None);
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&record).unwrap()).unwrap();

        let ts = value["timestamp"].as_str().unwrap();
        // 2026-08-07T09:15:42.123456Z
        assert_eq!(ts.len(), 27);
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[19..20], ".");
    }

    #[test]
    fn test_null_metadata_round_trip() {
        let record = AuditRecord::new("carol", OperationKind::Delete, vec!["X".into()], "lib", None);
        let line = serde_json::to_string(&record).unwrap();
        assert!(line.contains("\"metadata\":null"));
        let parsed: AuditRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.metadata, None);
    }
}
