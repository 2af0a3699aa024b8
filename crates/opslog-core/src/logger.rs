//! Durable, thread-safe audit log
//!
//! One JSON object per line, append-only, flushed before `append` returns.
//! The format + write + flush sequence runs under a single mutex per logger
//! instance, so concurrent appends land as whole lines in some total order.

use crate::error::{AuditError, Result};
use crate::record::{AuditRecord, OperationKind};
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

/// Thread-safe audit logger backed by a single JSON-lines file.
///
/// Shared deliberately: construct one instance and hand an `Arc` of it to
/// every collaborator that emits records. There is no hidden process-wide
/// singleton.
pub struct AuditLogger {
    path: PathBuf,
    mirror_to_console: bool,
    file: Mutex<File>,
}

impl AuditLogger {
    /// Open (or create) the audit log at `path`.
    ///
    /// The parent directory is created here, once, not per append. When
    /// `mirror_to_console` is set, each accepted record is also emitted as a
    /// tracing event on the `audit` target, independent of file durability.
    pub fn new(path: impl Into<PathBuf>, mirror_to_console: bool) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            mirror_to_console,
            file: Mutex::new(file),
        })
    }

    /// Path of the backing log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, returning only after it is flushed to the file.
    ///
    /// Safe to call from multiple threads; two concurrent appends yield two
    /// whole lines, never interleaved or truncated. There is no partial or
    /// cancelled append state: a call either completes or fails with an I/O
    /// error and writes nothing the reader would accept.
    pub fn append(&self, record: &AuditRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        {
            let mut file = self
                .file
                .lock()
                .map_err(|_| AuditError::Io(std::io::Error::other("audit log lock poisoned")))?;
            file.write_all(line.as_bytes())?;
            file.flush()?;
        }

        if self.mirror_to_console {
            info!(
                target: "audit",
                actor = %record.actor,
                operation = %record.operation,
                library = %record.library,
                symbols = ?record.symbols,
                "audit record appended"
            );
        }

        Ok(())
    }

    /// Read back the most recent `limit` records matching `filter`, in
    /// chronological order.
    ///
    /// Opens its own handle, so reads may run concurrently with appends; a
    /// read observes the file as of open time and never a half-written
    /// line. Malformed lines (external tampering, torn tail from a crashed
    /// foreign writer) are skipped and counted, never fatal.
    pub fn read_logs(&self, limit: usize, filter: Option<&LogFilter>) -> Result<LogReadOutcome> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(LogReadOutcome::default());
            }
            Err(e) => return Err(e.into()),
        };

        let reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut malformed_lines = 0usize;

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditRecord>(&line) {
                Ok(record) => {
                    if filter.is_none_or(|f| f.matches(&record)) {
                        records.push(record);
                    }
                }
                Err(_) => malformed_lines += 1,
            }
        }

        let keep_from = records.len().saturating_sub(limit);
        records.drain(..keep_from);

        Ok(LogReadOutcome {
            records,
            malformed_lines,
        })
    }
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("path", &self.path)
            .field("mirror_to_console", &self.mirror_to_console)
            .finish()
    }
}

/// Result of a `read_logs` call
#[derive(Debug, Default, Clone)]
pub struct LogReadOutcome {
    /// Matching records, oldest first
    pub records: Vec<AuditRecord>,
    /// Lines that did not parse as audit records
    pub malformed_lines: usize,
}

/// Conjunctive filter over audit records
#[derive(Debug, Default, Clone)]
pub struct LogFilter {
    pub actor: Option<String>,
    pub operation: Option<OperationKind>,
    pub library: Option<String>,
    pub symbol: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl LogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn operation(mut self, operation: OperationKind) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn library(mut self, library: impl Into<String>) -> Self {
        self.library = Some(library.into());
        self
    }

    /// Match records whose `symbols` list contains this symbol
    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Inclusive lower time bound
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Inclusive upper time bound
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    /// Does `record` satisfy every set criterion?
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(ref actor) = self.actor {
            if record.actor != *actor {
                return false;
            }
        }
        if let Some(operation) = self.operation {
            if record.operation != operation {
                return false;
            }
        }
        if let Some(ref library) = self.library {
            if record.library != *library {
                return false;
            }
        }
        if let Some(ref symbol) = self.symbol {
            if !record.symbols.iter().any(|s| s == symbol) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if record.timestamp > until {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(actor: &str, operation: OperationKind, symbols: &[&str]) -> AuditRecord {
        AuditRecord::new(
            actor,
            operation,
            symbols.iter().map(|s| s.to_string()).collect(),
            "test_lib",
            None,
        )
    }

    fn line_count(path: &Path) -> usize {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .filter(|l| !l.trim().is_empty())
            .count()
    }

    #[test]
    fn test_append_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/audit.log");

        let logger = AuditLogger::new(&path, false).unwrap();
        logger
            .append(&record("alice", OperationKind::Write, &["AAPL"]))
            .unwrap();

        assert!(path.exists());
        assert_eq!(line_count(&path), 1);
    }

    #[test]
    fn test_append_increments_line_count_by_one() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        let logger = AuditLogger::new(&path, false).unwrap();

        for i in 0..5 {
            logger
                .append(&record(&format!("user{}", i), OperationKind::Read, &["X"]))
                .unwrap();
            assert_eq!(line_count(&path), i + 1);
        }
    }

    #[test]
    fn test_last_line_matches_appended_record() {
        let dir = TempDir::new().unwrap();
        let logger = AuditLogger::new(dir.path().join("audit.log"), false).unwrap();

        let rec = AuditRecord::new(
            "alice",
            OperationKind::Write,
            vec!["AAPL".to_string()],
            "my_lib",
            Some(json!({"prune_previous_versions": false})),
        );
        logger.append(&rec).unwrap();

        let contents = std::fs::read_to_string(logger.path()).unwrap();
        let last = contents.lines().last().unwrap();
        let parsed: AuditRecord = serde_json::from_str(last).unwrap();
        assert_eq!(parsed, rec);
    }

    #[test]
    fn test_read_logs_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let logger = AuditLogger::new(dir.path().join("audit.log"), false).unwrap();
        std::fs::remove_file(logger.path()).unwrap();

        let outcome = logger.read_logs(10, None).unwrap();
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.malformed_lines, 0);
    }

    #[test]
    fn test_read_logs_limit_returns_most_recent_chronologically() {
        let dir = TempDir::new().unwrap();
        let logger = AuditLogger::new(dir.path().join("audit.log"), false).unwrap();

        for i in 0..10 {
            logger
                .append(&record(&format!("user{}", i), OperationKind::Write, &["S"]))
                .unwrap();
        }

        let outcome = logger.read_logs(3, None).unwrap();
        let actors: Vec<&str> = outcome.records.iter().map(|r| r.actor.as_str()).collect();
        assert_eq!(actors, vec!["user7", "user8", "user9"]);
    }

    #[test]
    fn test_read_logs_skips_and_counts_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let logger = AuditLogger::new(dir.path().join("audit.log"), false).unwrap();

        logger
            .append(&record("alice", OperationKind::Write, &["A"]))
            .unwrap();

        // External tampering between appends
        {
            let mut file = OpenOptions::new()
                .append(true)
                .open(logger.path())
                .unwrap();
            file.write_all(b"not json at all\n{\"half\": \n").unwrap();
        }

        logger
            .append(&record("bob", OperationKind::Read, &["B"]))
            .unwrap();

        let outcome = logger.read_logs(10, None).unwrap();
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.malformed_lines, 2);
        assert_eq!(outcome.records[0].actor, "alice");
        assert_eq!(outcome.records[1].actor, "bob");
    }

    #[test]
    fn test_read_logs_filters() {
        let dir = TempDir::new().unwrap();
        let logger = AuditLogger::new(dir.path().join("audit.log"), false).unwrap();

        logger
            .append(&record("alice", OperationKind::Write, &["AAPL"]))
            .unwrap();
        logger
            .append(&record("bob", OperationKind::Read, &["AAPL", "MSFT"]))
            .unwrap();
        logger
            .append(&record("alice", OperationKind::Delete, &["MSFT"]))
            .unwrap();

        let by_actor = logger
            .read_logs(10, Some(&LogFilter::new().actor("alice")))
            .unwrap();
        assert_eq!(by_actor.records.len(), 2);

        let by_op = logger
            .read_logs(10, Some(&LogFilter::new().operation(OperationKind::Read)))
            .unwrap();
        assert_eq!(by_op.records.len(), 1);
        assert_eq!(by_op.records[0].actor, "bob");

        let by_symbol = logger
            .read_logs(10, Some(&LogFilter::new().symbol("MSFT")))
            .unwrap();
        assert_eq!(by_symbol.records.len(), 2);

        let combined = logger
            .read_logs(
                10,
                Some(&LogFilter::new().actor("alice").symbol("MSFT")),
            )
            .unwrap();
        assert_eq!(combined.records.len(), 1);
        assert_eq!(combined.records[0].operation, OperationKind::Delete);
    }

    #[test]
    fn test_filter_time_bounds() {
        let early = record("alice", OperationKind::Write, &["A"]);
        let cutoff = early.timestamp;

        assert!(LogFilter::new().since(cutoff).matches(&early));
        assert!(LogFilter::new().until(cutoff).matches(&early));
        assert!(!LogFilter::new()
            .since(cutoff + chrono::Duration::seconds(1))
            .matches(&early));
        assert!(!LogFilter::new()
            .until(cutoff - chrono::Duration::seconds(1))
            .matches(&early));
    }

    #[test]
    fn test_concurrent_appends_produce_whole_lines() {
        let dir = TempDir::new().unwrap();
        let logger = Arc::new(AuditLogger::new(dir.path().join("audit.log"), false).unwrap());

        const THREADS: usize = 8;
        const PER_THREAD: usize = 25;

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let logger = Arc::clone(&logger);
                std::thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        logger
                            .append(&AuditRecord::new(
                                format!("thread{}", t),
                                OperationKind::Write,
                                vec![format!("sym{}", i)],
                                "test_lib",
                                None,
                            ))
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // Every line parses independently; count equals accepted appends.
        let contents = std::fs::read_to_string(logger.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), THREADS * PER_THREAD);
        for line in lines {
            let parsed: AuditRecord = serde_json::from_str(line).unwrap();
            assert_eq!(parsed.library, "test_lib");
        }
    }
}
