//! Audit metadata backfill
//!
//! Walks every symbol version of a library, finds the ones that predate
//! audit enforcement (no attribution stamp in their metadata), and tags
//! them with a default actor and a migration timestamp. Payloads are never
//! touched. Designed to run unattended against large libraries: a failing
//! entry is recorded and the run moves on.

use crate::error::Result;
use crate::logger::AuditLogger;
use crate::record::{AuditRecord, OperationKind};
use crate::store::VersionedStore;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value as JsonValue};
use tracing::{debug, info, warn};

/// Default actor attributed to backfilled versions
pub const DEFAULT_MIGRATION_USER: &str = "system_migration";

/// Metadata key carrying the attributed actor; its presence marks a
/// version as already migrated
pub const AUDIT_USER_KEY: &str = "_audit_user_id";

/// Metadata key carrying the migration timestamp
pub const AUDIT_MIGRATED_AT_KEY: &str = "_audit_migrated_at";

/// Action planned for one symbol version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    /// Attach the audit stamp
    Tag,
    /// Already stamped, leave untouched
    Skip,
}

impl std::fmt::Display for PlanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanAction::Tag => write!(f, "tag"),
            PlanAction::Skip => write!(f, "skip"),
        }
    }
}

/// One symbol version in the migration plan
#[derive(Debug, Clone)]
pub struct MigrationPlanEntry {
    pub symbol: String,
    pub version: u64,
    pub has_audit_metadata: bool,
    pub action: PlanAction,
}

/// A symbol version that could not be examined or tagged
#[derive(Debug, Clone)]
pub struct MigrationFailure {
    pub symbol: String,
    pub version: Option<u64>,
    pub error: String,
}

/// Counts and failures of one migration run
#[derive(Debug, Default)]
pub struct MigrationSummary {
    /// Symbols examined
    pub symbols: usize,
    /// Symbol versions examined
    pub versions: usize,
    /// Versions tagged (or, on a dry run, that would be tagged)
    pub tagged: usize,
    /// Versions already carrying the stamp
    pub skipped: usize,
    /// Per-entry failures; none of these aborted the run
    pub failures: Vec<MigrationFailure>,
    pub dry_run: bool,
}

impl MigrationSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Plan plus summary of one run
#[derive(Debug)]
pub struct MigrationReport {
    pub plan: Vec<MigrationPlanEntry>,
    pub summary: MigrationSummary,
}

/// Backfills audit metadata onto a library's existing versions
///
/// Re-running against an already migrated library is a safe no-op: every
/// stamped version plans as `Skip`.
pub struct MigrationRunner<'a, S> {
    store: &'a S,
    audit: &'a AuditLogger,
    migration_user: String,
    dry_run: bool,
}

impl<'a, S: VersionedStore> MigrationRunner<'a, S> {
    pub fn new(store: &'a S, audit: &'a AuditLogger, migration_user: impl Into<String>) -> Self {
        Self {
            store,
            audit,
            migration_user: migration_user.into(),
            dry_run: false,
        }
    }

    /// Plan and report only; no mutating store call, no per-entry records
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Compute the plan. Probe failures become failure entries, never
    /// fatal errors; only symbol enumeration itself aborts the run.
    pub async fn plan(&self) -> Result<(Vec<MigrationPlanEntry>, Vec<MigrationFailure>)> {
        let symbols = self.store.list_symbols().await?;
        let mut plan = Vec::new();
        let mut failures = Vec::new();

        for symbol in &symbols {
            let versions = match self.store.list_versions(symbol).await {
                Ok(versions) => versions,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "failed to enumerate versions");
                    failures.push(MigrationFailure {
                        symbol: symbol.clone(),
                        version: None,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            for info in versions {
                match self.store.read_metadata(symbol, Some(info.version)).await {
                    Ok(item) => {
                        let has_stamp = item
                            .metadata
                            .as_ref()
                            .and_then(|m| m.as_object())
                            .is_some_and(|m| m.contains_key(AUDIT_USER_KEY));
                        plan.push(MigrationPlanEntry {
                            symbol: symbol.clone(),
                            version: info.version,
                            has_audit_metadata: has_stamp,
                            action: if has_stamp {
                                PlanAction::Skip
                            } else {
                                PlanAction::Tag
                            },
                        });
                    }
                    Err(e) => {
                        warn!(symbol = %symbol, version = info.version, error = %e, "metadata probe failed");
                        failures.push(MigrationFailure {
                            symbol: symbol.clone(),
                            version: Some(info.version),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        Ok((plan, failures))
    }

    /// Execute the migration (or simulate it when in dry-run mode)
    pub async fn run(&self) -> Result<MigrationReport> {
        let (plan, mut failures) = self.plan().await?;

        let mut summary = MigrationSummary {
            symbols: count_symbols(&plan, &failures),
            versions: plan.len(),
            dry_run: self.dry_run,
            ..Default::default()
        };

        if self.dry_run {
            summary.tagged = plan.iter().filter(|e| e.action == PlanAction::Tag).count();
            summary.skipped = plan.len() - summary.tagged;
            summary.failures = failures;

            // Single summary entry so unattended dry runs leave a trace;
            // no per-entry records are written.
            self.audit.append(&AuditRecord::new(
                &self.migration_user,
                OperationKind::DryRun,
                Vec::new(),
                self.store.library_name(),
                Some(json!({
                    "planned_tags": summary.tagged,
                    "skipped": summary.skipped,
                    "failed": summary.failures.len(),
                })),
            ))?;

            info!(
                library = %self.store.library_name(),
                planned = summary.tagged,
                "migration dry run complete"
            );
            return Ok(MigrationReport { plan, summary });
        }

        for entry in &plan {
            match entry.action {
                PlanAction::Skip => {
                    debug!(symbol = %entry.symbol, version = entry.version, "already tagged, skipping");
                    summary.skipped += 1;
                }
                PlanAction::Tag => match self.tag(entry).await {
                    Ok(()) => summary.tagged += 1,
                    Err(e) => {
                        warn!(
                            symbol = %entry.symbol,
                            version = entry.version,
                            error = %e,
                            "failed to tag version"
                        );
                        failures.push(MigrationFailure {
                            symbol: entry.symbol.clone(),
                            version: Some(entry.version),
                            error: e.to_string(),
                        });
                    }
                },
            }
        }

        summary.failures = failures;
        info!(
            library = %self.store.library_name(),
            tagged = summary.tagged,
            skipped = summary.skipped,
            failed = summary.failed(),
            "migration complete"
        );

        Ok(MigrationReport { plan, summary })
    }

    /// Merge the stamp into one version's existing metadata and record the
    /// applied action. Engine errors bubble to the caller (`run` aggregates
    /// them); an audit log failure is infrastructural and aborts the run.
    async fn tag(&self, entry: &MigrationPlanEntry) -> Result<()> {
        let current = self
            .store
            .read_metadata(&entry.symbol, Some(entry.version))
            .await?;

        let mut metadata = match current.metadata {
            Some(JsonValue::Object(map)) => map,
            _ => Map::new(),
        };
        metadata.insert(
            AUDIT_USER_KEY.to_string(),
            json!(self.migration_user.clone()),
        );
        metadata.insert(
            AUDIT_MIGRATED_AT_KEY.to_string(),
            json!(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );

        self.store
            .write_metadata(&entry.symbol, Some(entry.version), JsonValue::Object(metadata))
            .await?;

        self.audit.append(&AuditRecord::new(
            &self.migration_user,
            OperationKind::Migrate,
            vec![entry.symbol.clone()],
            self.store.library_name(),
            Some(json!({
                "version": entry.version,
                "action": "add_audit_metadata",
            })),
        ))?;

        Ok(())
    }
}

fn count_symbols(plan: &[MigrationPlanEntry], failures: &[MigrationFailure]) -> usize {
    let mut symbols: Vec<&str> = plan
        .iter()
        .map(|e| e.symbol.as_str())
        .chain(failures.iter().map(|f| f.symbol.as_str()))
        .collect();
    symbols.sort_unstable();
    symbols.dedup();
    symbols.len()
}
