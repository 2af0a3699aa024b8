//! Error types for the opslog CLI
//!
//! Messages are user-facing; each one says what failed and what to do
//! about it.

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Error type for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Audit logger or enforcement failure
    #[error("Audit error: {0}")]
    Audit(#[from] opslog_core::AuditError),

    /// Storage engine failure
    #[error("Store error: {0}")]
    Store(#[from] opslog_core::StoreError),

    /// A flag value did not parse
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// One or more symbol versions failed to migrate; see the printed
    /// summary for the affected entries
    #[error("Migration finished with {0} failed entries. Re-run after resolving the reported symbols.")]
    MigrationFailed(usize),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
