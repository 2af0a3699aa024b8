//! Error types for audit operations
//!
//! Validation errors surface before any side effect; engine errors pass
//! through transparently so callers see exactly what the store raised.

use crate::record::OperationKind;
use crate::store::StoreError;
use thiserror::Error;

/// Result type alias for audit operations
pub type Result<T> = std::result::Result<T, AuditError>;

/// Error type for the audit logger and enforcement wrapper
#[derive(Error, Debug)]
pub enum AuditError {
    /// Operation called without a usable actor identity. Raised before the
    /// audit log or the store is touched.
    #[error("'{operation}' requires a non-empty user_id for audit attribution. Pass user_id=\"<user>\" or user_id=\"<service>\".")]
    ActorRequired { operation: OperationKind },

    /// Audit log destination unwritable or flush failed. The wrapped
    /// operation is aborted before the store is invoked.
    #[error("Audit log I/O failure: {0}. Check that the log path is writable and the disk has space.")]
    Io(#[from] std::io::Error),

    /// Audit record could not be encoded as a log line
    #[error("Failed to encode audit record: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Passthrough of whatever the storage engine raised
    #[error(transparent)]
    Store(#[from] StoreError),
}
