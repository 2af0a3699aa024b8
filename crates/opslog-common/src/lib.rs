//! opslog Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared plumbing for the opslog workspace.
//!
//! Today this is the logging configuration used by both the library crates
//! and the `opslog` binary. Diagnostic output goes through `tracing`
//! everywhere; the only `println!` calls in the workspace are the CLI's
//! user-facing summaries.

pub mod logging;

pub use logging::{init_logging, LogConfig, LogLevel, LogOutput};
