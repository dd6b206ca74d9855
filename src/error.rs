//! Error types for the migration engine.
//!
//! Library code returns [`MigrateError`] via `thiserror`. The binary and the
//! orchestration entry points wrap it in `anyhow` for fatal reporting.

use std::path::PathBuf;

/// Top-level error type for store, configuration and validation failures.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Database error raised inside a store operation.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    /// One or more required tables are absent from the target database.
    #[error("schema error: missing tables: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    /// Precondition check failed before any document was processed.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MigrateError>;

impl MigrateError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
