//! Error types for the headless runner.

use econ_core::error::SchedulerError;
use thiserror::Error;

/// Errors raised while loading inputs or running a sandbox episode.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Reading or writing a file failed.
    #[error("IO error on '{path}': {message}")]
    Io {
        /// Path involved.
        path: String,
        /// Underlying error.
        message: String,
    },

    /// A RON or JSON document did not parse.
    #[error("Parse error in '{path}': {message}")]
    Parse {
        /// Path involved.
        path: String,
        /// Parser message.
        message: String,
    },

    /// No catalog directory or named catalog was found.
    #[error("Catalog not found: {0}")]
    CatalogNotFound(String),

    /// Sandbox settings are unusable.
    #[error("Invalid sandbox config: {0}")]
    InvalidConfig(String),

    /// The scheduler reported an error.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Writing the JSON-lines stream failed.
    #[error("Output error: {0}")]
    Output(String),
}

/// Result alias for the headless crate.
pub type Result<T> = std::result::Result<T, SandboxError>;
