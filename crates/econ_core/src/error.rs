//! Error types for the scheduler.
//!
//! Ordinary scheduling outcomes (unaffordable, placement rejected, dispatch
//! rejected) are not errors; they are reported as
//! [`crate::scheduler::DispatchOutcome`] values. Only bookkeeping bugs and
//! loading failures surface here.

use thiserror::Error;

use crate::resources::ResourceKind;

/// Result type alias using [`SchedulerError`].
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Top-level error type for the scheduling core.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Attempted to release more than is reserved above the floor.
    #[error("Reservation underflow: releasing {requested} {resource} with only {held} held")]
    ReservationUnderflow {
        /// Resource kind being released.
        resource: ResourceKind,
        /// Amount the caller tried to release.
        requested: i32,
        /// Amount actually held above the floor.
        held: i32,
    },

    /// Failed to read a catalog or config file.
    #[error("Failed to load '{path}': {message}")]
    LoadError {
        /// Path to the file that failed to load.
        path: String,
        /// Error message.
        message: String,
    },

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path (or source name) of the data that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Catalog failed validation.
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    /// Scheduler configuration failed validation.
    #[error("Invalid scheduler config: {0}")]
    InvalidConfig(String),

    /// Action key not present in the catalog.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Internal state check failed.
    #[error("Invalid scheduler state: {0}")]
    InvalidState(String),
}
