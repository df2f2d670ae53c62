//! Error types for the scheduler.

use thiserror::Error;

/// Errors that can occur in scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A schedule entry could not be parsed.
    #[error("invalid schedule time {input:?}: {reason}")]
    InvalidTime { input: String, reason: String },

    /// The next run of a job could not be computed.
    #[error("cannot compute next run: {0}")]
    Fault(String),
}
