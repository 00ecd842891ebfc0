//! Error types for the planner engine.

use chrono::NaiveDate;
use thiserror::Error;

use crate::time_input::TimeParseError;

/// Errors that can occur in planner operations.
///
/// Partial application of a reschedule plan is not an error: it is reported
/// through [`crate::plan::ApplyOutcome::is_mismatch`].
#[derive(Error, Debug)]
pub enum PlannerError {
    /// Malformed input or a missing selection. Never sent to the backend.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The week could not be loaded. The previous snapshot is still in place.
    #[error("Could not load week: {0}")]
    TransientFetch(String),

    /// The backend refused a reschedule, plan apply or freeze toggle.
    #[error("Change rejected: {0}")]
    MutationRejected(String),

    #[error("Week of {0} is frozen")]
    WeekFrozen(NaiveDate),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Backend '{0}' not found in PATH")]
    BackendNotInstalled(String),

    #[error("Backend request timed out after {0}s")]
    BackendTimeout(u64),

    #[error("Invalid time: {0}")]
    TimeParse(#[from] TimeParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PlannerError {
    /// Message suitable for a non-blocking user notice.
    pub fn user_message(&self) -> String {
        match self {
            PlannerError::MutationRejected(msg) | PlannerError::TransientFetch(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for planner operations.
pub type PlannerResult<T> = Result<T, PlannerError>;
