use thiserror::Error;

/// Errors surfaced by the generation pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// A run for the period is already pending or processing.
    #[error("a generation run is already in progress for {0}")]
    Conflict(String),

    /// Malformed period, pattern count out of range, or invalid settings.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The oracle call failed or returned something unparseable.
    #[error("oracle call failed: {0}")]
    Oracle(String),

    /// The validator could not load its inputs.
    #[error("validation input unavailable: {0}")]
    ValidationInput(String),

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid state transition: {0}")]
    InvalidTransition(String),
}

impl From<rusqlite::Error> for ScheduleError {
    fn from(err: rusqlite::Error) -> Self {
        ScheduleError::Persistence(err.to_string())
    }
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
