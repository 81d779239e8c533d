//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::DomainError;

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("ambiguous reference {key:?}: {matches} matches")]
    Ambiguous { key: String, matches: usize },

    #[error("orchard not initialized: {0}")]
    NotInitialized(String),

    #[error("orchard already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("orchard state unavailable: a previous writer panicked")]
    StatePoisoned,

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
