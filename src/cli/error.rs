//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Usage(String),

    #[error("batch incomplete: {0}")]
    BatchIncomplete(String),
}

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) | CliError::Usage(_) => crate::exitcode::USAGE,
            CliError::BatchIncomplete(_) => crate::exitcode::PARTIAL,
            CliError::Infra(e) => match e {
                InfraError::Io { .. } => crate::exitcode::IOERR,
                InfraError::Application(app) => match app {
                    ApplicationError::NotInitialized(_) => crate::exitcode::NOINPUT,
                    ApplicationError::AlreadyInitialized(_) => crate::exitcode::CANTCREAT,
                    ApplicationError::NotFound(_) | ApplicationError::Ambiguous { .. } => {
                        crate::exitcode::NOINPUT
                    }
                    ApplicationError::Config { .. } => crate::exitcode::CONFIG,
                    ApplicationError::OperationFailed { .. } => crate::exitcode::IOERR,
                    ApplicationError::StatePoisoned => crate::exitcode::SOFTWARE,
                    ApplicationError::Domain(domain) => match domain {
                        DomainError::InvalidHierarchy(_) => crate::exitcode::DATAERR,
                        DomainError::AdmissionDenied(_)
                        | DomainError::InsufficientBalance { .. }
                        | DomainError::BalanceOverflow { .. } => crate::exitcode::REFUSED,
                        _ => crate::exitcode::DATAERR,
                    },
                },
            },
        }
    }
}
