// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Materialization error: {0}")]
    Materialization(String),

    #[error("Generator error: {0}")]
    Generator(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Errors caused by the request itself rather than by running it
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            AppError::Conflict(_)
                | AppError::Unauthorized(_)
                | AppError::Domain(crate::domain::DomainError::InvalidSnippet(_))
        )
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
