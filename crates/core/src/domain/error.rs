// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid invocation state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid snippet: {0}")]
    InvalidSnippet(String),

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid command template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("Command generator failed: {0}")]
    GeneratorFailed(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
