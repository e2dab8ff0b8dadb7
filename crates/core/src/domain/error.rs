// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid queued request state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Queued request not found: {0}")]
    RequestNotFound(String),

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
