use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("operation failed: {0}")]
    OperationFailed(String),
    #[error("inference unavailable: {0}")]
    Unavailable(String),
    #[error("camera device error: {0}")]
    Device(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
