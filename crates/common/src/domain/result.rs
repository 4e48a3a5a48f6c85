use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Record decode error: {0}")]
    RecordDecodeError(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("No form is open")]
    NoOpenForm,

    #[error("Unknown field: {0}")]
    UnknownField(String),
}
