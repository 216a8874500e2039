//! Error types for BRM

use thiserror::Error;

/// Main error type for BRM
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connectivity loss, aborted transaction or any other storage-layer fault
    #[error("Database error: {0}")]
    Database(String),

    /// A uniqueness or other store-enforced constraint rejected the write
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Transaction timed out after {0} ms")]
    Timeout(u64),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Hook error: {0}")]
    Hook(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for BRM
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Config(_) => 500,
            Error::Database(_) => 500,
            Error::ConstraintViolation(_) => 500,
            Error::Timeout(_) => 500,
            Error::Validation(_) => 400,
            Error::NotFound(_) => 404,
            Error::Hook(_) => 500,
            Error::Internal(_) => 500,
            Error::Other(_) => 500,
        }
    }

    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
            Error::ConstraintViolation(_) => "CONSTRAINT_VIOLATION",
            Error::Timeout(_) => "DATABASE_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Hook(_) => "HOOK_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this error is a storage fault (connectivity, abort, timeout)
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Timeout(_))
    }
}
