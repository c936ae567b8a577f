use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    ListAll,
    Upsert,
    Delete,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreOperation::ListAll => "list_all",
            StoreOperation::Upsert => "upsert",
            StoreOperation::Delete => "delete",
        })
    }
}

/// Any record store failure. The cause is carried as text only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record store {operation} failed: {message}")]
pub struct StoreError {
    pub operation: StoreOperation,
    pub message: String,
}

impl StoreError {
    pub fn new(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PhoneValidationError {
    #[error("phone number is empty")]
    Empty,
    #[error("phone number must contain only digits")]
    NonDigit,
    #[error("phone number needs at least {min} digits, got {actual}")]
    TooShort { min: usize, actual: usize },
}
