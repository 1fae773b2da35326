//! Error types for the fuelwatch state store.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: u64 },

    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
}

impl StateError {
    /// True for persistence/I/O faults, false for client errors.
    pub fn is_store_failure(&self) -> bool {
        !matches!(self, Self::NotFound { .. } | Self::Validation { .. })
    }
}
