//! This module contains the error types for the persistence layer.

use thiserror::Error;

/// Errors that can occur in the persistence layer.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// A general error occurred during a data store operation.
    #[error("A data store operation failed: {0}")]
    OperationFailed(String),

    /// The store could not be reached.
    #[error("Failed to connect to the data store: {0}")]
    ConnectionError(String),

    /// The requested item was not found in the data store.
    #[error("The requested item was not found: {0}")]
    NotFound(String),

    /// An error occurred during serialization or deserialization.
    #[error("Failed to serialize or deserialize data: {0}")]
    SerializationError(String),

    /// An error occurred during a database migration.
    #[error("A data migration failed: {0}")]
    MigrationError(String),

    /// An invalid configuration or input was provided.
    #[error("An invalid configuration or input was provided: {0}")]
    InvalidInput(String),

    /// The key holds a value of a different type than the operation expects.
    #[error("Operation against a key holding the wrong kind of value: {0}")]
    WrongType(String),
}

impl From<redis::RedisError> for PersistenceError {
    fn from(e: redis::RedisError) -> Self {
        if e.kind() == redis::ErrorKind::TypeError || e.code() == Some("WRONGTYPE") {
            PersistenceError::WrongType(e.to_string())
        } else if e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
            PersistenceError::ConnectionError(e.to_string())
        } else {
            PersistenceError::OperationFailed(e.to_string())
        }
    }
}

impl From<deadpool_redis::PoolError> for PersistenceError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        PersistenceError::ConnectionError(e.to_string())
    }
}
