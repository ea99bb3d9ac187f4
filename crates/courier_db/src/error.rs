// --- File: crates/courier_db/src/error.rs ---
//! Error types for the database client

use courier_common::error::CourierError;
use thiserror::Error;

/// Errors that can occur when working with the database client
#[derive(Debug, Error)]
pub enum DbError {
    /// Error from SQLx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// Error with the database configuration
    #[error("Database configuration error: {0}")]
    ConfigError(String),

    /// Error with database URL parsing
    #[error("Database URL error: {0}")]
    UrlError(String),

    /// Error with database pool creation
    #[error("Database pool error: {0}")]
    PoolError(String),

    /// Error with database query
    #[error("Database query error: {0}")]
    QueryError(String),

    /// A requested row does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<DbError> for CourierError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(message) => CourierError::NotFoundError(message),
            DbError::ConfigError(message) => CourierError::ConfigError(message),
            other => CourierError::DatabaseError(other.to_string()),
        }
    }
}
