//! Error types for the pool registry.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Library code always returns these errors; whether an error halts the process is
//! decided by the caller (see [`DbError::is_fatal`]).

use crate::models::{Engine, Role};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Unsupported database engine: '{engine}'")]
    UnsupportedEngine { engine: String },

    #[error("Unsupported database role: '{role}'")]
    UnsupportedRole { role: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String, suggestion: String },

    #[error("Invalid connection string: {message}")]
    InvalidDsn { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Failed to create {engine} {role} pool")]
    PoolCreation {
        engine: Engine,
        role: Role,
        #[source]
        source: Box<DbError>,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create an unsupported engine error.
    pub fn unsupported_engine(engine: impl Into<String>) -> Self {
        Self::UnsupportedEngine {
            engine: engine.into(),
        }
    }

    /// Create an unsupported role error.
    pub fn unsupported_role(role: impl Into<String>) -> Self {
        Self::UnsupportedRole { role: role.into() }
    }

    /// Create a configuration error with a helpful suggestion.
    pub fn configuration(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an invalid DSN error.
    pub fn invalid_dsn(message: impl Into<String>) -> Self {
        Self::InvalidDsn {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Wrap a failure that happened while populating an (engine, role) slot.
    pub fn pool_creation(engine: Engine, role: Role, source: DbError) -> Self {
        Self::PoolCreation {
            engine,
            role,
            source: Box::new(source),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Configuration { suggestion, .. } => Some(suggestion),
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::PoolCreation { source, .. } => source.suggestion(),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    ///
    /// A failed pool creation always leaves its slot empty; it is only worth
    /// retrying when the underlying cause is transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { .. } | Self::Timeout { .. } => true,
            Self::PoolCreation { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Check if this error indicates a build or deployment defect that no
    /// caller can recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnsupportedEngine { .. })
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::configuration(
                msg.to_string(),
                "Check the connection settings for this engine and role",
            ),
            sqlx::Error::Database(db_err) => DbError::connection(
                db_err.message(),
                "Check the credentials and that the database exists",
            ),
            sqlx::Error::PoolTimedOut => DbError::connection(
                "Timed out waiting for a pooled connection",
                "Raise --connect-timeout or check the server load",
            ),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Create a new registry")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for registry operations.
pub type DbResult<T> = Result<T, DbError>;
