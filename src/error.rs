//! Error types for the maintenance service.
//!
//! All error variants are defined with `thiserror`. Resolver and registry
//! errors propagate as typed failures; executor and status-query errors are
//! captured into result records before they reach the HTTP layer, so every
//! request ends with an explicit `success` flag.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MaintenanceError {
    #[error("Target with id {server_id} not found")]
    NotFound { server_id: u32 },

    #[error("Invalid target profile: {message}")]
    InvalidProfile { message: String },

    #[error("Unknown maintenance task: '{name}'")]
    InvalidTask { name: String },

    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error("Maintenance batch failed: {message}")]
    Execution { message: String },

    #[error("Telemetry query failed: {message}")]
    Telemetry { message: String },

    #[error("Status query failed: {message}")]
    Query { message: String },

    #[error("Timeout: {operation} exceeded {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl MaintenanceError {
    /// Create a not-found error for an unregistered target id.
    pub fn not_found(server_id: u32) -> Self {
        Self::NotFound { server_id }
    }

    /// Create an invalid-profile error.
    pub fn invalid_profile(message: impl Into<String>) -> Self {
        Self::InvalidProfile {
            message: message.into(),
        }
    }

    /// Create an invalid-task error.
    pub fn invalid_task(name: impl Into<String>) -> Self {
        Self::InvalidTask { name: name.into() }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create an execution error.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Create a telemetry error.
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry {
            message: message.into(),
        }
    }

    /// Create a status-query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_ms,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is retryable by the caller. The service never
    /// retries on its own; a fresh `acquire` after a connect failure attempts
    /// creation again because the failed attempt clears its pending slot.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

/// Decide whether a driver error means the pooled connection is no longer
/// usable. A positive answer makes the executor fire the fault signal so the
/// registry evicts the pool and the next `acquire` connects fresh.
pub fn is_connection_fault(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

/// Convert sqlx errors into the service taxonomy. Connection-level failures
/// map to `Connection`; statement failures map to `Execution`.
impl From<sqlx::Error> for MaintenanceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => MaintenanceError::connection(msg.to_string()),
            sqlx::Error::Io(io_err) => {
                MaintenanceError::connection(format!("I/O error: {}", io_err))
            }
            sqlx::Error::Tls(tls_err) => {
                MaintenanceError::connection(format!("TLS error: {}", tls_err))
            }
            sqlx::Error::Protocol(msg) => {
                MaintenanceError::connection(format!("Protocol error: {}", msg))
            }
            sqlx::Error::PoolTimedOut => {
                MaintenanceError::timeout("connection pool acquire", 30_000)
            }
            sqlx::Error::PoolClosed => MaintenanceError::connection("Connection pool is closed"),
            sqlx::Error::WorkerCrashed => MaintenanceError::connection("Database worker crashed"),
            sqlx::Error::Database(db_err) => {
                let msg = match db_err.code() {
                    Some(code) => format!("{} (SQLSTATE: {})", db_err.message(), code),
                    None => db_err.message().to_string(),
                };
                MaintenanceError::execution(msg)
            }
            sqlx::Error::RowNotFound => MaintenanceError::query("No rows returned"),
            sqlx::Error::ColumnNotFound(col) => {
                MaintenanceError::internal(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                MaintenanceError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                MaintenanceError::internal(format!("Decode error: {}", source))
            }
            _ => MaintenanceError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for maintenance operations.
pub type MaintenanceResult<T> = Result<T, MaintenanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MaintenanceError::not_found(999);
        assert!(err.to_string().contains("999"));

        let err = MaintenanceError::connection("refused");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_retryable() {
        assert!(MaintenanceError::connection("err").is_retryable());
        assert!(MaintenanceError::timeout("batch", 900_000).is_retryable());
        assert!(!MaintenanceError::invalid_profile("missing host").is_retryable());
        assert!(!MaintenanceError::not_found(1).is_retryable());
    }

    #[test]
    fn test_fault_classification() {
        let io = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert!(is_connection_fault(&io));
        assert!(is_connection_fault(&sqlx::Error::PoolClosed));
        assert!(!is_connection_fault(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn test_sqlx_io_maps_to_connection() {
        let io = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        let err: MaintenanceError = io.into();
        assert!(matches!(err, MaintenanceError::Connection { .. }));
    }

    #[test]
    fn test_sqlx_row_not_found_maps_to_query() {
        let err: MaintenanceError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, MaintenanceError::Query { .. }));
    }
}
