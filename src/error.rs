//! Error types for the query gateway.
//!
//! Every failure on the request path is a recoverable `GatewayError`; one
//! caller's bad token or unreachable backend never takes the process down.
//! Variants carry actionable suggestions where the caller can do something
//! about the condition.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid access token")]
    InvalidToken,

    #[error("Unknown backend: {backend}")]
    UnknownBackend { backend: String },

    #[error("Unsupported database driver: {driver}")]
    UnsupportedDriver { driver: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Query failed: {message}")]
    Query {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Failed to read result: {message}")]
    Marshal { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Create an unknown backend error.
    pub fn unknown_backend(backend: impl Into<String>) -> Self {
        Self::UnknownBackend {
            backend: backend.into(),
        }
    }

    /// Create an unsupported driver error.
    pub fn unsupported_driver(driver: impl Into<String>) -> Self {
        Self::UnsupportedDriver {
            driver: driver.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a query error with optional SQL state.
    pub fn query(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Query {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    pub fn marshal(message: impl Into<String>) -> Self {
        Self::Marshal {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Query { suggestion, .. } => Some(suggestion),
            Self::InvalidToken => Some("Check the Bearer token sent with the request"),
            Self::UnknownBackend { .. } | Self::UnsupportedDriver { .. } => {
                Some("The token refers to a misconfigured backend; contact the gateway operator")
            }
            Self::Timeout { .. } => {
                Some("Consider optimizing the query or asking for a larger timeout")
            }
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }

    /// Stable machine-readable code for this error class.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidToken => "invalid_token",
            Self::UnknownBackend { .. } => "unknown_backend",
            Self::UnsupportedDriver { .. } => "unsupported_driver",
            Self::Connection { .. } => "connection_error",
            Self::Query { .. } => "query_error",
            Self::Timeout { .. } => "timeout",
            Self::Marshal { .. } => "marshal_error",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Configuration { .. } => "configuration_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// HTTP status code reported to the transport layer.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidToken => 401,
            Self::Query { .. } | Self::InvalidInput { .. } => 400,
            Self::Connection { .. } => 502,
            Self::Timeout { .. } => 504,
            Self::UnknownBackend { .. }
            | Self::UnsupportedDriver { .. }
            | Self::Marshal { .. }
            | Self::Configuration { .. }
            | Self::Internal { .. } => 500,
        }
    }
}

/// Convert sqlx errors to GatewayError.
impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => GatewayError::connection(
                msg.to_string(),
                "Check the backend coordinates and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                GatewayError::query(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::PoolTimedOut => GatewayError::connection(
                "Timed out waiting for a backend connection",
                "The backend may be overloaded; retry later",
            ),
            sqlx::Error::PoolClosed => GatewayError::connection(
                "Connection was closed",
                "The gateway is shutting down or reloading; retry the request",
            ),
            sqlx::Error::Io(io_err) => GatewayError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => GatewayError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => GatewayError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => GatewayError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                GatewayError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                GatewayError::internal(format!("Decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => GatewayError::internal("Database worker crashed"),
            _ => GatewayError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
