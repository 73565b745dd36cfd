//! Configuration handling for the query gateway.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BACKENDS_FILE: &str = "databases.conf";
pub const DEFAULT_TOKENS_FILE: &str = "tokens.conf";
pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 1999;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_MAX_CONNECTIONS_SQLITE: u32 = 1;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = DEFAULT_CONNECT_TIMEOUT_SECS;

/// Sizing of the pool opened for each token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum connections in pool (default: 5 for MySQL/PostgreSQL, 1 for SQLite)
    pub max_connections: Option<u32>,
    /// Minimum connections in pool (default: 1)
    pub min_connections: Option<u32>,
    /// Idle timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Connection acquire timeout in seconds (default: 10)
    pub acquire_timeout_secs: Option<u64>,
    /// Whether to test connections before use (default: true)
    pub test_before_acquire: Option<bool>,
}

impl PoolOptions {
    /// Get max_connections with default value based on database type.
    pub fn max_connections_or_default(&self, is_sqlite: bool) -> u32 {
        self.max_connections.unwrap_or(if is_sqlite {
            DEFAULT_MAX_CONNECTIONS_SQLITE
        } else {
            DEFAULT_MAX_CONNECTIONS
        })
    }

    pub fn min_connections_or_default(&self) -> u32 {
        self.min_connections.unwrap_or(DEFAULT_MIN_CONNECTIONS)
    }

    pub fn idle_timeout_or_default(&self) -> u64 {
        self.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS)
    }

    pub fn acquire_timeout_or_default(&self) -> u64 {
        self.acquire_timeout_secs
            .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS)
    }

    pub fn test_before_acquire_or_default(&self) -> bool {
        self.test_before_acquire.unwrap_or(true)
    }

    /// Validate pool options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(max) = self.max_connections {
            if max == 0 {
                return Err("max_connections must be greater than 0".to_string());
            }
        }
        if let Some(min) = self.min_connections {
            if let Some(max) = self.max_connections {
                if min > max {
                    return Err(format!(
                        "min_connections ({}) cannot exceed max_connections ({})",
                        min, max
                    ));
                }
            }
        }
        if self.acquire_timeout_secs == Some(0) {
            return Err("connect timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Configuration for the query gateway.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "prqld",
    about = "Multi-tenant SQL query gateway - runs queries against the backend bound to an access token",
    version,
    author
)]
pub struct Config {
    /// Backend registry file (name:driver:host:port:tls per line)
    #[arg(
        long = "backends",
        value_name = "FILE",
        default_value = DEFAULT_BACKENDS_FILE,
        env = "PRQLD_BACKENDS"
    )]
    pub backends_file: PathBuf,

    /// Token table file (token:backend:user:password:database per line)
    #[arg(
        long = "tokens",
        value_name = "FILE",
        default_value = DEFAULT_TOKENS_FILE,
        env = "PRQLD_TOKENS"
    )]
    pub tokens_file: PathBuf,

    /// HTTP host to bind to
    #[arg(
        long,
        default_value = DEFAULT_HTTP_HOST,
        env = "PRQLD_HTTP_HOST"
    )]
    pub http_host: String,

    /// HTTP port to bind to
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "PRQLD_HTTP_PORT"
    )]
    pub http_port: u16,

    /// Query timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        env = "PRQLD_QUERY_TIMEOUT"
    )]
    pub query_timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "PRQLD_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Maximum pooled connections per token (default 5, 1 for SQLite)
    #[arg(long, env = "PRQLD_MAX_CONNECTIONS")]
    pub max_connections: Option<u32>,

    /// Seconds an idle pooled connection is kept open
    #[arg(
        long,
        default_value_t = DEFAULT_IDLE_TIMEOUT_SECS,
        env = "PRQLD_IDLE_TIMEOUT"
    )]
    pub idle_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "PRQLD_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "PRQLD_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            backends_file: PathBuf::from(DEFAULT_BACKENDS_FILE),
            tokens_file: PathBuf::from(DEFAULT_TOKENS_FILE),
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_connections: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT_SECS,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Pool sizing applied to every token's pool.
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_connections: self.max_connections,
            min_connections: None,
            idle_timeout_secs: Some(self.idle_timeout),
            acquire_timeout_secs: Some(self.connect_timeout),
            test_before_acquire: None,
        }
    }

    /// Get the query timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    pub fn shutdown_timeout_duration(&self) -> Duration {
        Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
