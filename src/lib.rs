//! prqld library
//!
//! A multi-tenant query gateway: an opaque access token selects backend
//! credentials, the gateway opens (and caches) a connection to that backend,
//! runs the caller's statement and returns the rows as typed JSON.

pub mod auth;
pub mod config;
pub mod db;
pub mod entry_file;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod registry;
pub mod tokens;
pub mod transport;

pub use config::Config;
pub use db::{ConnectionManager, QueryExecutor};
pub use error::{GatewayError, GatewayResult};
