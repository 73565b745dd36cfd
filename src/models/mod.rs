//! Data models for the query gateway.
//!
//! This module re-exports all model types used throughout the application.

pub mod backend;
pub mod credential;
pub mod result;

// Re-export commonly used types
pub use backend::{BackendEntry, DEFAULT_BACKEND_PORT, DriverKind};
pub use credential::Credential;
pub use result::{FieldMeta, MarshalledResult, QueryRequest};
