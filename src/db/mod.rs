//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - DSN synthesis per driver kind
//! - Token-keyed connection management
//! - Query execution
//! - Declared-type classification and result marshalling

pub mod dsn;
pub mod executor;
pub mod marshal;
pub mod pool;
pub mod types;

pub use dsn::{Dsn, DsnStrategy, DsnSynthesizer};
pub use executor::QueryExecutor;
pub use marshal::{ResultBuilder, marshal};
pub use pool::{ConnectionManager, Connector, DbPool, SqlxConnector};
pub use types::{ColumnDescriptor, TypeClass};
