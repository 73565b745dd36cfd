//! Query execution engine.
//!
//! Runs one raw statement on the connection bound to an access token and
//! hands the resulting rows to the marshaller. Statements are sent without
//! bind parameters, so every backend returns values in its textual wire
//! format.
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific fetch
//! - `postgres`: PostgreSQL-specific fetch
//! - `sqlite`: SQLite-specific fetch
//!
//! Each submodule is generated from the same template; only the pool type differs.

use crate::auth::mask_token;
use crate::db::marshal::ResultBuilder;
use crate::db::pool::{ConnectionManager, DbPool};
use crate::db::types::{RawRow, describe_columns};
use crate::error::{GatewayError, GatewayResult};
use crate::models::MarshalledResult;
use futures_util::TryStreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Executes statements for access tokens.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    connections: Arc<ConnectionManager>,
    query_timeout: Duration,
}

impl QueryExecutor {
    pub fn new(connections: Arc<ConnectionManager>, query_timeout: Duration) -> Self {
        Self {
            connections,
            query_timeout,
        }
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Run `query` on the backend bound to `token` and marshal every row.
    ///
    /// Fails with `InvalidToken` before any backend contact when the token
    /// does not resolve, and with `InvalidInput` for a blank statement before
    /// a connection is opened. A statement running longer than the query
    /// timeout is abandoned and reported as `Timeout`; the connection stays
    /// cached.
    pub async fn execute(&self, token: &str, query: &str) -> GatewayResult<MarshalledResult> {
        self.connections.resolve(token)?;
        if query.trim().is_empty() {
            return Err(GatewayError::invalid_input("Query must not be empty"));
        }
        let pool = self.connections.get_connection(token).await?;
        let start = Instant::now();

        debug!(
            token = %mask_token(token),
            driver = %pool.driver(),
            sql = %query,
            timeout_secs = self.query_timeout.as_secs(),
            "Executing query"
        );

        let result = match timeout(self.query_timeout, fetch_marshalled(&pool, query)).await {
            Ok(result) => result?,
            Err(_) => return Err(timeout_error("query execution", self.query_timeout)),
        };

        info!(
            token = %mask_token(token),
            rows = result.total_rows,
            columns = result.fields.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query completed"
        );
        Ok(result)
    }
}

async fn fetch_marshalled(pool: &DbPool, sql: &str) -> GatewayResult<MarshalledResult> {
    match pool {
        DbPool::MySql(p) => mysql::fetch_marshalled(p, sql).await,
        DbPool::Postgres(p) => postgres::fetch_marshalled(p, sql).await,
        DbPool::SQLite(p) => sqlite::fetch_marshalled(p, sql).await,
    }
}

fn timeout_error(operation: &str, timeout: Duration) -> GatewayError {
    GatewayError::timeout(operation, timeout.as_secs())
}

fn read_error(e: sqlx::Error) -> GatewayError {
    GatewayError::marshal(format!("Failed to read row values: {}", e))
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================

/// Generates a backend module whose `fetch_marshalled` streams rows into a
/// [`ResultBuilder`]. Column metadata comes from the first row, or from
/// describing the statement when it returns no rows. Statements that cannot
/// be described after running (DDL on SQLite, for one) report no fields.
macro_rules! backend_fetch {
    ($module:ident, $pool:ty) => {
        mod $module {
            use super::*;
            use sqlx::Executor;

            pub async fn fetch_marshalled(pool: &$pool, sql: &str) -> GatewayResult<MarshalledResult> {
                let mut builder: Option<ResultBuilder> = None;
                {
                    let mut rows = pool.fetch(sql);
                    while let Some(row) = rows.try_next().await? {
                        if let Some(builder) = builder.as_mut() {
                            if builder.has_untyped_columns() {
                                builder.resolve_types(row.column_descriptors());
                            }
                        }
                        let values = row.raw_values().map_err(read_error)?;
                        builder
                            .get_or_insert_with(|| ResultBuilder::new(row.column_descriptors()))
                            .push_row(values);
                    }
                }

                if let Some(builder) = builder {
                    return Ok(builder.finish());
                }
                match pool.describe(sql).await {
                    Ok(described) => {
                        Ok(ResultBuilder::new(describe_columns(described.columns())).finish())
                    }
                    Err(e) => {
                        warn!(error = %e, "Statement returned no rows and could not be described, reporting no fields");
                        Ok(MarshalledResult::default())
                    }
                }
            }
        }
    };
}

backend_fetch!(mysql, sqlx::MySqlPool);
backend_fetch!(postgres, sqlx::PgPool);
backend_fetch!(sqlite, sqlx::SqlitePool);
