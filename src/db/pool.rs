//! Connection management.
//!
//! The [`ConnectionManager`] owns the cache from access token to a live
//! backend connection (a database-specific sqlx pool in production).
//!
//! # Concurrency Safety
//!
//! - **`OnceCell` per token**: single-flight opening. Two simultaneous first
//!   uses of a token open exactly one connection; the second caller waits for
//!   the first.
//! - **Short lock scope**: the cache `RwLock` guards only the map structure.
//!   Connection opening runs inside the token's `OnceCell`, and query
//!   execution never touches the cache lock at all.
//! - **No broken handles**: a failed open leaves the cell empty and the slot
//!   is removed, so the next call retries from scratch.
//! - **Shutdown races**: `close_all` drains the map under the write lock and
//!   closes outside it. A connection that finishes opening after its slot was
//!   drained is closed immediately instead of being leaked.
//!
//! The backend registry is published as an immutable `Arc` snapshot and
//! swapped wholesale on reload.

use crate::auth::mask_token;
use crate::config::PoolOptions;
use crate::db::dsn::{Dsn, DsnSynthesizer};
use crate::error::{GatewayError, GatewayResult};
use crate::models::{Credential, DriverKind};
use crate::registry::BackendRegistry;
use crate::tokens::CredentialResolver;
use sqlx::{
    MySqlPool, PgPool, SqlitePool, mysql::MySqlPoolOptions, postgres::PgPoolOptions,
    sqlite::SqlitePoolOptions,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

// =============================================================================
// Connectors
// =============================================================================

/// Opens and closes backend connections for the manager.
pub trait Connector: Send + Sync + 'static {
    type Connection: Clone + Send + Sync + 'static;

    /// Open a live connection described by `dsn`.
    fn connect(&self, dsn: &Dsn) -> impl Future<Output = GatewayResult<Self::Connection>> + Send;

    /// Close a connection. In-flight users see a connection-closed error.
    fn close(&self, connection: &Self::Connection) -> impl Future<Output = ()> + Send;
}

/// Database-specific connection pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    SQLite(SqlitePool),
}

impl DbPool {
    /// Close the connection pool.
    pub async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
            DbPool::SQLite(pool) => pool.close().await,
        }
    }

    /// Get the driver kind for this pool.
    pub fn driver(&self) -> DriverKind {
        match self {
            DbPool::MySql(_) => DriverKind::MySql,
            DbPool::Postgres(_) => DriverKind::Postgres,
            DbPool::SQLite(_) => DriverKind::Sqlite,
        }
    }
}

/// Production connector backed by sqlx pools.
#[derive(Debug, Clone, Default)]
pub struct SqlxConnector {
    options: PoolOptions,
}

impl SqlxConnector {
    pub fn new(options: PoolOptions) -> Self {
        Self { options }
    }

    /// Generate a helpful suggestion for connection errors.
    fn connection_suggestion(driver: &DriverKind, error: &sqlx::Error) -> String {
        let error_str = error.to_string().to_lowercase();

        if error_str.contains("connection refused") {
            return format!("Check that the {} server is running and accessible", driver);
        }

        if error_str.contains("authentication") || error_str.contains("password") {
            return "Verify the user and password configured for this token".to_string();
        }

        if error_str.contains("does not exist")
            || error_str.contains("unknown database")
            || error_str.contains("unable to open database")
        {
            return "Check that the target database exists".to_string();
        }

        if error_str.contains("tls") || error_str.contains("ssl") {
            return "Check the backend TLS flag, or build with a TLS feature enabled".to_string();
        }

        format!("Check the {} backend coordinates in the registry", driver)
    }
}

impl Connector for SqlxConnector {
    type Connection = DbPool;

    async fn connect(&self, dsn: &Dsn) -> GatewayResult<DbPool> {
        let opts = &self.options;
        let is_sqlite = matches!(dsn, Dsn::Sqlite(_));
        let acquire_timeout = Duration::from_secs(opts.acquire_timeout_or_default());
        let idle_timeout = Some(Duration::from_secs(opts.idle_timeout_or_default()));
        let max_connections = opts.max_connections_or_default(is_sqlite);
        let min_connections = opts.min_connections_or_default().min(max_connections);
        let test_before_acquire = opts.test_before_acquire_or_default();

        let result = match dsn {
            Dsn::MySql(mysql) => MySqlPoolOptions::new()
                .min_connections(min_connections)
                .max_connections(max_connections)
                .acquire_timeout(acquire_timeout)
                .idle_timeout(idle_timeout)
                .test_before_acquire(test_before_acquire)
                .connect_with(mysql.connect_options())
                .await
                .map(DbPool::MySql),
            Dsn::Postgres(pg) => PgPoolOptions::new()
                .min_connections(min_connections)
                .max_connections(max_connections)
                .acquire_timeout(acquire_timeout)
                .idle_timeout(idle_timeout)
                .test_before_acquire(test_before_acquire)
                .connect_with(pg.connect_options())
                .await
                .map(DbPool::Postgres),
            Dsn::Sqlite(sqlite) => SqlitePoolOptions::new()
                .min_connections(min_connections)
                .max_connections(max_connections)
                .acquire_timeout(acquire_timeout)
                .idle_timeout(idle_timeout)
                .test_before_acquire(test_before_acquire)
                .connect_with(sqlite.connect_options())
                .await
                .map(DbPool::SQLite),
        };

        result.map_err(|e| {
            GatewayError::connection(
                format!("Failed to connect: {}", e),
                Self::connection_suggestion(&dsn.driver(), &e),
            )
        })
    }

    async fn close(&self, connection: &DbPool) {
        connection.close().await;
    }
}

// =============================================================================
// Connection Manager
// =============================================================================

#[derive(Debug)]
struct CachedConnection<T> {
    connection: T,
    driver: DriverKind,
}

type Slot<T> = Arc<OnceCell<CachedConnection<T>>>;

/// Token-keyed cache of live backend connections.
pub struct ConnectionManager<C: Connector = SqlxConnector> {
    connector: C,
    synthesizer: DsnSynthesizer,
    credentials: Arc<dyn CredentialResolver>,
    /// Uses std::sync::RwLock (not tokio) since it is never held across await.
    backends: std::sync::RwLock<Arc<BackendRegistry>>,
    connections: RwLock<HashMap<String, Slot<C::Connection>>>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Create a connection manager with the default DSN strategies.
    pub fn new(
        connector: C,
        backends: BackendRegistry,
        credentials: Arc<dyn CredentialResolver>,
    ) -> Self {
        Self::with_synthesizer(connector, DsnSynthesizer::with_defaults(), backends, credentials)
    }

    pub fn with_synthesizer(
        connector: C,
        synthesizer: DsnSynthesizer,
        backends: BackendRegistry,
        credentials: Arc<dyn CredentialResolver>,
    ) -> Self {
        Self {
            connector,
            synthesizer,
            credentials,
            backends: std::sync::RwLock::new(Arc::new(backends)),
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Current registry snapshot.
    pub fn backends(&self) -> Arc<BackendRegistry> {
        match self.backends.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Publish a new registry. Cached connections are left untouched.
    pub fn replace_backends(&self, registry: BackendRegistry) {
        let registry = Arc::new(registry);
        info!(count = registry.len(), "Publishing backend registry");
        match self.backends.write() {
            Ok(mut guard) => *guard = registry,
            Err(poisoned) => *poisoned.into_inner() = registry,
        }
    }

    /// Look up the credentials bound to `token`.
    pub fn resolve(&self, token: &str) -> GatewayResult<Credential> {
        self.credentials.resolve(token).ok_or_else(|| {
            debug!(token = %mask_token(token), "Token did not resolve");
            GatewayError::InvalidToken
        })
    }

    /// Get the live connection for `token`, opening it on first use.
    pub async fn get_connection(&self, token: &str) -> GatewayResult<C::Connection> {
        let credential = self.resolve(token)?;
        let backend = self.backends().get(&credential.backend)?.clone();

        let slot = self.slot_for(token).await;
        if let Some(cached) = slot.get() {
            return Ok(cached.connection.clone());
        }

        let opened = slot
            .get_or_try_init(|| async {
                let dsn = self.synthesizer.synthesize(&credential, &backend)?;
                info!(
                    token = %mask_token(token),
                    backend = %backend.name,
                    driver = %backend.driver,
                    dsn = %dsn.redacted(),
                    "Opening backend connection"
                );
                let connection = self.connector.connect(&dsn).await?;
                Ok::<_, GatewayError>(CachedConnection {
                    connection,
                    driver: dsn.driver(),
                })
            })
            .await;

        let cached = match opened {
            Ok(cached) => cached,
            Err(e) => {
                warn!(
                    token = %mask_token(token),
                    backend = %backend.name,
                    error = %e,
                    "Failed to open backend connection"
                );
                self.discard_empty_slot(token, &slot).await;
                return Err(e);
            }
        };

        // close_all may have drained the slot while the connection was opening.
        if !self.is_current_slot(token, &slot).await {
            warn!(
                token = %mask_token(token),
                "Connection cache was cleared while opening, closing new connection"
            );
            self.connector.close(&cached.connection).await;
            return Err(GatewayError::connection(
                "Connection was closed while it was being opened",
                "The gateway is shutting down or reloading; retry the request",
            ));
        }

        debug!(
            token = %mask_token(token),
            driver = %cached.driver,
            "Backend connection ready"
        );
        Ok(cached.connection.clone())
    }

    /// Get or create the cache slot for a token.
    async fn slot_for(&self, token: &str) -> Slot<C::Connection> {
        {
            let connections = self.connections.read().await;
            if let Some(slot) = connections.get(token) {
                return Arc::clone(slot);
            }
        }

        let mut connections = self.connections.write().await;
        // Double-check after acquiring write lock
        Arc::clone(
            connections
                .entry(token.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        )
    }

    async fn is_current_slot(&self, token: &str, slot: &Slot<C::Connection>) -> bool {
        let connections = self.connections.read().await;
        connections
            .get(token)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    /// Remove a slot whose open attempt failed, unless another caller filled it.
    async fn discard_empty_slot(&self, token: &str, slot: &Slot<C::Connection>) {
        let mut connections = self.connections.write().await;
        let remove = connections
            .get(token)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && current.get().is_none());
        if remove {
            connections.remove(token);
        }
    }

    /// Number of live cached connections.
    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    /// Close every cached connection and empty the cache. Idempotent.
    pub async fn close_all(&self) {
        // Drain under lock, close outside lock
        let drained: Vec<_> = {
            let mut connections = self.connections.write().await;
            connections.drain().collect()
        };

        let mut closed = 0usize;
        for (token, slot) in drained {
            if let Some(cached) = slot.get() {
                debug!(token = %mask_token(&token), driver = %cached.driver, "Closing connection");
                self.connector.close(&cached.connection).await;
                closed += 1;
            }
        }
        info!(closed, "All connections closed");
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("synthesizer", &self.synthesizer)
            .field("backends", &self.backends().len())
            .finish_non_exhaustive()
    }
}
