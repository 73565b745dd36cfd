//! Connection descriptor (DSN) synthesis.
//!
//! A [`DsnSynthesizer`] maps each [`DriverKind`] to a [`DsnStrategy`] that
//! assembles a driver-specific descriptor from backend coordinates and
//! resolved credentials. Synthesis is pure: no I/O, no side effects.
//!
//! The registry's `verify_tls` flag is honored by every network driver:
//! PostgreSQL gets `sslmode=verify-full` or `sslmode=disable`, MySQL gets
//! identity-verified TLS or none.

use crate::error::{GatewayError, GatewayResult};
use crate::models::{BackendEntry, Credential, DriverKind};
use sqlx::mysql::{MySqlConnectOptions, MySqlSslMode};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::sqlite::SqliteConnectOptions;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

const REDACTED: &str = "****";

// =============================================================================
// Descriptors
// =============================================================================

/// MySQL descriptor, mirroring the fields of the MySQL driver configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct MySqlDsn {
    pub user: String,
    pub password: String,
    /// Network transport, always "tcp"
    pub net: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub tls: bool,
}

impl MySqlDsn {
    /// `host:port` address.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Render using the MySQL driver DSN grammar:
    /// `user:password@tcp(host:port)/database`.
    fn render(&self, password: &str) -> String {
        let mut dsn = String::new();
        if !self.user.is_empty() {
            dsn.push_str(&self.user);
            if !password.is_empty() {
                dsn.push(':');
                dsn.push_str(password);
            }
            dsn.push('@');
        }
        dsn.push_str(&format!("{}({})/{}", self.net, self.addr(), self.database));
        if self.tls {
            dsn.push_str("?tls=true");
        }
        dsn
    }

    pub fn connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .charset("utf8mb4")
            .ssl_mode(if self.tls {
                MySqlSslMode::VerifyIdentity
            } else {
                MySqlSslMode::Disabled
            });
        if !self.password.is_empty() {
            options = options.password(&self.password);
        }
        if !self.database.is_empty() {
            options = options.database(&self.database);
        }
        options
    }
}

/// PostgreSQL descriptor, rendered as a libpq `key=value` string.
#[derive(Clone, PartialEq, Eq)]
pub struct PgDsn {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl PgDsn {
    pub fn ssl_mode(&self) -> &'static str {
        if self.tls { "verify-full" } else { "disable" }
    }

    fn render(&self, password: &str) -> String {
        let port = self.port.to_string();
        [
            ("user", self.user.as_str()),
            ("password", password),
            ("dbname", self.database.as_str()),
            ("host", self.host.as_str()),
            ("port", port.as_str()),
            ("sslmode", self.ssl_mode()),
        ]
        .iter()
        .map(|(key, value)| format!("{}={}", key, quote_libpq_value(value)))
        .collect::<Vec<_>>()
        .join(" ")
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database)
            .ssl_mode(if self.tls {
                PgSslMode::VerifyFull
            } else {
                PgSslMode::Disable
            });
        if !self.password.is_empty() {
            options = options.password(&self.password);
        }
        options
    }
}

/// Quote a libpq connection-string value when needed.
///
/// Empty values and values containing whitespace, `'` or `\` are wrapped in
/// single quotes with `'` and `\` backslash-escaped.
fn quote_libpq_value(value: &str) -> Cow<'_, str> {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\');
    if !needs_quotes {
        return Cow::Borrowed(value);
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    Cow::Owned(format!("'{}'", escaped))
}

/// SQLite descriptor: a database file inside the backend's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteDsn {
    pub path: PathBuf,
}

impl SqliteDsn {
    pub fn connect_options(&self) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(false)
    }
}

/// A synthesized, driver-specific connection descriptor.
#[derive(Clone, PartialEq, Eq)]
pub enum Dsn {
    MySql(MySqlDsn),
    Postgres(PgDsn),
    Sqlite(SqliteDsn),
}

impl Dsn {
    pub fn driver(&self) -> DriverKind {
        match self {
            Dsn::MySql(_) => DriverKind::MySql,
            Dsn::Postgres(_) => DriverKind::Postgres,
            Dsn::Sqlite(_) => DriverKind::Sqlite,
        }
    }

    /// Render with the password masked, safe for logs.
    pub fn redacted(&self) -> String {
        match self {
            Dsn::MySql(dsn) => dsn.render(REDACTED),
            Dsn::Postgres(dsn) => dsn.render(REDACTED),
            Dsn::Sqlite(dsn) => format!("sqlite://{}", dsn.path.display()),
        }
    }
}

impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dsn::MySql(dsn) => f.write_str(&dsn.render(&dsn.password)),
            Dsn::Postgres(dsn) => f.write_str(&dsn.render(&dsn.password)),
            Dsn::Sqlite(dsn) => write!(f, "sqlite://{}", dsn.path.display()),
        }
    }
}

impl fmt::Debug for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dsn").field(&self.redacted()).finish()
    }
}

// =============================================================================
// Strategies
// =============================================================================

/// Builds a descriptor for one driver family.
pub trait DsnStrategy: Send + Sync {
    fn synthesize(&self, credential: &Credential, backend: &BackendEntry) -> Dsn;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlStrategy;

impl DsnStrategy for MySqlStrategy {
    fn synthesize(&self, credential: &Credential, backend: &BackendEntry) -> Dsn {
        Dsn::MySql(MySqlDsn {
            user: credential.user.clone(),
            password: credential.password.clone(),
            net: "tcp".to_string(),
            host: backend.host.clone(),
            port: backend.port,
            database: credential.database.clone(),
            tls: backend.verify_tls,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresStrategy;

impl DsnStrategy for PostgresStrategy {
    fn synthesize(&self, credential: &Credential, backend: &BackendEntry) -> Dsn {
        Dsn::Postgres(PgDsn {
            user: credential.user.clone(),
            password: credential.password.clone(),
            database: credential.database.clone(),
            host: backend.host.clone(),
            port: backend.port,
            tls: backend.verify_tls,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteStrategy;

impl DsnStrategy for SqliteStrategy {
    fn synthesize(&self, credential: &Credential, backend: &BackendEntry) -> Dsn {
        Dsn::Sqlite(SqliteDsn {
            path: PathBuf::from(&backend.host).join(&credential.database),
        })
    }
}

/// Capability table from driver kind to DSN strategy.
#[derive(Clone)]
pub struct DsnSynthesizer {
    strategies: HashMap<DriverKind, Arc<dyn DsnStrategy>>,
}

impl DsnSynthesizer {
    /// Create a synthesizer with no registered drivers.
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Create a synthesizer for PostgreSQL, MySQL and SQLite.
    pub fn with_defaults() -> Self {
        let mut synthesizer = Self::empty();
        synthesizer.register(DriverKind::Postgres, PostgresStrategy);
        synthesizer.register(DriverKind::MySql, MySqlStrategy);
        synthesizer.register(DriverKind::Sqlite, SqliteStrategy);
        synthesizer
    }

    /// Register (or replace) the strategy for a driver kind.
    pub fn register(&mut self, driver: DriverKind, strategy: impl DsnStrategy + 'static) {
        self.strategies.insert(driver, Arc::new(strategy));
    }

    pub fn supports(&self, driver: &DriverKind) -> bool {
        self.strategies.contains_key(driver)
    }

    /// Build the descriptor for `credential` against `backend`.
    pub fn synthesize(&self, credential: &Credential, backend: &BackendEntry) -> GatewayResult<Dsn> {
        let strategy = self
            .strategies
            .get(&backend.driver)
            .ok_or_else(|| GatewayError::unsupported_driver(backend.driver.display_name()))?;
        Ok(strategy.synthesize(credential, backend))
    }
}

impl Default for DsnSynthesizer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for DsnSynthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DsnSynthesizer")
            .field("drivers", &self.strategies.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential::new("main", "u", "p", "d")
    }

    fn backend(driver: DriverKind, port: u16, verify_tls: bool) -> BackendEntry {
        BackendEntry::new("main", driver, "h", port, verify_tls)
    }

    #[test]
    fn test_mysql_dsn() {
        let dsn = DsnSynthesizer::with_defaults()
            .synthesize(&credential(), &backend(DriverKind::MySql, 3306, false))
            .unwrap();
        assert_eq!(dsn.driver(), DriverKind::MySql);
        assert_eq!(dsn.to_string(), "u:p@tcp(h:3306)/d");

        let Dsn::MySql(mysql) = dsn else {
            panic!("Expected MySQL descriptor");
        };
        assert_eq!(mysql.net, "tcp");
        assert_eq!(mysql.addr(), "h:3306");
        assert_eq!(mysql.user, "u");
        assert_eq!(mysql.password, "p");
        assert_eq!(mysql.database, "d");
    }

    #[test]
    fn test_postgres_dsn() {
        let dsn = DsnSynthesizer::with_defaults()
            .synthesize(&credential(), &backend(DriverKind::Postgres, 5432, false))
            .unwrap();
        assert_eq!(
            dsn.to_string(),
            "user=u password=p dbname=d host=h port=5432 sslmode=disable"
        );
    }

    #[test]
    fn test_tls_flag_is_honored() {
        let synthesizer = DsnSynthesizer::with_defaults();
        let pg = synthesizer
            .synthesize(&credential(), &backend(DriverKind::Postgres, 5432, true))
            .unwrap();
        assert!(pg.to_string().ends_with("sslmode=verify-full"));

        let mysql = synthesizer
            .synthesize(&credential(), &backend(DriverKind::MySql, 3306, true))
            .unwrap();
        assert_eq!(mysql.to_string(), "u:p@tcp(h:3306)/d?tls=true");
    }

    #[test]
    fn test_unsupported_driver() {
        let result = DsnSynthesizer::with_defaults().synthesize(
            &credential(),
            &backend(DriverKind::Other("oracle".to_string()), 1521, false),
        );
        match result {
            Err(GatewayError::UnsupportedDriver { driver }) => assert_eq!(driver, "oracle"),
            other => panic!("Expected UnsupportedDriver, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_synthesizer_supports_nothing() {
        let synthesizer = DsnSynthesizer::empty();
        assert!(!synthesizer.supports(&DriverKind::Postgres));
        assert!(
            synthesizer
                .synthesize(&credential(), &backend(DriverKind::Postgres, 5432, false))
                .is_err()
        );
    }

    #[test]
    fn test_custom_strategy_registration() {
        struct FixedPath;
        impl DsnStrategy for FixedPath {
            fn synthesize(&self, _: &Credential, _: &BackendEntry) -> Dsn {
                Dsn::Sqlite(SqliteDsn {
                    path: PathBuf::from("/tmp/fixed.db"),
                })
            }
        }

        let mut synthesizer = DsnSynthesizer::with_defaults();
        let kind = DriverKind::Other("duck".to_string());
        synthesizer.register(kind.clone(), FixedPath);
        let dsn = synthesizer
            .synthesize(&credential(), &backend(kind, 0, false))
            .unwrap();
        assert_eq!(dsn.to_string(), "sqlite:///tmp/fixed.db");
    }

    #[test]
    fn test_sqlite_dsn() {
        let cred = Credential::new("local", "", "", "app.db");
        let entry = BackendEntry::new("local", DriverKind::Sqlite, "/var/lib/prqld", 0, false);
        let dsn = DsnSynthesizer::with_defaults().synthesize(&cred, &entry).unwrap();
        assert_eq!(dsn.to_string(), "sqlite:///var/lib/prqld/app.db");
    }

    #[test]
    fn test_postgres_values_are_quoted() {
        let cred = Credential::new("main", "u", "it's a secret", "");
        let dsn = DsnSynthesizer::with_defaults()
            .synthesize(&cred, &backend(DriverKind::Postgres, 5432, false))
            .unwrap();
        assert_eq!(
            dsn.to_string(),
            r"user=u password='it\'s a secret' dbname='' host=h port=5432 sslmode=disable"
        );
    }

    #[test]
    fn test_mysql_without_password() {
        let cred = Credential::new("main", "root", "", "d");
        let dsn = DsnSynthesizer::with_defaults()
            .synthesize(&cred, &backend(DriverKind::MySql, 3306, false))
            .unwrap();
        assert_eq!(dsn.to_string(), "root@tcp(h:3306)/d");
    }

    #[test]
    fn test_redacted_hides_password() {
        let cred = Credential::new("main", "u", "hunter2", "d");
        let synthesizer = DsnSynthesizer::with_defaults();
        for driver in [DriverKind::MySql, DriverKind::Postgres] {
            let dsn = synthesizer
                .synthesize(&cred, &backend(driver, 5432, false))
                .unwrap();
            assert!(!dsn.redacted().contains("hunter2"));
            assert!(!format!("{:?}", dsn).contains("hunter2"));
            assert!(dsn.redacted().contains("****"));
        }
    }
}
