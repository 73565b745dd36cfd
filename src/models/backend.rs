//! Backend-related data models.
//!
//! This module defines the driver kinds the gateway knows about and the
//! connection coordinates of a single backend registry entry.

/// Default port used when a registry record carries an unparsable port.
pub const DEFAULT_BACKEND_PORT: u16 = 5432;

/// Database driver family of a backend.
///
/// Unrecognised names are preserved in `Other` so that the registry still
/// loads them; DSN synthesis reports them as unsupported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DriverKind {
    Postgres,
    /// Includes MariaDB
    MySql,
    Sqlite,
    Other(String),
}

impl DriverKind {
    /// Get the display name for this driver kind.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
            Self::Other(name) => name,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<&str> for DriverKind {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Self::Postgres,
            "mysql" | "mariadb" => Self::MySql,
            "sqlite" | "sqlite3" => Self::Sqlite,
            _ => Self::Other(s.trim().to_string()),
        }
    }
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Connection coordinates of one backend, as loaded from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendEntry {
    pub name: String,
    pub driver: DriverKind,
    /// Hostname for network drivers; directory of database files for SQLite.
    pub host: String,
    pub port: u16,
    pub verify_tls: bool,
}

impl BackendEntry {
    pub fn new(
        name: impl Into<String>,
        driver: DriverKind,
        host: impl Into<String>,
        port: u16,
        verify_tls: bool,
    ) -> Self {
        Self {
            name: name.into(),
            driver,
            host: host.into(),
            port,
            verify_tls,
        }
    }

    /// `host:port` address of the backend.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
