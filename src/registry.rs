//! Backend registry.
//!
//! The registry maps backend names to connection coordinates. It is built in
//! one pass from entry records and never mutated afterwards; a reload builds
//! a fresh registry and publishes it wholesale.

use crate::db::types::parse_bool;
use crate::entry_file::EntryRecord;
use crate::error::{GatewayError, GatewayResult};
use crate::models::{BackendEntry, DEFAULT_BACKEND_PORT, DriverKind};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Number of fields in a backend record: `name:driver:host:port:tls`.
pub const BACKEND_RECORD_FIELDS: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<String, BackendEntry>,
}

impl BackendRegistry {
    /// Build a registry from raw records.
    ///
    /// Records with the wrong field count are skipped with a warning. An
    /// unparsable port falls back to 5432 and an unparsable TLS flag to
    /// `false`; neither aborts the load.
    pub fn load(records: impl IntoIterator<Item = EntryRecord>) -> Self {
        let mut backends = HashMap::new();

        for record in records {
            let Some(entry) = Self::parse_record(&record) else {
                continue;
            };
            if backends.contains_key(&entry.name) {
                warn!(
                    line = record.line,
                    backend = %entry.name,
                    "Duplicate backend entry, later definition wins"
                );
            }
            if !entry.driver.is_supported() {
                warn!(
                    line = record.line,
                    backend = %entry.name,
                    driver = %entry.driver,
                    "Backend uses an unsupported driver, queries against it will fail"
                );
            }
            backends.insert(entry.name.clone(), entry);
        }

        debug!(count = backends.len(), "Backend registry loaded");
        Self { backends }
    }

    fn parse_record(record: &EntryRecord) -> Option<BackendEntry> {
        let [name, driver, host, port, tls] = record.fields.as_slice() else {
            warn!(
                line = record.line,
                fields = record.fields.len(),
                expected = BACKEND_RECORD_FIELDS,
                "Invalid database entry"
            );
            return None;
        };

        let port = match port.parse::<u16>() {
            Ok(port) if port > 0 => port,
            _ => {
                debug!(line = record.line, value = %port, "Unparsable port, using default");
                DEFAULT_BACKEND_PORT
            }
        };
        let verify_tls = parse_bool(tls).unwrap_or(false);
        let driver = DriverKind::from(driver.as_str());

        Some(BackendEntry::new(
            name.clone(),
            driver,
            host.clone(),
            port,
            verify_tls,
        ))
    }

    /// Look up a backend by name.
    pub fn get(&self, name: &str) -> GatewayResult<&BackendEntry> {
        self.backends
            .get(name)
            .ok_or_else(|| GatewayError::unknown_backend(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry_file::parse_entry_file;

    fn record(fields: &[&str]) -> EntryRecord {
        EntryRecord::new(1, fields.iter().copied())
    }

    #[test]
    fn test_load_well_formed_record() {
        let registry = BackendRegistry::load([record(&[
            "main",
            "postgres",
            "db.local",
            "5433",
            "true",
        ])]);
        let entry = registry.get("main").unwrap();
        assert_eq!(entry.driver, DriverKind::Postgres);
        assert_eq!(entry.host, "db.local");
        assert_eq!(entry.port, 5433);
        assert!(entry.verify_tls);
    }

    #[test]
    fn test_non_boolean_tls_defaults_false() {
        let registry =
            BackendRegistry::load([record(&["main", "mysql", "h", "3306", "maybe"])]);
        assert!(!registry.get("main").unwrap().verify_tls);
    }

    #[test]
    fn test_non_numeric_port_defaults_to_5432() {
        let registry = BackendRegistry::load([
            record(&["a", "mysql", "h", "abc", "false"]),
            record(&["b", "mysql", "h", "", "false"]),
            record(&["c", "mysql", "h", "0", "false"]),
            record(&["d", "mysql", "h", "70000", "false"]),
        ]);
        for name in ["a", "b", "c", "d"] {
            assert_eq!(registry.get(name).unwrap().port, 5432, "backend {}", name);
        }
    }

    #[test]
    fn test_wrong_field_count_is_skipped() {
        let registry = BackendRegistry::load([
            record(&["main", "postgres", "h", "5432", "false"]),
            record(&["short", "postgres", "h"]),
            record(&["long", "postgres", "h", "5432", "false", "extra"]),
        ]);
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains("short"));
        assert!(!registry.contains("long"));
    }

    #[test]
    fn test_unknown_driver_is_kept() {
        let registry = BackendRegistry::load([record(&["ora", "oracle", "h", "1521", "false"])]);
        assert_eq!(
            registry.get("ora").unwrap().driver,
            DriverKind::Other("oracle".to_string())
        );
    }

    #[test]
    fn test_get_missing_backend() {
        let registry = BackendRegistry::default();
        assert!(matches!(
            registry.get("nope"),
            Err(GatewayError::UnknownBackend { .. })
        ));
    }

    #[test]
    fn test_duplicate_name_later_wins() {
        let registry = BackendRegistry::load(parse_entry_file(
            "main:postgres:first:5432:false\nmain:postgres:second:5432:false\n",
        ));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("main").unwrap().host, "second");
    }
}
