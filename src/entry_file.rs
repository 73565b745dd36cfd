//! Colon-separated entry files.
//!
//! Backends and tokens are both configured through plain-text files with one
//! record per line:
//!
//! ```text
//! # name:driver:host:port:tls
//! main:postgres:db.internal:5432:false
//! ```
//!
//! Blank lines and `#` comments are skipped. Field counts are not checked
//! here; each consumer validates the shape it expects.

use crate::error::{GatewayError, GatewayResult};
use std::path::Path;

/// Field separator used by entry files.
pub const FIELD_SEPARATOR: char = ':';

/// One parsed record together with its 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    pub line: usize,
    pub fields: Vec<String>,
}

impl EntryRecord {
    pub fn new(line: usize, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            line,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// Parse the contents of an entry file.
pub fn parse_entry_file(contents: &str) -> Vec<EntryRecord> {
    contents
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            Some(EntryRecord {
                line: idx + 1,
                fields: trimmed
                    .split(FIELD_SEPARATOR)
                    .map(|field| field.trim().to_string())
                    .collect(),
            })
        })
        .collect()
}

/// Read and parse an entry file from disk.
pub fn read_entry_file(path: impl AsRef<Path>) -> GatewayResult<Vec<EntryRecord>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        GatewayError::configuration(format!("Cannot read {}: {}", path.display(), e))
    })?;
    Ok(parse_entry_file(&contents))
}
