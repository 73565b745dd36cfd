//! Query request and result models exchanged with the transport layer.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Body of a query request. The token travels separately (Authorization header).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// Metadata reported for one result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMeta {
    /// Backend-declared type name (e.g., "INT4", "VARCHAR", "INTEGER")
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Fully materialized, backend-agnostic result set.
///
/// Every row holds exactly the key set of `fields`; values are null, bool,
/// integer, float or string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarshalledResult {
    pub fields: BTreeMap<String, FieldMeta>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    pub total_rows: usize,
}
