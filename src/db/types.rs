//! Declared-type classification and textual value coercion.
//!
//! # Architecture
//!
//! Result values are read in their raw textual wire form and converted in two
//! phases:
//! 1. `TypeClass` classifies each column's declared type once, when column
//!    metadata is read
//! 2. `coerce` converts each cell's text according to its column's class
//!
//! A failed coercion never drops the value: the caller keeps the raw text.

use serde_json::Value as JsonValue;
use sqlx::{Column, ColumnIndex, Decode, Row, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical class of a backend-declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Boolean,
    Integer,
    Float,
    Text,
}

impl TypeClass {
    /// Classify a backend type name (case-insensitive).
    pub fn of(type_name: &str) -> Self {
        let upper = type_name.trim().to_ascii_uppercase();
        // MySQL reports e.g. "INT UNSIGNED"; classify by the base name.
        let base = upper.split_whitespace().next().unwrap_or("");

        match base {
            "BOOL" | "BOOLEAN" => Self::Boolean,
            "INT" | "INT2" | "INT4" | "INT8" | "INT16" | "INT32" | "INT64" | "INTEGER"
            | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "BIGINT" | "SERIAL" | "BIGSERIAL" => {
                Self::Integer
            }
            "FLOAT" | "FLOAT4" | "FLOAT8" | "FLOAT16" | "FLOAT32" | "FLOAT64" | "REAL"
            | "DOUBLE" | "NUMERIC" | "DECIMAL" => Self::Float,
            _ => Self::Text,
        }
    }
}

// =============================================================================
// Coercion
// =============================================================================

/// Parse a boolean literal.
///
/// Accepts `1, t, T, TRUE, true, True` and `0, f, F, FALSE, false, False`,
/// which covers PostgreSQL's `t`/`f` text form and MySQL's `1`/`0`.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Why a textual value could not be converted to its declared class.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoercionError {
    #[error("not a boolean literal")]
    Boolean,
    #[error("not a signed 64-bit integer: {0}")]
    Integer(String),
    #[error("not a float: {0}")]
    Float(String),
    #[error("float is not finite")]
    NonFinite,
}

/// Convert raw text into a JSON value of the given class.
pub fn coerce(text: &str, class: TypeClass) -> Result<JsonValue, CoercionError> {
    match class {
        TypeClass::Boolean => parse_bool(text)
            .map(JsonValue::Bool)
            .ok_or(CoercionError::Boolean),
        TypeClass::Integer => text
            .parse::<i64>()
            .map(|v| JsonValue::Number(v.into()))
            .map_err(|e| CoercionError::Integer(e.to_string())),
        TypeClass::Float => {
            let v = text
                .parse::<f64>()
                .map_err(|e| CoercionError::Float(e.to_string()))?;
            serde_json::Number::from_f64(v)
                .map(JsonValue::Number)
                .ok_or(CoercionError::NonFinite)
        }
        TypeClass::Text => Ok(JsonValue::String(text.to_string())),
    }
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// Render binary data as text: UTF-8 when valid, base64 otherwise.
pub fn decode_binary_value(bytes: Vec<u8>) -> String {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => STANDARD.encode(e.as_bytes()),
    }
}

// =============================================================================
// Raw Row Access
// =============================================================================

/// Type name sqlx reports for columns with no declared type.
pub const UNTYPED: &str = "NULL";

/// Column name and backend-declared type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub type_name: String,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    /// True when the backend declared no type (SQLite expression columns).
    pub fn is_untyped(&self) -> bool {
        self.type_name.eq_ignore_ascii_case(UNTYPED)
    }
}

/// Describe the columns of any sqlx column slice.
pub fn describe_columns<C: Column>(columns: &[C]) -> Vec<ColumnDescriptor> {
    columns
        .iter()
        .map(|col| ColumnDescriptor::new(col.name(), col.type_info().name()))
        .collect()
}

/// Read access to a driver row as raw text cells.
pub trait RawRow {
    /// Column metadata; untyped columns report this row's runtime value type.
    fn column_descriptors(&self) -> Vec<ColumnDescriptor>;

    /// Raw textual value of every column; `None` for SQL NULL.
    fn raw_values(&self) -> Result<Vec<Option<String>>, sqlx::Error>;
}

impl<R> RawRow for R
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> Option<String>: Decode<'r, R::Database>,
    for<'r> Option<Vec<u8>>: Decode<'r, R::Database>,
{
    fn column_descriptors(&self) -> Vec<ColumnDescriptor> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let declared = col.type_info();
                if !declared.is_null() {
                    return ColumnDescriptor::new(col.name(), declared.name());
                }
                let runtime = self
                    .try_get_raw(idx)
                    .ok()
                    .filter(|value| !value.is_null())
                    .map(|value| value.type_info().name().to_string());
                ColumnDescriptor::new(
                    col.name(),
                    runtime.unwrap_or_else(|| declared.name().to_string()),
                )
            })
            .collect()
    }

    fn raw_values(&self) -> Result<Vec<Option<String>>, sqlx::Error> {
        (0..self.len())
            .map(|idx| {
                // Unchecked: values arrive in text format regardless of the declared type.
                match self.try_get_unchecked::<Option<String>, _>(idx) {
                    Ok(value) => Ok(value),
                    Err(_) => self
                        .try_get_unchecked::<Option<Vec<u8>>, _>(idx)
                        .map(|value| value.map(decode_binary_value)),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_postgres_names() {
        assert_eq!(TypeClass::of("BOOL"), TypeClass::Boolean);
        assert_eq!(TypeClass::of("INT4"), TypeClass::Integer);
        assert_eq!(TypeClass::of("INT8"), TypeClass::Integer);
        assert_eq!(TypeClass::of("FLOAT8"), TypeClass::Float);
        assert_eq!(TypeClass::of("NUMERIC"), TypeClass::Float);
        assert_eq!(TypeClass::of("TEXT"), TypeClass::Text);
        assert_eq!(TypeClass::of("TIMESTAMPTZ"), TypeClass::Text);
    }

    #[test]
    fn test_classify_mysql_and_sqlite_names() {
        assert_eq!(TypeClass::of("BIGINT"), TypeClass::Integer);
        assert_eq!(TypeClass::of("INT UNSIGNED"), TypeClass::Integer);
        assert_eq!(TypeClass::of("DECIMAL"), TypeClass::Float);
        assert_eq!(TypeClass::of("DOUBLE"), TypeClass::Float);
        assert_eq!(TypeClass::of("BOOLEAN"), TypeClass::Boolean);
        assert_eq!(TypeClass::of("INTEGER"), TypeClass::Integer);
        assert_eq!(TypeClass::of("real"), TypeClass::Float);
        assert_eq!(TypeClass::of("VARCHAR"), TypeClass::Text);
    }

    #[test]
    fn test_parse_bool() {
        for text in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(text), Some(true), "{}", text);
        }
        for text in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(text), Some(false), "{}", text);
        }
        assert_eq!(parse_bool("yes"), None);
        assert_eq!(parse_bool("tRuE"), None);
    }

    #[test]
    fn test_coerce_by_class() {
        assert_eq!(coerce("42", TypeClass::Integer), Ok(json!(42)));
        assert_eq!(coerce("-7", TypeClass::Integer), Ok(json!(-7)));
        assert_eq!(coerce("1.5", TypeClass::Float), Ok(json!(1.5)));
        assert_eq!(coerce("t", TypeClass::Boolean), Ok(json!(true)));
        assert_eq!(coerce("hello", TypeClass::Text), Ok(json!("hello")));
    }

    #[test]
    fn test_coerce_failures() {
        assert!(matches!(
            coerce("abc", TypeClass::Integer),
            Err(CoercionError::Integer(_))
        ));
        assert!(matches!(
            coerce("1.5", TypeClass::Integer),
            Err(CoercionError::Integer(_))
        ));
        assert!(matches!(
            coerce("x", TypeClass::Float),
            Err(CoercionError::Float(_))
        ));
        assert_eq!(coerce("NaN", TypeClass::Float), Err(CoercionError::NonFinite));
        assert_eq!(
            coerce("Infinity", TypeClass::Float),
            Err(CoercionError::NonFinite)
        );
        assert_eq!(coerce("maybe", TypeClass::Boolean), Err(CoercionError::Boolean));
    }

    #[test]
    fn test_integer_overflow_is_failure() {
        assert!(coerce("18446744073709551615", TypeClass::Integer).is_err());
    }

    #[test]
    fn test_untyped_descriptor() {
        assert!(ColumnDescriptor::new("n", "NULL").is_untyped());
        assert!(!ColumnDescriptor::new("n", "INTEGER").is_untyped());
    }

    #[test]
    fn test_decode_binary_value() {
        assert_eq!(decode_binary_value(b"hello world".to_vec()), "hello world");
        assert_eq!(decode_binary_value(vec![0xFF, 0xFE, 0x00, 0x01]), "//4AAQ==");
        assert_eq!(decode_binary_value(Vec::new()), "");
    }
}
