//! Result marshalling.
//!
//! Turns a driver row set into a [`MarshalledResult`]. Column metadata is read
//! once; every row is then coerced cell by cell according to its column's
//! [`TypeClass`]. Duplicate column names are not guarded: the later column
//! overwrites the earlier one in `fields` and in every row.

use crate::db::types::{ColumnDescriptor, TypeClass, coerce};
use crate::models::{FieldMeta, MarshalledResult};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug)]
struct ColumnSlot {
    name: String,
    class: TypeClass,
    /// No declared type yet; resolved from the first non-null value.
    untyped: bool,
}

/// Incremental builder fed one raw row at a time.
#[derive(Debug)]
pub struct ResultBuilder {
    columns: Vec<ColumnSlot>,
    fields: BTreeMap<String, FieldMeta>,
    rows: Vec<serde_json::Map<String, JsonValue>>,
}

impl ResultBuilder {
    /// Create a builder for the given column layout.
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        let mut fields = BTreeMap::new();
        let columns = columns
            .into_iter()
            .map(|col| {
                let slot = ColumnSlot {
                    class: TypeClass::of(&col.type_name),
                    untyped: col.is_untyped(),
                    name: col.name,
                };
                fields.insert(
                    slot.name.clone(),
                    FieldMeta {
                        type_name: col.type_name,
                    },
                );
                slot
            })
            .collect();

        Self {
            columns,
            fields,
            rows: Vec::new(),
        }
    }

    /// Whether some column still waits for a value to fix its type.
    pub fn has_untyped_columns(&self) -> bool {
        self.columns.iter().any(|col| col.untyped)
    }

    /// Adopt the types reported by a later row for still-untyped columns.
    ///
    /// Earlier rows hold only NULLs in such columns, so nothing is re-coerced.
    pub fn resolve_types(&mut self, descriptors: Vec<ColumnDescriptor>) {
        for (idx, desc) in descriptors.into_iter().enumerate() {
            let Some(slot) = self.columns.get_mut(idx) else {
                break;
            };
            if !slot.untyped || desc.is_untyped() {
                continue;
            }
            slot.class = TypeClass::of(&desc.type_name);
            slot.untyped = false;

            // Duplicate names: only the last column with the name owns `fields`.
            let name = slot.name.clone();
            let owner = self.columns.iter().rposition(|col| col.name == name);
            if owner == Some(idx) {
                self.fields.insert(
                    name,
                    FieldMeta {
                        type_name: desc.type_name,
                    },
                );
            }
        }
    }

    /// Append one row of raw textual values, in column order.
    ///
    /// Missing trailing values are treated as NULL.
    pub fn push_row(&mut self, values: Vec<Option<String>>) {
        let mut values = values.into_iter();
        let mut row = serde_json::Map::with_capacity(self.columns.len());

        for col in &self.columns {
            let value = match values.next().flatten() {
                None => JsonValue::Null,
                Some(text) => match coerce(&text, col.class) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(
                            column = %col.name,
                            class = ?col.class,
                            error = %e,
                            "Value does not match declared type, keeping raw text"
                        );
                        JsonValue::String(text)
                    }
                },
            };
            row.insert(col.name.clone(), value);
        }

        self.rows.push(row);
    }

    pub fn finish(self) -> MarshalledResult {
        MarshalledResult {
            total_rows: self.rows.len(),
            fields: self.fields,
            rows: self.rows,
        }
    }
}

/// Marshal a complete row set in one call.
pub fn marshal(
    columns: Vec<ColumnDescriptor>,
    rows: impl IntoIterator<Item = Vec<Option<String>>>,
) -> MarshalledResult {
    let mut builder = ResultBuilder::new(columns);
    for row in rows {
        builder.push_row(row);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cell(text: &str) -> Option<String> {
        Some(text.to_string())
    }

    #[test]
    fn test_marshal_typed_rows() {
        let result = marshal(
            vec![
                ColumnDescriptor::new("id", "INT4"),
                ColumnDescriptor::new("active", "BOOL"),
                ColumnDescriptor::new("name", "TEXT"),
            ],
            vec![
                vec![cell("1"), cell("true"), cell("alice")],
                vec![None, cell("false"), cell("bob")],
            ],
        );

        assert_eq!(result.total_rows, 2);
        assert_eq!(result.fields["id"].type_name, "INT4");
        assert_eq!(result.fields["active"].type_name, "BOOL");
        assert_eq!(
            JsonValue::Object(result.rows[0].clone()),
            json!({ "id": 1, "active": true, "name": "alice" })
        );
        assert_eq!(
            JsonValue::Object(result.rows[1].clone()),
            json!({ "id": null, "active": false, "name": "bob" })
        );
    }

    #[test]
    fn test_unparsable_integer_keeps_raw_text() {
        let result = marshal(
            vec![ColumnDescriptor::new("id", "INT4")],
            vec![vec![cell("abc")], vec![cell("2")]],
        );
        assert_eq!(result.total_rows, 2);
        assert_eq!(result.rows[0]["id"], json!("abc"));
        assert_eq!(result.rows[1]["id"], json!(2));
    }

    #[test]
    fn test_duplicate_column_names_later_wins() {
        let result = marshal(
            vec![
                ColumnDescriptor::new("x", "INT4"),
                ColumnDescriptor::new("x", "TEXT"),
            ],
            vec![vec![cell("1"), cell("second")], vec![cell("2"), cell("again")]],
        );
        assert_eq!(result.fields.len(), 1);
        assert_eq!(result.fields["x"].type_name, "TEXT");
        assert_eq!(result.rows[0]["x"], json!("second"));
        assert_eq!(result.rows[1]["x"], json!("again"));
    }

    #[test]
    fn test_every_row_has_every_field() {
        let result = marshal(
            vec![
                ColumnDescriptor::new("a", "INT8"),
                ColumnDescriptor::new("b", "FLOAT8"),
            ],
            vec![vec![cell("1")], vec![]],
        );
        let fields: std::collections::BTreeSet<_> = result.fields.keys().cloned().collect();
        for row in &result.rows {
            let keys: std::collections::BTreeSet<_> = row.keys().cloned().collect();
            assert_eq!(keys, fields);
        }
        assert_eq!(result.rows[0]["b"], JsonValue::Null);
    }

    #[test]
    fn test_float_and_numeric_columns() {
        let result = marshal(
            vec![
                ColumnDescriptor::new("price", "NUMERIC"),
                ColumnDescriptor::new("ratio", "FLOAT4"),
            ],
            vec![vec![cell("19.99"), cell("NaN")]],
        );
        assert_eq!(result.rows[0]["price"], json!(19.99));
        assert_eq!(result.rows[0]["ratio"], json!("NaN"));
    }

    #[test]
    fn test_untyped_column_takes_first_value_type() {
        let mut builder = ResultBuilder::new(vec![
            ColumnDescriptor::new("label", "TEXT"),
            ColumnDescriptor::new("total", "NULL"),
        ]);
        assert!(builder.has_untyped_columns());

        builder.push_row(vec![cell("a"), None]);
        builder.resolve_types(vec![
            ColumnDescriptor::new("label", "TEXT"),
            ColumnDescriptor::new("total", "NULL"),
        ]);
        assert!(builder.has_untyped_columns());

        builder.resolve_types(vec![
            ColumnDescriptor::new("label", "TEXT"),
            ColumnDescriptor::new("total", "INTEGER"),
        ]);
        assert!(!builder.has_untyped_columns());
        builder.push_row(vec![cell("b"), cell("42")]);

        let result = builder.finish();
        assert_eq!(result.fields["total"].type_name, "INTEGER");
        assert_eq!(result.rows[0]["total"], JsonValue::Null);
        assert_eq!(result.rows[1]["total"], json!(42));
    }

    #[test]
    fn test_resolving_earlier_duplicate_keeps_later_field() {
        let mut builder = ResultBuilder::new(vec![
            ColumnDescriptor::new("x", "NULL"),
            ColumnDescriptor::new("x", "TEXT"),
        ]);
        builder.resolve_types(vec![
            ColumnDescriptor::new("x", "REAL"),
            ColumnDescriptor::new("x", "TEXT"),
        ]);
        assert_eq!(builder.finish().fields["x"].type_name, "TEXT");
    }

    #[test]
    fn test_empty_result_keeps_fields() {
        let result = marshal(vec![ColumnDescriptor::new("id", "INT4")], Vec::new());
        assert_eq!(result.total_rows, 0);
        assert!(result.rows.is_empty());
        assert!(result.fields.contains_key("id"));
    }
}
