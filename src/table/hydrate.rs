//! Row assembly and projection
//!
//! Resolvers set column values on a `RowBuilder`; `finish` projects the row
//! to the requested columns, with `null` for anything the resolver did not
//! produce. `wants_detail` decides whether a projection needs the per-row
//! detail fetch at all.

use serde_json::{Map, Value};

use super::context::QueryContext;
use super::schema::{ColumnSource, Table};
use super::stream::Row;

/// Whether the projection includes any detail-sourced column
pub fn wants_detail(table: &Table, ctx: &QueryContext) -> bool {
    table
        .columns
        .iter()
        .any(|c| c.source == ColumnSource::Detail && ctx.wants_column(c.name))
}

/// Accumulates column values for one row
#[derive(Default)]
pub struct RowBuilder {
    values: Map<String, Value>,
}

impl RowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: &str, value: Value) {
        self.values.insert(column.to_string(), value);
    }

    /// Project to the requested columns, in descriptor order
    pub fn finish(mut self, table: &Table, ctx: &QueryContext) -> Row {
        let mut row = Map::new();
        for column in &table.columns {
            if !ctx.wants_column(column.name) {
                continue;
            }
            let value = self.values.remove(column.name).unwrap_or(Value::Null);
            row.insert(column.name.to_string(), value);
        }
        Value::Object(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::quals::Quals;
    use crate::table::schema::{Column, ColumnKind};
    use serde_json::json;

    fn test_table() -> Table {
        Table {
            name: "test_table",
            description: "test",
            columns: vec![
                Column {
                    name: "id",
                    kind: ColumnKind::String,
                    source: ColumnSource::ListItem,
                    description: "The id.",
                },
                Column {
                    name: "name",
                    kind: ColumnKind::String,
                    source: ColumnSource::Detail,
                    description: "The name.",
                },
                Column {
                    name: "akas",
                    kind: ColumnKind::Json,
                    source: ColumnSource::Computed,
                    description: "Identifiers.",
                },
            ],
            get_keys: &["id"],
            list_keys: &[],
            ignore_codes: &[],
        }
    }

    fn ctx_with_columns(columns: Option<Vec<&str>>) -> QueryContext {
        QueryContext::new(
            "us-east-1",
            Quals::new(),
            columns.map(|cols| cols.into_iter().map(String::from).collect()),
        )
    }

    #[test]
    fn finish_projects_requested_columns_in_order() {
        let table = test_table();
        let ctx = ctx_with_columns(Some(vec!["name", "id"]));

        let mut builder = RowBuilder::new();
        builder.set("id", json!("i-1"));
        builder.set("name", json!("first"));
        builder.set("akas", json!(["arn:..."]));

        let row = builder.finish(&table, &ctx);
        let keys: Vec<&String> = row.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["id", "name"]);
    }

    #[test]
    fn finish_fills_missing_values_with_null() {
        let table = test_table();
        let ctx = ctx_with_columns(None);

        let mut builder = RowBuilder::new();
        builder.set("id", json!("i-1"));

        let row = builder.finish(&table, &ctx);
        assert_eq!(row["id"], "i-1");
        assert_eq!(row["name"], Value::Null);
        assert_eq!(row["akas"], Value::Null);
    }

    #[test]
    fn wants_detail_follows_the_projection() {
        let table = test_table();

        assert!(wants_detail(&table, &ctx_with_columns(None)));
        assert!(wants_detail(&table, &ctx_with_columns(Some(vec!["name"]))));
        assert!(!wants_detail(
            &table,
            &ctx_with_columns(Some(vec!["id", "akas"]))
        ));
    }
}
