//! Declarative table descriptors
//!
//! A table definition lists its columns, where each column's value comes
//! from, the key columns usable for point lookups and pushdown, and which
//! API error codes mean "not found" rather than failure.

use crate::aws::ApiError;

/// Column value type exposed to consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    String,
    Json,
}

/// Where a column's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    /// Present on the listed item itself, no extra call needed
    ListItem,
    /// Requires the per-row detail fetch
    Detail,
    /// Computed from query-scoped context
    Computed,
}

/// A single column definition
#[derive(Debug, Clone)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub source: ColumnSource,
    pub description: &'static str,
}

/// A table definition
#[derive(Debug, Clone)]
pub struct Table {
    pub name: &'static str,
    pub description: &'static str,
    pub columns: Vec<Column>,
    /// Key columns that must all be present (as single values) for a point lookup
    pub get_keys: &'static [&'static str],
    /// Key columns a list scan accepts as optional pushdown filters
    pub list_keys: &'static [&'static str],
    /// API error codes a point lookup treats as "not found"
    pub ignore_codes: &'static [&'static str],
}

impl Table {
    /// Look up a column definition by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Whether an error is classified as ignorable ("not found") by the table.
/// Only typed AWS errors carry a code; anything else is a real failure.
pub fn should_ignore(table: &Table, err: &anyhow::Error) -> bool {
    err.downcast_ref::<ApiError>()
        .map(|api| table.ignore_codes.contains(&api.code.as_str()))
        .unwrap_or(false)
}
