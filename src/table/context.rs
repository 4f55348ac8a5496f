//! Per-query execution context
//!
//! Carries the active region, pushed-down quals, the requested column
//! projection, and the memoized account/partition metadata shared by every
//! row of the query.

use anyhow::Result;
use std::collections::HashSet;
use std::future::Future;
use tokio::sync::OnceCell;

use crate::aws::CommonColumns;

use super::quals::Quals;

/// Context scoped to a single query execution
pub struct QueryContext {
    pub region: String,
    pub quals: Quals,
    /// Requested columns; `None` means all
    columns: Option<HashSet<String>>,
    /// Account/partition metadata, resolved at most once per query
    common: OnceCell<CommonColumns>,
}

impl QueryContext {
    pub fn new(region: &str, quals: Quals, columns: Option<Vec<String>>) -> Self {
        Self {
            region: region.to_string(),
            quals,
            columns: columns.map(|cols| cols.into_iter().collect()),
            common: OnceCell::new(),
        }
    }

    /// Whether the projection includes a column
    pub fn wants_column(&self, name: &str) -> bool {
        match &self.columns {
            Some(cols) => cols.contains(name),
            None => true,
        }
    }

    /// The memoized account/partition metadata. The fetch runs at most once
    /// per query; concurrent callers share the single in-flight resolution.
    pub async fn common_columns<F, Fut>(&self, fetch: F) -> Result<&CommonColumns>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CommonColumns>>,
    {
        self.common.get_or_try_init(fetch).await
    }
}
