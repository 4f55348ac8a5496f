//! Query execution over a table source
//!
//! Routes a request to a point lookup when every get-key column has a single
//! pushed-down value, and to the streaming list scan otherwise. The point
//! lookup applies the table's ignore policy: a classified "not found" error
//! yields zero rows instead of a failure.

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::context::QueryContext;
use super::schema::{should_ignore, Table};
use super::stream::{Row, RowSink};

/// A table that can be scanned or point-looked-up
#[async_trait]
pub trait TableSource: Send + Sync {
    /// The table descriptor
    fn schema(&self) -> &Table;

    /// Stream rows for a full or filtered scan
    async fn scan(&self, ctx: &QueryContext, sink: &mut RowSink) -> Result<()>;

    /// Fetch a single row by its key columns
    async fn lookup(&self, ctx: &QueryContext) -> Result<Option<Row>>;
}

/// Execute a query against a table source
pub async fn execute<S: TableSource>(
    source: &S,
    ctx: &QueryContext,
    sink: &mut RowSink,
) -> Result<()> {
    let table = source.schema();

    if ctx.quals.has_all_single(table.get_keys) {
        debug!(table = table.name, "executing point lookup");
        match source.lookup(ctx).await {
            Ok(Some(row)) => {
                sink.emit(row).await;
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) if should_ignore(table, &err) => {
                debug!(table = table.name, error = %err, "lookup target not found");
                Ok(())
            }
            Err(err) => Err(err),
        }
    } else {
        debug!(table = table.name, "executing list scan");
        source.scan(ctx, sink).await
    }
}
