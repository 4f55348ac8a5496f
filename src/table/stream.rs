//! Row streaming with cooperative cancellation
//!
//! Resolvers emit rows through a `RowSink` and must stop as soon as `emit`
//! reports that no more rows are wanted, either because the row budget is
//! exhausted or because the consumer went away.

use serde_json::Value;
use tokio::sync::mpsc;

/// A single result row (a JSON object keyed by column name)
pub type Row = Value;

/// Sink for streamed rows, with an optional remaining-row budget
pub struct RowSink {
    tx: mpsc::Sender<Row>,
    remaining: Option<u64>,
}

impl RowSink {
    pub fn new(tx: mpsc::Sender<Row>, limit: Option<u64>) -> Self {
        Self {
            tx,
            remaining: limit,
        }
    }

    /// Emit one row. Returns whether more rows are wanted; the producer must
    /// check this after every emitted row and stop promptly when false.
    pub async fn emit(&mut self, row: Row) -> bool {
        if self.remaining == Some(0) {
            return false;
        }
        if self.tx.send(row).await.is_err() {
            // Receiver gone: the query was cancelled
            return false;
        }
        if let Some(remaining) = &mut self.remaining {
            *remaining -= 1;
        }
        self.remaining != Some(0)
    }
}
