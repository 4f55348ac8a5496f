pub mod context;
pub mod hydrate;
pub mod quals;
pub mod scan;
pub mod schema;
pub mod stream;

pub use context::QueryContext;
pub use quals::{QualValue, Quals};
pub use scan::{execute, TableSource};
pub use schema::{Column, ColumnKind, ColumnSource, Table};
pub use stream::{Row, RowSink};
