//! qaws - query AWS GuardDuty threat intel sets as table rows
//!
//! A GuardDuty ThreatIntelSet data-source connector: lists threat intel set
//! ids per detector, hydrates rows with detail on demand, and derives an
//! ARN-style identifier for each row. The `table` module carries the host
//! contract (descriptors, pushdown quals, row streaming, scan execution);
//! the `aws` module carries the SigV4 HTTP transport.

pub mod aws;
pub mod guardduty;
pub mod table;
