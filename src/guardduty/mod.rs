pub mod client;
pub mod threat_intel_set;
pub mod types;

pub use client::{GuardDutyApi, GuardDutyClient};
pub use threat_intel_set::ThreatIntelSetTable;
