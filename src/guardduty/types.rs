//! GuardDuty wire types and list items

use serde::Deserialize;
use std::collections::HashMap;

/// One page of detector ids
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorIdsPage {
    #[serde(default)]
    pub detector_ids: Vec<String>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// One page of threat intel set ids for a detector
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatIntelSetIdsPage {
    #[serde(default)]
    pub threat_intel_set_ids: Vec<String>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Full detail for one threat intel set
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatIntelSetDetail {
    pub name: String,
    pub format: String,
    pub location: String,
    pub status: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// A listed (detector, threat intel set) pair, produced during the scan to
/// drive detail hydration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreatIntelSetSummary {
    pub detector_id: String,
    pub threat_intel_set_id: String,
}

/// Some GuardDuty responses carry an empty string instead of omitting the
/// token on the last page
pub fn normalize_token(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}
