//! GuardDuty API client
//!
//! The three operations the threat intel set table consumes, as direct
//! REST-JSON calls. The `GuardDutyApi` trait is the seam that lets resolvers
//! run against a stub in tests.

use anyhow::Result;
use async_trait::async_trait;

use crate::aws::sts::get_common_columns;
use crate::aws::{AwsClients, CommonColumns, CommonColumnsSource};

use super::types::{
    normalize_token, DetectorIdsPage, ThreatIntelSetDetail, ThreatIntelSetIdsPage,
};

/// Page size for list calls
pub const MAX_PAGE_SIZE: u32 = 50;

/// GuardDuty operations consumed by the table
#[async_trait]
pub trait GuardDutyApi: Send + Sync {
    /// List detector ids, one page per call
    async fn list_detector_ids(&self, next_token: Option<&str>) -> Result<DetectorIdsPage>;

    /// List threat intel set ids for a detector, one page per call
    async fn list_threat_intel_set_ids(
        &self,
        detector_id: &str,
        next_token: Option<&str>,
    ) -> Result<ThreatIntelSetIdsPage>;

    /// Fetch full detail for one threat intel set
    async fn get_threat_intel_set(
        &self,
        detector_id: &str,
        threat_intel_set_id: &str,
    ) -> Result<ThreatIntelSetDetail>;
}

/// GuardDuty client over the signed HTTP transport
pub struct GuardDutyClient<'a> {
    clients: &'a AwsClients,
}

impl<'a> GuardDutyClient<'a> {
    pub fn new(clients: &'a AwsClients) -> Self {
        Self { clients }
    }
}

#[async_trait]
impl GuardDutyApi for GuardDutyClient<'_> {
    async fn list_detector_ids(&self, next_token: Option<&str>) -> Result<DetectorIdsPage> {
        let path = paged_path("/detector".to_string(), next_token);
        let response = self
            .clients
            .http
            .rest_json_request("guardduty", "GET", &path, None)
            .await?;
        let mut page: DetectorIdsPage = serde_json::from_str(&response)?;
        page.next_token = normalize_token(page.next_token);
        Ok(page)
    }

    async fn list_threat_intel_set_ids(
        &self,
        detector_id: &str,
        next_token: Option<&str>,
    ) -> Result<ThreatIntelSetIdsPage> {
        let path = paged_path(
            format!("/detector/{}/threatintelset", urlencoding::encode(detector_id)),
            next_token,
        );
        let response = self
            .clients
            .http
            .rest_json_request("guardduty", "GET", &path, None)
            .await?;
        let mut page: ThreatIntelSetIdsPage = serde_json::from_str(&response)?;
        page.next_token = normalize_token(page.next_token);
        Ok(page)
    }

    async fn get_threat_intel_set(
        &self,
        detector_id: &str,
        threat_intel_set_id: &str,
    ) -> Result<ThreatIntelSetDetail> {
        let path = format!(
            "/detector/{}/threatintelset/{}",
            urlencoding::encode(detector_id),
            urlencoding::encode(threat_intel_set_id)
        );
        let response = self
            .clients
            .http
            .rest_json_request("guardduty", "GET", &path, None)
            .await?;
        Ok(serde_json::from_str(&response)?)
    }
}

#[async_trait]
impl CommonColumnsSource for GuardDutyClient<'_> {
    async fn common_columns(&self) -> Result<CommonColumns> {
        get_common_columns(self.clients).await
    }
}

/// Append maxResults and the optional pagination token to a list path
fn paged_path(base: String, next_token: Option<&str>) -> String {
    let mut path = format!("{}?maxResults={}", base, MAX_PAGE_SIZE);
    if let Some(token) = next_token {
        path.push_str(&format!("&nextToken={}", urlencoding::encode(token)));
    }
    path
}
