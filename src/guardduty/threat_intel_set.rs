//! AWS GuardDuty ThreatIntelSet table
//!
//! Lists threat intel set ids per detector (detectors are the parent
//! iteration), hydrates each row with full detail on demand, and derives an
//! ARN-style identifier from the memoized account metadata.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::aws::CommonColumnsSource;
use crate::table::hydrate::{wants_detail, RowBuilder};
use crate::table::{
    Column, ColumnKind, ColumnSource, QualValue, Quals, QueryContext, Row, RowSink, Table,
    TableSource,
};

use super::client::GuardDutyApi;
use super::types::{ThreatIntelSetDetail, ThreatIntelSetSummary};

/// Table definition
pub fn table() -> Table {
    Table {
        name: "aws_guardduty_threat_intel_set",
        description: "AWS GuardDuty ThreatIntelSet",
        columns: vec![
            Column {
                name: "name",
                kind: ColumnKind::String,
                source: ColumnSource::Detail,
                description: "A ThreatIntelSet name displayed in all findings that are generated by activity that involves IP addresses included in this ThreatIntelSet.",
            },
            Column {
                name: "threat_intel_set_id",
                kind: ColumnKind::String,
                source: ColumnSource::ListItem,
                description: "The ID of the ThreatIntelSet.",
            },
            Column {
                name: "detector_id",
                kind: ColumnKind::String,
                source: ColumnSource::ListItem,
                description: "The ID of the detector.",
            },
            Column {
                name: "format",
                kind: ColumnKind::String,
                source: ColumnSource::Detail,
                description: "The format of the threatIntelSet.",
            },
            Column {
                name: "location",
                kind: ColumnKind::String,
                source: ColumnSource::Detail,
                description: "The URI of the file that contains the ThreatIntelSet.",
            },
            Column {
                name: "status",
                kind: ColumnKind::String,
                source: ColumnSource::Detail,
                description: "The status of threatIntelSet file uploaded.",
            },
            // Standard columns
            Column {
                name: "title",
                kind: ColumnKind::String,
                source: ColumnSource::Detail,
                description: "Title of the resource.",
            },
            Column {
                name: "tags",
                kind: ColumnKind::Json,
                source: ColumnSource::Detail,
                description: "A map of tags for the resource.",
            },
            Column {
                name: "akas",
                kind: ColumnKind::Json,
                source: ColumnSource::Computed,
                description: "Array of globally unique identifier strings (also known as) for the resource.",
            },
        ],
        get_keys: &["detector_id", "threat_intel_set_id"],
        list_keys: &["detector_id"],
        ignore_codes: &["InvalidInputException", "BadRequestException"],
    }
}

/// The threat intel set table bound to an API implementation
pub struct ThreatIntelSetTable<A> {
    api: A,
    schema: Table,
}

impl<A> ThreatIntelSetTable<A>
where
    A: GuardDutyApi + CommonColumnsSource,
{
    pub fn new(api: A) -> Self {
        Self {
            api,
            schema: table(),
        }
    }

    /// List all threat intel sets belonging to one detector, honoring the
    /// pushed-down detector_id qual. Returns false once the sink wants no
    /// more rows.
    async fn list_for_detector(
        &self,
        detector_id: &str,
        ctx: &QueryContext,
        sink: &mut RowSink,
    ) -> Result<bool> {
        // Skip before any API call when the qual rules this detector out
        if !detector_matches_qual(detector_id, &ctx.quals) {
            return Ok(true);
        }

        let mut next_token: Option<String> = None;
        loop {
            let page = self
                .api
                .list_threat_intel_set_ids(detector_id, next_token.as_deref())
                .await?;

            for threat_intel_set_id in page.threat_intel_set_ids {
                let summary = ThreatIntelSetSummary {
                    detector_id: detector_id.to_string(),
                    threat_intel_set_id,
                };
                let row = self.hydrate_row(ctx, &summary, None).await?;
                if !sink.emit(row).await {
                    return Ok(false);
                }
            }

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }
        Ok(true)
    }

    /// Fetch full detail for one (detector, threat intel set) pair
    async fn get(
        &self,
        detector_id: &str,
        threat_intel_set_id: &str,
    ) -> Result<ThreatIntelSetDetail> {
        match self
            .api
            .get_threat_intel_set(detector_id, threat_intel_set_id)
            .await
        {
            Ok(detail) => Ok(detail),
            Err(err) => {
                debug!(
                    detector_id,
                    threat_intel_set_id,
                    error = %err,
                    "get threat intel set failed"
                );
                Err(err)
            }
        }
    }

    /// Resource identifiers for a row
    async fn akas(
        &self,
        ctx: &QueryContext,
        summary: &ThreatIntelSetSummary,
    ) -> Result<Vec<String>> {
        let common = ctx.common_columns(|| self.api.common_columns()).await?;
        Ok(vec![threat_intel_set_aka(
            &common.partition,
            &ctx.region,
            &common.account_id,
            &summary.detector_id,
            &summary.threat_intel_set_id,
        )])
    }

    /// Assemble one output row. The detail is fetched at most once per row,
    /// and only when the projection includes a detail-sourced column.
    async fn hydrate_row(
        &self,
        ctx: &QueryContext,
        summary: &ThreatIntelSetSummary,
        detail: Option<ThreatIntelSetDetail>,
    ) -> Result<Row> {
        let mut row = RowBuilder::new();
        row.set("detector_id", json!(summary.detector_id));
        row.set("threat_intel_set_id", json!(summary.threat_intel_set_id));

        let detail = match detail {
            Some(detail) => Some(detail),
            None if wants_detail(&self.schema, ctx) => Some(
                self.get(&summary.detector_id, &summary.threat_intel_set_id)
                    .await?,
            ),
            None => None,
        };
        if let Some(detail) = detail {
            row.set("name", json!(detail.name));
            row.set("title", json!(detail.name));
            row.set("format", json!(detail.format));
            row.set("location", json!(detail.location));
            row.set("status", json!(detail.status));
            row.set("tags", json!(detail.tags));
        }

        if ctx.wants_column("akas") {
            row.set("akas", json!(self.akas(ctx, summary).await?));
        }

        Ok(row.finish(&self.schema, ctx))
    }
}

#[async_trait]
impl<A> TableSource for ThreatIntelSetTable<A>
where
    A: GuardDutyApi + CommonColumnsSource,
{
    fn schema(&self) -> &Table {
        &self.schema
    }

    async fn scan(&self, ctx: &QueryContext, sink: &mut RowSink) -> Result<()> {
        // Parent iteration: every detector in the region
        let mut next_token: Option<String> = None;
        loop {
            let page = self.api.list_detector_ids(next_token.as_deref()).await?;
            for detector_id in &page.detector_ids {
                if !self.list_for_detector(detector_id, ctx, sink).await? {
                    return Ok(());
                }
            }
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }
        Ok(())
    }

    async fn lookup(&self, ctx: &QueryContext) -> Result<Option<Row>> {
        let detector_id = ctx
            .quals
            .single("detector_id")
            .ok_or_else(|| anyhow!("point lookup requires detector_id"))?
            .to_string();
        let threat_intel_set_id = ctx
            .quals
            .single("threat_intel_set_id")
            .ok_or_else(|| anyhow!("point lookup requires threat_intel_set_id"))?
            .to_string();

        let detail = self.get(&detector_id, &threat_intel_set_id).await?;
        let summary = ThreatIntelSetSummary {
            detector_id,
            threat_intel_set_id,
        };
        Ok(Some(self.hydrate_row(ctx, &summary, Some(detail)).await?))
    }
}

/// Whether a detector passes the pushed-down detector_id qual.
/// List values use substring containment against the rendered list, not
/// exact membership.
fn detector_matches_qual(detector_id: &str, quals: &Quals) -> bool {
    match quals.get("detector_id") {
        Some(QualValue::Single(value)) => value == detector_id,
        Some(QualValue::List(values)) => format!("{:?}", values).contains(detector_id),
        None => true,
    }
}

/// ARN-style identifier for a threat intel set
fn threat_intel_set_aka(
    partition: &str,
    region: &str,
    account_id: &str,
    detector_id: &str,
    threat_intel_set_id: &str,
) -> String {
    format!(
        "arn:{}:guardduty:{}:{}:detector/{}/threatintelset/{}",
        partition, region, account_id, detector_id, threat_intel_set_id
    )
}
