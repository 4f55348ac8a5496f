use anyhow::{bail, Result};
use clap::Parser;
use serde_json::json;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use qaws::aws::{format_aws_error, AwsClients};
use qaws::guardduty::{threat_intel_set, GuardDutyClient, ThreatIntelSetTable};
use qaws::table::{self, ColumnKind, QualValue, Quals, QueryContext, RowSink, Table};

/// Query AWS GuardDuty threat intel sets as table rows
#[derive(Parser, Debug)]
#[command(name = "qaws")]
#[command(about = "Query AWS GuardDuty threat intel sets as table rows")]
struct Args {
    /// AWS profile
    #[arg(long, env = "AWS_PROFILE", default_value = "default")]
    profile: String,

    /// AWS region
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    region: String,

    /// Custom endpoint URL (LocalStack, etc.)
    #[arg(long, env = "AWS_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// Filter by detector id; repeat for an IN-style filter
    #[arg(long = "detector-id")]
    detector_ids: Vec<String>,

    /// Fetch a single threat intel set (requires exactly one --detector-id)
    #[arg(long)]
    threat_intel_set_id: Option<String>,

    /// Stop after this many rows
    #[arg(long)]
    limit: Option<u64>,

    /// Comma-separated columns to output (default: all)
    #[arg(long, value_delimiter = ',')]
    columns: Option<Vec<String>>,

    /// Print the table schema instead of querying
    #[arg(long)]
    describe: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("qaws=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(err) = run(args).await {
        eprintln!("Error: {}", format_aws_error(&err));
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let schema = threat_intel_set::table();

    if args.describe {
        println!("{}", describe_table(&schema));
        for row in describe_columns(&schema) {
            println!("{}", row);
        }
        return Ok(());
    }

    if let Some(columns) = &args.columns {
        for column in columns {
            if schema.column(column).is_none() {
                bail!("unknown column '{}' for table {}", column, schema.name);
            }
        }
    }

    let quals = build_quals(&args)?;
    let ctx = QueryContext::new(&args.region, quals, args.columns.clone());

    let clients = AwsClients::new(&args.profile, &args.region, args.endpoint_url.clone()).await?;
    let source = ThreatIntelSetTable::new(GuardDutyClient::new(&clients));

    let (tx, mut rx) = mpsc::channel(64);
    let limit = args.limit;

    let scan = async {
        let mut sink = RowSink::new(tx, limit);
        table::execute(&source, &ctx, &mut sink).await
        // sink drops here, closing the channel
    };
    let print = async {
        while let Some(row) = rx.recv().await {
            println!("{}", row);
        }
    };

    let (result, ()) = tokio::join!(scan, print);
    result
}

/// Table-level metadata: name, key columns, ignorable error codes
fn describe_table(table: &Table) -> serde_json::Value {
    json!({
        "table": table.name,
        "description": table.description,
        "get_keys": table.get_keys,
        "list_keys": table.list_keys,
        "not_found_codes": table.ignore_codes,
    })
}

/// One JSON line per column: name, type, description
fn describe_columns(table: &Table) -> Vec<serde_json::Value> {
    table
        .columns
        .iter()
        .map(|column| {
            let kind = match column.kind {
                ColumnKind::String => "string",
                ColumnKind::Json => "json",
            };
            json!({
                "column": column.name,
                "type": kind,
                "description": column.description,
            })
        })
        .collect()
}

/// Translate CLI filters into pushed-down quals
fn build_quals(args: &Args) -> Result<Quals> {
    let mut quals = Quals::new();

    if let Some(threat_intel_set_id) = &args.threat_intel_set_id {
        if args.detector_ids.len() != 1 {
            bail!("--threat-intel-set-id requires exactly one --detector-id");
        }
        quals.insert(
            "detector_id",
            QualValue::Single(args.detector_ids[0].clone()),
        );
        quals.insert(
            "threat_intel_set_id",
            QualValue::Single(threat_intel_set_id.clone()),
        );
        return Ok(quals);
    }

    match args.detector_ids.as_slice() {
        [] => {}
        [single] => quals.insert("detector_id", QualValue::Single(single.clone())),
        many => quals.insert("detector_id", QualValue::List(many.to_vec())),
    }
    Ok(quals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_with(detector_ids: &[&str], threat_intel_set_id: Option<&str>) -> Args {
        Args {
            profile: "default".to_string(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
            detector_ids: detector_ids.iter().map(|s| s.to_string()).collect(),
            threat_intel_set_id: threat_intel_set_id.map(String::from),
            limit: None,
            columns: None,
            describe: false,
        }
    }

    #[test]
    fn describe_lists_every_column_with_its_type() {
        let schema = threat_intel_set::table();
        let rows = describe_columns(&schema);

        assert_eq!(rows.len(), schema.columns.len());
        assert_eq!(rows[0]["column"], "name");
        assert_eq!(rows[0]["type"], "string");
        let akas = rows.iter().find(|r| r["column"] == "akas").unwrap();
        assert_eq!(akas["type"], "json");
    }

    #[test]
    fn describe_reports_keys_and_not_found_codes() {
        let meta = describe_table(&threat_intel_set::table());

        assert_eq!(meta["table"], "aws_guardduty_threat_intel_set");
        assert_eq!(
            meta["get_keys"],
            json!(["detector_id", "threat_intel_set_id"])
        );
        assert_eq!(meta["list_keys"], json!(["detector_id"]));
        assert_eq!(
            meta["not_found_codes"],
            json!(["InvalidInputException", "BadRequestException"])
        );
    }

    #[test]
    fn one_detector_id_becomes_a_single_qual() {
        let quals = build_quals(&args_with(&["d1"], None)).unwrap();
        assert_eq!(quals.single("detector_id"), Some("d1"));
    }

    #[test]
    fn several_detector_ids_become_a_list_qual() {
        let quals = build_quals(&args_with(&["d1", "d2"], None)).unwrap();
        assert_eq!(
            quals.get("detector_id"),
            Some(&QualValue::List(vec!["d1".to_string(), "d2".to_string()]))
        );
    }

    #[test]
    fn point_lookup_needs_exactly_one_detector_id() {
        assert!(build_quals(&args_with(&[], Some("t1"))).is_err());
        assert!(build_quals(&args_with(&["d1", "d2"], Some("t1"))).is_err());

        let quals = build_quals(&args_with(&["d1"], Some("t1"))).unwrap();
        assert_eq!(quals.single("detector_id"), Some("d1"));
        assert_eq!(quals.single("threat_intel_set_id"), Some("t1"));
    }
}
