//! STS caller identity lookup
//!
//! Backs the per-query memoized account/partition metadata used when
//! composing ARN-style identifiers.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::client::AwsClients;
use super::http::xml_to_json;

/// Account-level metadata shared by every row of a query
#[derive(Debug, Clone, PartialEq)]
pub struct CommonColumns {
    pub account_id: String,
    /// AWS partition ("aws", "aws-cn", "aws-us-gov"), taken from the caller ARN
    pub partition: String,
}

/// Source of the account/partition metadata.
/// Lets resolvers be exercised against a stub without an STS call.
#[async_trait]
pub trait CommonColumnsSource: Send + Sync {
    async fn common_columns(&self) -> Result<CommonColumns>;
}

#[async_trait]
impl CommonColumnsSource for AwsClients {
    async fn common_columns(&self) -> Result<CommonColumns> {
        get_common_columns(self).await
    }
}

/// Fetch the caller's account id and partition via GetCallerIdentity
pub async fn get_common_columns(clients: &AwsClients) -> Result<CommonColumns> {
    let xml = clients
        .http
        .query_request("sts", "GetCallerIdentity", &[])
        .await?;
    let json = xml_to_json(&xml)?;
    parse_caller_identity(&json)
}

/// Parse the converted GetCallerIdentity response
fn parse_caller_identity(json: &Value) -> Result<CommonColumns> {
    let result = json
        .pointer("/GetCallerIdentityResponse/GetCallerIdentityResult")
        .ok_or_else(|| anyhow!("Unexpected GetCallerIdentity response shape"))?;

    let account_id = result
        .pointer("/Account")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("GetCallerIdentity response missing Account"))?
        .to_string();

    let arn = result
        .pointer("/Arn")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("GetCallerIdentity response missing Arn"))?;

    // ARN format: arn:<partition>:sts::<account>:...
    let partition = arn
        .split(':')
        .nth(1)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| anyhow!("Cannot parse partition from ARN: {}", arn))?
        .to_string();

    Ok(CommonColumns {
        account_id,
        partition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_account_and_partition() {
        let json = json!({
            "GetCallerIdentityResponse": {
                "GetCallerIdentityResult": {
                    "Arn": "arn:aws:sts::123456789012:assumed-role/admin/session",
                    "UserId": "AROATEST:session",
                    "Account": "123456789012"
                }
            }
        });

        let common = parse_caller_identity(&json).unwrap();
        assert_eq!(common.account_id, "123456789012");
        assert_eq!(common.partition, "aws");
    }

    #[test]
    fn parses_govcloud_partition() {
        let json = json!({
            "GetCallerIdentityResponse": {
                "GetCallerIdentityResult": {
                    "Arn": "arn:aws-us-gov:iam::210987654321:user/ops",
                    "UserId": "AIDATEST",
                    "Account": "210987654321"
                }
            }
        });

        let common = parse_caller_identity(&json).unwrap();
        assert_eq!(common.partition, "aws-us-gov");
    }

    #[test]
    fn rejects_malformed_response() {
        let json = json!({ "GetCallerIdentityResponse": {} });
        assert!(parse_caller_identity(&json).is_err());
    }

    #[tokio::test]
    async fn get_common_columns_round_trips_over_http() {
        use crate::aws::credentials::Credentials;
        use crate::aws::http::AwsHttpClient;
        use wiremock::matchers::{method, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("Action", "GetCallerIdentity"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<GetCallerIdentityResponse>
                    <GetCallerIdentityResult>
                        <Arn>arn:aws:iam::123456789012:user/test</Arn>
                        <UserId>AIDATEST</UserId>
                        <Account>123456789012</Account>
                    </GetCallerIdentityResult>
                </GetCallerIdentityResponse>"#,
            ))
            .mount(&server)
            .await;

        let clients = AwsClients {
            http: AwsHttpClient::new(
                Credentials {
                    access_key_id: "TESTACCESSKEY".to_string(),
                    secret_access_key: "TESTSECRETKEY".to_string(),
                    session_token: None,
                },
                "us-east-1",
                Some(server.uri()),
            ),
            region: "us-east-1".to_string(),
            profile: "default".to_string(),
        };

        let common = get_common_columns(&clients).await.unwrap();
        assert_eq!(common.account_id, "123456789012");
        assert_eq!(common.partition, "aws");
    }
}
