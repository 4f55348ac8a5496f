//! Lightweight AWS HTTP client with SigV4 signing
//!
//! Talks to the two services this crate consumes (GuardDuty, STS) with
//! direct HTTP calls instead of the service SDK crates.

use anyhow::{anyhow, Result};
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningSettings};
use aws_sigv4::sign::v4::SigningParams;
use aws_smithy_runtime_api::client::identity::Identity;
use reqwest::Client;
use std::collections::HashMap;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::credentials::Credentials;

/// Error returned by an AWS service, with the service's own error code
/// (e.g. "BadRequestException") preserved for classification by callers.
#[derive(Debug, Error)]
#[error("AWS request failed ({status}) {code}: {message}")]
pub struct ApiError {
    pub status: u16,
    pub code: String,
    pub message: String,
}

/// AWS service definition
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    /// Service signing name (e.g. "guardduty")
    pub signing_name: &'static str,
    /// Service endpoint prefix (e.g. "guardduty")
    pub endpoint_prefix: &'static str,
    /// API version, sent as the Version query parameter for Query protocol
    pub api_version: &'static str,
    /// Protocol: "query" or "rest-json"
    #[allow(dead_code)]
    pub protocol: Protocol,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Protocol {
    /// STS style: Action=X&Version=Y as query params, XML response
    Query,
    /// REST with JSON body (GuardDuty)
    RestJson,
}

/// Service definitions for the supported services
pub fn get_service(name: &str) -> Option<ServiceDefinition> {
    match name {
        "guardduty" => Some(ServiceDefinition {
            signing_name: "guardduty",
            endpoint_prefix: "guardduty",
            api_version: "2017-11-28",
            protocol: Protocol::RestJson,
        }),
        "sts" => Some(ServiceDefinition {
            signing_name: "sts",
            endpoint_prefix: "sts",
            api_version: "2011-06-15",
            protocol: Protocol::Query,
        }),
        _ => None,
    }
}

/// Mask sensitive credential values for logging
fn mask_credential(value: &str) -> String {
    if value.len() <= 8 {
        "*".repeat(value.len())
    } else {
        format!("{}...{}", &value[..4], &value[value.len() - 4..])
    }
}

/// AWS HTTP client
pub struct AwsHttpClient {
    http_client: Client,
    credentials: Credentials,
    region: String,
    endpoint_url: Option<String>,
}

impl AwsHttpClient {
    /// Create a new AWS HTTP client
    pub fn new(credentials: Credentials, region: &str, endpoint_url: Option<String>) -> Self {
        debug!(
            "Creating AWS HTTP client for region: {}, access_key: {}, endpoint_url: {:?}",
            region,
            mask_credential(&credentials.access_key_id),
            endpoint_url
        );
        Self {
            http_client: Client::new(),
            credentials,
            region: region.to_string(),
            endpoint_url,
        }
    }

    /// Get the endpoint URL for a service
    fn get_endpoint(&self, service: &ServiceDefinition) -> String {
        // A custom endpoint overrides ALL services (LocalStack, etc.)
        if let Some(ref endpoint) = self.endpoint_url {
            return endpoint.clone();
        }
        format!(
            "https://{}.{}.amazonaws.com",
            service.endpoint_prefix, self.region
        )
    }

    /// Make a Query protocol request (STS)
    pub async fn query_request(
        &self,
        service_name: &str,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<String> {
        debug!("Query request: service={}, action={}", service_name, action);
        trace!("Query params: {:?}", params);

        let service = get_service(service_name)
            .ok_or_else(|| anyhow!("Unknown service: {}", service_name))?;

        let endpoint = self.get_endpoint(&service);
        debug!("Endpoint: {}", endpoint);

        let mut query_params: Vec<(String, String)> = vec![
            ("Action".to_string(), action.to_string()),
            ("Version".to_string(), service.api_version.to_string()),
        ];
        for (k, v) in params {
            query_params.push((k.to_string(), v.to_string()));
        }

        let query_string: String = query_params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let url = format!("{}/?{}", endpoint, query_string);

        self.signed_request(&service, "POST", &url, "", None).await
    }

    /// Make a REST-JSON request (GuardDuty)
    pub async fn rest_json_request(
        &self,
        service_name: &str,
        method: &str,
        path: &str,
        body: Option<&str>,
    ) -> Result<String> {
        debug!(
            "REST-JSON request: service={}, method={}, path={}",
            service_name, method, path
        );
        trace!("REST-JSON body: {:?}", body);

        let service = get_service(service_name)
            .ok_or_else(|| anyhow!("Unknown service: {}", service_name))?;

        let endpoint = self.get_endpoint(&service);
        let url = format!("{}{}", endpoint, path);
        debug!("URL: {}", url);

        let mut headers = HashMap::new();
        if body.is_some() {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }

        self.signed_request(&service, method, &url, body.unwrap_or(""), Some(headers))
            .await
    }

    /// Make a signed request
    async fn signed_request(
        &self,
        service: &ServiceDefinition,
        method: &str,
        url: &str,
        body: &str,
        extra_headers: Option<HashMap<String, String>>,
    ) -> Result<String> {
        // Parse URL
        let parsed_url = url::Url::parse(url)?;
        let host = parsed_url
            .host_str()
            .ok_or_else(|| anyhow!("Invalid URL"))?;
        let path_and_query = if let Some(query) = parsed_url.query() {
            format!("{}?{}", parsed_url.path(), query)
        } else {
            parsed_url.path().to_string()
        };

        // Build headers
        let mut headers = vec![("host".to_string(), host.to_string())];
        if let Some(extra) = &extra_headers {
            for (k, v) in extra {
                headers.push((k.to_lowercase(), v.clone()));
            }
        }

        // Create identity for signing
        let creds = aws_credential_types::Credentials::new(
            &self.credentials.access_key_id,
            &self.credentials.secret_access_key,
            self.credentials.session_token.clone(),
            None,
            "qaws",
        );
        let identity: Identity = creds.into();

        let signing_params = SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(service.signing_name)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()?
            .into();

        let signable_body = if body.is_empty() {
            SignableBody::Bytes(&[])
        } else {
            SignableBody::Bytes(body.as_bytes())
        };

        let signable_request = SignableRequest::new(
            method,
            &path_and_query,
            headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            signable_body,
        )?;

        let (signing_instructions, _signature) =
            sign(signable_request, &signing_params)?.into_parts();

        // Build the actual request
        let mut request = match method {
            "GET" => self.http_client.get(url),
            "POST" => self.http_client.post(url),
            "PUT" => self.http_client.put(url),
            "DELETE" => self.http_client.delete(url),
            _ => return Err(anyhow!("Unsupported HTTP method: {}", method)),
        };

        // Apply signing headers
        for (name, value) in signing_instructions.headers() {
            request = request.header(name.to_string(), value.to_string());
        }

        // Apply extra headers
        if let Some(extra) = extra_headers {
            for (k, v) in extra {
                request = request.header(&k, &v);
            }
        }

        if !body.is_empty() {
            request = request.body(body.to_string());
        }

        trace!("Sending {} request to {}", method, url);
        let response = request.send().await?;
        let status = response.status();
        let response_headers = response.headers().clone();
        let text = response.text().await?;

        debug!("Response status: {}", status);
        trace!(
            "Response body (first 2000 chars): {}",
            &text[..text.len().min(2000)]
        );

        if !status.is_success() {
            warn!(
                "AWS request failed: status={}, body={}",
                status,
                &text[..text.len().min(500)]
            );
            let code = error_code(&response_headers, &text).unwrap_or_else(|| status.to_string());
            let message = error_message(&text).unwrap_or_else(|| text.clone());
            return Err(ApiError {
                status: status.as_u16(),
                code,
                message,
            }
            .into());
        }

        Ok(text)
    }
}

/// Extract the AWS error code from a failed response.
///
/// REST-JSON services put the code in the `x-amzn-errortype` header (possibly
/// suffixed with `:http://...`) and in the body's `__type`/`code` field
/// (possibly prefixed with `namespace#`). Query services return an XML
/// `<Error><Code>` element.
fn error_code(headers: &reqwest::header::HeaderMap, body: &str) -> Option<String> {
    if let Some(value) = headers
        .get("x-amzn-errortype")
        .and_then(|v| v.to_str().ok())
    {
        let code = value.split(':').next().unwrap_or(value);
        if !code.is_empty() {
            return Some(trim_error_namespace(code).to_string());
        }
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let raw = json
            .get("__type")
            .or_else(|| json.get("code"))
            .and_then(|v| v.as_str());
        if let Some(code) = raw {
            return Some(trim_error_namespace(code).to_string());
        }
    }

    if body.trim_start().starts_with('<') {
        if let Ok(json) = xml_to_json(body) {
            let code = json
                .pointer("/ErrorResponse/Error/Code")
                .or_else(|| json.pointer("/Error/Code"))
                .and_then(|v| v.as_str());
            if let Some(code) = code {
                return Some(code.to_string());
            }
        }
    }

    None
}

/// Strip a `namespace#` prefix from an error code
fn trim_error_namespace(code: &str) -> &str {
    code.rsplit('#').next().unwrap_or(code)
}

/// Extract a human-readable message from a failed response body
fn error_message(body: &str) -> Option<String> {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let message = json
            .get("message")
            .or_else(|| json.get("Message"))
            .and_then(|v| v.as_str());
        if let Some(message) = message {
            return Some(message.to_string());
        }
    }

    if body.trim_start().starts_with('<') {
        if let Ok(json) = xml_to_json(body) {
            let message = json
                .pointer("/ErrorResponse/Error/Message")
                .or_else(|| json.pointer("/Error/Message"))
                .and_then(|v| v.as_str());
            if let Some(message) = message {
                return Some(message.to_string());
            }
        }
    }

    None
}

/// Parse an XML response to JSON using quick-xml
pub fn xml_to_json(xml: &str) -> Result<serde_json::Value> {
    use quick_xml::events::Event;
    use quick_xml::Reader;
    use serde_json::{Map, Value};

    fn parse_element(reader: &mut Reader<&[u8]>) -> Result<Value> {
        let mut map: Map<String, Value> = Map::new();
        let mut buf = Vec::new();
        let mut current_text = String::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let tag_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    let child_value = parse_element(reader)?;

                    // Duplicate keys become an array
                    if let Some(existing) = map.get_mut(&tag_name) {
                        match existing {
                            Value::Array(arr) => arr.push(child_value),
                            _ => {
                                let old = existing.take();
                                *existing = Value::Array(vec![old, child_value]);
                            }
                        }
                    } else {
                        map.insert(tag_name, child_value);
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().unwrap_or_default().trim().to_string();
                    if !text.is_empty() {
                        current_text = text;
                    }
                }
                Ok(Event::End(_)) => break,
                Ok(Event::Empty(e)) => {
                    let tag_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    map.insert(tag_name, Value::Null);
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(anyhow!("XML parse error: {}", e)),
                _ => {}
            }
            buf.clear();
        }

        // Text-only elements collapse to a string
        if map.is_empty() && !current_text.is_empty() {
            Ok(Value::String(current_text))
        } else {
            Ok(Value::Object(map))
        }
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root_map: Map<String, Value> = Map::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let child_value = parse_element(&mut reader)?;
                root_map.insert(tag_name, child_value);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(anyhow!("XML parse error: {}", e)),
        }
        buf.clear();
    }

    Ok(serde_json::Value::Object(root_map))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_credentials() -> Credentials {
        Credentials {
            access_key_id: "TESTACCESSKEY".to_string(),
            secret_access_key: "TESTSECRETKEY".to_string(),
            session_token: None,
        }
    }

    fn client_with_region(region: &str) -> AwsHttpClient {
        AwsHttpClient::new(dummy_credentials(), region, None)
    }

    #[test]
    fn guardduty_uses_regional_endpoint() {
        let client = client_with_region("us-east-1");
        let service = get_service("guardduty").expect("guardduty service definition");
        assert_eq!(
            client.get_endpoint(&service),
            "https://guardduty.us-east-1.amazonaws.com"
        );
    }

    #[test]
    fn sts_uses_regional_endpoint() {
        let client = client_with_region("eu-central-1");
        let service = get_service("sts").expect("sts service definition");
        assert_eq!(
            client.get_endpoint(&service),
            "https://sts.eu-central-1.amazonaws.com"
        );
    }

    #[test]
    fn custom_endpoint_overrides_all_services() {
        let client = AwsHttpClient::new(
            dummy_credentials(),
            "us-east-1",
            Some("http://localhost:4566".to_string()),
        );
        let service = get_service("guardduty").unwrap();
        assert_eq!(client.get_endpoint(&service), "http://localhost:4566");
    }

    #[test]
    fn unknown_service_has_no_definition() {
        assert!(get_service("dynamodb").is_none());
    }

    #[test]
    fn error_code_prefers_errortype_header() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "x-amzn-errortype",
            "BadRequestException:http://internal.amazon.com/coral/"
                .parse()
                .unwrap(),
        );
        let body = r#"{"message":"The request is rejected.","__type":"InvalidInputException"}"#;
        assert_eq!(
            error_code(&headers, body).as_deref(),
            Some("BadRequestException")
        );
    }

    #[test]
    fn error_code_falls_back_to_body_type() {
        let headers = reqwest::header::HeaderMap::new();
        let body = r#"{"message":"nope","__type":"com.amazonaws.guardduty#InvalidInputException"}"#;
        assert_eq!(
            error_code(&headers, body).as_deref(),
            Some("InvalidInputException")
        );
    }

    #[test]
    fn error_code_reads_query_protocol_xml() {
        let headers = reqwest::header::HeaderMap::new();
        let body = r#"<ErrorResponse><Error><Type>Sender</Type><Code>ExpiredToken</Code><Message>The security token included in the request is expired</Message></Error></ErrorResponse>"#;
        assert_eq!(error_code(&headers, body).as_deref(), Some("ExpiredToken"));
        assert_eq!(
            error_message(body).as_deref(),
            Some("The security token included in the request is expired")
        );
    }

    #[test]
    fn xml_to_json_parses_caller_identity() {
        let xml = r#"
            <GetCallerIdentityResponse>
                <GetCallerIdentityResult>
                    <Arn>arn:aws:iam::123456789012:user/test</Arn>
                    <UserId>AIDATEST</UserId>
                    <Account>123456789012</Account>
                </GetCallerIdentityResult>
            </GetCallerIdentityResponse>
        "#;
        let json = xml_to_json(xml).unwrap();
        assert_eq!(
            json.pointer("/GetCallerIdentityResponse/GetCallerIdentityResult/Account")
                .and_then(|v| v.as_str()),
            Some("123456789012")
        );
    }

    #[test]
    fn xml_to_json_collects_repeated_tags_into_array() {
        let xml = "<Out><Item>a</Item><Item>b</Item></Out>";
        let json = xml_to_json(xml).unwrap();
        assert_eq!(
            json.pointer("/Out/Item"),
            Some(&serde_json::json!(["a", "b"]))
        );
    }

    #[tokio::test]
    async fn rest_json_request_returns_body_on_success() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/detector"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"detectorIds":["d1"]}"#),
            )
            .mount(&server)
            .await;

        let client = AwsHttpClient::new(dummy_credentials(), "us-east-1", Some(server.uri()));
        let body = client
            .rest_json_request("guardduty", "GET", "/detector", None)
            .await
            .unwrap();
        assert_eq!(body, r#"{"detectorIds":["d1"]}"#);
    }

    #[tokio::test]
    async fn rest_json_request_surfaces_api_error_with_code() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(400)
                    .insert_header("x-amzn-errortype", "InvalidInputException")
                    .set_body_string(
                        r#"{"message":"The request is rejected because an invalid or out-of-range value is specified as an input parameter.","__type":"InvalidInputException"}"#,
                    ),
            )
            .mount(&server)
            .await;

        let client = AwsHttpClient::new(dummy_credentials(), "us-east-1", Some(server.uri()));
        let err = client
            .rest_json_request("guardduty", "GET", "/detector/bad/threatintelset/x", None)
            .await
            .unwrap_err();
        let api_err = err.downcast_ref::<ApiError>().expect("typed api error");
        assert_eq!(api_err.status, 400);
        assert_eq!(api_err.code, "InvalidInputException");
        assert!(api_err.message.starts_with("The request is rejected"));
    }
}
