//! AWS client container
//!
//! Bundles the SigV4 HTTP client with the active region and profile.

use anyhow::Result;

use super::credentials::load_credentials;
use super::http::AwsHttpClient;

/// Container for the AWS HTTP client
pub struct AwsClients {
    pub http: AwsHttpClient,
    pub region: String,
    pub profile: String,
}

impl AwsClients {
    /// Create an AWS client for a given profile and region.
    /// Credential loading reads the shared config files, so it runs on a
    /// blocking thread.
    pub async fn new(profile: &str, region: &str, endpoint_url: Option<String>) -> Result<Self> {
        let profile = profile.to_string();
        let region = region.to_string();
        let profile_for_closure = profile.clone();

        let credentials =
            tokio::task::spawn_blocking(move || load_credentials(&profile_for_closure)).await??;

        let http = AwsHttpClient::new(credentials, &region, endpoint_url);

        Ok(Self {
            http,
            region,
            profile,
        })
    }
}

/// Format AWS errors into user-friendly messages
pub fn format_aws_error(err: &anyhow::Error) -> String {
    let err_str = err.to_string();

    if err_str.contains("connection") || err_str.contains("dns error") {
        return "Connection failed - check internet/credentials".to_string();
    }
    if err_str.contains("InvalidClientTokenId") || err_str.contains("SignatureDoesNotMatch") {
        return "Invalid credentials - run 'aws configure'".to_string();
    }
    if err_str.contains("ExpiredToken") {
        return "Credentials expired - refresh or reconfigure".to_string();
    }
    if err_str.contains("AccessDenied") || err_str.contains("UnauthorizedAccess") {
        return "Access denied - check IAM permissions".to_string();
    }
    if err_str.contains("no credentials") || err_str.contains("No credentials") {
        return "No credentials - run 'aws configure'".to_string();
    }
    if err_str.contains("timeout") || err_str.contains("Timeout") {
        return "Request timed out - check connection".to_string();
    }

    err_str
}
