//! AWS credentials loading
//!
//! Supports:
//! - Environment variables (AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, AWS_SESSION_TOKEN)
//! - AWS profiles (~/.aws/credentials and ~/.aws/config)
//!
//! Session setup beyond that (SSO, instance metadata, role assumption) is
//! expected to have produced static keys before this program runs.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("no credentials found for profile '{profile}' - run 'aws configure'")]
    NotFound { profile: String },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// AWS credentials
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Load credentials for a given profile
pub fn load_credentials(profile: &str) -> Result<Credentials, CredentialsError> {
    // 1. Environment variables win for the default profile
    if profile == "default" {
        if let Some(creds) = load_from_env() {
            debug!("Loaded credentials from environment variables");
            return Ok(creds);
        }
    }

    // 2. Shared credentials file (~/.aws/credentials)
    if let Some(path) = credentials_file_path() {
        if let Some(creds) = load_from_file(&path, profile)? {
            debug!("Loaded credentials for profile '{}' from {:?}", profile, path);
            return Ok(creds);
        }
    }

    // 3. Shared config file (~/.aws/config), where sections are "profile <name>"
    if let Some(path) = config_file_path() {
        let section = if profile == "default" {
            "default".to_string()
        } else {
            format!("profile {}", profile)
        };
        if let Some(creds) = load_from_file(&path, &section)? {
            debug!("Loaded credentials for profile '{}' from {:?}", profile, path);
            return Ok(creds);
        }
    }

    Err(CredentialsError::NotFound {
        profile: profile.to_string(),
    })
}

/// Load credentials from environment variables
fn load_from_env() -> Option<Credentials> {
    let access_key_id = env::var("AWS_ACCESS_KEY_ID").ok()?;
    let secret_access_key = env::var("AWS_SECRET_ACCESS_KEY").ok()?;
    if access_key_id.is_empty() || secret_access_key.is_empty() {
        return None;
    }
    Some(Credentials {
        access_key_id,
        secret_access_key,
        session_token: env::var("AWS_SESSION_TOKEN").ok().filter(|t| !t.is_empty()),
    })
}

/// Load credentials from an INI-style shared file section
fn load_from_file(path: &PathBuf, section: &str) -> Result<Option<Credentials>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read {:?}: {}", path, e))?;
    let sections = parse_ini(&content);
    Ok(sections.get(section).and_then(section_credentials))
}

/// Build credentials from a parsed INI section, if it carries static keys
fn section_credentials(section: &HashMap<String, String>) -> Option<Credentials> {
    let access_key_id = section.get("aws_access_key_id")?.clone();
    let secret_access_key = section.get("aws_secret_access_key")?.clone();
    Some(Credentials {
        access_key_id,
        secret_access_key,
        session_token: section.get("aws_session_token").cloned(),
    })
}

/// Path to the shared credentials file
fn credentials_file_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("AWS_SHARED_CREDENTIALS_FILE") {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".aws").join("credentials"))
}

/// Path to the shared config file
fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("AWS_CONFIG_FILE") {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".aws").join("config"))
}

/// Parse INI-style content into section -> key/value maps.
/// Comments (# and ;) and blank lines are skipped; keys are lowercased.
fn parse_ini(content: &str) -> HashMap<String, HashMap<String, String>> {
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            let name = line[1..line.len() - 1].trim().to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        if let (Some(section), Some(eq)) = (&current, line.find('=')) {
            let key = line[..eq].trim().to_lowercase();
            let value = line[eq + 1..].trim().to_string();
            if !key.is_empty() {
                sections
                    .entry(section.clone())
                    .or_default()
                    .insert(key, value);
            }
        }
    }

    sections
}
