//! AWS CLI named profiles from `~/.aws/credentials` and `~/.aws/config`.
//!
//! Only the settings this tool consumes are read: static keys, an optional
//! session token, and the profile region. Profiles that obtain keys through
//! SSO, `role_arn` or `credential_process` are recognised but not resolved.

use crate::config::{non_empty_env, AwsCredentials};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Name used when no profile is configured.
pub const DEFAULT_PROFILE: &str = "default";

type Sections = HashMap<String, HashMap<String, String>>;

/// A named profile merged from the shared credentials and config files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AwsProfile {
    /// Profile name (e.g., "default", "dsoadev").
    pub name: String,
    /// The region configured in this profile.
    pub region: Option<String>,
    /// Static credentials from either file.
    pub credentials: Option<AwsCredentials>,
    /// Credential source this crate cannot resolve, e.g. `"SSO"`.
    pub unsupported_source: Option<&'static str>,
}

/// Keys that mark a profile as needing a credential source other than
/// static keys, with the label used in error messages.
const UNSUPPORTED_SOURCES: &[(&str, &str)] = &[
    ("sso_session", "SSO"),
    ("sso_start_url", "SSO"),
    ("sso_account_id", "SSO"),
    ("role_arn", "role_arn"),
    ("credential_process", "credential_process"),
];

/// Locations of the two shared files.
#[derive(Debug, Clone)]
pub struct SharedFiles {
    pub credentials: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

impl SharedFiles {
    /// Resolve file locations honouring `AWS_SHARED_CREDENTIALS_FILE` and
    /// `AWS_CONFIG_FILE`.
    pub fn from_environment() -> Self {
        let aws_dir = dirs::home_dir().map(|h| h.join(".aws"));
        Self {
            credentials: non_empty_env("AWS_SHARED_CREDENTIALS_FILE")
                .map(PathBuf::from)
                .or_else(|| aws_dir.as_ref().map(|d| d.join("credentials"))),
            config: non_empty_env("AWS_CONFIG_FILE")
                .map(PathBuf::from)
                .or_else(|| aws_dir.as_ref().map(|d| d.join("config"))),
        }
    }

    pub fn new(credentials: impl Into<PathBuf>, config: impl Into<PathBuf>) -> Self {
        Self {
            credentials: Some(credentials.into()),
            config: Some(config.into()),
        }
    }

    /// Load a profile. Missing files or sections yield an empty profile.
    pub fn load_profile(&self, name: &str) -> AwsProfile {
        let name = if name.trim().is_empty() {
            DEFAULT_PROFILE
        } else {
            name.trim()
        };

        let creds_sections = self.credentials.as_deref().map(read_sections).unwrap_or_default();
        let config_sections = self.config.as_deref().map(read_sections).unwrap_or_default();

        let config_key = if name == DEFAULT_PROFILE {
            DEFAULT_PROFILE.to_string()
        } else {
            format!("profile {}", name)
        };
        let from_config = config_sections
            .get(&config_key)
            .or_else(|| config_sections.get(name));
        let from_creds = creds_sections.get(name);

        let credentials = from_creds
            .and_then(|s| credentials_from_section(s, "shared-credentials-file"))
            .or_else(|| from_config.and_then(|s| credentials_from_section(s, "shared-config-file")));
        let region = from_config
            .and_then(|s| s.get("region"))
            .or_else(|| from_creds.and_then(|s| s.get("region")))
            .cloned();
        let unsupported_source = [from_config, from_creds]
            .into_iter()
            .flatten()
            .find_map(unsupported_source);

        AwsProfile {
            name: name.to_string(),
            region,
            credentials,
            unsupported_source,
        }
    }
}

fn credentials_from_section(
    section: &HashMap<String, String>,
    provider: &str,
) -> Option<AwsCredentials> {
    let access_key = section.get("aws_access_key_id")?;
    let secret_key = section.get("aws_secret_access_key")?;
    let creds = match section.get("aws_session_token") {
        Some(token) => AwsCredentials::new_temporary(access_key, secret_key, token, None),
        None => AwsCredentials::new(access_key, secret_key),
    };
    Some(creds.with_provider_name(provider))
}

fn unsupported_source(section: &HashMap<String, String>) -> Option<&'static str> {
    UNSUPPORTED_SOURCES
        .iter()
        .find(|(key, _)| section.contains_key(*key))
        .map(|(_, label)| *label)
}

fn read_sections(path: &Path) -> Sections {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_ini(&text),
        Err(e) => {
            log::debug!("shared AWS file {} not readable: {}", path.display(), e);
            Sections::new()
        }
    }
}

/// Minimal INI reader for the AWS shared file format.
pub(crate) fn parse_ini(text: &str) -> Sections {
    let mut sections = Sections::new();
    let mut current: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(inner) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = inner.split_whitespace().collect::<Vec<_>>().join(" ");
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        let (Some(section), Some((key, value))) = (current.as_ref(), line.split_once('=')) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            // nested sub-section header such as `s3 =`
            continue;
        }
        if let Some(entries) = sections.get_mut(section) {
            entries.insert(key.trim().to_lowercase(), value.to_string());
        }
    }
    sections
}
