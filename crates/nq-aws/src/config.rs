//! Regions and credential material.

use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AwsRegion {
    /// Region code such as `us-east-2`; may be empty when unknown.
    pub name: String,
}

impl AwsRegion {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_owned(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// `https://<service>.<region>.<suffix>`, with the China partition
    /// using `amazonaws.com.cn`.
    pub fn endpoint(&self, service: &str) -> String {
        let suffix = if self.name.starts_with("cn-") {
            "amazonaws.com.cn"
        } else {
            "amazonaws.com"
        };
        format!("https://{service}.{}.{suffix}", self.name)
    }

    /// Read the region label that follows `appsync-api` in a GraphQL host,
    /// e.g. `abc.appsync-api.us-east-2.amazonaws.com`.
    pub fn from_appsync_url(endpoint: &str) -> Result<Self, String> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err("appsync endpoint is required".into());
        }
        let url = url::Url::parse(endpoint)
            .map_err(|e| format!("invalid appsync endpoint {endpoint:?}: {e}"))?;
        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host,
            _ => return Err(format!("appsync endpoint {endpoint:?} missing hostname")),
        };

        let mut labels = host.split('.').skip_while(|label| *label != "appsync-api");
        match (labels.next(), labels.next()) {
            (Some(_), Some(region)) if !region.is_empty() => Ok(Self::new(region)),
            _ => Err(format!(
                "unable to infer AWS region from appsync endpoint {endpoint:?}"
            )),
        }
    }
}

impl fmt::Display for AwsRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Access key material, long-term or temporary.
#[derive(Clone, PartialEq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Set for temporary (`ASIA...`) keys.
    pub session_token: Option<String>,
    pub expiration: Option<DateTime<Utc>>,
    /// Where the keys came from, for log lines.
    pub provider_name: Option<String>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const HIDDEN: &str = "** redacted **";
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &HIDDEN)
            .field("session_token", &self.session_token.as_ref().map(|_| HIDDEN))
            .field("expiration", &self.expiration)
            .field("provider_name", &self.provider_name)
            .finish()
    }
}

impl AwsCredentials {
    pub fn new(access_key_id: &str, secret_access_key: &str) -> Self {
        Self {
            access_key_id: access_key_id.to_owned(),
            secret_access_key: secret_access_key.to_owned(),
            session_token: None,
            expiration: None,
            provider_name: Some("static".to_owned()),
        }
    }

    pub fn new_temporary(
        access_key_id: &str,
        secret_access_key: &str,
        session_token: &str,
        expiration: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            session_token: Some(session_token.to_owned()),
            expiration,
            provider_name: Some("sts".to_owned()),
            ..Self::new(access_key_id, secret_access_key)
        }
    }

    pub fn with_provider_name(self, name: &str) -> Self {
        Self {
            provider_name: Some(name.to_owned()),
            ..self
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expiration.is_some_and(|at| at < Utc::now())
    }

    pub fn is_temporary(&self) -> bool {
        self.session_token.is_some()
    }

    /// `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`.
    pub fn from_environment() -> Option<Self> {
        let access_key = non_empty_env("AWS_ACCESS_KEY_ID")?;
        let secret_key = non_empty_env("AWS_SECRET_ACCESS_KEY")?;
        let creds = match non_empty_env("AWS_SESSION_TOKEN") {
            Some(token) => Self::new_temporary(&access_key, &secret_key, &token, None),
            None => Self::new(&access_key, &secret_key),
        };
        Some(creds.with_provider_name("environment"))
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    let value = std::env::var(key).ok()?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_owned())
}
