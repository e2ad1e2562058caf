//! Credential providers.
//!
//! A provider hands out either SigV4 key material or a bearer token. The
//! default chain follows the AWS SDK order: environment variables first,
//! then the named profile in the shared files.

use crate::config::AwsCredentials;
use crate::error::{AwsError, AwsResult};
use crate::profile::SharedFiles;
use async_trait::async_trait;
use std::fmt;

/// Material used to authenticate a request.
#[derive(Clone, PartialEq)]
pub enum Credentials {
    /// Keys for SigV4 signing.
    Aws(AwsCredentials),
    /// An opaque OAuth access token sent as `Authorization: Bearer`.
    Bearer(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Aws(creds) => f.debug_tuple("Aws").field(creds).finish(),
            Credentials::Bearer(_) => f.write_str("Bearer(** redacted **)"),
        }
    }
}

/// Source of credentials, consulted once per signed request.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn retrieve(&self) -> AwsResult<Credentials>;
}

/// Always returns the same credentials.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    credentials: Credentials,
}

impl StaticProvider {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn aws(credentials: AwsCredentials) -> Self {
        Self::new(Credentials::Aws(credentials))
    }
}

#[async_trait]
impl CredentialProvider for StaticProvider {
    async fn retrieve(&self) -> AwsResult<Credentials> {
        Ok(self.credentials.clone())
    }
}

/// Bearer token provider. An empty token is a configuration error reported
/// at retrieval time.
#[derive(Clone)]
pub struct TokenProvider {
    token: String,
}

impl TokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into().trim().to_string(),
        }
    }
}

impl fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenProvider").finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialProvider for TokenProvider {
    async fn retrieve(&self) -> AwsResult<Credentials> {
        if self.token.is_empty() {
            return Err(AwsError::credential_error(
                "bearer token is empty; run `nq login` or set NEPTUNE_TOKEN",
            ));
        }
        Ok(Credentials::Bearer(self.token.clone()))
    }
}

/// Environment variables, then the shared profile files.
#[derive(Debug, Clone)]
pub struct DefaultChain {
    profile: String,
    files: SharedFiles,
}

impl DefaultChain {
    pub fn new(profile: Option<&str>) -> Self {
        Self::with_files(profile, SharedFiles::from_environment())
    }

    pub fn with_files(profile: Option<&str>, files: SharedFiles) -> Self {
        Self {
            profile: profile.unwrap_or_default().to_string(),
            files,
        }
    }

    fn resolve(&self) -> AwsResult<AwsCredentials> {
        // An explicit profile wins over ambient environment keys.
        if self.profile.is_empty() {
            if let Some(creds) = AwsCredentials::from_environment() {
                return Ok(creds);
            }
        }

        let profile = self.files.load_profile(&self.profile);
        match (profile.credentials, profile.unsupported_source) {
            (Some(creds), _) => Ok(creds),
            (None, Some(source)) => Err(AwsError::credential_error(&format!(
                "AWS profile {:?} uses {} credentials, which are not supported; \
                 export AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY or add static keys to the profile",
                profile.name, source
            ))),
            (None, None) if !self.profile.is_empty() => AwsCredentials::from_environment().ok_or_else(|| {
                AwsError::credential_error(&format!(
                    "no AWS credentials found for profile {:?}",
                    profile.name
                ))
            }),
            (None, None) => Err(AwsError::credential_error(
                "no AWS credentials found in environment or shared credentials files",
            )),
        }
    }
}

#[async_trait]
impl CredentialProvider for DefaultChain {
    async fn retrieve(&self) -> AwsResult<Credentials> {
        let creds = self.resolve()?;
        if creds.is_expired() {
            return Err(AwsError::credential_error(&format!(
                "AWS credentials from {} have expired",
                creds.provider_name.as_deref().unwrap_or("provider")
            )));
        }
        log::debug!(
            "resolved AWS credentials from {}",
            creds.provider_name.as_deref().unwrap_or("unknown")
        );
        Ok(Credentials::Aws(creds))
    }
}
