use crate::auth::{acquire_token, AccessToken, DEFAULT_AUTHORITY};
use crate::error::{LoginError, LoginResult};
use crate::secret::{ApiCredentials, SecretSource};
use std::sync::Arc;
use std::time::Duration;

/// Secret consulted when none is configured.
pub const DEFAULT_SECRET_NAME: &str = "lrl-dtf-sdr-api-auth-secrets";

/// Fetches the client registration from Secrets Manager and exchanges it for
/// an Azure AD access token.
pub struct LoginService {
    secret_name: String,
    secrets: Arc<dyn SecretSource>,
    http: reqwest::Client,
    authority: String,
}

impl LoginService {
    pub fn new(secret_name: impl Into<String>, secrets: Arc<dyn SecretSource>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            secret_name: secret_name.into().trim().to_string(),
            secrets,
            http,
            authority: DEFAULT_AUTHORITY.to_string(),
        }
    }

    /// Point the token request at another authority (sovereign clouds, tests).
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    pub async fn login(&self) -> LoginResult<AccessToken> {
        if self.secret_name.is_empty() {
            return Err(LoginError::MissingSecretName);
        }
        let creds = self.fetch_credentials().await?;
        log::debug!(
            "requesting token for client {} in tenant {}",
            creds.client_id,
            creds.tenant_id
        );
        acquire_token(&self.http, &self.authority, &creds).await
    }

    async fn fetch_credentials(&self) -> LoginResult<ApiCredentials> {
        let payload = self
            .secrets
            .secret_string(&self.secret_name)
            .await
            .map_err(|source| LoginError::Secret {
                name: self.secret_name.clone(),
                source,
            })?
            .ok_or(LoginError::EmptySecretString)?;
        ApiCredentials::from_secret_string(&payload)
    }
}
