//! Azure AD client-credentials grant against the v2.0 token endpoint.

use crate::error::{LoginError, LoginResult};
use crate::secret::ApiCredentials;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// `<authority>/<tenant>/oauth2/v2.0/token`
pub fn token_url(authority: &str, tenant_id: &str) -> String {
    let authority = authority.trim_end_matches('/');
    format!("{authority}/{tenant_id}/oauth2/v2.0/token")
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    scope: &'a str,
}

impl<'a> From<&'a ApiCredentials> for TokenRequest<'a> {
    fn from(creds: &'a ApiCredentials) -> Self {
        Self {
            grant_type: "client_credentials",
            client_id: &creds.client_id,
            client_secret: &creds.client_secret,
            scope: &creds.scope,
        }
    }
}

/// Token endpoint reply; missing members fall back to the defaults below.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: i64,
}

impl TokenResponse {
    fn into_token(self, now: DateTime<Utc>) -> LoginResult<AccessToken> {
        if self.access_token.is_empty() {
            return Err(LoginError::EmptyAccessToken);
        }
        let lifetime = match self.expires_in {
            secs if secs > 0 => secs,
            _ => 3600,
        };
        let token_type = if self.token_type.is_empty() {
            "Bearer".to_string()
        } else {
            self.token_type
        };
        Ok(AccessToken {
            access_token: self.access_token,
            token_type,
            expires_at: now + Duration::seconds(lifetime),
        })
    }
}

/// A token ready to be stored as `NEPTUNE_TOKEN`.
#[derive(Clone, PartialEq)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Exchange the registration in `creds` for an access token. Any status
/// other than 200 is an error carrying the response body.
pub async fn acquire_token(
    http: &reqwest::Client,
    authority: &str,
    creds: &ApiCredentials,
) -> LoginResult<AccessToken> {
    let url = token_url(authority, &creds.tenant_id);
    log::debug!("POST {}", url);

    let resp = http
        .post(&url)
        .form(&TokenRequest::from(creds))
        .send()
        .await?;
    let status = resp.status().as_u16();
    let body = resp.text().await?;
    if status != 200 {
        return Err(LoginError::TokenEndpoint {
            status,
            body: body.trim().to_string(),
        });
    }

    serde_json::from_str::<TokenResponse>(&body)
        .map_err(LoginError::DecodeToken)?
        .into_token(Utc::now())
}
