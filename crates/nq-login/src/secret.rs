//! The OAuth client registration stored in AWS Secrets Manager.

use crate::error::{LoginError, LoginResult};
use async_trait::async_trait;
use nq_aws::secrets::SecretsManagerClient;
use nq_aws::AwsResult;
use serde::Deserialize;
use std::fmt;

/// Anything that can return a secret's string payload.
#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn secret_string(&self, name: &str) -> AwsResult<Option<String>>;
}

#[async_trait]
impl SecretSource for SecretsManagerClient {
    async fn secret_string(&self, name: &str) -> AwsResult<Option<String>> {
        Ok(self.get_secret_value(name, None).await?.secret_string)
    }
}

/// JSON document kept in the secret.
#[derive(Clone, Default, Deserialize, PartialEq)]
pub struct ApiCredentials {
    #[serde(rename = "ApiAuthClientSecret", default)]
    pub client_secret: String,
    #[serde(rename = "ApiAuthRole", default)]
    pub role: String,
    #[serde(rename = "ApiAuthClientId", default)]
    pub client_id: String,
    #[serde(rename = "ApiAuthDsClientId", default)]
    pub ds_client_id: String,
    #[serde(rename = "ApiAuthTenantId", default)]
    pub tenant_id: String,
    #[serde(rename = "ApiAuthScope", default)]
    pub scope: String,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .field("scope", &self.scope)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl ApiCredentials {
    /// Parse the secret payload and check the fields the token request needs.
    pub fn from_secret_string(payload: &str) -> LoginResult<Self> {
        if payload.trim().is_empty() {
            return Err(LoginError::EmptySecretString);
        }
        let creds: Self = serde_json::from_str(payload).map_err(LoginError::ParseSecret)?;
        creds.validate()?;
        Ok(creds)
    }

    /// Every missing required field is reported at once.
    pub fn validate(&self) -> LoginResult<()> {
        let missing: Vec<&'static str> = [
            ("ApiAuthClientId", &self.client_id),
            ("ApiAuthClientSecret", &self.client_secret),
            ("ApiAuthTenantId", &self.tenant_id),
            ("ApiAuthScope", &self.scope),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(LoginError::MissingFields(missing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_secret() {
        let creds = ApiCredentials::from_secret_string(
            r#"{"ApiAuthClientSecret":"s","ApiAuthClientId":"c","ApiAuthTenantId":"t",
                "ApiAuthScope":"api://x/.default","ApiAuthRole":"reader","ApiAuthDsClientId":"ds"}"#,
        )
        .unwrap();
        assert_eq!(creds.client_id, "c");
        assert_eq!(creds.role, "reader");
        assert_eq!(creds.ds_client_id, "ds");
    }

    #[test]
    fn lists_every_missing_field() {
        let err = ApiCredentials::from_secret_string(r#"{"ApiAuthClientId":"c"}"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "secret missing fields: ApiAuthClientSecret, ApiAuthTenantId, ApiAuthScope"
        );
    }

    #[test]
    fn blank_and_invalid_payloads() {
        assert!(matches!(
            ApiCredentials::from_secret_string("  "),
            Err(LoginError::EmptySecretString)
        ));
        assert!(matches!(
            ApiCredentials::from_secret_string("{nope"),
            Err(LoginError::ParseSecret(_))
        ));
    }

    #[test]
    fn debug_hides_client_secret() {
        let creds = ApiCredentials {
            client_secret: "hunter2".into(),
            ..Default::default()
        };
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
