//! Secrets Manager `GetSecretValue` over the JSON 1.1 protocol.

use crate::client::AwsClient;
use crate::error::{AwsError, AwsResult};
use serde::{Deserialize, Serialize};

const SERVICE: &str = "secretsmanager";
const GET_SECRET_VALUE: &str = "secretsmanager.GetSecretValue";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueRequest<'a> {
    secret_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version_stage: Option<&'a str>,
}

/// Subset of the `GetSecretValue` response. Binary secrets are not read.
#[derive(Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct SecretValue {
    #[serde(rename = "ARN")]
    pub arn: Option<String>,
    pub name: String,
    pub version_id: Option<String>,
    pub secret_string: Option<String>,
    pub version_stages: Vec<String>,
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretValue")
            .field("arn", &self.arn)
            .field("name", &self.name)
            .field("version_stages", &self.version_stages)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct SecretsManagerClient {
    client: AwsClient,
}

impl SecretsManagerClient {
    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }

    /// Fetch `secret_id`, optionally at a staging label such as `AWSPREVIOUS`.
    pub async fn get_secret_value(
        &self,
        secret_id: &str,
        version_stage: Option<&str>,
    ) -> AwsResult<SecretValue> {
        let request = GetSecretValueRequest {
            secret_id,
            version_stage,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| AwsError::validation(SERVICE, &e.to_string()))?;
        let response = self
            .client
            .json_request(SERVICE, GET_SECRET_VALUE, &body)
            .await?;
        serde_json::from_str(&response.body)
            .map_err(|e| AwsError::new(SERVICE, "ParseError", &e.to_string(), response.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(GetSecretValueRequest {
            secret_id: "x",
            version_stage: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"SecretId": "x"}));

        let body = serde_json::to_value(GetSecretValueRequest {
            secret_id: "x",
            version_stage: Some("AWSCURRENT"),
        })
        .unwrap();
        assert_eq!(body["VersionStage"], "AWSCURRENT");
    }

    #[test]
    fn response_fields() {
        let v: SecretValue = serde_json::from_str(
            r#"{"ARN":"arn:aws:secretsmanager:us-east-2:1:secret:x","Name":"x","SecretString":"{\"a\":1}","VersionStages":["AWSCURRENT"],"CreatedDate":1.7e9}"#,
        )
        .unwrap();
        assert_eq!(v.name, "x");
        assert_eq!(v.arn.as_deref(), Some("arn:aws:secretsmanager:us-east-2:1:secret:x"));
        assert_eq!(v.secret_string.as_deref(), Some("{\"a\":1}"));
        assert_eq!(v.version_stages, vec!["AWSCURRENT"]);
    }

    #[test]
    fn debug_hides_secret_string() {
        let v = SecretValue {
            name: "x".into(),
            secret_string: Some("hunter2".into()),
            ..Default::default()
        };
        assert!(!format!("{:?}", v).contains("hunter2"));
    }
}
