//! Authentication for data-plane requests.
//!
//! Bearer credentials become a plain `Authorization: Bearer` header. AWS
//! credentials are turned into a SigV4 signature over the exact body bytes.

use crate::error::{GraphError, GraphResult};
use chrono::{DateTime, Utc};
use nq_aws::client::extract_host;
use nq_aws::{AwsError, AwsRegion, Credentials, SigV4Signer, SignedRequest};
use std::collections::BTreeMap;

/// Signing name of AppSync GraphQL endpoints.
pub const APPSYNC_SERVICE: &str = "appsync";

#[derive(Debug, Clone)]
pub struct RequestSigner {
    service: String,
    region: Option<AwsRegion>,
}

impl RequestSigner {
    pub fn new(service: &str, region: Option<AwsRegion>) -> Self {
        Self {
            service: service.to_string(),
            region: region.filter(|r| !r.is_empty()),
        }
    }

    pub fn region(&self) -> Option<&AwsRegion> {
        self.region.as_ref()
    }

    pub fn sign(
        &self,
        method: &str,
        url: &str,
        body: &[u8],
        credentials: &Credentials,
    ) -> GraphResult<SignedRequest> {
        self.sign_at(method, url, body, credentials, Utc::now())
    }

    pub fn sign_at(
        &self,
        method: &str,
        url: &str,
        body: &[u8],
        credentials: &Credentials,
        timestamp: DateTime<Utc>,
    ) -> GraphResult<SignedRequest> {
        url::Url::parse(url)
            .map_err(|e| GraphError::Request(format!("invalid endpoint URL {:?}: {}", url, e)))?;

        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());

        match credentials {
            Credentials::Bearer(token) => {
                let token = token.trim();
                if token.is_empty() {
                    return Err(GraphError::Credentials(AwsError::credential_error(
                        "bearer token is empty",
                    )));
                }
                headers.insert("authorization".to_string(), format!("Bearer {}", token));
                Ok(SignedRequest {
                    method: method.to_string(),
                    url: url.to_string(),
                    headers,
                    body: body.to_vec(),
                })
            }
            Credentials::Aws(creds) => {
                let region = self.region.as_ref().ok_or_else(|| {
                    GraphError::Config(
                        "AWS region is required to sign requests; set AWS_REGION".to_string(),
                    )
                })?;
                headers.insert("host".to_string(), extract_host(url));
                let signer = SigV4Signer::new(
                    &creds.access_key_id,
                    &creds.secret_access_key,
                    creds.session_token.as_deref(),
                    &region.name,
                    &self.service,
                );
                Ok(signer.sign_request(method, url, &headers, body, timestamp))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nq_aws::AwsCredentials;

    const URL: &str = "https://abc.appsync-api.us-east-2.amazonaws.com/graphql";

    fn signer() -> RequestSigner {
        RequestSigner::new(APPSYNC_SERVICE, Some(AwsRegion::new("us-east-2")))
    }

    #[test]
    fn bearer_sets_authorization_only() {
        let signed = signer()
            .sign("POST", URL, b"{}", &Credentials::Bearer("tok".into()))
            .unwrap();
        assert_eq!(signed.header("authorization"), Some("Bearer tok"));
        assert_eq!(signed.header("content-type"), Some("application/json"));
        assert!(signed.header("x-amz-date").is_none());
    }

    #[test]
    fn empty_bearer_token_is_rejected() {
        let err = signer()
            .sign("POST", URL, b"{}", &Credentials::Bearer(" ".into()))
            .unwrap_err();
        assert!(matches!(err, GraphError::Credentials(_)));
    }

    #[test]
    fn sigv4_binds_service_region_and_session_token() {
        let creds = Credentials::Aws(AwsCredentials::new_temporary("ASIAX", "sk", "st", None));
        let signed = signer().sign("POST", URL, b"{\"q\":1}", &creds).unwrap();
        let auth = signed.header("authorization").unwrap();
        assert!(auth.contains("/us-east-2/appsync/aws4_request"));
        assert_eq!(signed.header("x-amz-security-token"), Some("st"));
        assert_eq!(
            signed.header("host"),
            Some("abc.appsync-api.us-east-2.amazonaws.com")
        );

        let verifier = SigV4Signer::new("ASIAX", "sk", Some("st"), "us-east-2", "appsync");
        assert!(verifier.verify(&signed));
    }

    #[test]
    fn sigv4_without_region_is_config_error() {
        let creds = Credentials::Aws(AwsCredentials::new("AK", "SK"));
        let err = RequestSigner::new(APPSYNC_SERVICE, Some(AwsRegion::new("")))
            .sign("POST", URL, b"{}", &creds)
            .unwrap_err();
        assert!(matches!(err, GraphError::Config(_)));
    }

    #[test]
    fn invalid_url_is_rejected() {
        let err = signer()
            .sign("POST", "not a url", b"{}", &Credentials::Bearer("t".into()))
            .unwrap_err();
        assert!(matches!(err, GraphError::Request(_)));
    }
}
