//! Signed HTTP transport shared by the service clients.
//!
//! Two wire protocols are spoken: AWS JSON 1.1 (`POST /` with an
//! `x-amz-target` header, used by Secrets Manager) and REST-JSON `GET`s
//! (the AppSync control plane). Each call is sent once; failures go back to
//! the caller as [`AwsError`].

use crate::config::{AwsCredentials, AwsRegion};
use crate::credentials::{CredentialProvider, Credentials};
use crate::error::{AwsError, AwsResult};
use crate::signing::{build_query_string, SigV4Signer};
use chrono::Utc;
use reqwest::{Client, Method};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str = concat!("nq/", env!("CARGO_PKG_VERSION"));
const JSON_1_1: &str = "application/x-amz-json-1.1";

#[derive(Clone)]
pub struct AwsClient {
    http: Client,
    credentials: Arc<dyn CredentialProvider>,
    region: AwsRegion,
    /// Replaces `https://<service>.<region>.amazonaws.com`, e.g. for mocks.
    endpoint_override: Option<String>,
}

impl std::fmt::Debug for AwsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsClient")
            .field("region", &self.region)
            .field("endpoint_override", &self.endpoint_override)
            .finish_non_exhaustive()
    }
}

/// A 2xx answer.
#[derive(Debug, Clone)]
pub struct AwsResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub request_id: Option<String>,
}

impl AwsResponse {
    async fn read(resp: reqwest::Response) -> AwsResult<Self> {
        let status = resp.status().as_u16();
        let headers: BTreeMap<String, String> = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
            .collect();
        let request_id = ["x-amzn-requestid", "x-amz-request-id"]
            .iter()
            .find_map(|name| headers.get(*name).cloned());
        let body = resp.text().await?;
        Ok(Self {
            status,
            headers,
            body,
            request_id,
        })
    }

    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn into_error(self, service: &str) -> AwsError {
        let err = AwsError::parse_json_error(
            service,
            self.status,
            &self.body,
            self.headers.get("x-amzn-errortype").map(String::as_str),
        );
        match self.request_id {
            Some(id) => err.with_request_id(id),
            None => err,
        }
    }
}

impl AwsClient {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        region: AwsRegion,
        endpoint_override: Option<String>,
    ) -> Self {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            credentials,
            region,
            endpoint_override: endpoint_override.map(|url| url.trim_end_matches('/').to_owned()),
        }
    }

    pub fn endpoint(&self, service: &str) -> String {
        self.endpoint_override
            .clone()
            .unwrap_or_else(|| self.region.endpoint(service))
    }

    /// AWS JSON 1.1 call: `target` is the `x-amz-target` operation name.
    pub async fn json_request(&self, service: &str, target: &str, body: &str) -> AwsResult<AwsResponse> {
        let url = format!("{}/", self.endpoint(service));
        let headers = BTreeMap::from([
            ("content-type".to_string(), JSON_1_1.to_string()),
            ("x-amz-target".to_string(), target.to_string()),
        ]);
        self.send(service, Method::POST, &url, headers, body.as_bytes())
            .await
    }

    /// REST-JSON `GET <endpoint><path>?<query>`.
    pub async fn rest_get(
        &self,
        service: &str,
        path: &str,
        query: &BTreeMap<String, String>,
    ) -> AwsResult<AwsResponse> {
        let mut url = self.endpoint(service);
        if !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(path);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&build_query_string(query));
        }
        self.send(service, Method::GET, &url, BTreeMap::new(), &[])
            .await
    }

    async fn send(
        &self,
        service: &str,
        method: Method,
        url: &str,
        mut headers: BTreeMap<String, String>,
        body: &[u8],
    ) -> AwsResult<AwsResponse> {
        let creds = self.iam_credentials(service).await?;
        headers.insert("host".to_string(), extract_host(url));
        let signed = SigV4Signer::new(
            &creds.access_key_id,
            &creds.secret_access_key,
            creds.session_token.as_deref(),
            &self.region.name,
            service,
        )
        .sign_request(method.as_str(), url, &headers, body, Utc::now());

        let mut request = self.http.request(method.clone(), &signed.url);
        for (name, value) in &signed.headers {
            request = request.header(name, value);
        }
        if !signed.body.is_empty() {
            request = request.body(signed.body);
        }

        let response = AwsResponse::read(request.send().await?).await?;
        if response.is_success() {
            return Ok(response);
        }
        let err = response.into_error(service);
        log::debug!("{} {} failed: {}", method, url, err);
        Err(err)
    }

    async fn iam_credentials(&self, service: &str) -> AwsResult<AwsCredentials> {
        match self.credentials.retrieve().await? {
            Credentials::Aws(creds) => Ok(creds),
            Credentials::Bearer(_) => Err(AwsError::credential_error(&format!(
                "AWS {} requires IAM credentials, not a bearer token",
                service
            ))),
        }
    }
}

/// `host[:port]` of `url`, as signed in the `host` header.
pub fn extract_host(url: &str) -> String {
    let Ok(parsed) = url::Url::parse(url) else {
        return "amazonaws.com".to_string();
    };
    match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => "amazonaws.com".to_string(),
    }
}
