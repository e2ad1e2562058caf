//! Executes one Neptune query through the AppSync `executeQuery` mutation.

use crate::error::{GraphError, GraphResult};
use crate::signer::{RequestSigner, APPSYNC_SERVICE};
use nq_aws::{AwsRegion, CredentialProvider};
use reqwest::Client;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// The only operation the endpoint exposes.
pub const EXECUTE_QUERY_MUTATION: &str =
    "mutation ($input: NeptuneQuery!) { executeQuery(input: $input) }";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: Variables<'a>,
}

#[derive(Debug, Serialize)]
struct Variables<'a> {
    input: NeptuneQuery<'a>,
}

#[derive(Debug, Serialize)]
struct NeptuneQuery<'a> {
    #[serde(rename = "type")]
    language: &'a str,
    query: &'a str,
}

/// Serialize the request envelope. The returned bytes are both the signing
/// input and the request body.
pub fn encode_envelope(query: &str, language: &str) -> GraphResult<Vec<u8>> {
    let request = GraphqlRequest {
        query: EXECUTE_QUERY_MUTATION,
        variables: Variables {
            input: NeptuneQuery { language, query },
        },
    };
    Ok(serde_json::to_vec(&request)?)
}

#[derive(Clone)]
pub struct GraphqlExecutor {
    http: Client,
    endpoint: String,
    credentials: Arc<dyn CredentialProvider>,
    signer: RequestSigner,
    timeout: Duration,
}

impl std::fmt::Debug for GraphqlExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphqlExecutor")
            .field("endpoint", &self.endpoint)
            .field("signer", &self.signer)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GraphqlExecutor {
    /// Without an explicit region the signing region is read from an
    /// `*.appsync-api.<region>.amazonaws.com` host. Bearer-only setups may
    /// leave both unset.
    pub fn new(
        endpoint: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
        region: Option<AwsRegion>,
    ) -> Self {
        let endpoint = endpoint.into().trim().to_string();
        let region = region.filter(|r| !r.is_empty()).or_else(|| {
            AwsRegion::from_appsync_url(&endpoint)
                .map_err(|e| log::debug!("{}", e))
                .ok()
        });
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http,
            endpoint,
            credentials,
            signer: RequestSigner::new(APPSYNC_SERVICE, region),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn region(&self) -> Option<&AwsRegion> {
        self.signer.region()
    }

    /// Send `query` tagged with its language and return the raw response body.
    pub async fn execute(&self, query: &str, language: &str) -> GraphResult<String> {
        self.execute_cancellable(query, language, std::future::pending::<()>())
            .await
    }

    /// Like [`execute`](Self::execute), abandoning the request as soon as
    /// `cancel` completes.
    pub async fn execute_cancellable<F>(
        &self,
        query: &str,
        language: &str,
        cancel: F,
    ) -> GraphResult<String>
    where
        F: Future<Output = ()>,
    {
        if query.trim().is_empty() {
            return Err(GraphError::EmptyQuery);
        }
        tokio::select! {
            _ = cancel => {
                log::debug!("query to {} cancelled", self.endpoint);
                Err(GraphError::Cancelled)
            }
            result = tokio::time::timeout(self.timeout, self.round_trip(query, language)) => {
                result.map_err(|_| GraphError::Timeout(self.timeout))?
            }
        }
    }

    async fn round_trip(&self, query: &str, language: &str) -> GraphResult<String> {
        let body = encode_envelope(query, language)?;
        let credentials = self
            .credentials
            .retrieve()
            .await
            .map_err(GraphError::Credentials)?;
        let signed = self
            .signer
            .sign("POST", &self.endpoint, &body, &credentials)?;

        let mut req = self.http.post(&signed.url);
        for (key, value) in &signed.headers {
            req = req.header(key.as_str(), value.as_str());
        }
        log::debug!("POST {} ({} bytes, {})", signed.url, signed.body.len(), language);
        let resp = req.body(signed.body).send().await?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;
        if status != 200 {
            log::debug!("endpoint answered {}: {}", status, text);
            return Err(GraphError::Status { status, body: text });
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Bytes,
        http::{HeaderMap, StatusCode, Uri},
        routing::post,
        Router,
    };
    use nq_aws::{AwsCredentials, SigV4Signer, SignedRequest, StaticProvider, TokenProvider};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    type Seen = Arc<Mutex<Vec<SignedRequest>>>;

    async fn endpoint(status: StatusCode, reply: &'static str, delay: Duration) -> (String, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let seen_in = seen.clone();
        let base_in = base.clone();
        let app = Router::new().route(
            "/graphql",
            post(move |uri: Uri, headers: HeaderMap, body: Bytes| {
                let seen = seen_in.clone();
                let base = base_in.clone();
                async move {
                    seen.lock().unwrap().push(SignedRequest {
                        method: "POST".into(),
                        url: format!("{}{}", base, uri),
                        headers: headers
                            .iter()
                            .map(|(k, v)| (k.to_string(), v.to_str().unwrap().to_string()))
                            .collect(),
                        body: body.to_vec(),
                    });
                    tokio::time::sleep(delay).await;
                    (status, reply)
                }
            }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("{}/graphql", base), seen)
    }

    fn iam_executor(url: &str) -> GraphqlExecutor {
        GraphqlExecutor::new(
            url,
            Arc::new(StaticProvider::aws(AwsCredentials::new("AKIDEXAMPLE", "secret"))),
            Some(AwsRegion::new("us-east-2")),
        )
    }

    const OK_BODY: &str = r#"{"data":{"executeQuery":"{\"data\":{\"count\":5}}"}}"#;

    #[test]
    fn envelope_is_exact() {
        let body = encode_envelope("g.V().has('name', \"x\")", "gremlin").unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "query": EXECUTE_QUERY_MUTATION,
                "variables": {"input": {"type": "gremlin", "query": "g.V().has('name', \"x\")"}}
            })
        );
    }

    #[test]
    fn region_is_inferred_from_appsync_host() {
        let exec = GraphqlExecutor::new(
            "https://abc.appsync-api.eu-west-1.amazonaws.com/graphql",
            Arc::new(TokenProvider::new("t")),
            None,
        );
        assert_eq!(exec.region().unwrap().name, "eu-west-1");

        let custom = GraphqlExecutor::new(
            "https://graph.example.com/graphql",
            Arc::new(TokenProvider::new("t")),
            None,
        );
        assert!(custom.region().is_none());
    }

    #[tokio::test]
    async fn signed_request_round_trips_query_and_verifies() {
        let (url, seen) = endpoint(StatusCode::OK, OK_BODY, Duration::ZERO).await;
        let raw = iam_executor(&url)
            .execute("MATCH (n) RETURN count(n)", "cypher")
            .await
            .unwrap();
        assert_eq!(raw, OK_BODY);

        let req = seen.lock().unwrap()[0].clone();
        let body: Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(body["variables"]["input"]["query"], "MATCH (n) RETURN count(n)");
        assert_eq!(body["variables"]["input"]["type"], "cypher");
        assert_eq!(body["query"], EXECUTE_QUERY_MUTATION);

        let verifier = SigV4Signer::new("AKIDEXAMPLE", "secret", None, "us-east-2", "appsync");
        assert!(verifier.verify(&req));

        let mut tampered = req.clone();
        let last = tampered.body.len() - 2;
        tampered.body[last] = b'X';
        assert!(!verifier.verify(&tampered));
    }

    #[tokio::test]
    async fn bearer_mode_sends_token() {
        let (url, seen) = endpoint(StatusCode::OK, OK_BODY, Duration::ZERO).await;
        let exec = GraphqlExecutor::new(&url, Arc::new(TokenProvider::new("abc")), None);
        exec.execute("g.V().count()", "gremlin").await.unwrap();
        let req = seen.lock().unwrap()[0].clone();
        assert_eq!(req.header("authorization"), Some("Bearer abc"));
        assert_eq!(req.header("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn non_200_keeps_status_and_body() {
        let (url, _) = endpoint(
            StatusCode::UNAUTHORIZED,
            r#"{"errors":[{"errorType":"UnauthorizedException"}]}"#,
            Duration::ZERO,
        )
        .await;
        let err = iam_executor(&url).execute("g.V()", "gremlin").await.unwrap_err();
        match err {
            GraphError::Status { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("UnauthorizedException"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn blank_query_fails_before_network() {
        let (url, seen) = endpoint(StatusCode::OK, OK_BODY, Duration::ZERO).await;
        let err = iam_executor(&url).execute(" \n\t", "gremlin").await.unwrap_err();
        assert!(matches!(err, GraphError::EmptyQuery));
        assert_eq!(err.to_string(), "query content is empty");
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn credential_failure_is_reported() {
        let (url, seen) = endpoint(StatusCode::OK, OK_BODY, Duration::ZERO).await;
        let exec = GraphqlExecutor::new(&url, Arc::new(TokenProvider::new("")), None);
        let err = exec.execute("g.V()", "gremlin").await.unwrap_err();
        assert!(matches!(err, GraphError::Credentials(_)));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancellation_aborts_request() {
        let (url, _) = endpoint(StatusCode::OK, OK_BODY, Duration::from_secs(5)).await;
        let err = iam_executor(&url)
            .execute_cancellable(
                "g.V()",
                "gremlin",
                tokio::time::sleep(Duration::from_millis(50)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Cancelled));
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let (url, _) = endpoint(StatusCode::OK, OK_BODY, Duration::from_secs(5)).await;
        let err = iam_executor(&url)
            .with_timeout(Duration::from_millis(100))
            .execute("g.V()", "gremlin")
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Timeout(_)));
    }
}
