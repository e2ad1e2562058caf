use axum::{
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use nq_aws::{AwsCredentials, AwsRegion, StaticProvider};
use nq_graph::{EndpointSelector, GraphqlExecutor};
use nq_lib::{AppService, AuthMode, QueryError, Settings};
use serde_json::Value;
use std::sync::{Arc, Mutex};

type Bodies = Arc<Mutex<Vec<(HeaderMap, Value)>>>;

/// A GraphQL endpoint that answers every request with `reply`.
async fn graphql_endpoint(status: StatusCode, reply: &'static str) -> (String, Bodies) {
    let bodies: Bodies = Arc::new(Mutex::new(Vec::new()));
    let seen = bodies.clone();
    let app = Router::new().route(
        "/graphql",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push((headers, body));
                (status, reply)
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/graphql", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (url, bodies)
}

fn token_settings(url: &str) -> Settings {
    Settings {
        url: Some(url.to_string()),
        token: Some("test-token".to_string()),
        auth: AuthMode::Token,
        profile: None,
        region: None,
        selector: EndpointSelector::Auto,
    }
}

const COUNT_REPLY: &str = r#"{"data":{"executeQuery":"{\"data\":{\"count\":5}}"}}"#;

#[tokio::test]
async fn count_query_is_unwrapped_end_to_end() {
    let (url, bodies) = graphql_endpoint(StatusCode::OK, COUNT_REPLY).await;
    let app = AppService::connect(&token_settings(&url)).await.unwrap();

    let output = app.execute_query("g.V().count()", "gremlin").await.unwrap();
    assert_eq!(output.processed, "{\n  \"count\": 5\n}");
    assert_eq!(output.raw, COUNT_REPLY);

    let (headers, body) = bodies.lock().unwrap()[0].clone();
    assert_eq!(headers["authorization"], "Bearer test-token");
    assert_eq!(body["variables"]["input"]["query"], "g.V().count()");
    assert_eq!(body["variables"]["input"]["type"], "gremlin");
}

#[tokio::test]
async fn sigv4_requests_carry_aws_headers() {
    let (url, bodies) = graphql_endpoint(StatusCode::OK, COUNT_REPLY).await;
    let executor = GraphqlExecutor::new(
        &url,
        Arc::new(StaticProvider::aws(AwsCredentials::new_temporary(
            "AKIDEXAMPLE",
            "secret",
            "session",
            None,
        ))),
        Some(AwsRegion::new("us-east-2")),
    );
    let app = AppService::new(executor);

    let output = app
        .execute_query("MATCH (n) RETURN count(n)", "cypher")
        .await
        .unwrap();
    assert_eq!(output.processed, "{\n  \"count\": 5\n}");

    let (headers, body) = bodies.lock().unwrap()[0].clone();
    let auth = headers["authorization"].to_str().unwrap();
    assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
    assert!(auth.contains("/us-east-2/appsync/aws4_request"));
    assert_eq!(headers["x-amz-security-token"], "session");
    assert!(headers.contains_key("x-amz-date"));
    assert_eq!(body["variables"]["input"]["type"], "cypher");
}

#[tokio::test]
async fn plain_text_results_are_passed_through() {
    let (url, _) =
        graphql_endpoint(StatusCode::OK, r#"{"data":{"executeQuery":"not json"}}"#).await;
    let app = AppService::connect(&token_settings(&url)).await.unwrap();
    let output = app.execute_query("g.V()", "gremlin").await.unwrap();
    assert_eq!(output.processed, "not json");
}

#[tokio::test]
async fn error_status_keeps_response_body() {
    let (url, _) = graphql_endpoint(
        StatusCode::UNAUTHORIZED,
        r#"{"errors":[{"errorType":"UnauthorizedException"}]}"#,
    )
    .await;
    let app = AppService::connect(&token_settings(&url)).await.unwrap();

    let err = app.execute_query("g.V()", "gremlin").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "neptune query failed: API returned status code 401"
    );
    assert!(err
        .raw_response()
        .unwrap_or_default()
        .contains("UnauthorizedException"));
}

#[tokio::test]
async fn malformed_body_is_reported_with_raw_text() {
    let (url, _) = graphql_endpoint(StatusCode::OK, "<html>gateway error</html>").await;
    let app = AppService::connect(&token_settings(&url)).await.unwrap();

    let err = app.execute_query("g.V()", "gremlin").await.unwrap_err();
    assert!(matches!(err, QueryError::Unwrap(_)));
    assert!(err
        .to_string()
        .starts_with("failed to unmarshal JSON response"));
    assert_eq!(err.raw_response(), Some("<html>gateway error</html>"));
}

#[tokio::test]
async fn query_file_is_read_and_executed() {
    let (url, bodies) = graphql_endpoint(StatusCode::OK, COUNT_REPLY).await;
    let app = AppService::connect(&token_settings(&url)).await.unwrap();

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("count.gremlin");
    std::fs::write(&path, "g.V().count()\n").unwrap();

    let output = app.execute(Some(&path), "gremlin").await.unwrap();
    assert_eq!(output.processed, "{\n  \"count\": 5\n}");
    assert_eq!(
        bodies.lock().unwrap()[0].1["variables"]["input"]["query"],
        "g.V().count()\n"
    );
}
