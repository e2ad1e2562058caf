use crate::app::QueryRunner;
use crate::error::{NqError, NqResult, QueryError};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

pub const DEFAULT_ADDR: &str = ":8080";
pub const REQUEST_BODY_LIMIT: usize = 1 << 20;
const DEFAULT_QUERY_TYPE: &str = "gremlin";

static INDEX_HTML: &str = include_str!("../assets/index.html");

#[derive(Debug, Deserialize)]
struct QueryRequest {
    #[serde(default, rename = "type")]
    query_type: String,
    #[serde(default)]
    query: String,
}

#[derive(Debug, Serialize)]
struct QueryResponse {
    #[serde(rename = "type")]
    query_type: String,
    processed: String,
    #[serde(rename = "rawResponse")]
    raw_response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// REST front end for a [`QueryRunner`].
pub struct QueryServer {
    runner: Arc<dyn QueryRunner>,
}

impl QueryServer {
    pub fn new(runner: Arc<dyn QueryRunner>) -> Self {
        Self { runner }
    }

    pub fn create_router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/", get(index))
            .route("/healthz", get(health_check))
            .route("/queries", post(execute_query))
            .layer(DefaultBodyLimit::max(REQUEST_BODY_LIMIT))
            .with_state(self)
    }

    /// Serve on `addr` until `shutdown` completes. A bare `:port` binds all
    /// interfaces.
    pub async fn start_server<F>(self: Arc<Self>, addr: &str, shutdown: F) -> NqResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = normalize_addr(addr);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| NqError::io(format!("failed to bind {}", addr), e))?;
        log::info!("HTTP server listening on {}", addr);

        axum::serve(listener, self.create_router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| NqError::Server(e.to_string()))?;

        log::info!("HTTP server stopped");
        Ok(())
    }
}

/// Completes on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("received Ctrl+C, shutting down"),
        _ = terminate => log::info!("received SIGTERM, shutting down"),
    }
}

fn normalize_addr(addr: &str) -> String {
    let addr = addr.trim();
    if addr.is_empty() {
        return normalize_addr(DEFAULT_ADDR);
    }
    match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => addr.to_string(),
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_check() -> &'static str {
    "ok"
}

async fn execute_query(State(server): State<Arc<QueryServer>>, body: Bytes) -> Response {
    let req: QueryRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            log::debug!("rejecting query payload: {}", e);
            return (StatusCode::BAD_REQUEST, "invalid JSON payload").into_response();
        }
    };

    let query_type = if req.query_type.trim().is_empty() {
        DEFAULT_QUERY_TYPE.to_string()
    } else {
        req.query_type
    };

    match server.runner.run_query(&req.query, &query_type).await {
        Ok(output) => Json(QueryResponse {
            query_type,
            processed: output.processed,
            raw_response: output.raw,
            error: None,
        })
        .into_response(),
        Err(err) => {
            log::warn!("query failed: {}", err);
            let raw = err.raw_response().unwrap_or_default().to_string();
            // an unparseable body is still shown as the result
            let processed = match &err {
                QueryError::Unwrap(_) => raw.clone(),
                _ => String::new(),
            };
            let resp = QueryResponse {
                query_type,
                processed,
                raw_response: raw,
                error: Some(err.to_string()),
            };
            (StatusCode::BAD_REQUEST, Json(resp)).into_response()
        }
    }
}
