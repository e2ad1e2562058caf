use nq_aws::AwsError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while resolving an endpoint or executing a query.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Missing or invalid configuration; fatal before any network traffic.
    #[error("{0}")]
    Config(String),

    /// The AppSync control plane could not produce a single usable endpoint.
    #[error("{0}")]
    Discovery(String),

    /// A control-plane call failed.
    #[error("{context}: {source}")]
    Aws {
        context: String,
        #[source]
        source: AwsError,
    },

    #[error("failed to obtain credentials: {0}")]
    Credentials(#[source] AwsError),

    #[error("query content is empty")]
    EmptyQuery,

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    Request(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,

    /// The endpoint answered with something other than 200.
    #[error("API returned status code {status}")]
    Status { status: u16, body: String },
}

impl GraphError {
    pub(crate) fn aws(context: impl Into<String>, source: AwsError) -> Self {
        Self::Aws {
            context: context.into(),
            source,
        }
    }

    /// Response body received from the endpoint, if any.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

pub type GraphResult<T> = Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_keeps_body() {
        let err = GraphError::Status {
            status: 403,
            body: "{\"message\":\"denied\"}".into(),
        };
        assert_eq!(err.to_string(), "API returned status code 403");
        assert_eq!(err.response_body(), Some("{\"message\":\"denied\"}"));
        assert!(GraphError::EmptyQuery.response_body().is_none());
    }

    #[test]
    fn aws_error_has_context() {
        let err = GraphError::aws(
            "list AppSync APIs",
            AwsError::new("appsync", "AccessDeniedException", "nope", 403),
        );
        assert!(err.to_string().starts_with("list AppSync APIs: "));
    }
}
