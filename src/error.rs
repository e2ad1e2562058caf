use nq_aws::AwsError;
use nq_graph::{CacheError, GraphError, UnwrapError};
use nq_login::LoginError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error for the command line and server.
#[derive(Debug, Error)]
pub enum NqError {
    #[error("env file {0:?} not found")]
    EnvFileNotFound(PathBuf),

    #[error("env file {0:?} is a directory")]
    EnvFileIsDirectory(PathBuf),

    #[error("failed to load env file {path:?}: {source}")]
    EnvFileLoad {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("env key cannot be empty")]
    EmptyEnvKey,

    #[error("cannot resolve home directory")]
    NoHomeDirectory,

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("write env file {path:?}: {source}")]
    PersistEnvFile {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },

    /// Invalid settings detected before any network traffic.
    #[error("{0}")]
    Config(String),

    /// Nothing to run: no argument and stdin is a terminal.
    #[error("{0}")]
    Input(String),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Login(#[from] LoginError),

    #[error(transparent)]
    Aws(#[from] AwsError),

    #[error("endpoint cache: {0}")]
    Cache(#[from] CacheError),

    #[error("server error: {0}")]
    Server(String),

    #[error("interrupted")]
    Interrupted,
}

impl NqError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Failure of a single query. Carries the endpoint's response body when one
/// was received so callers can still show it.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query content is empty")]
    EmptyQuery,

    #[error("neptune query failed: {0}")]
    Execute(#[source] GraphError),

    #[error(transparent)]
    Unwrap(#[from] UnwrapError),
}

impl QueryError {
    /// Raw response body, if the endpoint answered.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::EmptyQuery => None,
            Self::Execute(e) => e.response_body(),
            Self::Unwrap(e) => Some(&e.raw),
        }
    }
}

impl From<GraphError> for QueryError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::EmptyQuery => Self::EmptyQuery,
            other => Self::Execute(other),
        }
    }
}

pub type NqResult<T> = Result<T, NqError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_keep_the_body() {
        let err = QueryError::from(GraphError::Status {
            status: 403,
            body: r#"{"errors":[{"message":"denied"}]}"#.into(),
        });
        assert_eq!(
            err.to_string(),
            "neptune query failed: API returned status code 403"
        );
        assert!(err.raw_response().unwrap_or_default().contains("denied"));
    }

    #[test]
    fn empty_query_maps_to_its_own_variant() {
        let err = QueryError::from(GraphError::EmptyQuery);
        assert!(matches!(err, QueryError::EmptyQuery));
        assert!(err.raw_response().is_none());
    }
}
