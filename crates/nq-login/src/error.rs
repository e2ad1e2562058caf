use nq_aws::AwsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("secret name is required")]
    MissingSecretName,

    #[error("get secret {name:?}: {source}")]
    Secret {
        name: String,
        #[source]
        source: AwsError,
    },

    #[error("secret does not contain SecretString payload")]
    EmptySecretString,

    #[error("parse secret JSON: {0}")]
    ParseSecret(#[source] serde_json::Error),

    #[error("secret missing fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("request token: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token endpoint returned {status}: {body}")]
    TokenEndpoint { status: u16, body: String },

    #[error("decode token response: {0}")]
    DecodeToken(#[source] serde_json::Error),

    #[error("empty access token in response")]
    EmptyAccessToken,
}

pub type LoginResult<T> = Result<T, LoginError>;
