//! Error value shared by the AWS clients.
//!
//! Service failures, transport failures and local validation problems all
//! end up as an [`AwsError`] carrying the service's error code.

use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct AwsError {
    /// Short code such as `NotFoundException`, without any namespace.
    pub code: String,
    pub message: String,
    /// HTTP status; 0 when no response arrived.
    pub status_code: u16,
    pub request_id: Option<String>,
    /// Service that produced the error, e.g. `appsync`.
    pub service: String,
}

impl std::error::Error for AwsError {}

impl fmt::Display for AwsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AWS {} error [{}]: {}", self.service, self.code, self.message)?;
        write!(f, " (HTTP {})", self.status_code)?;
        match &self.request_id {
            Some(id) => write!(f, " [RequestId: {}]", id),
            None => Ok(()),
        }
    }
}

/// JSON error document. JSON-protocol services send `__type`, REST-JSON
/// ones may only send the `x-amzn-errortype` header.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type", alias = "code", alias = "Code")]
    code: Option<String>,
    #[serde(alias = "Message", alias = "errorMessage")]
    message: Option<String>,
}

impl AwsError {
    pub fn new(service: &str, code: &str, message: &str, status_code: u16) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status_code,
            request_id: None,
            service: service.into(),
        }
    }

    pub fn credential_error(message: &str) -> Self {
        Self::new("credentials", "CredentialError", message, 401)
    }

    pub fn validation(service: &str, message: &str) -> Self {
        Self::new(service, "ValidationError", message, 400)
    }

    pub fn with_request_id(self, id: String) -> Self {
        Self {
            request_id: Some(id),
            ..self
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code == 404 || self.code == "NotFoundException"
    }

    /// Build an error from a non-2xx response. `header_code` is the value of
    /// `x-amzn-errortype`, used when the body names no code.
    pub fn parse_json_error(
        service: &str,
        status_code: u16,
        body: &str,
        header_code: Option<&str>,
    ) -> Self {
        let header_code = header_code.map(short_code);
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(doc) => {
                let code = doc
                    .code
                    .as_deref()
                    .map(short_code)
                    .or(header_code)
                    .unwrap_or("UnknownError");
                let message = doc.message.as_deref().unwrap_or("Unknown error");
                Self::new(service, code, message, status_code)
            }
            Err(_) => {
                let snippet: String = body.chars().take(200).collect();
                Self::new(
                    service,
                    header_code.unwrap_or("ParseError"),
                    &format!("Failed to parse error response: {}", snippet),
                    status_code,
                )
            }
        }
    }
}

/// `com.amazonaws.appsync#NotFoundException` and
/// `NotFoundException:http://internal...` both become `NotFoundException`.
fn short_code(raw: &str) -> &str {
    let tail = raw.rsplit_once('#').map_or(raw, |(_, t)| t);
    tail.split_once(':').map_or(tail, |(head, _)| head)
}

impl From<reqwest::Error> for AwsError {
    fn from(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() { "Timeout" } else { "HttpError" };
        let status = err.status().map_or(0, |s| s.as_u16());
        Self::new("http", code, &err.to_string(), status)
    }
}

pub type AwsResult<T> = Result<T, AwsError>;
