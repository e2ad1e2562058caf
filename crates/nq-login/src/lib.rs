//! # nq-login – bearer tokens for the GraphQL endpoint
//!
//! The OAuth client registration lives in an AWS Secrets Manager secret.
//! Logging in reads that secret and runs the Azure AD client-credentials
//! grant; the caller decides where the token is stored.

pub mod auth;
pub mod error;
pub mod secret;
pub mod service;

pub use auth::AccessToken;
pub use error::{LoginError, LoginResult};
pub use secret::{ApiCredentials, SecretSource};
pub use service::{LoginService, DEFAULT_SECRET_NAME};
