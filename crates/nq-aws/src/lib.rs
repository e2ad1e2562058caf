//! # nq-aws – AWS plumbing for the nq query client
//!
//! Provides just enough of the AWS SDK surface to discover an AppSync
//! endpoint and read a secret: credential resolution, SigV4 request signing
//! and two small service clients.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │  AppSyncClient (appsync.rs)                      │
//! │  SecretsManagerClient (secrets.rs)               │
//! ├──────────────────────────────────────────────────┤
//! │  AwsClient  (client.rs)                          │
//! │  ├── json_request   (Secrets Manager)            │
//! │  └── rest_get       (AppSync control plane)      │
//! ├──────────────────────────────────────────────────┤
//! │  CredentialProvider (credentials.rs, profile.rs) │
//! │  SigV4Signer  (signing.rs)                       │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod config;
pub mod profile;
pub mod credentials;
pub mod signing;
pub mod client;

// Service clients
pub mod appsync;
pub mod secrets;

pub use client::AwsClient;
pub use config::{AwsCredentials, AwsRegion};
pub use credentials::{CredentialProvider, Credentials, DefaultChain, StaticProvider, TokenProvider};
pub use error::{AwsError, AwsResult};
pub use signing::{SigV4Signer, SignedRequest};
