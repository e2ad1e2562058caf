//! # nq – Neptune queries over AWS AppSync
//!
//! Library half of the `nq` binary: settings and `.env` handling, the
//! application service that ties endpoint discovery to query execution,
//! the REST server and the command line.

pub mod app;
pub mod cli;
pub mod env_file;
pub mod error;
pub mod server;
pub mod settings;

pub use app::{AppService, QueryOutput, QueryRunner};
pub use error::{NqError, NqResult, QueryError};
pub use server::QueryServer;
pub use settings::{AuthMode, Overrides, Settings};
