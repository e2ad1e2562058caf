//! # nq-graph – endpoint resolution and query execution
//!
//! ```text
//! EndpointResolver ──► URL ──► GraphqlExecutor ──► RequestSigner ──► HTTP
//!       │                              │
//!  EndpointCache                raw body ──► unwrap_response ──► text
//! ```
//!
//! Discovery runs once per process for a (profile, region) pair; the
//! executor and unwrapper run once per query.

pub mod cache;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod signer;
pub mod unwrap;

pub use cache::{cache_key, CacheEntry, CacheError, CacheFile, EndpointCache};
pub use discovery::{ApiCatalog, EndpointResolver, EndpointSelector};
pub use error::{GraphError, GraphResult};
pub use executor::GraphqlExecutor;
pub use signer::RequestSigner;
pub use unwrap::{unwrap_response, UnwrapError};
