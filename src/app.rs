use crate::error::{NqError, NqResult, QueryError};
use crate::settings::{AuthMode, Settings};
use async_trait::async_trait;
use nq_aws::appsync::AppSyncClient;
use nq_aws::{AwsClient, AwsRegion, CredentialProvider, DefaultChain, TokenProvider};
use nq_graph::{unwrap_response, EndpointCache, EndpointResolver, GraphqlExecutor};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

const NO_QUERY_HINT: &str =
    "no query provided. Use 'echo \"query\" | nq', 'nq \"query\"' or 'nq <query_file>'";

/// Result of one query: the unwrapped text and the body it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutput {
    pub processed: String,
    pub raw: String,
}

/// Anything that can run a tagged query; the HTTP server only needs this.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run_query(&self, query: &str, language: &str) -> Result<QueryOutput, QueryError>;
}

pub struct AppService {
    executor: GraphqlExecutor,
}

impl AppService {
    pub fn new(executor: GraphqlExecutor) -> Self {
        Self { executor }
    }

    /// Build the service from resolved settings, discovering the endpoint
    /// when no URL is configured.
    pub async fn connect(settings: &Settings) -> NqResult<Self> {
        let chain: Arc<dyn CredentialProvider> =
            Arc::new(DefaultChain::new(settings.profile.as_deref()));

        let url = match &settings.url {
            Some(url) => url.clone(),
            None => discover_endpoint(settings, chain.clone()).await?,
        };

        let credentials: Arc<dyn CredentialProvider> = match settings.auth {
            AuthMode::Iam => chain,
            AuthMode::Token => Arc::new(TokenProvider::new(
                settings.token.clone().unwrap_or_default(),
            )),
        };

        let executor = GraphqlExecutor::new(url, credentials, settings.aws_region());
        log::debug!(
            "using endpoint {} with {} auth",
            executor.endpoint(),
            settings.auth
        );
        Ok(Self::new(executor))
    }

    pub fn endpoint(&self) -> &str {
        self.executor.endpoint()
    }

    /// Run the query read from `path`, or from stdin when no path is given.
    pub async fn execute(&self, path: Option<&Path>, language: &str) -> NqResult<QueryOutput> {
        let query = read_query(path).await?;
        Ok(self.execute_query(&query, language).await?)
    }

    pub async fn execute_query(
        &self,
        query: &str,
        language: &str,
    ) -> Result<QueryOutput, QueryError> {
        if query.trim().is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        let raw = self.executor.execute(query, language).await?;
        let processed = unwrap_response(&raw)?;
        Ok(QueryOutput { processed, raw })
    }
}

#[async_trait]
impl QueryRunner for AppService {
    async fn run_query(&self, query: &str, language: &str) -> Result<QueryOutput, QueryError> {
        self.execute_query(query, language).await
    }
}

/// Resolve the GraphQL URL through the endpoint cache and the AppSync
/// control plane.
pub async fn discover_endpoint(
    settings: &Settings,
    credentials: Arc<dyn CredentialProvider>,
) -> NqResult<String> {
    let region = settings
        .aws_region()
        .unwrap_or_else(|| AwsRegion::new(""));
    let catalog = AppSyncClient::new(AwsClient::new(credentials, region, None));

    let cache = match EndpointCache::from_environment() {
        Ok(cache) => Some(cache),
        Err(e) => {
            log::warn!("endpoint cache disabled: {}", e);
            None
        }
    };

    let url = EndpointResolver::new(catalog, cache)
        .resolve(
            &settings.selector,
            settings.region_name(),
            settings.profile_name(),
        )
        .await?;
    Ok(url)
}

async fn read_query(path: Option<&Path>) -> NqResult<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| NqError::io(format!("failed to open query file {:?}", path), e)),
        None => {
            if std::io::stdin().is_terminal() {
                return Err(NqError::Input(NO_QUERY_HINT.to_string()));
            }
            let mut query = String::new();
            tokio::io::stdin()
                .read_to_string(&mut query)
                .await
                .map_err(|e| NqError::io("failed to read query content", e))?;
            Ok(query)
        }
    }
}
