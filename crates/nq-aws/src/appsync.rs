//! AWS AppSync control-plane client.
//!
//! Only the two read operations needed for endpoint discovery are exposed.
//! The control plane speaks REST-JSON under the `appsync` signing name.
//!
//! Reference: <https://docs.aws.amazon.com/appsync/latest/APIReference/>

use crate::client::AwsClient;
use crate::error::{AwsError, AwsResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const SERVICE: &str = "appsync";

/// Key of the GraphQL endpoint inside [`GraphqlApi::uris`].
pub const GRAPHQL_URI_KEY: &str = "GRAPHQL";

// ── Types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlApi {
    pub api_id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Protocol → endpoint URL (`GRAPHQL`, `REALTIME`).
    #[serde(default)]
    pub uris: Option<HashMap<String, String>>,
    #[serde(default)]
    pub arn: Option<String>,
    #[serde(default)]
    pub authentication_type: Option<String>,
}

impl GraphqlApi {
    /// The non-blank GraphQL endpoint, if the descriptor carries one.
    pub fn graphql_uri(&self) -> Option<&str> {
        self.uris
            .as_ref()?
            .get(GRAPHQL_URI_KEY)
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.api_id)
    }
}

/// One page of `ListGraphqlApis`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlApiPage {
    #[serde(default)]
    pub graphql_apis: Vec<GraphqlApi>,
    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetGraphqlApiResponse {
    graphql_api: Option<GraphqlApi>,
}

// ── Client ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AppSyncClient {
    client: AwsClient,
}

impl AppSyncClient {
    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }

    /// Fetch one page of GraphQL APIs. Pass the previous page's token to continue.
    pub async fn list_graphql_apis(&self, next_token: Option<&str>) -> AwsResult<GraphqlApiPage> {
        let mut query = BTreeMap::new();
        if let Some(token) = next_token.filter(|t| !t.is_empty()) {
            query.insert("nextToken".to_string(), token.to_string());
        }
        let response = self
            .client
            .rest_get(SERVICE, "/v1/apis", &query)
            .await?;
        serde_json::from_str(&response.body)
            .map_err(|e| AwsError::new(SERVICE, "ParseError", &e.to_string(), response.status))
    }

    pub async fn get_graphql_api(&self, api_id: &str) -> AwsResult<GraphqlApi> {
        if api_id.trim().is_empty() {
            return Err(AwsError::validation(SERVICE, "apiId is required"));
        }
        let path = format!("/v1/apis/{}", crate::signing::uri_encode(api_id.trim()));
        let response = self
            .client
            .rest_get(SERVICE, &path, &BTreeMap::new())
            .await?;
        let parsed: GetGraphqlApiResponse = serde_json::from_str(&response.body)
            .map_err(|e| AwsError::new(SERVICE, "ParseError", &e.to_string(), response.status))?;
        parsed.graphql_api.ok_or_else(|| {
            AwsError::new(
                SERVICE,
                "NotFoundException",
                &format!("GraphQL API {} not found.", api_id),
                response.status,
            )
        })
    }
}
