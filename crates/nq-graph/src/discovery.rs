//! AppSync endpoint discovery.
//!
//! Resolution order: local cache, then the control plane. A cached URL is
//! trusted until it is invalidated by hand (`nq cache clear`).

use crate::cache::{cache_key, CacheEntry, EndpointCache};
use crate::error::{GraphError, GraphResult};
use async_trait::async_trait;
use chrono::Utc;
use nq_aws::appsync::{AppSyncClient, GraphqlApi, GraphqlApiPage};
use nq_aws::AwsResult;

/// Which AppSync API to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointSelector {
    ById(String),
    ByName(String),
    /// The account/region must contain exactly one API.
    Auto,
}

impl EndpointSelector {
    /// An ID wins over a name; blank values are ignored.
    pub fn from_options(api_id: Option<&str>, api_name: Option<&str>) -> Self {
        fn clean(v: Option<&str>) -> Option<String> {
            v.map(str::trim).filter(|v| !v.is_empty()).map(String::from)
        }
        match (clean(api_id), clean(api_name)) {
            (Some(id), _) => Self::ById(id),
            (None, Some(name)) => Self::ByName(name),
            (None, None) => Self::Auto,
        }
    }
}

/// Read access to the GraphQL API inventory of one account and region.
#[async_trait]
pub trait ApiCatalog: Send + Sync {
    async fn list_page(&self, next_token: Option<&str>) -> AwsResult<GraphqlApiPage>;
    async fn get_api(&self, api_id: &str) -> AwsResult<GraphqlApi>;
}

#[async_trait]
impl ApiCatalog for AppSyncClient {
    async fn list_page(&self, next_token: Option<&str>) -> AwsResult<GraphqlApiPage> {
        self.list_graphql_apis(next_token).await
    }

    async fn get_api(&self, api_id: &str) -> AwsResult<GraphqlApi> {
        self.get_graphql_api(api_id).await
    }
}

pub struct EndpointResolver<C> {
    catalog: C,
    cache: Option<EndpointCache>,
}

impl<C: ApiCatalog> EndpointResolver<C> {
    pub fn new(catalog: C, cache: Option<EndpointCache>) -> Self {
        Self { catalog, cache }
    }

    /// Resolve the GraphQL endpoint URL for `profile` in `region`.
    pub async fn resolve(
        &self,
        selector: &EndpointSelector,
        region: &str,
        profile: &str,
    ) -> GraphResult<String> {
        if region.trim().is_empty() {
            return Err(GraphError::Config(
                "AWS region is required to discover the AppSync endpoint".to_string(),
            ));
        }

        let key = cache_key(profile, region);
        if let Some(url) = self.cache.as_ref().and_then(|c| c.lookup(&key)) {
            log::debug!("endpoint cache hit for {}: {}", key, url);
            return Ok(url);
        }

        let selected = match selector {
            EndpointSelector::ById(id) => self.fetch_by_id(id).await?,
            EndpointSelector::ByName(name) => self.fetch_by_name(name).await?,
            EndpointSelector::Auto => self.fetch_single().await?,
        };
        let url = self.graphql_url(&selected).await?;
        log::debug!(
            "discovered AppSync API {} ({}) at {}",
            selected.display_name(),
            selected.api_id,
            url
        );

        if let Some(cache) = &self.cache {
            let entry = CacheEntry {
                url: url.clone(),
                api_name: selected.name.clone(),
                api_id: Some(selected.api_id.clone()).filter(|id| !id.is_empty()),
                region: region.trim().to_string(),
                profile: profile.trim().to_string(),
                fetched_at: Utc::now(),
            };
            if let Err(e) = cache.write(&key, entry) {
                log::warn!(
                    "failed to update endpoint cache {}: {}",
                    cache.path().display(),
                    e
                );
            }
        }
        Ok(url)
    }

    async fn fetch_by_id(&self, api_id: &str) -> GraphResult<GraphqlApi> {
        self.catalog.get_api(api_id).await.map_err(|e| {
            if e.is_not_found() {
                GraphError::Discovery(format!("AppSync API {:?} not found", api_id))
            } else {
                GraphError::aws(format!("get AppSync API {:?}", api_id), e)
            }
        })
    }

    async fn fetch_by_name(&self, api_name: &str) -> GraphResult<GraphqlApi> {
        let mut matches: Vec<GraphqlApi> = self
            .list_all()
            .await?
            .into_iter()
            .filter(|api| api.name.as_deref() == Some(api_name))
            .collect();

        match matches.len() {
            0 => Err(GraphError::Discovery(format!(
                "no AppSync API named {:?} found",
                api_name
            ))),
            1 => Ok(matches.remove(0)),
            _ => Err(GraphError::Discovery(format!(
                "multiple AppSync APIs named {:?} found; use NEPTUNE_APPSYNC_API_ID instead",
                api_name
            ))),
        }
    }

    async fn fetch_single(&self) -> GraphResult<GraphqlApi> {
        let mut apis = self.list_all().await?;
        match apis.len() {
            0 => Err(GraphError::Discovery(
                "no AppSync APIs found for the current AWS account and region".to_string(),
            )),
            1 => Ok(apis.remove(0)),
            _ => {
                let names: Vec<&str> = apis.iter().map(GraphqlApi::display_name).collect();
                Err(GraphError::Discovery(format!(
                    "multiple AppSync APIs found ({}); set NEPTUNE_APPSYNC_API_NAME or NEPTUNE_APPSYNC_API_ID",
                    names.join(", ")
                )))
            }
        }
    }

    /// Every page is fetched before any filtering happens.
    async fn list_all(&self) -> GraphResult<Vec<GraphqlApi>> {
        let mut apis = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .catalog
                .list_page(token.as_deref())
                .await
                .map_err(|e| GraphError::aws("list AppSync APIs", e))?;
            apis.extend(page.graphql_apis);
            match page.next_token.filter(|t| !t.is_empty()) {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(apis)
    }

    async fn graphql_url(&self, api: &GraphqlApi) -> GraphResult<String> {
        if let Some(url) = api.graphql_uri() {
            return Ok(url.to_string());
        }
        if api.api_id.trim().is_empty() {
            return Err(GraphError::Discovery(
                "selected AppSync API is missing an ID".to_string(),
            ));
        }

        // List results may omit uris; the single-item fetch carries them.
        let refreshed = self.fetch_by_id(&api.api_id).await?;
        refreshed
            .graphql_uri()
            .map(str::to_string)
            .ok_or_else(|| {
                GraphError::Discovery(format!(
                    "AppSync API {:?} is missing a GraphQL URL",
                    api.api_id
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nq_aws::AwsError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn api(id: &str, name: &str, url: Option<&str>) -> GraphqlApi {
        GraphqlApi {
            api_id: id.to_string(),
            name: Some(name.to_string()),
            uris: url.map(|u| {
                let mut m = HashMap::new();
                m.insert("GRAPHQL".to_string(), u.to_string());
                m
            }),
            ..Default::default()
        }
    }

    /// Paginated in-memory catalog; page N is addressed by token "N".
    #[derive(Default)]
    struct StubCatalog {
        pages: Vec<Vec<GraphqlApi>>,
        by_id: HashMap<String, GraphqlApi>,
        list_calls: AtomicUsize,
        get_calls: AtomicUsize,
    }

    impl StubCatalog {
        fn with_pages(pages: Vec<Vec<GraphqlApi>>) -> Self {
            Self {
                pages,
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst) + self.get_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ApiCatalog for StubCatalog {
        async fn list_page(&self, next_token: Option<&str>) -> AwsResult<GraphqlApiPage> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            let index: usize = next_token.map(|t| t.parse().unwrap()).unwrap_or(0);
            let next_token = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
            Ok(GraphqlApiPage {
                graphql_apis: self.pages.get(index).cloned().unwrap_or_default(),
                next_token,
            })
        }

        async fn get_api(&self, api_id: &str) -> AwsResult<GraphqlApi> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            self.by_id.get(api_id).cloned().ok_or_else(|| {
                AwsError::new("appsync", "NotFoundException", "GraphQL API not found.", 404)
            })
        }
    }

    fn temp_cache() -> (TempDir, EndpointCache) {
        let dir = TempDir::new().unwrap();
        let cache = EndpointCache::with_path(dir.path().join("appsync_cache.json"));
        (dir, cache)
    }

    #[tokio::test]
    async fn empty_region_is_config_error() {
        let resolver = EndpointResolver::new(StubCatalog::default(), None);
        let err = resolver
            .resolve(&EndpointSelector::Auto, "", "dsoadev")
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Config(_)));
        assert_eq!(
            err.to_string(),
            "AWS region is required to discover the AppSync endpoint"
        );
        assert_eq!(resolver.catalog.calls(), 0);
    }

    #[tokio::test]
    async fn auto_single_api_is_selected_and_cached() {
        let (_dir, cache) = temp_cache();
        let catalog = StubCatalog::with_pages(vec![vec![api("a1", "neptune", Some("https://a1/graphql"))]]);
        let resolver = EndpointResolver::new(catalog, Some(cache.clone()));

        let url = resolver
            .resolve(&EndpointSelector::Auto, "us-east-2", "dsoadev")
            .await
            .unwrap();
        assert_eq!(url, "https://a1/graphql");

        let file = cache.read();
        let entry = &file.entries["dsoadev|us-east-2"];
        assert_eq!(entry.api_id.as_deref(), Some("a1"));
        assert_eq!(entry.api_name.as_deref(), Some("neptune"));
        assert_eq!(entry.region, "us-east-2");
    }

    #[tokio::test]
    async fn cache_hit_skips_network() {
        let (_dir, cache) = temp_cache();
        cache
            .write(
                "default|us-east-2",
                CacheEntry {
                    url: "https://cached/graphql".into(),
                    api_name: None,
                    api_id: None,
                    region: "us-east-2".into(),
                    profile: String::new(),
                    fetched_at: Utc::now(),
                },
            )
            .unwrap();
        let resolver = EndpointResolver::new(StubCatalog::default(), Some(cache));
        let url = resolver
            .resolve(&EndpointSelector::ByName("x".into()), "us-east-2", "")
            .await
            .unwrap();
        assert_eq!(url, "https://cached/graphql");
        assert_eq!(resolver.catalog.calls(), 0);
    }

    #[tokio::test]
    async fn auto_with_no_apis() {
        let resolver = EndpointResolver::new(StubCatalog::with_pages(vec![vec![]]), None);
        let err = resolver
            .resolve(&EndpointSelector::Auto, "us-east-2", "")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "no AppSync APIs found for the current AWS account and region"
        );
    }

    #[tokio::test]
    async fn auto_with_many_apis_lists_every_page() {
        let catalog = StubCatalog::with_pages(vec![
            vec![api("a1", "alpha", Some("https://a1"))],
            vec![api("b2", "beta", Some("https://b2"))],
        ]);
        let resolver = EndpointResolver::new(catalog, None);
        let err = resolver
            .resolve(&EndpointSelector::Auto, "us-east-2", "")
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("multiple AppSync APIs found (alpha, beta)"));
        assert!(msg.contains("NEPTUNE_APPSYNC_API_NAME"));
        assert!(msg.contains("NEPTUNE_APPSYNC_API_ID"));
        assert_eq!(resolver.catalog.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn by_name_matches_on_a_later_page() {
        let catalog = StubCatalog::with_pages(vec![
            vec![api("a1", "alpha", Some("https://a1"))],
            vec![],
            vec![api("c3", "neptune", Some("https://c3/graphql"))],
        ]);
        let resolver = EndpointResolver::new(catalog, None);
        let url = resolver
            .resolve(&EndpointSelector::ByName("neptune".into()), "us-east-2", "")
            .await
            .unwrap();
        assert_eq!(url, "https://c3/graphql");
    }

    #[tokio::test]
    async fn by_name_missing_or_ambiguous() {
        let catalog = StubCatalog::with_pages(vec![vec![
            api("a1", "dup", Some("https://a1")),
            api("a2", "dup", Some("https://a2")),
        ]]);
        let resolver = EndpointResolver::new(catalog, None);

        let err = resolver
            .resolve(&EndpointSelector::ByName("nope".into()), "us-east-2", "")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no AppSync API named \"nope\" found");

        let err = resolver
            .resolve(&EndpointSelector::ByName("dup".into()), "us-east-2", "")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("use NEPTUNE_APPSYNC_API_ID instead"));
    }

    #[tokio::test]
    async fn by_id_not_found_names_the_id() {
        let resolver = EndpointResolver::new(StubCatalog::default(), None);
        let err = resolver
            .resolve(&EndpointSelector::ById("zzz".into()), "us-east-2", "")
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Discovery(_)));
        assert!(err.to_string().contains("\"zzz\""));
    }

    #[tokio::test]
    async fn missing_uri_triggers_one_refetch() {
        let mut catalog = StubCatalog::with_pages(vec![vec![api("a1", "neptune", None)]]);
        catalog
            .by_id
            .insert("a1".into(), api("a1", "neptune", Some("https://a1/graphql")));
        let resolver = EndpointResolver::new(catalog, None);
        let url = resolver
            .resolve(&EndpointSelector::Auto, "us-east-2", "")
            .await
            .unwrap();
        assert_eq!(url, "https://a1/graphql");
        assert_eq!(resolver.catalog.get_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_uri_after_refetch_is_an_error() {
        let mut catalog = StubCatalog::with_pages(vec![vec![api("a1", "neptune", None)]]);
        catalog.by_id.insert("a1".into(), api("a1", "neptune", None));
        let resolver = EndpointResolver::new(catalog, None);
        let err = resolver
            .resolve(&EndpointSelector::Auto, "us-east-2", "")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "AppSync API \"a1\" is missing a GraphQL URL");
    }

    #[tokio::test]
    async fn cache_write_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();
        let cache = EndpointCache::with_path(blocker.join("appsync_cache.json"));

        let catalog = StubCatalog::with_pages(vec![vec![api("a1", "n", Some("https://a1"))]]);
        let resolver = EndpointResolver::new(catalog, Some(cache));
        let url = resolver
            .resolve(&EndpointSelector::Auto, "us-east-2", "")
            .await
            .unwrap();
        assert_eq!(url, "https://a1");
    }

    #[test]
    fn selector_precedence() {
        assert_eq!(
            EndpointSelector::from_options(Some("id"), Some("name")),
            EndpointSelector::ById("id".into())
        );
        assert_eq!(
            EndpointSelector::from_options(Some("  "), Some("name")),
            EndpointSelector::ByName("name".into())
        );
        assert_eq!(EndpointSelector::from_options(None, None), EndpointSelector::Auto);
    }
}
