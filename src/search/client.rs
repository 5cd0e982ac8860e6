//! Document index abstraction and its Elasticsearch REST implementation

use crate::search::config::SearchConfig;
use crate::search::error::{SearchError, SearchResult};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Write acknowledgement returned by the backend
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexResponse {
    #[serde(rename = "_index", default)]
    pub index: String,

    #[serde(rename = "_id", default)]
    pub id: String,

    #[serde(rename = "_version", default)]
    pub version: Option<u64>,

    /// `created`, `updated`, `deleted`, `noop`
    #[serde(default)]
    pub result: String,

    /// HTTP status of the write call
    #[serde(skip)]
    pub status: u16,
}

/// Pagination and flags sent alongside a search body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    pub size: usize,
    pub from: usize,
    pub track_total_hits: Option<bool>,
}

/// Operations the service needs from a document index
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Check that the backend answers
    async fn ping(&self) -> SearchResult<()>;

    async fn index_exists(&self, index: &str) -> SearchResult<bool>;

    /// Create an index with the given settings/mappings body
    async fn create_index(&self, index: &str, body: &Value) -> SearchResult<()>;

    /// Store a new document; an existing id is a rejection
    async fn create_document(
        &self,
        index: &str,
        id: &str,
        document: &Value,
    ) -> SearchResult<IndexResponse>;

    /// Merge `patch` into an existing document
    async fn update_document(
        &self,
        index: &str,
        id: &str,
        patch: &Value,
    ) -> SearchResult<IndexResponse>;

    /// Remove a document; a missing id is a rejection
    async fn delete_document(&self, index: &str, id: &str) -> SearchResult<IndexResponse>;

    /// Run a search and return the raw response body
    async fn search(&self, index: &str, body: &Value, params: &SearchParams) -> SearchResult<Value>;
}

/// Elasticsearch REST client with transport-level retries
#[derive(Clone)]
pub struct ElasticsearchClient {
    client: Client,
    base_url: Url,
    config: SearchConfig,
}

impl ElasticsearchClient {
    /// Create a new client from configuration
    pub fn new(config: SearchConfig) -> SearchResult<Self> {
        let base_url = Url::parse(&config.url).map_err(|e| {
            SearchError::InvalidConfiguration(format!("invalid search url '{}': {}", config.url, e))
        })?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .pool_idle_timeout(config.pool_idle_timeout())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .tcp_keepalive(config.tcp_keepalive())
            .build()
            .map_err(|e| {
                SearchError::InvalidConfiguration(format!("Failed to create HTTP client: {}", e))
            })?;

        info!(url = %base_url, "Initialized search client");

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn endpoint(&self, segments: &[&str]) -> SearchResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                SearchError::InvalidConfiguration(format!(
                    "search url '{}' cannot be a base",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.config.username {
            Some(user) => builder.basic_auth(user, self.config.password.as_ref()),
            None => builder,
        }
    }

    /// Send a request, retrying on retryable statuses and connection failures
    async fn execute<F>(&self, build: F) -> SearchResult<Response>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0u32;

        loop {
            match build().send().await {
                Ok(response)
                    if self.config.is_retryable(response.status().as_u16())
                        && attempt < self.config.max_retries =>
                {
                    attempt += 1;
                    warn!(
                        status = response.status().as_u16(),
                        attempt,
                        "Retryable status from search backend"
                    );
                }
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(attempt, error = %e, "Search backend connection failed, retrying");
                }
                Err(e) if e.is_timeout() => {
                    return Err(SearchError::BackendUnavailable(format!(
                        "request timed out: {}",
                        e
                    )))
                }
                Err(e) => return Err(SearchError::BackendUnavailable(e.to_string())),
            }

            tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt))).await;
        }
    }

    async fn ensure_success(response: Response) -> SearchResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SearchError::BackendRejected {
            status: status.as_u16(),
            body,
        })
    }

    async fn write_response(response: Response) -> SearchResult<IndexResponse> {
        let response = Self::ensure_success(response).await?;
        let status = response.status().as_u16();
        let mut parsed: IndexResponse = response.json().await?;
        parsed.status = status;
        Ok(parsed)
    }
}

#[async_trait]
impl DocumentIndex for ElasticsearchClient {
    async fn ping(&self) -> SearchResult<()> {
        let url = self.endpoint(&[])?;
        let response = self.execute(|| self.request(Method::GET, url.clone())).await?;
        Self::ensure_success(response).await?;
        debug!("Search backend ping succeeded");
        Ok(())
    }

    async fn index_exists(&self, index: &str) -> SearchResult<bool> {
        let url = self.endpoint(&[index])?;
        let response = self.execute(|| self.request(Method::HEAD, url.clone())).await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(SearchError::BackendRejected {
                status: status.as_u16(),
                body: format!("unexpected status checking index {}", index),
            }),
        }
    }

    async fn create_index(&self, index: &str, body: &Value) -> SearchResult<()> {
        let url = self.endpoint(&[index])?;
        let response = self
            .execute(|| self.request(Method::PUT, url.clone()).json(body))
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn create_document(
        &self,
        index: &str,
        id: &str,
        document: &Value,
    ) -> SearchResult<IndexResponse> {
        let url = self.endpoint(&[index, "_create", id])?;
        let response = self
            .execute(|| self.request(Method::PUT, url.clone()).json(document))
            .await?;
        Self::write_response(response).await
    }

    async fn update_document(
        &self,
        index: &str,
        id: &str,
        patch: &Value,
    ) -> SearchResult<IndexResponse> {
        let url = self.endpoint(&[index, "_update", id])?;
        let body = json!({ "doc": patch });
        let response = self
            .execute(|| self.request(Method::POST, url.clone()).json(&body))
            .await?;
        Self::write_response(response).await
    }

    async fn delete_document(&self, index: &str, id: &str) -> SearchResult<IndexResponse> {
        let url = self.endpoint(&[index, "_doc", id])?;
        let response = self
            .execute(|| self.request(Method::DELETE, url.clone()))
            .await?;
        Self::write_response(response).await
    }

    async fn search(&self, index: &str, body: &Value, params: &SearchParams) -> SearchResult<Value> {
        let mut url = self.endpoint(&[index, "_search"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("size", &params.size.to_string());
            query.append_pair("from", &params.from.to_string());
            if let Some(track) = params.track_total_hits {
                query.append_pair("track_total_hits", &track.to_string());
            }
        }

        let response = self
            .execute(|| self.request(Method::POST, url.clone()).json(body))
            .await?;
        let response = Self::ensure_success(response).await?;

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| SearchError::MalformedResponse(format!("response is not JSON: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = ElasticsearchClient::new(SearchConfig {
            url: "http://localhost:9200/".to_string(),
            ..Default::default()
        })
        .unwrap();

        let url = client.endpoint(&["books", "_doc", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9200/books/_doc/a%20b%2Fc");
    }

    #[test]
    fn test_invalid_url_is_configuration_error() {
        let result = ElasticsearchClient::new(SearchConfig {
            url: "not a url".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(SearchError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_index_response_deserialize() {
        let parsed: IndexResponse = serde_json::from_value(json!({
            "_index": "books",
            "_id": "b1",
            "_version": 1,
            "result": "created",
            "_shards": {"total": 2, "successful": 1, "failed": 0}
        }))
        .unwrap();

        assert_eq!(parsed.id, "b1");
        assert_eq!(parsed.version, Some(1));
        assert_eq!(parsed.result, "created");
    }
}
