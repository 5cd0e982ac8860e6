//! Read path: executes query documents and parses hits and aggregations

use crate::metrics::{SEARCH_DURATION_SECONDS, SEARCH_REQUESTS_TOTAL};
use crate::search::client::{DocumentIndex, SearchParams};
use crate::search::error::{SearchError, SearchResult};
use crate::search::mapping::IndexMapping;
use crate::search::query::QueryDocument;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// A single search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document id
    pub id: String,

    /// Stored document
    pub source: Value,
}

/// Parsed search response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Hits in backend order
    pub hits: Vec<SearchHit>,

    /// Total matching documents, when reported
    pub total: Option<u64>,

    /// Raw aggregation results keyed by name; empty when none were requested
    pub aggregations: Map<String, Value>,
}

/// Per-call overrides; set fields win over the gateway defaults
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub index: Option<String>,
    pub track_total_hits: Option<bool>,
    pub deadline: Option<Instant>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn with_track_total_hits(mut self, track: bool) -> Self {
        self.track_total_hits = Some(track);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }
}

/// Synchronous read access to the document index
#[derive(Clone)]
pub struct SearchGateway {
    index: Arc<dyn DocumentIndex>,
    default_index: String,
}

impl SearchGateway {
    pub fn new(index: Arc<dyn DocumentIndex>, default_index: impl Into<String>) -> Self {
        Self {
            index,
            default_index: default_index.into(),
        }
    }

    pub fn default_index(&self) -> &str {
        &self.default_index
    }

    /// Run `query`, returning `size` hits starting at offset `from`
    pub async fn search(
        &self,
        query: &QueryDocument,
        size: usize,
        from: usize,
        options: SearchOptions,
    ) -> SearchResult<SearchOutcome> {
        let index = options.index.unwrap_or_else(|| self.default_index.clone());
        let params = SearchParams {
            size,
            from,
            track_total_hits: options.track_total_hits,
        };
        let body = query.to_json();

        let timer = SEARCH_DURATION_SECONDS.start_timer();
        let call = self.index.search(&index, &body, &params);
        let result = match options.deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, call).await {
                Ok(result) => result,
                Err(_) => Err(SearchError::Cancelled(format!(
                    "search on {} exceeded its deadline",
                    index
                ))),
            },
            None => call.await,
        };
        timer.observe_duration();

        let outcome = result.and_then(|raw| Self::parse_response(&raw));
        match &outcome {
            Ok(parsed) => {
                SEARCH_REQUESTS_TOTAL.with_label_values(&["ok"]).inc();
                debug!(index = %index, hits = parsed.hits.len(), "Search executed");
            }
            Err(e) => {
                SEARCH_REQUESTS_TOTAL.with_label_values(&["error"]).inc();
                error!(index = %index, error = %e, "Search failed");
            }
        }

        outcome
    }

    /// Extract hits, total and aggregations from a raw search response
    pub fn parse_response(raw: &Value) -> SearchResult<SearchOutcome> {
        let hits_section = raw.get("hits").ok_or_else(|| {
            SearchError::MalformedResponse("unable to extract hits from response".to_string())
        })?;

        let raw_hits = hits_section
            .get("hits")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                SearchError::MalformedResponse("unable to extract hits from response".to_string())
            })?;

        let hits = raw_hits
            .iter()
            .filter_map(|hit| {
                let id = hit.get("_id").and_then(Value::as_str).unwrap_or_default();
                let Some(source) = hit.get("_source").filter(|s| s.is_object()) else {
                    debug!(id, "Skipping hit without an object _source");
                    return None;
                };
                Some(SearchHit {
                    id: id.to_string(),
                    source: source.clone(),
                })
            })
            .collect();

        let total = hits_section.get("total").and_then(|total| {
            total
                .get("value")
                .and_then(Value::as_u64)
                .or_else(|| total.as_u64())
        });

        let aggregations = match raw.get("aggregations") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(aggs)) => aggs.clone(),
            Some(_) => {
                return Err(SearchError::MalformedResponse(
                    "aggregations section is not an object".to_string(),
                ))
            }
        };

        Ok(SearchOutcome {
            hits,
            total,
            aggregations,
        })
    }

    /// Create every missing index; all mappings are attempted before the first error is returned
    pub async fn ensure_indices(&self, mappings: &[IndexMapping]) -> SearchResult<usize> {
        let mut created = 0;
        let mut first_error = None;

        for mapping in mappings {
            match self.ensure_index(mapping).await {
                Ok(true) => {
                    created += 1;
                    info!(index = %mapping.index, "Index created");
                }
                Ok(false) => info!(index = %mapping.index, "Index already exists"),
                Err(e) => {
                    error!(index = %mapping.index, error = %e, "Failed to initialize index");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(created),
        }
    }

    async fn ensure_index(&self, mapping: &IndexMapping) -> SearchResult<bool> {
        if self.index.index_exists(&mapping.index).await? {
            return Ok(false);
        }
        self.index.create_index(&mapping.index, &mapping.body).await?;
        Ok(true)
    }
}
