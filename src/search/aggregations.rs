//! Named aggregation registry and response parsing

use crate::search::error::{SearchError, SearchResult};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Group holding the catalog-wide statistics
pub const BOOK_STATS: &str = "book_stats";

pub const DISTINCT_AUTHORS: &str = "distinct_authors";
pub const TOTAL_BOOKS: &str = "total_books";

/// Metric computed by an aggregation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    Cardinality,
    ValueCount,
}

impl AggregationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationKind::Cardinality => "cardinality",
            AggregationKind::ValueCount => "value_count",
        }
    }
}

/// A single-metric aggregation over one field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregationSpec {
    pub kind: AggregationKind,
    pub field: String,
}

impl AggregationSpec {
    pub fn new(kind: AggregationKind, field: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
        }
    }

    /// Query DSL fragment, e.g. `{"cardinality": {"field": "author_name.keyword"}}`
    pub fn to_json(&self) -> Value {
        json!({ self.kind.as_str(): { "field": self.field } })
    }
}

type Registry = BTreeMap<&'static str, BTreeMap<&'static str, AggregationSpec>>;

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut book_stats = BTreeMap::new();
    book_stats.insert(
        DISTINCT_AUTHORS,
        AggregationSpec::new(AggregationKind::Cardinality, "author_name.keyword"),
    );
    book_stats.insert(
        TOTAL_BOOKS,
        AggregationSpec::new(AggregationKind::ValueCount, "_id"),
    );

    let mut registry = BTreeMap::new();
    registry.insert(BOOK_STATS, book_stats);
    registry
});

/// Look up an aggregation by `(group, name)`
pub fn lookup(group: &str, name: &str) -> Option<&'static AggregationSpec> {
    REGISTRY.get(group).and_then(|specs| specs.get(name))
}

/// All aggregation names registered under `group`
pub fn group_names(group: &str) -> Option<Vec<&'static str>> {
    REGISTRY
        .get(group)
        .map(|specs| specs.keys().copied().collect())
}

/// Extract the integer value of every aggregation of `group` present in `aggregations`.
///
/// Aggregations of the group that are absent from the response are skipped; an
/// aggregation that is present but has no numeric `value` is an error.
pub fn parse_aggregations(
    aggregations: &Map<String, Value>,
    group: &str,
) -> SearchResult<BTreeMap<String, i64>> {
    let mut result = BTreeMap::new();

    let Some(names) = group_names(group) else {
        tracing::warn!(group, "Unknown aggregation group");
        return Ok(result);
    };

    for name in names {
        let Some(raw) = aggregations.get(name) else {
            continue;
        };

        let value = raw
            .get("value")
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                SearchError::MalformedResponse(format!("invalid format for aggregation {}", name))
            })?;

        result.insert(name.to_string(), value as i64);
    }

    Ok(result)
}
