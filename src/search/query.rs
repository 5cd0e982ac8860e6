//! Search query building
//!
//! [`QueryBuilder`] accumulates optional criteria and materializes an immutable
//! [`QueryDocument`], which serializes to the engine's query DSL. Every clause is
//! conjoined under a `bool.must`; with no clauses the document is `match_all`.

use crate::search::aggregations::{self, AggregationSpec, BOOK_STATS, DISTINCT_AUTHORS, TOTAL_BOOKS};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const ID_FIELD: &str = "_id";
pub const TITLE_FIELD: &str = "title";
pub const AUTHOR_NAME_FIELD: &str = "author_name";
pub const PRICE_FIELD: &str = "price";

/// A single filter clause
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Exact match on a keyword-like field
    Term { field: String, value: String },

    /// Analyzed full-text match
    Match { field: String, text: String },

    /// Numeric range; `None` bounds are open
    Range {
        field: String,
        gte: Option<f64>,
        lte: Option<f64>,
    },
}

impl Clause {
    pub fn field(&self) -> &str {
        match self {
            Clause::Term { field, .. } | Clause::Match { field, .. } | Clause::Range { field, .. } => {
                field
            }
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Clause::Term { field, value } => json!({ "term": { field.as_str(): value } }),
            Clause::Match { field, text } => json!({ "match": { field.as_str(): text } }),
            Clause::Range { field, gte, lte } => {
                let mut bounds = Map::new();
                if let Some(gte) = gte {
                    bounds.insert("gte".to_string(), json!(gte));
                }
                if let Some(lte) = lte {
                    bounds.insert("lte".to_string(), json!(lte));
                }
                json!({ "range": { field.as_str(): Value::Object(bounds) } })
            }
        }
    }
}

/// Price filter with explicit present/absent bounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl PriceBounds {
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// `min <= max` whenever both are present
    pub fn is_valid(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => min <= max,
            _ => true,
        }
    }
}

/// Immutable filter record; absent fields add no clause
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookCriteria {
    pub id: Option<String>,
    pub title: Option<String>,
    pub author_name: Option<String>,
    pub price: Option<PriceBounds>,
}

/// Materialized query: filter clauses plus named aggregations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDocument {
    clauses: Vec<Clause>,
    aggregations: BTreeMap<String, AggregationSpec>,
}

impl QueryDocument {
    pub fn match_all() -> Self {
        Self::default()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn aggregations(&self) -> &BTreeMap<String, AggregationSpec> {
        &self.aggregations
    }

    pub fn is_match_all(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Engine query DSL body
    pub fn to_json(&self) -> Value {
        let query = if self.clauses.is_empty() {
            json!({ "match_all": {} })
        } else {
            let must: Vec<Value> = self.clauses.iter().map(Clause::to_json).collect();
            json!({ "bool": { "must": must } })
        };

        let mut body = Map::new();
        body.insert("query".to_string(), query);

        if !self.aggregations.is_empty() {
            let aggs: Map<String, Value> = self
                .aggregations
                .iter()
                .map(|(name, spec)| (name.clone(), spec.to_json()))
                .collect();
            body.insert("aggs".to_string(), Value::Object(aggs));
        }

        Value::Object(body)
    }
}

impl Serialize for QueryDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Fluent builder for [`QueryDocument`]
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    id: Option<String>,
    title: Option<String>,
    author_name: Option<String>,
    price: Option<PriceBounds>,
    aggregations: BTreeMap<String, AggregationSpec>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an options record
    pub fn from_criteria(criteria: &BookCriteria) -> Self {
        let mut builder = Self::new();
        if let Some(id) = &criteria.id {
            builder = builder.id(id.clone());
        }
        if let Some(title) = &criteria.title {
            builder = builder.title(title.clone());
        }
        if let Some(author_name) = &criteria.author_name {
            builder = builder.author_name(author_name.clone());
        }
        if let Some(price) = criteria.price {
            builder = builder.price_bounds(price);
        }
        builder
    }

    /// Exact match on the document id; empty is a no-op
    pub fn id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !id.is_empty() {
            self.id = Some(id);
        }
        self
    }

    /// Full-text match on the title; empty is a no-op
    pub fn title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        if !title.is_empty() {
            self.title = Some(title);
        }
        self
    }

    /// Full-text match on the author name; empty is a no-op
    pub fn author_name(mut self, author_name: impl Into<String>) -> Self {
        let author_name = author_name.into();
        if !author_name.is_empty() {
            self.author_name = Some(author_name);
        }
        self
    }

    /// Inclusive price range.
    ///
    /// `(0.0, 0.0)` cannot be told apart from "not set" and is read as
    /// `[0, +inf)`. Use [`QueryBuilder::price_bounds`] to express open bounds
    /// without that ambiguity.
    pub fn price_range(mut self, min: f64, max: f64) -> Self {
        self.price = if min == 0.0 && max == 0.0 {
            Some(PriceBounds::at_least(0.0))
        } else {
            Some(PriceBounds::between(min, max))
        };
        self
    }

    /// Price range with explicit open bounds; fully open adds no clause
    pub fn price_bounds(mut self, bounds: PriceBounds) -> Self {
        self.price = if bounds.is_unbounded() {
            None
        } else {
            Some(bounds)
        };
        self
    }

    /// Select a registered aggregation; unknown names are skipped with a warning
    pub fn aggregation(mut self, group: &str, name: &str) -> Self {
        match aggregations::lookup(group, name) {
            Some(spec) => {
                self.aggregations.insert(name.to_string(), spec.clone());
            }
            None => {
                tracing::warn!(group, name, "Unknown aggregation, omitting it from query");
            }
        }
        self
    }

    pub fn distinct_authors(self) -> Self {
        self.aggregation(BOOK_STATS, DISTINCT_AUTHORS)
    }

    pub fn total_books(self) -> Self {
        self.aggregation(BOOK_STATS, TOTAL_BOOKS)
    }

    /// Materialize the accumulated state; has no side effects
    pub fn build(&self) -> QueryDocument {
        let mut clauses = Vec::new();

        if let Some(id) = &self.id {
            clauses.push(Clause::Term {
                field: ID_FIELD.to_string(),
                value: id.clone(),
            });
        }

        if let Some(title) = &self.title {
            clauses.push(Clause::Match {
                field: TITLE_FIELD.to_string(),
                text: title.clone(),
            });
        }

        if let Some(author_name) = &self.author_name {
            clauses.push(Clause::Match {
                field: AUTHOR_NAME_FIELD.to_string(),
                text: author_name.clone(),
            });
        }

        if let Some(price) = self.price {
            clauses.push(Clause::Range {
                field: PRICE_FIELD.to_string(),
                gte: price.min,
                lte: price.max,
            });
        }

        QueryDocument {
            clauses,
            aggregations: self.aggregations.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_builder_is_match_all() {
        let doc = QueryBuilder::new().build();
        assert!(doc.is_match_all());
        assert_eq!(doc.to_json(), json!({"query": {"match_all": {}}}));
    }

    #[test]
    fn test_empty_strings_are_ignored() {
        let doc = QueryBuilder::new().id("").title("").author_name("").build();
        assert!(doc.is_match_all());
    }

    #[test]
    fn test_id_is_single_term_clause() {
        let doc = QueryBuilder::new().id("12345").build();
        assert_eq!(
            doc.to_json(),
            json!({"query": {"bool": {"must": [{"term": {"_id": "12345"}}]}}})
        );
    }

    #[test]
    fn test_zero_zero_price_is_open_ended() {
        let doc = QueryBuilder::new().price_range(0.0, 0.0).build();
        assert_eq!(
            doc.clauses(),
            &[Clause::Range {
                field: PRICE_FIELD.to_string(),
                gte: Some(0.0),
                lte: None,
            }]
        );
        assert_eq!(
            doc.to_json()["query"]["bool"]["must"][0],
            json!({"range": {"price": {"gte": 0.0}}})
        );
    }

    #[test]
    fn test_price_bounds_tri_state() {
        let doc = QueryBuilder::new()
            .price_bounds(PriceBounds {
                min: None,
                max: Some(20.0),
            })
            .build();
        assert_eq!(
            doc.to_json()["query"]["bool"]["must"][0],
            json!({"range": {"price": {"lte": 20.0}}})
        );

        let open = QueryBuilder::new().price_bounds(PriceBounds::default()).build();
        assert!(open.is_match_all());
    }

    #[test]
    fn test_unknown_aggregation_is_omitted() {
        let doc = QueryBuilder::new()
            .aggregation(BOOK_STATS, "does_not_exist")
            .distinct_authors()
            .build();

        assert_eq!(doc.aggregations().len(), 1);
        assert!(doc.aggregations().contains_key(DISTINCT_AUTHORS));
    }

    #[test]
    fn test_build_is_idempotent() {
        let builder = QueryBuilder::new().title("rust").price_range(10.0, 20.0).total_books();
        assert_eq!(builder.build(), builder.build());
    }

    #[test]
    fn test_from_criteria() {
        let criteria = BookCriteria {
            title: Some("dune".to_string()),
            price: Some(PriceBounds::between(1.0, 9.0)),
            ..Default::default()
        };

        let doc = QueryBuilder::from_criteria(&criteria).build();
        assert_eq!(doc.clauses().len(), 2);
        assert_eq!(doc.clauses()[0].field(), TITLE_FIELD);
        assert_eq!(doc.clauses()[1].field(), PRICE_FIELD);
    }

    #[test]
    fn test_price_bounds_validity() {
        assert!(PriceBounds::between(1.0, 2.0).is_valid());
        assert!(!PriceBounds::between(3.0, 2.0).is_valid());
        assert!(PriceBounds::at_least(5.0).is_valid());
    }
}
