//! In-memory document index (for development and testing)
//!
//! Understands the subset of the query DSL produced by
//! [`QueryBuilder`](crate::search::QueryBuilder): `match_all`, `bool.must`,
//! `term`, `match`, `range`, and the `cardinality` / `value_count` metrics.
//! Responses are shaped like the engine's so the gateway parses them unchanged.

use crate::search::client::{DocumentIndex, IndexResponse, SearchParams};
use crate::search::error::{SearchError, SearchResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
struct StoredDocument {
    source: Value,
    version: u64,
}

type Index = BTreeMap<String, StoredDocument>;

/// In-memory index keyed by index name, then document id
#[derive(Default)]
pub struct InMemoryIndex {
    indices: RwLock<BTreeMap<String, Index>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored source of a document
    pub fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.indices
            .read()
            .get(index)
            .and_then(|docs| docs.get(id))
            .map(|doc| doc.source.clone())
    }

    /// Number of documents in an index
    pub fn len(&self, index: &str) -> usize {
        self.indices.read().get(index).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, index: &str) -> bool {
        self.len(index) == 0
    }

    fn rejected(status: u16, body: impl Into<String>) -> SearchError {
        SearchError::BackendRejected {
            status,
            body: body.into(),
        }
    }

    fn ack(index: &str, id: &str, version: u64, result: &str, status: u16) -> IndexResponse {
        IndexResponse {
            index: index.to_string(),
            id: id.to_string(),
            version: Some(version),
            result: result.to_string(),
            status,
        }
    }
}

fn tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn field_value(id: &str, source: &Value, field: &str) -> Option<Value> {
    if field == "_id" {
        return Some(Value::String(id.to_string()));
    }
    let field = field.strip_suffix(".keyword").unwrap_or(field);
    source.get(field).filter(|v| !v.is_null()).cloned()
}

fn single_entry<'a>(clause: &'a Value, kind: &str) -> SearchResult<(&'a String, &'a Value)> {
    clause
        .as_object()
        .and_then(|obj| obj.iter().next())
        .ok_or_else(|| InMemoryIndex::rejected(400, format!("malformed {} clause", kind)))
}

fn matches(query: &Value, id: &str, source: &Value) -> SearchResult<bool> {
    let Some((kind, clause)) = query.as_object().and_then(|obj| obj.iter().next()) else {
        return Err(InMemoryIndex::rejected(400, "empty query"));
    };

    match kind.as_str() {
        "match_all" => Ok(true),
        "bool" => {
            let must = clause
                .get("must")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for inner in &must {
                if !matches(inner, id, source)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        "term" => {
            let (field, expected) = single_entry(clause, "term")?;
            Ok(field_value(id, source, field).as_ref() == Some(expected))
        }
        "match" => {
            let (field, text) = single_entry(clause, "match")?;
            let wanted = tokens(text.as_str().unwrap_or_default());
            let actual = field_value(id, source, field)
                .and_then(|v| v.as_str().map(tokens))
                .unwrap_or_default();
            Ok(wanted.iter().any(|t| actual.contains(t)))
        }
        "range" => {
            let (field, bounds) = single_entry(clause, "range")?;
            let Some(value) = field_value(id, source, field).and_then(|v| v.as_f64()) else {
                return Ok(false);
            };
            let bound = |key: &str| bounds.get(key).and_then(Value::as_f64);
            Ok(bound("gte").map_or(true, |b| value >= b)
                && bound("gt").map_or(true, |b| value > b)
                && bound("lte").map_or(true, |b| value <= b)
                && bound("lt").map_or(true, |b| value < b))
        }
        other => Err(InMemoryIndex::rejected(
            400,
            format!("unsupported query type [{}]", other),
        )),
    }
}

fn aggregate(spec: &Value, hits: &[(&String, &StoredDocument)]) -> SearchResult<Value> {
    let (kind, params) = single_entry(spec, "aggregation")?;
    let field = params
        .get("field")
        .and_then(Value::as_str)
        .ok_or_else(|| InMemoryIndex::rejected(400, "aggregation without field"))?;

    let values = hits
        .iter()
        .filter_map(|(id, doc)| field_value(id, &doc.source, field));

    let value = match kind.as_str() {
        "cardinality" => values.map(|v| v.to_string()).collect::<BTreeSet<_>>().len(),
        "value_count" => values.count(),
        other => {
            return Err(InMemoryIndex::rejected(
                400,
                format!("unsupported aggregation type [{}]", other),
            ))
        }
    };

    Ok(json!({ "value": value }))
}

#[async_trait]
impl DocumentIndex for InMemoryIndex {
    async fn ping(&self) -> SearchResult<()> {
        Ok(())
    }

    async fn index_exists(&self, index: &str) -> SearchResult<bool> {
        Ok(self.indices.read().contains_key(index))
    }

    async fn create_index(&self, index: &str, _body: &Value) -> SearchResult<()> {
        let mut indices = self.indices.write();
        if indices.contains_key(index) {
            return Err(Self::rejected(
                400,
                format!("resource_already_exists_exception: index [{}]", index),
            ));
        }
        indices.insert(index.to_string(), Index::new());
        Ok(())
    }

    async fn create_document(
        &self,
        index: &str,
        id: &str,
        document: &Value,
    ) -> SearchResult<IndexResponse> {
        let mut indices = self.indices.write();
        let docs = indices.entry(index.to_string()).or_default();

        if docs.contains_key(id) {
            return Err(Self::rejected(
                409,
                format!("version_conflict_engine_exception: [{}]: document already exists", id),
            ));
        }

        docs.insert(
            id.to_string(),
            StoredDocument {
                source: document.clone(),
                version: 1,
            },
        );
        Ok(Self::ack(index, id, 1, "created", 201))
    }

    async fn update_document(
        &self,
        index: &str,
        id: &str,
        patch: &Value,
    ) -> SearchResult<IndexResponse> {
        let mut indices = self.indices.write();
        let doc = indices
            .get_mut(index)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| {
                Self::rejected(404, format!("document_missing_exception: [{}]: document missing", id))
            })?;

        let (Some(target), Some(fields)) = (doc.source.as_object_mut(), patch.as_object()) else {
            return Err(Self::rejected(400, "update requires object documents"));
        };

        let mut changed = false;
        for (key, value) in fields {
            if target.get(key) != Some(value) {
                target.insert(key.clone(), value.clone());
                changed = true;
            }
        }

        if !changed {
            return Ok(Self::ack(index, id, doc.version, "noop", 200));
        }

        doc.version += 1;
        Ok(Self::ack(index, id, doc.version, "updated", 200))
    }

    async fn delete_document(&self, index: &str, id: &str) -> SearchResult<IndexResponse> {
        let mut indices = self.indices.write();
        let removed = indices.get_mut(index).and_then(|docs| docs.remove(id));

        match removed {
            Some(doc) => Ok(Self::ack(index, id, doc.version + 1, "deleted", 200)),
            None => Err(Self::rejected(
                404,
                json!({"_index": index, "_id": id, "result": "not_found"}).to_string(),
            )),
        }
    }

    async fn search(&self, index: &str, body: &Value, params: &SearchParams) -> SearchResult<Value> {
        let indices = self.indices.read();
        let docs = indices.get(index).ok_or_else(|| {
            Self::rejected(404, format!("index_not_found_exception: no such index [{}]", index))
        })?;

        let query = body.get("query").cloned().unwrap_or_else(|| json!({"match_all": {}}));

        let mut matched = Vec::new();
        for (id, doc) in docs {
            if matches(&query, id, &doc.source)? {
                matched.push((id, doc));
            }
        }

        let page: Vec<Value> = matched
            .iter()
            .skip(params.from)
            .take(params.size)
            .map(|(id, doc)| {
                json!({
                    "_index": index,
                    "_id": id,
                    "_score": 1.0,
                    "_source": doc.source,
                })
            })
            .collect();

        let mut response = Map::new();
        response.insert("took".to_string(), json!(0));
        response.insert("timed_out".to_string(), json!(false));
        response.insert(
            "hits".to_string(),
            json!({
                "total": {"value": matched.len(), "relation": "eq"},
                "hits": page,
            }),
        );

        if let Some(aggs) = body.get("aggs").and_then(Value::as_object) {
            let mut results = Map::new();
            for (name, spec) in aggs {
                results.insert(name.clone(), aggregate(spec, &matched)?);
            }
            response.insert("aggregations".to_string(), Value::Object(results));
        }

        Ok(Value::Object(response))
    }
}
