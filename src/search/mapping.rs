//! Index mappings created at startup

use serde_json::{json, Value};

/// An index and the body used to create it
#[derive(Debug, Clone)]
pub struct IndexMapping {
    pub index: String,
    pub body: Value,
}

/// Field mapping of the books index
pub fn books_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "title": { "type": "text" },
                "author_name": {
                    "type": "text",
                    "fields": {
                        "keyword": { "type": "keyword", "ignore_above": 256 }
                    }
                },
                "price": { "type": "float" },
                "ebook_available": { "type": "boolean", "null_value": false },
                "publish_date": { "type": "date", "format": "yyyy-MM-dd" },
                "username": { "type": "keyword" }
            }
        }
    })
}

/// Every index the service needs, keyed by the configured books index name
pub fn index_mappings(books_index: &str) -> Vec<IndexMapping> {
    vec![IndexMapping {
        index: books_index.to_string(),
        body: books_mapping(),
    }]
}
