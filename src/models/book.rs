use crate::error::{AppError, Result};
use crate::search::{BookCriteria, QueryBuilder, SearchHit};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use validator::Validate;

/// A catalog entry as stored in the books index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Book {
    /// Document id; not part of the stored source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub title: String,

    pub author_name: String,

    pub price: f64,

    #[serde(default)]
    pub ebook_available: bool,

    /// Serialized as `YYYY-MM-DD`
    pub publish_date: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Book {
    /// Source document sent to the index
    pub fn to_document(&self) -> Result<Value> {
        let mut document = serde_json::to_value(self)?;
        if let Some(fields) = document.as_object_mut() {
            fields.remove("id");
        }
        Ok(document)
    }

    /// Rebuild a book from a search hit, taking the id from the hit
    pub fn from_hit(hit: &SearchHit) -> Result<Self> {
        let mut book: Book = serde_json::from_value(hit.source.clone()).map_err(|e| {
            AppError::MalformedResponse(format!("hit {} is not a book: {}", hit.id, e))
        })?;
        book.id = Some(hit.id.clone());
        Ok(book)
    }
}

/// Payload for adding a book
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewBook {
    #[validate(length(min = 2, max = 150))]
    pub title: String,

    #[validate(length(min = 2, max = 40))]
    pub author_name: String,

    #[validate(range(min = 0.0, max = 10000.0))]
    pub price: f64,

    #[serde(default)]
    pub ebook_available: bool,

    /// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp
    #[serde(deserialize_with = "deserialize_publish_date")]
    pub publish_date: NaiveDate,

    #[validate(length(min = 3, max = 50))]
    #[serde(default)]
    pub username: Option<String>,
}

impl NewBook {
    pub fn into_book(self, id: impl Into<String>) -> Book {
        Book {
            id: Some(id.into()),
            title: self.title,
            author_name: self.author_name,
            price: self.price,
            ebook_available: self.ebook_available,
            publish_date: self.publish_date,
            username: self.username,
        }
    }
}

/// The only partial update exposed for a book
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TitleUpdate {
    #[validate(length(min = 2, max = 150))]
    pub title: String,
}

/// Inclusive price filter; `{0, 0}` means no upper bound
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct PriceRange {
    #[serde(default)]
    pub min: f64,

    #[serde(default)]
    pub max: f64,
}

/// Book search criteria
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookSearch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,

    #[serde(default)]
    pub size: usize,

    #[serde(default)]
    pub from: usize,
}

impl BookSearch {
    pub const MAX_SIZE: usize = 100;

    pub fn validate_request(&self) -> Result<()> {
        if let Some(range) = self.price_range {
            if range.min > range.max {
                return Err(AppError::Validation(format!(
                    "price_range min {} exceeds max {}",
                    range.min, range.max
                )));
            }
        }
        if self.size > Self::MAX_SIZE {
            return Err(AppError::Validation(format!(
                "size must be at most {}",
                Self::MAX_SIZE
            )));
        }
        Ok(())
    }

    /// Builder carrying these criteria
    pub fn to_query(&self) -> QueryBuilder {
        let criteria = BookCriteria {
            title: self.title.clone(),
            author_name: self.author_name.clone(),
            ..Default::default()
        };
        let builder = QueryBuilder::from_criteria(&criteria);
        match self.price_range {
            Some(range) => builder.price_range(range.min, range.max),
            None => builder,
        }
    }
}

fn deserialize_publish_date<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(&raw)
        .map(|timestamp| timestamp.date_naive())
        .map_err(|_| {
            serde::de::Error::custom(format!(
                "publish_date '{}' is neither YYYY-MM-DD nor RFC 3339",
                raw
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_book() -> NewBook {
        serde_json::from_value(json!({
            "title": "Dune",
            "author_name": "Frank Herbert",
            "price": 9.99,
            "ebook_available": true,
            "publish_date": "1965-08-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_publish_date_formats() {
        let book = new_book();
        assert_eq!(book.publish_date, NaiveDate::from_ymd_opt(1965, 8, 1).unwrap());

        let plain: NewBook = serde_json::from_value(json!({
            "title": "Dune",
            "author_name": "Frank Herbert",
            "price": 9.99,
            "publish_date": "1965-08-01"
        }))
        .unwrap();
        assert_eq!(plain.publish_date, book.publish_date);
        assert!(!plain.ebook_available);
    }

    #[test]
    fn test_new_book_validation() {
        assert!(new_book().validate().is_ok());

        let mut short = new_book();
        short.title = "D".to_string();
        assert!(short.validate().is_err());

        let mut pricey = new_book();
        pricey.price = 10_000.5;
        assert!(pricey.validate().is_err());

        let mut user = new_book();
        user.username = Some("ab".to_string());
        assert!(user.validate().is_err());
    }

    #[test]
    fn test_document_omits_id() {
        let book = new_book().into_book("b1");
        let document = book.to_document().unwrap();

        assert!(document.get("id").is_none());
        assert_eq!(document["publish_date"], "1965-08-01");
        assert!(document.get("username").is_none());
    }

    #[test]
    fn test_from_hit() {
        let hit = SearchHit {
            id: "b1".to_string(),
            source: new_book().into_book("ignored").to_document().unwrap(),
        };
        let book = Book::from_hit(&hit).unwrap();
        assert_eq!(book.id.as_deref(), Some("b1"));
        assert_eq!(book.title, "Dune");
    }

    #[test]
    fn test_search_validation() {
        let search = BookSearch {
            price_range: Some(PriceRange { min: 20.0, max: 10.0 }),
            ..Default::default()
        };
        assert!(matches!(search.validate_request(), Err(AppError::Validation(_))));

        let search = BookSearch {
            size: 101,
            ..Default::default()
        };
        assert!(search.validate_request().is_err());
    }

    #[test]
    fn test_search_to_query() {
        let search = BookSearch {
            title: Some("dune".to_string()),
            price_range: Some(PriceRange::default()),
            ..Default::default()
        };
        let query = search.to_query().build();
        assert_eq!(
            query.to_json()["query"]["bool"]["must"],
            json!([
                {"match": {"title": "dune"}},
                {"range": {"price": {"gte": 0.0}}}
            ])
        );
    }
}
