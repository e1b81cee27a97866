//! Search endpoint responses and the per-rule merged result.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::ItemId;
use crate::models::cursor::created_at_format;

/// Related-entity buckets every merged result carries, even when empty.
pub const ENTITY_CATEGORIES: [&str; 3] = ["users", "places", "media"];

/// Pagination and bounds metadata of one page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub newest_id: Option<ItemId>,

    #[serde(default)]
    pub oldest_id: Option<ItemId>,

    #[serde(default)]
    pub result_count: Option<u64>,

    #[serde(default)]
    pub next_token: Option<String>,
}

/// One decoded page from the search endpoint.
///
/// Items and related entities are kept as raw JSON so the stored output
/// mirrors what the endpoint returned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsePage {
    #[serde(default)]
    pub data: Vec<Value>,

    #[serde(default)]
    pub includes: BTreeMap<String, Vec<Value>>,

    #[serde(default)]
    pub meta: PageMeta,

    /// Partial errors reported next to otherwise successful data
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Value>,
}

impl ResponsePage {
    /// Creation time of the item with the given ID, if it is on this page.
    pub fn created_at_of(&self, id: &ItemId) -> Option<DateTime<Utc>> {
        self.data
            .iter()
            .find(|item| {
                item.get("id")
                    .and_then(|v| serde_json::from_value::<ItemId>(v.clone()).ok())
                    .is_some_and(|item_id| &item_id == id)
            })
            .and_then(|item| item.get("created_at"))
            .and_then(Value::as_str)
            .and_then(created_at_format::parse)
    }
}

/// All pages collected for one rule in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedResult {
    #[serde(default)]
    pub data: Vec<Value>,

    #[serde(default)]
    pub includes: BTreeMap<String, Vec<Value>>,
}

impl MergedResult {
    /// Empty result with the known entity buckets present.
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            includes: ENTITY_CATEGORIES
                .iter()
                .map(|category| (category.to_string(), Vec::new()))
                .collect(),
        }
    }

    /// Append a page in fetch order. Nothing is de-duplicated.
    pub fn merge(&mut self, page: ResponsePage) {
        self.data.extend(page.data);
        for (category, records) in page.includes {
            self.includes.entry(category).or_default().extend(records);
        }
    }

    pub fn bucket(&self, category: &str) -> &[Value] {
        self.includes.get(category).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for MergedResult {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(value: Value) -> ResponsePage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_empty_has_known_buckets() {
        let merged = MergedResult::empty();
        assert!(merged.data.is_empty());
        for category in ENTITY_CATEGORIES {
            assert!(merged.includes.contains_key(category));
        }
        assert_eq!(
            serde_json::to_value(&merged).unwrap(),
            json!({"data": [], "includes": {"media": [], "places": [], "users": []}})
        );
    }

    #[test]
    fn test_merge_keeps_order_and_duplicates() {
        let mut merged = MergedResult::empty();
        merged.merge(page(json!({
            "data": [{"id": "3"}, {"id": "2"}],
            "includes": {"users": [{"id": "u1"}]},
            "meta": {"newest_id": "3", "next_token": "abc"}
        })));
        merged.merge(page(json!({
            "data": [{"id": "2"}, {"id": "1"}],
            "includes": {"users": [{"id": "u1"}], "tweets": [{"id": "9"}]},
            "meta": {"newest_id": "2"}
        })));

        let ids: Vec<_> = merged.data.iter().map(|item| item["id"].clone()).collect();
        assert_eq!(ids, vec![json!("3"), json!("2"), json!("2"), json!("1")]);
        assert_eq!(merged.bucket("users").len(), 2);
        assert_eq!(merged.bucket("tweets").len(), 1);
        assert!(merged.bucket("media").is_empty());
    }

    #[test]
    fn test_page_without_data_or_includes() {
        let empty = page(json!({"meta": {"result_count": 0}}));
        assert!(empty.data.is_empty());
        assert!(empty.meta.newest_id.is_none());
        assert!(empty.meta.next_token.is_none());

        let mut merged = MergedResult::empty();
        merged.merge(empty);
        assert_eq!(merged, MergedResult::empty());
    }

    #[test]
    fn test_created_at_lookup() {
        let first = page(json!({
            "data": [
                {"id": "42", "created_at": "2024-01-01T00:00:00.000Z"},
                {"id": "41", "created_at": "2023-12-31T00:00:00.000Z"}
            ],
            "meta": {"newest_id": "42"}
        }));

        let created = first.created_at_of(&ItemId::from(42)).unwrap();
        assert_eq!(created_at_format::format(&created), "2024-01-01T00:00:00.000Z");
        assert!(first.created_at_of(&ItemId::from("7")).is_none());
    }
}
