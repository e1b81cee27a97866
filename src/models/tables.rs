//! Flat rows produced by the enrich flow.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One collected item per attached media key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreRow {
    pub id: String,
    pub media_id: Option<String>,
    /// Tag of the rule that collected the item
    pub name: String,
    pub created_at: Option<String>,
    pub lang: Option<String>,
    pub text: Option<String>,
    pub public_metrics_retweet_count: Option<u64>,
    pub public_metrics_reply_count: Option<u64>,
    pub public_metrics_like_count: Option<u64>,
    pub public_metrics_quote_count: Option<u64>,
    pub public_metrics_bookmark_count: Option<u64>,
    pub public_metrics_impression_count: Option<u64>,
    pub hashtags: Vec<String>,
    pub url_titles: Vec<Option<String>>,
    pub url_descriptions: Vec<Option<String>>,
    pub mentions: Vec<String>,
}

impl CoreRow {
    /// Flatten one raw item.
    ///
    /// Items with several media keys yield one row per key; items without
    /// media yield a single row with no `media_id`.
    pub fn from_item(item: &Value, name: &str) -> Vec<CoreRow> {
        let metric = |key: &str| item.pointer(&format!("/public_metrics/{key}")).and_then(Value::as_u64);

        let base = CoreRow {
            id: string_field(item, "id").unwrap_or_default(),
            media_id: None,
            name: name.to_string(),
            created_at: string_field(item, "created_at"),
            lang: string_field(item, "lang"),
            text: string_field(item, "text"),
            public_metrics_retweet_count: metric("retweet_count"),
            public_metrics_reply_count: metric("reply_count"),
            public_metrics_like_count: metric("like_count"),
            public_metrics_quote_count: metric("quote_count"),
            public_metrics_bookmark_count: metric("bookmark_count"),
            public_metrics_impression_count: metric("impression_count"),
            hashtags: entities(item, "hashtags")
                .iter()
                .filter_map(|tag| string_field(tag, "tag"))
                .collect(),
            url_titles: entities(item, "urls")
                .iter()
                .map(|url| string_field(url, "title"))
                .collect(),
            url_descriptions: entities(item, "urls")
                .iter()
                .map(|url| string_field(url, "description"))
                .collect(),
            mentions: entities(item, "mentions")
                .iter()
                .filter_map(|mention| string_field(mention, "username"))
                .collect(),
        };

        let media_keys: Vec<String> = item
            .pointer("/attachments/media_keys")
            .and_then(Value::as_array)
            .map(|keys| keys.iter().filter_map(|k| k.as_str().map(String::from)).collect())
            .unwrap_or_default();

        if media_keys.is_empty() {
            return vec![base];
        }
        media_keys
            .into_iter()
            .map(|key| CoreRow {
                media_id: Some(key),
                ..base.clone()
            })
            .collect()
    }
}

/// One media entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRow {
    pub media_key: Option<String>,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub url: Option<String>,
    pub preview_image_url: Option<String>,
    /// `public_metrics.view_count`, when the endpoint reports it
    pub view_count: Option<u64>,
}

impl MediaRow {
    pub fn from_media(media: &Value) -> Self {
        Self {
            media_key: string_field(media, "media_key"),
            media_type: string_field(media, "type"),
            url: string_field(media, "url"),
            preview_image_url: string_field(media, "preview_image_url"),
            view_count: media
                .pointer("/public_metrics/view_count")
                .and_then(Value::as_u64),
        }
    }
}

fn entities<'a>(item: &'a Value, kind: &str) -> &'a [Value] {
    item.get("entities")
        .and_then(|e| e.get(kind))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_core_row_explodes_media_keys() {
        let item = json!({
            "id": "42",
            "created_at": "2024-01-01T00:00:00.000Z",
            "lang": "en",
            "text": "Bet now #odds @bookie",
            "attachments": {"media_keys": ["3_1", "3_2"]},
            "public_metrics": {
                "retweet_count": 1, "reply_count": 2, "like_count": 3,
                "quote_count": 4, "bookmark_count": 5, "impression_count": 600
            },
            "entities": {
                "hashtags": [{"tag": "odds"}],
                "urls": [{"title": "Promo", "description": "Free bet"}, {"url": "x"}],
                "mentions": [{"username": "bookie"}]
            }
        });

        let rows = CoreRow::from_item(&item, "betway_promotions");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].media_id.as_deref(), Some("3_1"));
        assert_eq!(rows[1].media_id.as_deref(), Some("3_2"));
        assert_eq!(rows[0].name, "betway_promotions");
        assert_eq!(rows[0].public_metrics_impression_count, Some(600));
        assert_eq!(rows[0].hashtags, vec!["odds"]);
        assert_eq!(rows[0].url_titles, vec![Some("Promo".to_string()), None]);
        assert_eq!(rows[0].url_descriptions, vec![Some("Free bet".to_string()), None]);
        assert_eq!(rows[0].mentions, vec!["bookie"]);
    }

    #[test]
    fn test_core_row_without_media_or_entities() {
        let rows = CoreRow::from_item(&json!({"id": "7", "text": "plain"}), "skybet");
        assert_eq!(rows.len(), 1);
        assert!(rows[0].media_id.is_none());
        assert!(rows[0].hashtags.is_empty());
        assert!(rows[0].public_metrics_like_count.is_none());
    }

    #[test]
    fn test_media_row() {
        let row = MediaRow::from_media(&json!({
            "media_key": "3_1",
            "type": "video",
            "preview_image_url": "https://img/1.jpg",
            "public_metrics": {"view_count": 1200}
        }));
        assert_eq!(row.media_key.as_deref(), Some("3_1"));
        assert_eq!(row.media_type.as_deref(), Some("video"));
        assert!(row.url.is_none());
        assert_eq!(row.view_count, Some(1200));
    }
}
