// src/services/output.rs

//! Writes one rule's merged result for a run.

use std::sync::Arc;

use crate::error::Result;
use crate::models::{MergedResult, RunStamp};
use crate::storage::{self, ObjectStore};

/// File name prefix of raw run output.
pub const OUTPUT_PREFIX: &str = "recent_search_";

/// `recent_search_{tag}_{stamp}.json`
pub fn output_file_name(tag: &str, stamp: &RunStamp) -> String {
    format!("{OUTPUT_PREFIX}{tag}_{stamp}.json")
}

/// Rule tag and run stamp of a raw output file name.
pub fn parse_output_file_name(file_name: &str) -> Option<(&str, RunStamp)> {
    let stem = file_name
        .strip_prefix(OUTPUT_PREFIX)?
        .strip_suffix(".json")?;
    // The stamp itself is six `_`-separated fields.
    let split = stem.rmatch_indices('_').nth(5)?.0;
    let (tag, stamp) = (&stem[..split], &stem[split + 1..]);
    if tag.is_empty() {
        return None;
    }
    Some((tag, RunStamp::parse(stamp)?))
}

/// Persists merged results under the raw folder.
#[derive(Clone)]
pub struct ResultWriter {
    store: Arc<dyn ObjectStore>,
    raw_folder: String,
}

impl ResultWriter {
    pub fn new(store: Arc<dyn ObjectStore>, raw_folder: impl Into<String>) -> Self {
        Self {
            store,
            raw_folder: raw_folder.into(),
        }
    }

    /// Write `result` and return its key.
    pub async fn write(&self, tag: &str, stamp: &RunStamp, result: &MergedResult) -> Result<String> {
        let key = storage::join_key(&self.raw_folder, &output_file_name(tag, stamp));
        storage::write_json(self.store.as_ref(), &key, result).await?;
        log::info!(
            "Saved {} items for '{}' to {}",
            result.data.len(),
            tag,
            self.store.describe(&key)
        );
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use chrono::{TimeZone, Utc};
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn stamp() -> RunStamp {
        RunStamp::new(Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap())
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name("betway_promotions", &stamp()),
            "recent_search_betway_promotions_2024_03_05_14_07_09.json"
        );
    }

    #[test]
    fn test_parse_output_file_name() {
        let (tag, parsed) =
            parse_output_file_name("recent_search_betway_promotions_2024_03_05_14_07_09.json").unwrap();
        assert_eq!(tag, "betway_promotions");
        assert_eq!(parsed, stamp());

        assert!(parse_output_file_name("max_tweet_id.json").is_none());
        assert!(parse_output_file_name("recent_search_2024_03_05_14_07_09.json").is_none());
        assert!(parse_output_file_name("recent_search_x_not_a_stamp.json").is_none());
    }

    #[tokio::test]
    async fn test_write_merged_result() {
        let tmp = TempDir::new().unwrap();
        let writer = ResultWriter::new(Arc::new(LocalStorage::new(tmp.path())), "raw");

        let mut result = MergedResult::empty();
        result.data.push(json!({"id": "1"}));
        let key = writer.write("skybet", &stamp(), &result).await.unwrap();

        assert_eq!(key, "raw/recent_search_skybet_2024_03_05_14_07_09.json");
        let written: Value =
            serde_json::from_slice(&std::fs::read(tmp.path().join(&key)).unwrap()).unwrap();
        assert_eq!(written["data"][0]["id"], "1");
        assert_eq!(written["includes"]["users"], json!([]));
    }
}
