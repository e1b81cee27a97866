// src/pipeline/enrich.rs

//! Flattens raw run output into tables.
//!
//! Reads every `recent_search_{tag}_{stamp}.json` under the raw folder and
//! writes `core_table`, `media_table` and `all_tweets` documents, suffixed
//! with the processing date, to the processed folder.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{Config, CoreRow, MediaRow, MergedResult};
use crate::services::parse_output_file_name;
use crate::storage::{self, ObjectStore};
use crate::utils::log;

/// Files read per development run.
pub const DEVELOPMENT_FILE_LIMIT: usize = 3;

const CONCURRENT_READS: usize = 4;

/// Tables built from a set of raw files.
#[derive(Debug, Clone, Default)]
pub struct EnrichedTables {
    pub core: Vec<CoreRow>,
    pub media: Vec<MediaRow>,
    /// Raw items per rule tag, in file order
    pub all_items: BTreeMap<String, Vec<Value>>,
}

impl EnrichedTables {
    /// Add one rule's merged result.
    pub fn add(&mut self, tag: &str, result: &MergedResult) {
        for item in &result.data {
            self.core.extend(CoreRow::from_item(item, tag));
        }
        self.media
            .extend(result.bucket("media").iter().map(MediaRow::from_media));
        self.all_items
            .entry(tag.to_string())
            .or_default()
            .extend(result.data.iter().cloned());
    }
}

/// Keys written by one enrich run.
#[derive(Debug, Clone)]
pub struct EnrichSummary {
    pub files_read: usize,
    pub core_rows: usize,
    pub media_rows: usize,
    pub core_key: String,
    pub media_key: String,
    pub all_items_key: String,
}

/// Build and store the tables for `date`.
pub async fn run_enrich(
    config: &Config,
    store: Arc<dyn ObjectStore>,
    production: bool,
    date: NaiveDate,
) -> Result<EnrichSummary> {
    log::header("Enriching collected results");
    let raw_folder = &config.storage.raw_folder;

    let mut inputs: Vec<(String, String)> = store
        .list_keys(raw_folder)
        .await?
        .into_iter()
        .filter_map(|key| {
            let file_name = key.rsplit('/').next()?;
            let (tag, _) = parse_output_file_name(file_name)?;
            Some((tag.to_string(), key.clone()))
        })
        .collect();
    if !production {
        inputs.truncate(DEVELOPMENT_FILE_LIMIT);
    }
    if inputs.is_empty() {
        return Err(AppError::validation(format!(
            "No collected files under {}",
            store.describe(raw_folder)
        )));
    }

    log::step(1, 2, &format!("Loading {} files", inputs.len()));
    let results: Vec<(String, MergedResult)> = stream::iter(inputs)
        .map(|(tag, key)| {
            let store = Arc::clone(&store);
            async move {
                let result = storage::read_json::<MergedResult>(store.as_ref(), &key)
                    .await?
                    .ok_or_else(|| AppError::persistence(format!("{key} disappeared while reading")))?;
                Ok::<_, AppError>((tag, result))
            }
        })
        .buffered(CONCURRENT_READS)
        .try_collect()
        .await?;

    let mut tables = EnrichedTables::default();
    for (tag, result) in &results {
        tables.add(tag, result);
    }

    log::step(2, 2, "Writing tables");
    let processed = &config.storage.processed_folder;
    let suffix = date.format("%Y%m%d").to_string();
    let core_key = storage::join_key(processed, &format!("core_table_{suffix}.json"));
    let media_key = storage::join_key(processed, &format!("media_table_{suffix}.json"));
    let all_items_key = storage::join_key(processed, &format!("all_tweets_{suffix}.json"));

    storage::write_json(store.as_ref(), &core_key, &tables.core).await?;
    storage::write_json(store.as_ref(), &media_key, &tables.media).await?;
    storage::write_json(store.as_ref(), &all_items_key, &tables.all_items).await?;

    let summary = EnrichSummary {
        files_read: results.len(),
        core_rows: tables.core.len(),
        media_rows: tables.media.len(),
        core_key,
        media_key,
        all_items_key,
    };
    log::summary(
        "Enrich",
        &[
            ("Files read", summary.files_read.to_string()),
            ("Core rows", summary.core_rows.to_string()),
            ("Media rows", summary.media_rows.to_string()),
            ("Output", store.describe(processed)),
        ],
    );
    Ok(summary)
}
