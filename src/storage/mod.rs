//! Storage abstractions for raw responses, cursors and enriched tables.
//!
//! Everything is addressed by a `/`-separated key. Locally a key is a path
//! under the configured root; on S3 it is the object key.
//!
//! ## Layout
//!
//! ```text
//! {raw_folder}/
//! ├── max_tweet_id.json                                # cursor store
//! └── recent_search_{tag}_{YYYY_MM_DD_HH_MM_SS}.json   # one per rule per run
//! {processed_folder}/
//! ├── core_table_{YYYYMMDD}.json
//! ├── media_table_{YYYYMMDD}.json
//! └── all_tweets_{YYYYMMDD}.json
//! ```

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::models::StorageConfig;

// Re-export for convenience
pub use local::LocalStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;

/// Trait for key/value object storage backends.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read an object, `None` if it does not exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Create or overwrite an object.
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Keys of the objects directly under `prefix`, sorted.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Human readable location of a key, for logs.
    fn describe(&self, key: &str) -> String;
}

/// Join a folder and a file name into a key.
pub fn join_key(folder: &str, file_name: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        file_name.to_string()
    } else {
        format!("{folder}/{file_name}")
    }
}

/// Serialize `value` as JSON and store it under `key`.
pub async fn write_json<T: Serialize + ?Sized>(
    store: &dyn ObjectStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    store.write_bytes(key, &bytes).await
}

/// Read and parse a JSON object, `None` if it does not exist.
pub async fn read_json<T: DeserializeOwned>(store: &dyn ObjectStore, key: &str) -> Result<Option<T>> {
    match store.read_bytes(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Pick the backend: S3 when a bucket is configured, the local folder otherwise.
pub async fn open(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    match &config.bucket {
        None => {
            log::info!("Using local storage under {}", config.local_root);
            Ok(Arc::new(LocalStorage::new(&config.local_root)))
        }
        #[cfg(feature = "s3")]
        Some(bucket) => {
            log::info!("Using S3 bucket {}", bucket);
            Ok(Arc::new(S3Storage::from_env(bucket).await))
        }
        #[cfg(not(feature = "s3"))]
        Some(bucket) => Err(crate::error::AppError::config(format!(
            "storage.bucket = '{bucket}' needs the `s3` feature"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_key() {
        assert_eq!(join_key("data/raw", "a.json"), "data/raw/a.json");
        assert_eq!(join_key("data/raw/", "a.json"), "data/raw/a.json");
        assert_eq!(join_key("", "a.json"), "a.json");
    }

    #[tokio::test]
    async fn test_open_local_without_bucket() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = StorageConfig {
            local_root: tmp.path().to_string_lossy().into_owned(),
            ..StorageConfig::default()
        };

        let store = open(&config).await.unwrap();
        write_json(store.as_ref(), "x/y.json", &vec![1, 2]).await.unwrap();
        let back: Option<Vec<i32>> = read_json(store.as_ref(), "x/y.json").await.unwrap();
        assert_eq!(back, Some(vec![1, 2]));
    }
}
