// src/services/cursor_store.rs

//! Load and save the cursor document.

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::CursorStoreMap;
use crate::storage::{self, ObjectStore};

/// File name of the cursor document inside the raw folder.
pub const CURSOR_FILE: &str = "max_tweet_id.json";

/// Cursor document persisted at one key of an [`ObjectStore`].
#[derive(Clone)]
pub struct CursorStore {
    store: Arc<dyn ObjectStore>,
    key: String,
}

impl CursorStore {
    /// Cursor store at `{raw_folder}/max_tweet_id.json`.
    pub fn new(store: Arc<dyn ObjectStore>, raw_folder: &str) -> Self {
        Self {
            store,
            key: storage::join_key(raw_folder, CURSOR_FILE),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn location(&self) -> String {
        self.store.describe(&self.key)
    }

    /// Read the whole document.
    ///
    /// A missing document is the first run and yields an empty map; a
    /// document that does not parse is an error.
    pub async fn load(&self) -> Result<CursorStoreMap> {
        let Some(bytes) = self.store.read_bytes(&self.key).await? else {
            log::info!("No cursor store at {}, starting empty", self.location());
            return Ok(CursorStoreMap::new());
        };

        let cursors = CursorStoreMap::from_slice(&bytes)
            .map_err(|message| AppError::malformed_cursor_store(self.location(), message))?;
        log::info!("Loaded {} cursors from {}", cursors.len(), self.location());
        Ok(cursors)
    }

    /// Overwrite the whole document with `cursors`.
    pub async fn save(&self, cursors: &CursorStoreMap) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(cursors)?;
        self.store.write_bytes(&self.key, &bytes).await?;
        log::debug!("Saved {} cursors to {}", cursors.len(), self.location());
        Ok(())
    }
}
