// src/models/mod.rs

//! Domain models for the collector.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
pub mod cursor;
mod response;
mod rule;
mod tables;

// Re-export all public types
pub use config::{
    CollectionConfig, Config, EndpointConfig, MAX_RESULTS_RANGE, RECENCY_WINDOW_DAYS_RANGE, RetryConfig, StorageConfig,
};
pub use cursor::{CursorRecord, CursorStoreMap, CursorUpdate, ItemId, RunStamp};
pub use response::{ENTITY_CATEGORIES, MergedResult, PageMeta, ResponsePage};
pub use rule::Rule;
pub use tables::{CoreRow, MediaRow};
