//! Application configuration structures.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Rule;

/// Smallest and largest page size the search endpoint accepts.
pub const MAX_RESULTS_RANGE: std::ops::RangeInclusive<u32> = 5..=100;

/// Accepted cursor recency windows, in days.
pub const RECENCY_WINDOW_DAYS_RANGE: std::ops::RangeInclusive<i64> = 1..=365;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Search endpoint and base query parameters
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Backoff and rate limit settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Incremental collection behavior
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Where raw and processed files live
    #[serde(default)]
    pub storage: StorageConfig,

    /// Query rules, collected in order
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Page size for the given deployment mode.
    pub fn max_results(&self, production: bool) -> u32 {
        if production {
            self.collection.max_results_production
        } else {
            self.collection.max_results_development
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.endpoint.url)?;
        if self.endpoint.timeout_secs == 0 {
            return Err(AppError::validation("endpoint.timeout_secs must be > 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::validation("retry.max_attempts must be > 0"));
        }
        if self.retry.min_backoff_secs > self.retry.max_backoff_secs {
            return Err(AppError::validation(
                "retry.min_backoff_secs must not exceed retry.max_backoff_secs",
            ));
        }
        self.collection.recency_window()?;
        for (name, value) in [
            ("max_results_production", self.collection.max_results_production),
            ("max_results_development", self.collection.max_results_development),
        ] {
            if !MAX_RESULTS_RANGE.contains(&value) {
                return Err(AppError::validation(format!(
                    "collection.{name} must be within {}..={}, got {value}",
                    MAX_RESULTS_RANGE.start(),
                    MAX_RESULTS_RANGE.end()
                )));
            }
        }
        self.validate_rules()
    }

    /// Rule set must be non-empty with unique, well-formed tags.
    fn validate_rules(&self) -> Result<()> {
        if self.rules.is_empty() {
            return Err(AppError::config("No rules defined"));
        }

        let mut seen = HashSet::new();
        for rule in &self.rules {
            rule.validate()?;
            if !seen.insert(rule.tag.as_str()) {
                return Err(AppError::config(format!("Duplicate rule tag '{}'", rule.tag)));
            }
        }
        Ok(())
    }
}

/// Search endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Recent search URL
    #[serde(default = "defaults::endpoint_url")]
    pub url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Base query parameters shared by every rule (fields, expansions)
    #[serde(default = "defaults::query")]
    pub query: BTreeMap<String, String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: defaults::endpoint_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            query: defaults::query(),
        }
    }
}

/// Backoff on transient failures plus the steady-state rate limit delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "defaults::min_backoff")]
    pub min_backoff_secs: u64,

    #[serde(default = "defaults::max_backoff")]
    pub max_backoff_secs: u64,

    /// Total attempts per page before giving up
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Pause after every successful call
    #[serde(default = "defaults::rate_limit_delay")]
    pub rate_limit_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_backoff_secs: defaults::min_backoff(),
            max_backoff_secs: defaults::max_backoff(),
            max_attempts: defaults::max_attempts(),
            rate_limit_delay_secs: defaults::rate_limit_delay(),
        }
    }
}

/// Incremental collection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Cursors whose newest item is older than this are discarded.
    /// 7 for the standard recent search, 30 for the extended deployment.
    #[serde(default = "defaults::recency_window_days")]
    pub recency_window_days: i64,

    #[serde(default = "defaults::max_results_production")]
    pub max_results_production: u32,

    #[serde(default = "defaults::max_results_development")]
    pub max_results_development: u32,

    /// Stop the whole run when a rule's request is rejected
    #[serde(default)]
    pub abort_on_rejection: bool,

    /// Fetch pages past the first one
    #[serde(default = "defaults::follow_pagination")]
    pub follow_pagination: bool,
}

impl CollectionConfig {
    /// The recency window as a duration, rejecting out of range day counts.
    pub fn recency_window(&self) -> Result<chrono::Duration> {
        let days = self.recency_window_days;
        if !RECENCY_WINDOW_DAYS_RANGE.contains(&days) {
            return Err(AppError::validation(format!(
                "collection.recency_window_days must be within {}..={}, got {days}",
                RECENCY_WINDOW_DAYS_RANGE.start(),
                RECENCY_WINDOW_DAYS_RANGE.end()
            )));
        }
        chrono::Duration::try_days(days).ok_or_else(|| {
            AppError::validation(format!("collection.recency_window_days out of range: {days}"))
        })
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            recency_window_days: defaults::recency_window_days(),
            max_results_production: defaults::max_results_production(),
            max_results_development: defaults::max_results_development(),
            abort_on_rejection: false,
            follow_pagination: defaults::follow_pagination(),
        }
    }
}

/// Storage location settings.
///
/// With no `bucket` everything is kept under `local_root` on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub bucket: Option<String>,

    #[serde(default = "defaults::local_root")]
    pub local_root: String,

    /// Raw responses and the cursor document
    #[serde(default = "defaults::raw_folder")]
    pub raw_folder: String,

    /// Enriched tables
    #[serde(default = "defaults::processed_folder")]
    pub processed_folder: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            local_root: defaults::local_root(),
            raw_folder: defaults::raw_folder(),
            processed_folder: defaults::processed_folder(),
        }
    }
}

mod defaults {
    use std::collections::BTreeMap;

    // Endpoint defaults
    pub fn endpoint_url() -> String {
        "https://api.twitter.com/2/tweets/search/recent".into()
    }
    pub fn user_agent() -> String {
        "ads-collector/0.1".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn query() -> BTreeMap<String, String> {
        [
            (
                "tweet.fields",
                "attachments,author_id,created_at,entities,geo,lang,public_metrics",
            ),
            ("expansions", "attachments.media_keys,author_id,geo.place_id"),
            (
                "media.fields",
                "media_key,preview_image_url,public_metrics,type,url",
            ),
            ("user.fields", "id,name,username,verified"),
            ("place.fields", "country,full_name,id"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    // Retry defaults
    pub fn min_backoff() -> u64 {
        5
    }
    pub fn max_backoff() -> u64 {
        60
    }
    pub fn max_attempts() -> u32 {
        20
    }
    pub fn rate_limit_delay() -> u64 {
        5
    }

    // Collection defaults
    pub fn recency_window_days() -> i64 {
        7
    }
    pub fn max_results_production() -> u32 {
        100
    }
    pub fn max_results_development() -> u32 {
        10
    }
    pub fn follow_pagination() -> bool {
        true
    }

    // Storage defaults
    pub fn local_root() -> String {
        "inputs".into()
    }
    pub fn raw_folder() -> String {
        "data/raw/recent_search".into()
    }
    pub fn processed_folder() -> String {
        "data/processed/recent_search".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_rules() -> Config {
        Config {
            rules: vec![
                Rule::new("betway_promotions", "from:betway has:media"),
                Rule::new("skybet", "from:skybet"),
            ],
            ..Config::default()
        }
    }

    #[test]
    fn validate_config_with_rules_ok() {
        assert!(config_with_rules().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_rule_set() {
        let err = Config::default().validate().unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn validate_rejects_duplicate_tags() {
        let mut config = config_with_rules();
        config.rules.push(Rule::new("skybet", "skybet promo"));
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn validate_rejects_out_of_range_page_size() {
        let mut config = config_with_rules();
        config.collection.max_results_production = 500;
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));

        config.collection.max_results_production = 100;
        config.collection.max_results_development = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_backoff_range() {
        let mut config = config_with_rules();
        config.retry.min_backoff_secs = 90;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_bounds_recency_window() {
        let mut config = config_with_rules();
        for days in [0, -3, 366, i64::MAX / 1000] {
            config.collection.recency_window_days = days;
            assert!(matches!(config.validate(), Err(AppError::Validation(_))), "{days}");
            assert!(config.collection.recency_window().is_err());
        }

        config.collection.recency_window_days = 365;
        assert!(config.validate().is_ok());
        assert_eq!(
            config.collection.recency_window().unwrap(),
            chrono::Duration::days(365)
        );
    }

    #[test]
    fn validate_rejects_bad_endpoint_url() {
        let mut config = config_with_rules();
        config.endpoint.url = "not a url".into();
        assert!(matches!(config.validate(), Err(AppError::Url(_))));
    }

    #[test]
    fn parse_partial_toml_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [collection]
            recency_window_days = 30

            [storage]
            bucket = "ads-bucket"

            [[rules]]
            tag = "betway_promotions"
            value = "from:betway"
            "#,
        )
        .unwrap();

        assert_eq!(config.collection.recency_window_days, 30);
        assert_eq!(config.collection.max_results_production, 100);
        assert_eq!(config.retry.min_backoff_secs, 5);
        assert_eq!(config.retry.max_backoff_secs, 60);
        assert_eq!(config.storage.bucket.as_deref(), Some("ads-bucket"));
        assert_eq!(config.storage.local_root, "inputs");
        assert!(config.endpoint.query.contains_key("expansions"));
        assert_eq!(config.rules.len(), 1);
    }

    #[test]
    fn max_results_depends_on_mode() {
        let config = Config::default();
        assert_eq!(config.max_results(true), 100);
        assert_eq!(config.max_results(false), 10);
    }
}
