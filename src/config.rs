// src/config.rs

//! Configuration loading utilities.
//!
//! Loads `config.toml` from disk or object storage, applies environment
//! overrides for the Lambda deployment and reads the bearer token.

use std::env;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::storage::{self, ObjectStore};

/// Environment variable holding the endpoint bearer token.
pub const BEARER_TOKEN_VAR: &str = "BEARER_TOKEN";

/// Bearer token for the search endpoint.
#[derive(Clone)]
pub struct Credentials {
    bearer_token: String,
}

impl Credentials {
    pub fn new(bearer_token: impl Into<String>) -> Self {
        Self {
            bearer_token: bearer_token.into(),
        }
    }

    /// Read `BEARER_TOKEN`, loading a `.env` file first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_value(env::var(BEARER_TOKEN_VAR).ok())
    }

    /// Missing or blank tokens are a configuration error.
    pub fn from_value(value: Option<String>) -> Result<Self> {
        match value {
            Some(token) if !token.trim().is_empty() => Ok(Self::new(token.trim())),
            _ => Err(AppError::config(format!("{BEARER_TOKEN_VAR} must be set"))),
        }
    }

    pub fn bearer_token(&self) -> &str {
        &self.bearer_token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("bearer_token", &"<redacted>")
            .finish()
    }
}

/// Config loader for the Lambda environment.
///
/// Reads `{prefix}/config.toml` from the deployment bucket.
pub struct LambdaConfigLoader {
    storage: Arc<dyn ObjectStore>,
    prefix: String,
}

impl LambdaConfigLoader {
    pub fn new(storage: Arc<dyn ObjectStore>, config_prefix: &str) -> Self {
        Self {
            storage,
            prefix: config_prefix.to_string(),
        }
    }

    /// Load the stored config, `None` if the bucket has none.
    pub async fn load_config(&self) -> Result<Option<Config>> {
        let key = storage::join_key(&self.prefix, "config.toml");
        log::info!("Loading config file from {}", self.storage.describe(&key));
        let Some(bytes) = self.storage.read_bytes(&key).await? else {
            return Ok(None);
        };

        let s = String::from_utf8(bytes).map_err(|e| {
            AppError::Config(format!("Config file {} is not valid UTF-8: {}", key, e))
        })?;
        Config::from_toml(&s).map(Some)
    }

    /// Load the stored config; a missing file is a configuration error.
    ///
    /// Lambda runs have no local rule set to fall back to.
    pub async fn require_config(&self) -> Result<Config> {
        self.load_config().await?.ok_or_else(|| {
            AppError::config(format!(
                "No config.toml under {}; Lambda runs need a stored rule set",
                self.storage.describe(&self.prefix)
            ))
        })
    }
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist; a file that exists but
/// does not parse is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        log::warn!("No config at {path:?}, using default configuration");
        return Ok(Config::default());
    }
    Config::load(path)
        .map_err(|e| AppError::config(format!("Failed to load config from {path:?}: {e}")))
}

/// Apply `S3_BUCKET`, `RECENCY_WINDOW_DAYS` and `MAX_ATTEMPTS` overrides.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    apply_overrides(config, |name| env::var(name).ok())
}

fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(bucket) = lookup("S3_BUCKET").filter(|b| !b.is_empty()) {
        config.storage.bucket = Some(bucket);
    }
    if let Some(days) = lookup("RECENCY_WINDOW_DAYS") {
        config.collection.recency_window_days = days
            .parse()
            .map_err(|_| AppError::config(format!("RECENCY_WINDOW_DAYS is not a number: {days}")))?;
    }
    if let Some(attempts) = lookup("MAX_ATTEMPTS") {
        config.retry.max_attempts = attempts
            .parse()
            .map_err(|_| AppError::config(format!("MAX_ATTEMPTS is not a number: {attempts}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_credentials_required() {
        assert!(matches!(
            Credentials::from_value(None),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            Credentials::from_value(Some("  ".into())),
            Err(AppError::Config(_))
        ));
        let creds = Credentials::from_value(Some("abc\n".into())).unwrap();
        assert_eq!(creds.bearer_token(), "abc");
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = Credentials::new("secret-token");
        assert!(!format!("{creds:?}").contains("secret-token"));
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("config.toml")).unwrap();
        assert!(config.rules.is_empty());
        assert_eq!(config.collection.recency_window_days, 7);
    }

    #[test]
    fn test_load_config_invalid_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "rules = 3").unwrap();
        assert!(matches!(load_config(&path), Err(AppError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("S3_BUCKET", "ads-bucket"),
            ("RECENCY_WINDOW_DAYS", "30"),
            ("MAX_ATTEMPTS", "4"),
        ]);
        let mut config = Config::default();
        apply_overrides(&mut config, |name| vars.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(config.storage.bucket.as_deref(), Some("ads-bucket"));
        assert_eq!(config.collection.recency_window_days, 30);
        assert_eq!(config.retry.max_attempts, 4);
    }

    #[test]
    fn test_env_override_not_a_number() {
        let mut config = Config::default();
        let result = apply_overrides(&mut config, |name| {
            (name == "MAX_ATTEMPTS").then(|| "many".to_string())
        });
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_lambda_loader_reads_stored_config() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStorage::new(tmp.path()));
        let loader = LambdaConfigLoader::new(store.clone(), "config");

        assert!(loader.load_config().await.unwrap().is_none());

        store
            .write_bytes(
                "config/config.toml",
                b"[collection]\nrecency_window_days = 30\n\n[[rules]]\ntag = \"skybet\"\nvalue = \"from:skybet\"\n",
            )
            .await
            .unwrap();
        let config = loader.load_config().await.unwrap().unwrap();
        assert_eq!(config.collection.recency_window_days, 30);
        assert_eq!(config.rules[0].tag, "skybet");
    }

    #[tokio::test]
    async fn test_lambda_loader_requires_stored_config() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStorage::new(tmp.path()));
        let loader = LambdaConfigLoader::new(store.clone(), "config");

        match loader.require_config().await {
            Err(AppError::Config(message)) => assert!(message.contains("config.toml")),
            other => panic!("unexpected result: {other:?}"),
        }

        store
            .write_bytes("config/config.toml", b"[[rules]]\ntag = \"a\"\nvalue = \"from:a\"\n")
            .await
            .unwrap();
        assert_eq!(loader.require_config().await.unwrap().rules.len(), 1);
    }
}
