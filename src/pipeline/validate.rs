// src/pipeline/validate.rs

use crate::config::Credentials;
use crate::error::Result;
use crate::models::Config;
use crate::utils::log;

/// Validate configuration and check that a bearer token is available.
pub fn run_validate(config: &Config, credentials: Result<Credentials>) -> Result<()> {
    log::header("Validating configuration");

    if let Err(e) = config.validate() {
        ::log::error!("Config validation failed: {}", e);
        return Err(e);
    }
    ::log::info!("Config OK");
    log::sub_item(&format!("Endpoint: {}", config.endpoint.url));
    log::sub_item(&format!("Timeout: {}s", config.endpoint.timeout_secs));
    log::sub_item(&format!(
        "Backoff: {}-{}s, {} attempts",
        config.retry.min_backoff_secs, config.retry.max_backoff_secs, config.retry.max_attempts
    ));
    log::sub_item(&format!(
        "Recency window: {} days",
        config.collection.recency_window_days
    ));
    log::sub_item(&format!("Rules: {}", config.rules.len()));

    match credentials {
        Ok(_) => {
            ::log::info!("Credentials OK");
            Ok(())
        }
        Err(e) => {
            ::log::error!("Credentials missing: {}", e);
            Err(e)
        }
    }
}
