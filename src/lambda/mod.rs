// src/lambda/mod.rs

//! AWS Lambda handler for the collector.
//!
//! Each invocation:
//! 1. Loads `config.toml` from S3 and applies env overrides
//! 2. Collects every rule and advances cursors
//! 3. Optionally rebuilds the enriched tables

use std::sync::Arc;

use chrono::Utc;
use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::{Credentials, LambdaConfigLoader, apply_env_overrides};
use crate::error::{AppError, Result};
use crate::models::Config;
use crate::pipeline::{run_collect, run_enrich};
use crate::storage::{ObjectStore, S3Storage};

/// Default S3 prefix holding `config.toml`.
const DEFAULT_CONFIG_PREFIX: &str = "ads-collector/config";

/// Lambda invocation payload.
#[derive(Debug, Default, Deserialize)]
pub struct CollectRequest {
    /// Use the production page size and every rule
    #[serde(default)]
    pub production: bool,

    /// Rebuild the enriched tables after collecting
    #[serde(default)]
    pub enrich: bool,
}

/// Lambda response payload.
#[derive(Debug, Default, Serialize)]
pub struct CollectResponse {
    /// Whether the run completed
    pub success: bool,

    pub rules_collected: usize,
    pub rules_skipped: usize,
    pub items_collected: usize,

    /// Error message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

/// Main Lambda handler function.
#[instrument(skip(event))]
pub async fn handler(
    event: LambdaEvent<CollectRequest>,
) -> std::result::Result<CollectResponse, LambdaError> {
    let start = std::time::Instant::now();
    let (request, _context) = event.into_parts();

    info!(
        "Starting collection: production={}, enrich={}",
        request.production, request.enrich
    );

    match run(&request).await {
        Ok(mut response) => {
            response.execution_time_ms = start.elapsed().as_millis() as u64;
            info!(
                "Collection completed: {} rules, {} skipped, {} items in {}ms",
                response.rules_collected,
                response.rules_skipped,
                response.items_collected,
                response.execution_time_ms
            );
            Ok(response)
        }
        Err(e) => {
            error!("Collection failed: {}", e);
            Ok(CollectResponse {
                success: false,
                error: Some(e.to_string()),
                execution_time_ms: start.elapsed().as_millis() as u64,
                ..Default::default()
            })
        }
    }
}

async fn run(request: &CollectRequest) -> Result<CollectResponse> {
    let credentials = Credentials::from_env()?;
    let config = load_lambda_config().await?;

    let bucket = config
        .storage
        .bucket
        .clone()
        .ok_or_else(|| AppError::config("S3_BUCKET must be set for Lambda runs"))?;
    let store: Arc<dyn ObjectStore> = Arc::new(S3Storage::from_env(bucket).await);

    let summary = run_collect(&config, &credentials, store.clone(), request.production).await?;

    if request.enrich {
        run_enrich(&config, store, request.production, Utc::now().date_naive()).await?;
    }

    Ok(CollectResponse {
        success: true,
        rules_collected: summary.rules_collected(),
        rules_skipped: summary.rules_skipped(),
        items_collected: summary.items_collected(),
        error: None,
        execution_time_ms: 0,
    })
}

/// Load configuration suitable for Lambda environment.
///
/// `CONFIG_S3_PREFIX/config.toml` in `S3_BUCKET` is required; env overrides
/// apply on top of it.
async fn load_lambda_config() -> Result<Config> {
    let mut bootstrap = Config::default();
    apply_env_overrides(&mut bootstrap)?;
    let bucket = bootstrap
        .storage
        .bucket
        .ok_or_else(|| AppError::config("S3_BUCKET must be set for Lambda runs"))?;

    let prefix =
        std::env::var("CONFIG_S3_PREFIX").unwrap_or_else(|_| DEFAULT_CONFIG_PREFIX.to_string());
    let loader = LambdaConfigLoader::new(Arc::new(S3Storage::from_env(bucket).await), &prefix);
    let mut config = loader.require_config().await?;
    apply_env_overrides(&mut config)?;
    info!("Loaded stored config with {} rules", config.rules.len());

    Ok(config)
}
