//! Search endpoint client.
//!
//! [`EndpointClient`] fetches one page at a time and owns the retry loop.
//! The HTTP call itself sits behind [`SearchTransport`] so the loop can be
//! driven by a scripted transport in tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::config::Credentials;
use crate::error::{AppError, Result};
use crate::models::{ItemId, ResponsePage, Rule};
use crate::services::backoff::{BackoffPolicy, StatusClass};

pub const QUERY_PARAM: &str = "query";
pub const SINCE_ID_PARAM: &str = "since_id";
pub const NEXT_TOKEN_PARAM: &str = "next_token";
pub const MAX_RESULTS_PARAM: &str = "max_results";

/// Query parameters of one request.
///
/// Built from the shared base for each rule and each page; never modified in
/// place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    pairs: BTreeMap<String, String>,
}

impl RequestParams {
    /// Base parameters shared by every rule of a run.
    pub fn base(query: &BTreeMap<String, String>, max_results: u32) -> Self {
        let mut pairs = query.clone();
        pairs.insert(MAX_RESULTS_PARAM.to_string(), max_results.to_string());
        Self { pairs }
    }

    /// First-page parameters for `rule`.
    pub fn for_rule(&self, rule: &Rule) -> Self {
        let mut pairs = self.pairs.clone();
        pairs.insert(QUERY_PARAM.to_string(), rule.value.clone());
        pairs.remove(SINCE_ID_PARAM);
        pairs.remove(NEXT_TOKEN_PARAM);
        Self { pairs }
    }

    /// Only ask for items newer than `id`.
    pub fn with_since_id(mut self, id: &ItemId) -> Self {
        self.pairs.insert(SINCE_ID_PARAM.to_string(), id.to_string());
        self
    }

    /// Parameters for the page after this one.
    ///
    /// The endpoint does not accept `since_id` together with a page token.
    pub fn next_page(&self, token: &str) -> Self {
        let mut pairs = self.pairs.clone();
        pairs.remove(SINCE_ID_PARAM);
        pairs.insert(NEXT_TOKEN_PARAM.to_string(), token.to_string());
        Self { pairs }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Status and body of one HTTP response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// One GET against the search endpoint.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    async fn get(&self, params: &RequestParams) -> Result<RawResponse>;
}

/// `reqwest` transport with bearer token authentication.
pub struct HttpTransport {
    client: reqwest::Client,
    url: Url,
    bearer_token: String,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, url: &str, credentials: &Credentials) -> Result<Self> {
        Ok(Self {
            client,
            url: Url::parse(url)?,
            bearer_token: credentials.bearer_token().to_string(),
        })
    }

    fn request_url(&self, params: &RequestParams) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut().extend_pairs(params.iter());
        url
    }
}

#[async_trait]
impl SearchTransport for HttpTransport {
    async fn get(&self, params: &RequestParams) -> Result<RawResponse> {
        let response = self
            .client
            .get(self.request_url(params))
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}

/// Paginated search client with backoff.
#[derive(Clone)]
pub struct EndpointClient {
    transport: Arc<dyn SearchTransport>,
    policy: BackoffPolicy,
}

impl EndpointClient {
    pub fn new(transport: Arc<dyn SearchTransport>, policy: BackoffPolicy) -> Self {
        Self { transport, policy }
    }

    /// Fetch and decode one page.
    ///
    /// Transient failures are retried until the attempt budget runs out;
    /// rejected requests fail immediately.
    pub async fn fetch_page(&self, params: &RequestParams) -> Result<ResponsePage> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let failure = match self.transport.get(params).await {
                Ok(response) => match StatusClass::of(response.status) {
                    StatusClass::Success => return self.decode(response).await,
                    StatusClass::Rejected => {
                        return Err(AppError::RequestRejected {
                            status: response.status,
                            body: response.body,
                        });
                    }
                    StatusClass::Transient => {
                        format!("HTTP {}: {}", response.status, snippet(&response.body))
                    }
                },
                Err(AppError::Http(e)) => e.to_string(),
                Err(e) => return Err(e),
            };

            if !self.policy.allows_retry(attempts) {
                return Err(AppError::TransientEndpoint {
                    attempts,
                    message: failure,
                });
            }

            let delay = self.policy.next_delay();
            log::warn!(
                "Cannot get data ({}), sleeping {}s before retry {}/{}",
                failure,
                delay.as_secs(),
                attempts + 1,
                self.policy.max_attempts()
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn decode(&self, response: RawResponse) -> Result<ResponsePage> {
        let page: ResponsePage = serde_json::from_str(&response.body).map_err(|e| {
            AppError::MalformedResponse(format!("{e} in {:?}", snippet(&response.body)))
        })?;
        if !page.errors.is_empty() {
            log::warn!("Response carried {} partial errors", page.errors.len());
        }
        log::debug!(
            "Fetched page: {} items, newest_id={:?}, next_token={:?}",
            page.data.len(),
            page.meta.newest_id,
            page.meta.next_token
        );

        tokio::time::sleep(self.policy.rate_limit_delay()).await;
        Ok(page)
    }
}

fn snippet(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
