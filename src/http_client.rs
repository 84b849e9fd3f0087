//! HTTP client module for fetching the upstream collections
//!
//! Each source is fetched with a bounded number of retries and a fixed
//! pause between attempts. The three sources are fetched concurrently as
//! separate tasks; the first failure cancels the rest.

use anyhow::{Context, Result};
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::{FetchConfig, RetryConfig, SourcesConfig};
use crate::data_merger::SourceKind;
use crate::error::GenerateError;

/// A named upstream URL
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub label: String,
    pub url: String,
}

impl Endpoint {
    pub fn new(label: &str, url: &str) -> Self {
        Self {
            label: label.to_string(),
            url: url.to_string(),
        }
    }
}

/// Endpoints for the three sources
#[derive(Debug, Clone)]
pub struct SourceEndpoints {
    pub users: Endpoint,
    pub posts: Endpoint,
    pub comments: Endpoint,
}

impl SourceEndpoints {
    pub fn from_config(config: &SourcesConfig) -> Self {
        Self {
            users: Endpoint::new(SourceKind::Users.label(), &config.users),
            posts: Endpoint::new(SourceKind::Posts.label(), &config.posts),
            comments: Endpoint::new(SourceKind::Comments.label(), &config.comments),
        }
    }

    pub fn get(&self, kind: SourceKind) -> &Endpoint {
        match kind {
            SourceKind::Users => &self.users,
            SourceKind::Posts => &self.posts,
            SourceKind::Comments => &self.comments,
        }
    }
}

/// Retry budget and fixed delay for one logical fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Total attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: Duration::from_millis(config.delay_ms),
        }
    }
}

/// The three collections as returned upstream
#[derive(Debug, Clone, Default)]
pub struct FetchedSources {
    pub users: Vec<Value>,
    pub posts: Vec<Value>,
    pub comments: Vec<Value>,
}

impl FetchedSources {
    pub fn get(&self, kind: SourceKind) -> &[Value] {
        match kind {
            SourceKind::Users => &self.users,
            SourceKind::Posts => &self.posts,
            SourceKind::Comments => &self.comments,
        }
    }

    /// Labels of the sources that came back empty
    pub fn empty_sources(&self) -> Vec<String> {
        SourceKind::ALL
            .iter()
            .filter(|kind| self.get(**kind).is_empty())
            .map(|kind| kind.label().to_string())
            .collect()
    }

    /// Every source must carry at least one item
    pub fn validate(&self) -> Result<(), GenerateError> {
        let empty = self.empty_sources();
        if empty.is_empty() {
            Ok(())
        } else {
            warn!("Empty response from: {}", empty.join(", "));
            Err(GenerateError::EmptySource(empty))
        }
    }
}

/// Failure of a single attempt
struct AttemptError {
    message: String,
    status: Option<u16>,
}

/// HTTP client wrapper with retry support
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    retry: RetryPolicy,
    /// Applied to every request; an elapsed timeout is retried like any
    /// other transport error
    timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();

        // Configure proxy if provided
        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .context(format!("Failed to configure proxy: {}", proxy_url))?;
            builder = builder.proxy(proxy);
            info!("HTTP client configured with proxy: {}", proxy_url);
        }

        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            retry: RetryPolicy::from(&config.retry),
            timeout: config.timeout(),
        })
    }

    /// Replace the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn try_once(&self, endpoint: &Endpoint) -> Result<Vec<u8>, AttemptError> {
        let response = self
            .client
            .get(&endpoint.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AttemptError {
                message: e.to_string(),
                status: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError {
                message: format!("HTTP request failed with status: {}", status),
                status: Some(status.as_u16()),
            });
        }

        let body = response.bytes().await.map_err(|e| AttemptError {
            message: format!("Failed to read response body: {}", e),
            status: None,
        })?;
        Ok(body.to_vec())
    }

    /// GET `endpoint` and parse the body as JSON, retrying transport
    /// errors and non-2xx responses.
    ///
    /// A 2xx response with a malformed body is not retried.
    pub async fn fetch_json(&self, endpoint: &Endpoint) -> Result<Value, GenerateError> {
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!("Fetching {} from {} (attempt {})", endpoint.label, endpoint.url, attempt);

            match self.try_once(endpoint).await {
                Ok(body) => {
                    debug!("Fetched {} bytes for {}", body.len(), endpoint.label);
                    return serde_json::from_slice(&body).map_err(|e| {
                        GenerateError::Unexpected(format!(
                            "Failed to parse {} response as JSON: {}",
                            endpoint.label, e
                        ))
                    });
                }
                Err(err) if attempt < max_attempts => {
                    warn!(
                        "Fetching {} failed (attempt {}/{}): {}, retrying in {:?}",
                        endpoint.label, attempt, max_attempts, err.message, self.retry.delay
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(err) => {
                    error!(
                        "Fetching {} failed after {} attempts: {}",
                        endpoint.label, attempt, err.message
                    );
                    return Err(GenerateError::FetchExhausted {
                        label: endpoint.label.clone(),
                        attempts: attempt,
                        message: err.message,
                        status: err.status,
                    });
                }
            }
        }
    }

    fn into_records(kind: SourceKind, value: Value) -> Result<Vec<Value>, GenerateError> {
        match value {
            Value::Array(items) => Ok(items),
            _ => Err(GenerateError::Unexpected(format!(
                "{} response is not a JSON array",
                kind.label()
            ))),
        }
    }

    /// Fetch all three sources concurrently.
    ///
    /// Waits for every fetch to finish; the first failure aborts the
    /// fetches still in flight and is returned as-is.
    pub async fn fetch_sources(&self, endpoints: &SourceEndpoints) -> Result<FetchedSources, GenerateError> {
        let mut tasks = JoinSet::new();
        for kind in SourceKind::ALL {
            let client = self.clone();
            let endpoint = endpoints.get(kind).clone();
            tasks.spawn(async move {
                let result = client.fetch_json(&endpoint).await;
                (kind, result)
            });
        }

        let mut fetched = FetchedSources::default();
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok((kind, result)) => result
                    .and_then(|value| Self::into_records(kind, value))
                    .map(|records| (kind, records)),
                Err(e) => Err(GenerateError::Unexpected(format!("Fetch task failed: {}", e))),
            };

            match outcome {
                Ok((kind, records)) => {
                    info!("Fetched {} items from {}", records.len(), kind.label());
                    match kind {
                        SourceKind::Users => fetched.users = records,
                        SourceKind::Posts => fetched.posts = records,
                        SourceKind::Comments => fetched.comments = records,
                    }
                }
                Err(e) => {
                    if !tasks.is_empty() {
                        warn!("Cancelling {} in-flight fetches after failure", tasks.len());
                    }
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        Ok(fetched)
    }
}
