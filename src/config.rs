//! Configuration module for the CSV aggregator
//!
//! This module defines the configuration structure for the upstream sources,
//! fetch retry policy, join limits and output location. Every section has
//! defaults, so a partial (or missing) YAML file is fine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Upstream source URLs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Users collection (items carry `id` and `name`)
    pub users: String,
    /// Posts collection (items carry `id` and `title`)
    pub posts: String,
    /// Comments collection (items carry `id` and `body`)
    pub comments: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            users: "https://jsonplaceholder.typicode.com/users".to_string(),
            posts: "https://jsonplaceholder.typicode.com/posts".to_string(),
            comments: "https://jsonplaceholder.typicode.com/comments".to_string(),
        }
    }
}

/// Retry settings for a single source fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Fixed pause between attempts, in milliseconds
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_ms: 1000,
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Optional proxy URL for upstream requests (e.g., "http://proxy.example.com:8080")
    pub proxy: Option<String>,
    pub retry: RetryConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            proxy: None,
            retry: RetryConfig::default(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Join configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    /// Upper bound on the identifier space. One row is emitted per
    /// identifier up to the largest one seen, so sparse upstream ids
    /// are rejected past this point instead of producing a huge file.
    pub max_rows: usize,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self { max_rows: 100_000 }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving the generated CSV files
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "output".to_string(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sources: SourcesConfig,
    pub fetch: FetchConfig,
    pub join: JoinConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .context(format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config = serde_yaml::from_str(&content)
            .context("Failed to parse config YAML")?;

        Ok(config)
    }

    /// Load from `path` when given, otherwise use the built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }
}
