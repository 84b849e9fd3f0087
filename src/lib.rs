//! CSV Aggregator Library
//!
//! Fetches the users, posts and comments collections, joins them by
//! identifier, sanitizes every field against CSV injection and writes the
//! result to a timestamped CSV file. `server` exposes the pipeline as
//! `GET /generate-csv`.

pub mod config;
pub mod error;
pub mod http_client;
pub mod data_merger;
pub mod sanitizer;
pub mod writer;
pub mod generator;
pub mod server;

// Re-export commonly used types
pub use config::{Config, FetchConfig, JoinConfig, OutputConfig, RetryConfig, SourcesConfig};
pub use error::GenerateError;
pub use http_client::{Endpoint, FetchedSources, HttpClient, RetryPolicy, SourceEndpoints};
pub use data_merger::{DataMerger, JoinedRow, SourceKind, PLACEHOLDER};
pub use sanitizer::{sanitize_field, sanitize_row};
pub use writer::{CsvWriter, OutputDir, Writer, file_timestamp};
pub use generator::{GenerationSummary, Generator, Stage};
pub use server::{AppState, router};
