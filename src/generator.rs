//! CSV generation pipeline
//!
//! One call to `Generator::generate` runs a full request:
//! fetch → validate → join → sanitize → write. Any stage failing ends the
//! run; there is no partial output.

use chrono::Utc;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::data_merger::{DataMerger, JoinedRow, SourceKind};
use crate::error::GenerateError;
use crate::http_client::{HttpClient, SourceEndpoints};
use crate::sanitizer::sanitize_row;
use crate::writer::{Writer, file_timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Validating,
    Joining,
    Sanitizing,
    Writing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetching => "fetching",
            Stage::Validating => "validating",
            Stage::Joining => "joining",
            Stage::Sanitizing => "sanitizing",
            Stage::Writing => "writing",
        };
        f.write_str(name)
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct GenerationSummary {
    pub file_path: PathBuf,
    pub record_count: usize,
    pub timestamp: String,
}

pub struct Generator {
    client: HttpClient,
    endpoints: SourceEndpoints,
    writer: Arc<dyn Writer>,
    max_rows: usize,
}

impl Generator {
    pub fn new(
        client: HttpClient,
        endpoints: SourceEndpoints,
        writer: Arc<dyn Writer>,
        max_rows: usize,
    ) -> Self {
        Self {
            client,
            endpoints,
            writer,
            max_rows,
        }
    }

    pub async fn generate(&self) -> Result<GenerationSummary, GenerateError> {
        debug!("Stage: {}", Stage::Fetching);
        let sources = self.client.fetch_sources(&self.endpoints).await?;

        debug!("Stage: {}", Stage::Validating);
        sources.validate()?;

        debug!("Stage: {}", Stage::Joining);
        let mut merger = DataMerger::new(self.max_rows);
        for kind in SourceKind::ALL {
            merger.add_records(kind, sources.get(kind));
        }
        let rows = merger.joined_rows()?;

        debug!("Stage: {}", Stage::Sanitizing);
        let rows: Vec<JoinedRow> = rows.into_iter().map(sanitize_row).collect();

        debug!("Stage: {}", Stage::Writing);
        let timestamp = file_timestamp(Utc::now());
        let record_count = rows.len();
        let file_path = self.writer.write_rows(rows, &timestamp).await?;

        info!("Generated {:?} with {} records", file_path, record_count);
        Ok(GenerationSummary {
            file_path,
            record_count,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::http_client::{Endpoint, RetryPolicy};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Keeps written rows in memory
    #[derive(Default)]
    struct RecordingWriter {
        written: Mutex<Vec<Vec<JoinedRow>>>,
    }

    #[async_trait]
    impl Writer for RecordingWriter {
        async fn write_rows(&self, rows: Vec<JoinedRow>, timestamp: &str) -> Result<PathBuf, GenerateError> {
            self.written.lock().unwrap().push(rows);
            Ok(PathBuf::from(format!("memory/data-{}.csv", timestamp)))
        }
    }

    struct FailingWriter;

    #[async_trait]
    impl Writer for FailingWriter {
        async fn write_rows(&self, _rows: Vec<JoinedRow>, _timestamp: &str) -> Result<PathBuf, GenerateError> {
            Err(GenerateError::WriteFailed("read-only filesystem".to_string()))
        }
    }

    async fn upstream(users: Value, posts: Value, comments: Value) -> MockServer {
        let server = MockServer::start().await;
        for (route, body) in [("/users", users), ("/posts", posts), ("/comments", comments)] {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;
        }
        server
    }

    fn generator(server: &MockServer, writer: Arc<dyn Writer>, max_rows: usize) -> Generator {
        let base = server.uri();
        let client = HttpClient::new(&FetchConfig::default())
            .unwrap()
            .with_retry(RetryPolicy {
                max_retries: 0,
                delay: Duration::ZERO,
            });
        let endpoints = SourceEndpoints {
            users: Endpoint::new("users", &format!("{}/users", base)),
            posts: Endpoint::new("posts", &format!("{}/posts", base)),
            comments: Endpoint::new("comments", &format!("{}/comments", base)),
        };
        Generator::new(client, endpoints, writer, max_rows)
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Fetching.to_string(), "fetching");
        assert_eq!(Stage::Writing.to_string(), "writing");
    }

    #[tokio::test]
    async fn test_generate_joins_and_sanitizes() {
        let server = upstream(
            json!([{"id": 1, "name": "=CMD()"}]),
            json!([{"id": 1, "title": "P1"}, {"id": 2, "title": "line1\r\nline2"}]),
            json!([{"id": 2, "body": "C2"}]),
        )
        .await;
        let writer = Arc::new(RecordingWriter::default());

        let summary = generator(&server, writer.clone(), 1000).generate().await.unwrap();

        assert_eq!(summary.record_count, 2);
        assert!(summary.file_path.to_string_lossy().ends_with(&format!("data-{}.csv", summary.timestamp)));
        assert!(!summary.timestamp.contains(':'));

        let written = writer.written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(
            written[0],
            vec![
                JoinedRow {
                    name: "'=CMD()".to_string(),
                    title: "P1".to_string(),
                    body: "N/A".to_string(),
                },
                JoinedRow {
                    name: "N/A".to_string(),
                    title: "line1 line2".to_string(),
                    body: "C2".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_source_writes_nothing() {
        let server = upstream(json!([{"id": 1, "name": "A"}]), json!([]), json!([])).await;
        let writer = Arc::new(RecordingWriter::default());

        let err = generator(&server, writer.clone(), 1000).generate().await.unwrap_err();

        match err {
            GenerateError::EmptySource(labels) => assert_eq!(labels, vec!["posts", "comments"]),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(writer.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_identifier_limit_fails_before_writing() {
        let server = upstream(
            json!([{"id": 50, "name": "A"}]),
            json!([{"id": 1, "title": "T"}]),
            json!([{"id": 1, "body": "B"}]),
        )
        .await;
        let writer = Arc::new(RecordingWriter::default());

        let err = generator(&server, writer.clone(), 10).generate().await.unwrap_err();
        assert!(matches!(err, GenerateError::Unexpected(_)));
        assert!(writer.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_is_returned() {
        let server = upstream(
            json!([{"id": 1, "name": "A"}]),
            json!([{"id": 1, "title": "T"}]),
            json!([{"id": 1, "body": "B"}]),
        )
        .await;

        let err = generator(&server, Arc::new(FailingWriter), 1000)
            .generate()
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::WriteFailed(_)));
    }
}
