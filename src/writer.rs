//! Writer trait and the CSV file writer
//!
//! Rows are written to a temporary file inside the output directory and
//! persisted under their final name only once complete, so a failed
//! request never leaves a partial CSV behind.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::data_merger::JoinedRow;
use crate::error::GenerateError;

pub const CSV_HEADER: [&str; 3] = ["Name", "Title", "Body"];

/// Names tried per timestamp before giving up: `data-<ts>.csv`, then
/// `data-<ts>-1.csv` and so on
const MAX_NAME_ATTEMPTS: usize = 100;

/// Filesystem-safe timestamp: ISO-8601 instant with `:` and `.` replaced by `-`
pub fn file_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// Directory receiving generated files, created by `init`
#[derive(Debug, Clone)]
pub struct OutputDir {
    path: PathBuf,
}

impl OutputDir {
    /// Create the directory if it is missing. Safe to call repeatedly.
    pub fn init<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)
            .context(format!("Failed to create output directory: {:?}", path))?;
        info!("Output directory ready: {:?}", path);
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_path(&self, timestamp: &str) -> PathBuf {
        self.path.join(format!("data-{}.csv", timestamp))
    }

    /// `file_path` for the first attempt, `data-<ts>-<n>.csv` after a collision
    pub fn numbered_file_path(&self, timestamp: &str, n: usize) -> PathBuf {
        match n {
            0 => self.file_path(timestamp),
            n => self.path.join(format!("data-{}-{}.csv", timestamp, n)),
        }
    }
}

/// Trait for writing joined rows to a storage backend
#[async_trait]
pub trait Writer: Send + Sync {
    /// Write all rows as one artifact and return where it landed
    async fn write_rows(&self, rows: Vec<JoinedRow>, timestamp: &str) -> Result<PathBuf, GenerateError>;
}

fn failed(what: &str, e: impl fmt::Display) -> GenerateError {
    GenerateError::WriteFailed(format!("{}: {}", what, e))
}

/// Writes `Name,Title,Body` CSV files into an `OutputDir`
pub struct CsvWriter {
    output: OutputDir,
}

impl CsvWriter {
    pub fn new(output: OutputDir) -> Self {
        Self { output }
    }

    fn write_file(output: &OutputDir, timestamp: &str, rows: &[JoinedRow]) -> Result<PathBuf, GenerateError> {
        let temp = NamedTempFile::new_in(output.path())
            .map_err(|e| failed("Failed to create temporary file", e))?;

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(BufWriter::new(temp));

        writer
            .write_record(CSV_HEADER)
            .map_err(|e| failed("Failed to write header", e))?;
        for row in rows {
            writer
                .write_record(row.as_record())
                .map_err(|e| failed("Failed to write record", e))?;
        }

        let buffered = writer
            .into_inner()
            .map_err(|e| failed("Failed to flush CSV writer", e.error()))?;
        let mut temp = buffered
            .into_inner()
            .map_err(|e| failed("Failed to flush file buffer", e.error()))?;

        for n in 0..MAX_NAME_ATTEMPTS {
            let path = output.numbered_file_path(timestamp, n);
            match temp.persist_noclobber(&path) {
                Ok(_) => {
                    debug!("Persisted {} rows to {:?}", rows.len(), path);
                    return Ok(path);
                }
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("{:?} already exists, trying the next name", path);
                    temp = e.file;
                }
                Err(e) => return Err(failed(&format!("Failed to persist {:?}", path), e.error)),
            }
        }

        Err(GenerateError::WriteFailed(format!(
            "No free file name for timestamp {} after {} attempts",
            timestamp, MAX_NAME_ATTEMPTS
        )))
    }
}

#[async_trait]
impl Writer for CsvWriter {
    async fn write_rows(&self, rows: Vec<JoinedRow>, timestamp: &str) -> Result<PathBuf, GenerateError> {
        let output = self.output.clone();
        let stamp = timestamp.to_string();
        let path = tokio::task::spawn_blocking(move || Self::write_file(&output, &stamp, &rows))
            .await
            .map_err(|e| GenerateError::WriteFailed(format!("Writer task failed: {}", e)))??;

        match tokio::fs::try_exists(&path).await {
            Ok(true) => Ok(path),
            Ok(false) => Err(GenerateError::WriteFailed("CSV file creation failed".to_string())),
            Err(e) => Err(GenerateError::WriteFailed(format!(
                "Failed to verify {:?}: {}",
                path, e
            ))),
        }
    }
}
