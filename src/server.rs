//! HTTP surface: router, response bodies and error mapping

use anyhow::Result;
use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt::Write;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::Config;
use crate::error::GenerateError;
use crate::generator::Generator;
use crate::http_client::{HttpClient, SourceEndpoints};
use crate::writer::{CsvWriter, OutputDir};

#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<Generator>,
    /// Include error details in failure bodies
    pub development: bool,
}

impl AppState {
    /// Wire the pipeline from configuration. `output` must already be
    /// initialised.
    pub fn from_config(config: &Config, output: OutputDir, development: bool) -> Result<Self> {
        let client = HttpClient::new(&config.fetch)?;
        let generator = Generator::new(
            client,
            SourceEndpoints::from_config(&config.sources),
            Arc::new(CsvWriter::new(output)),
            config.join.max_rows,
        );

        Ok(Self {
            generator: Arc::new(generator),
            development,
        })
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    pub message: String,
    pub file_path: String,
    pub record_count: usize,
    pub timestamp: String,
}

#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Failure of `/generate-csv` on its way to the caller
#[derive(Debug)]
pub struct ApiError {
    error: GenerateError,
    /// Captured only in development, where it ends up in `details`
    backtrace: Option<Backtrace>,
}

impl ApiError {
    pub fn new(error: GenerateError, development: bool) -> Self {
        Self {
            error,
            backtrace: development.then(Backtrace::force_capture),
        }
    }
}

/// Error message, its `source()` chain, the debug form and a backtrace
fn failure_trace(error: &(dyn StdError + 'static), backtrace: &Backtrace) -> String {
    let mut trace = error.to_string();
    let mut source = error.source();
    if source.is_some() {
        trace.push_str("\n\nCaused by:");
    }
    let mut depth = 0;
    while let Some(cause) = source {
        let _ = write!(trace, "\n    {}: {}", depth, cause);
        depth += 1;
        source = cause.source();
    }
    let _ = write!(trace, "\n\n{:#?}\n\nBacktrace:\n{}", error, backtrace);
    trace
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();

        // Log the error
        error!("Error in /generate-csv: {} - {}", status, self.error);

        let body = ErrorResponse {
            success: false,
            message: "Failed to generate CSV file".to_string(),
            error: self.error.to_string(),
            details: self
                .backtrace
                .as_ref()
                .map(|backtrace| failure_trace(&self.error, backtrace)),
        };

        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/generate-csv", get(generate_csv))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn generate_csv(State(state): State<AppState>) -> Result<Json<GenerateResponse>, ApiError> {
    let summary = state
        .generator
        .generate()
        .await
        .map_err(|error| ApiError::new(error, state.development))?;

    Ok(Json(GenerateResponse {
        success: true,
        message: "CSV file generated successfully".to_string(),
        file_path: summary.file_path.to_string_lossy().to_string(),
        record_count: summary.record_count,
        timestamp: summary.timestamp,
    }))
}
