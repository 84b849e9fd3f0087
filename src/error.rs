//! Error type shared by every stage of the CSV generation pipeline

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerateError {
    /// An upstream source failed on every attempt
    #[error("Failed to fetch {label} after {attempts} attempts: {message}")]
    FetchExhausted {
        label: String,
        attempts: u32,
        message: String,
        /// Upstream HTTP status of the last attempt, if it got that far
        status: Option<u16>,
    },

    #[error("Invalid or empty response received from: {}", .0.join(", "))]
    EmptySource(Vec<String>),

    #[error("CSV file operation failed: {0}")]
    WriteFailed(String),

    #[error("{0}")]
    Unexpected(String),
}

impl GenerateError {
    /// HTTP status reported to the caller.
    ///
    /// An upstream 4xx/5xx carried by `FetchExhausted` is passed through,
    /// everything else is a 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GenerateError::FetchExhausted {
                status: Some(code), ..
            } => StatusCode::from_u16(*code)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
