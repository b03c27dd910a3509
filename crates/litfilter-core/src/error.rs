use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Excel export error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Column not found in spreadsheet: {0}")]
    MissingColumn(String),

    #[error("AI provider error: {0}")]
    Provider(#[from] ProviderError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single provider call, classified for the retry policy
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("provider fault (HTTP {status}): {message}")]
    ProviderFault { status: u16, message: String },

    #[error("request rejected (HTTP {status}): {message}")]
    InvalidRequest { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Whether another attempt at the same row may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. }
                | ProviderError::Timeout
                | ProviderError::Network(_)
                | ProviderError::ProviderFault { .. }
        )
    }

    /// Credentials are shared by every row, so an auth failure ends the run
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProviderError::Auth(_))
    }

    /// Delay the provider asked for, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
