//! Error types for trend-oxide
//!
//! Malformed records never surface here: the normalizer drops and counts them.
//! These errors cover the boundaries around the core (files, configuration)
//! and the worker round trip, where a caller needs to decide whether to retry.

use std::time::Duration;

use thiserror::Error;

use crate::perf::RequestId;

/// Main error type for trend-oxide operations
#[derive(Error, Debug)]
pub enum TrendError {
    /// File I/O error
    #[error("Failed to access file: {0}")]
    FileIo(#[from] std::io::Error),

    /// Polars parsing error while reading a record file
    #[error("Data processing error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unsupported file format
    #[error("Unsupported file format: {extension}")]
    UnsupportedFormat { extension: String },

    /// Column not found in data
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound { column: String },

    /// Empty dataset error
    #[error("Dataset is empty or has no valid records")]
    EmptyDataset,

    /// A domain with start > end or non-finite bounds
    #[error("Invalid domain [{start}, {end}]")]
    InvalidDomain { start: i64, end: i64 },

    /// The request was superseded by a newer one or cancelled explicitly
    #[error("Request {request_id} was cancelled")]
    WorkerCancelled { request_id: RequestId },

    /// The worker failed while computing a request
    #[error("Request {request_id} failed: {reason}")]
    WorkerFailed { request_id: RequestId, reason: String },

    /// The caller's wall-clock budget expired before a response arrived
    #[error("Request {request_id} timed out after {budget:?}")]
    WorkerTimeout { request_id: RequestId, budget: Duration },

    /// The worker thread is gone
    #[error("Statistics worker is not running")]
    WorkerDisconnected,
}

/// Result type alias for trend-oxide operations
pub type Result<T> = std::result::Result<T, TrendError>;

impl TrendError {
    /// Get a user-friendly error message suitable for displaying in UI
    pub fn user_message(&self) -> String {
        match self {
            TrendError::FileIo(e) => format!("File error: {}", e),
            TrendError::Polars(e) => format!("Data error: {}", e),
            TrendError::Json(e) => format!("JSON error: {}", e),
            TrendError::Config(msg) => format!("Config error: {}", msg),
            TrendError::UnsupportedFormat { extension } => {
                format!("Unsupported file format: '.{}'", extension)
            }
            TrendError::ColumnNotFound { column } => {
                format!("Column '{}' not found", column)
            }
            TrendError::EmptyDataset => "No valid records in file".to_string(),
            TrendError::InvalidDomain { .. } => "Invalid time range".to_string(),
            TrendError::WorkerCancelled { .. } => "Statistics superseded by a newer request".to_string(),
            TrendError::WorkerFailed { reason, .. } => {
                format!("Statistics failed: {} (retry possible)", reason)
            }
            TrendError::WorkerTimeout { budget, .. } => {
                format!(
                    "Statistics took longer than {} ms (retry possible)",
                    budget.as_millis()
                )
            }
            TrendError::WorkerDisconnected => "Statistics worker stopped".to_string(),
        }
    }

    /// Get a short title for the error (for toast notifications)
    pub fn title(&self) -> &'static str {
        match self {
            TrendError::FileIo(_) => "File Error",
            TrendError::Polars(_) => "Data Error",
            TrendError::Json(_) => "JSON Error",
            TrendError::Config(_) => "Configuration Error",
            TrendError::UnsupportedFormat { .. } => "Unsupported Format",
            TrendError::ColumnNotFound { .. } => "Column Not Found",
            TrendError::EmptyDataset => "Empty Dataset",
            TrendError::InvalidDomain { .. } => "Invalid Range",
            TrendError::WorkerCancelled { .. } => "Cancelled",
            TrendError::WorkerFailed { .. } => "Statistics Error",
            TrendError::WorkerTimeout { .. } => "Timeout",
            TrendError::WorkerDisconnected => "Worker Error",
        }
    }

    /// Whether re-issuing the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrendError::WorkerCancelled { .. }
                | TrendError::WorkerFailed { .. }
                | TrendError::WorkerTimeout { .. }
        )
    }
}
