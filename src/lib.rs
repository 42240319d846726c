//! fipe-sync: an incremental, resumable mirror of the FIPE vehicle price tables
//!
//! This crate crawls the FIPE reference tables (period → brand → model →
//! model-year → price) from a rate-limited upstream API and materializes
//! them into SQLite, checkpointing every level so interrupted or partially
//! failed runs can be resumed.

pub mod classifier;
pub mod config;
pub mod crawler;
pub mod fipe;
pub mod output;
pub mod storage;

use thiserror::Error;

/// Main error type for fipe-sync operations
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Upstream error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Invalid crawl options: {0}")]
    Options(#[from] crawler::OptionsError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] classifier::ClassifierError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while talking to the FIPE API
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-2xx response or network failure that survived the retry budget.
    /// Rate limiting ends up here once retries are exhausted.
    #[error("Request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    /// Structured `{codigo, erro}` payload returned with a 2xx status
    #[error("FIPE error from {endpoint} ({code}): {message}")]
    Domain {
        endpoint: String,
        code: String,
        message: String,
    },

    /// Payload did not have the expected shape or format
    #[error("Invalid payload from {endpoint}: {message}")]
    Validation { endpoint: String, message: String },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl FetchError {
    pub(crate) fn validation(endpoint: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for fipe-sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Result type alias for upstream requests
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use classifier::{Segment, SegmentClassifier};
pub use config::Config;
pub use crawler::{Coordinator, CrawlOptions, CrawlReport};
pub use fipe::{FipeClient, ThrottleController};
pub use storage::{SqliteStorage, Storage};
