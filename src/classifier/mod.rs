//! Segment classification of vehicle models
//!
//! Models are assigned one of a closed set of market segments by asking the
//! Anthropic Messages API. Classification is best-effort enrichment: a
//! failure never blocks discovery, the model simply stays unclassified until
//! the next sweep.

mod anthropic;
mod segment;
mod sweep;

pub use anthropic::SegmentClassifier;
pub use segment::Segment;
pub use sweep::{run_classification_sweep, SweepReport, DRY_RUN_LISTING_LIMIT};

use thiserror::Error;

/// Errors that can occur while classifying
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Network failure, non-2xx status or malformed response body
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    /// The answer was not one of the known segments
    #[error("Unparseable classifier answer: {0:?}")]
    Unparseable(String),

    /// The configured API key variable is not set
    #[error("API key variable {0} is not set")]
    MissingApiKey(String),
}

impl From<reqwest::Error> for ClassifierError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Result type for classifier operations
pub type ClassifierResult<T> = Result<T, ClassifierError>;
