//! Error types for flowstats-core

use thiserror::Error;

use crate::stats::Dimension;

/// Main error type for the flowstats-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Form identifier is missing or not positive
    #[error("invalid form: {0}")]
    InvalidForm(i64),

    /// Dimension string is not one of the known report dimensions
    #[error("invalid report dimension: {0}")]
    InvalidDimension(String),

    /// Period selector is not recognized
    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    /// Custom period without usable start and end dates
    #[error("missing or invalid date range: {0}")]
    MissingDateRange(String),

    /// The workflow for this form has no steps
    #[error("no workflow steps configured for form {0}")]
    NoStepsConfigured(i64),

    /// The backing store failed while aggregating
    #[error("{dimension} aggregation query failed: {source}")]
    AggregationQueryFailed {
        dimension: Dimension,
        #[source]
        source: rusqlite::Error,
    },

    /// Table prefix contains characters that cannot be used in an identifier
    #[error("invalid table prefix: {0:?}")]
    InvalidTablePrefix(String),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a SQLite failure raised while computing `dimension`.
    pub fn aggregation(dimension: Dimension, source: rusqlite::Error) -> Self {
        Error::AggregationQueryFailed { dimension, source }
    }

    /// Whether the error was caused by caller input rather than the store.
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            Error::InvalidForm(_)
                | Error::InvalidDimension(_)
                | Error::InvalidPeriod(_)
                | Error::MissingDateRange(_)
        )
    }
}

/// Result type alias for flowstats-core
pub type Result<T> = std::result::Result<T, Error>;
