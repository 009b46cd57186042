//! Error types for query-stream
//!
//! One `Error` enum covers the whole library. Variants map onto the failure
//! classes the components can hit: terminal query failures, construction-time
//! validation, storage and result-set problems, and wrapped decode/IO errors.
//! Nothing in this crate retries; a failed operation surfaces to the caller
//! as-is and re-invoking the top-level operation is the caller's decision.

use thiserror::Error;

/// Result type alias for query-stream operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for query-stream
#[derive(Debug, Error)]
pub enum Error {
    /// Query submission or execution failed.
    ///
    /// Carries the service-reported reason for FAILED/CANCELLED/unknown
    /// states, `"no execution id"` when the submit response is missing an
    /// identifier, or the underlying message for transport errors hit while
    /// submitting or polling.
    #[error("query error: {reason}")]
    Query {
        /// Human-readable failure reason
        reason: String,
    },

    /// A size or option failed validation at construction, before any I/O
    #[error("validation error: {0}")]
    Validation(String),

    /// Object storage failure (missing object, empty body, bad storage URI)
    #[error("storage error: {0}")]
    Storage(String),

    /// Result-set shape failure (absent result set, missing header row)
    #[error("result set error: {0}")]
    ResultSet(String),

    /// A batch sink rejected a batch
    #[error("sink error: {0}")]
    Sink(String),

    /// CSV decode error while streaming results
    #[error("CSV decode error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Wrap any error's message as a query error.
    ///
    /// Used at the poller boundary where every failure, transport-level or
    /// otherwise, is reported to the caller as a single wrapped reason.
    pub fn query(reason: impl Into<String>) -> Self {
        Error::Query {
            reason: reason.into(),
        }
    }
}
