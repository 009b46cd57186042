//! Core types and events for query-stream

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque identifier for one query run, assigned by the query service
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(pub String);

impl ExecutionId {
    /// Create a new ExecutionId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ExecutionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ExecutionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a query execution, as reported by the service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    /// Accepted, waiting to run
    Queued,
    /// Currently executing
    Running,
    /// Finished successfully (terminal)
    Succeeded,
    /// Finished with an error (terminal, reason on the status)
    Failed,
    /// Cancelled before completion (terminal)
    Cancelled,
    /// Any value this library does not recognize (treated as terminal failure)
    Unknown(String),
}

impl ExecutionState {
    /// Parse the service's string form of a state.
    ///
    /// Unrecognized values map to `Unknown` carrying the raw string so the
    /// failure reason can name it.
    pub fn from_service_state(state: &str) -> Self {
        match state {
            "QUEUED" => ExecutionState::Queued,
            "RUNNING" => ExecutionState::Running,
            "SUCCEEDED" => ExecutionState::Succeeded,
            "FAILED" => ExecutionState::Failed,
            "CANCELLED" => ExecutionState::Cancelled,
            other => ExecutionState::Unknown(other.to_string()),
        }
    }

    /// True if no further state transitions can occur
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionState::Queued | ExecutionState::Running)
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionState::Queued => write!(f, "QUEUED"),
            ExecutionState::Running => write!(f, "RUNNING"),
            ExecutionState::Succeeded => write!(f, "SUCCEEDED"),
            ExecutionState::Failed => write!(f, "FAILED"),
            ExecutionState::Cancelled => write!(f, "CANCELLED"),
            ExecutionState::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

/// Status snapshot returned by one poll of the query service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionStatus {
    /// Current lifecycle state
    pub state: ExecutionState,
    /// Failure reason, when the service provides one
    pub reason: Option<String>,
}

impl ExecutionStatus {
    /// Status with no reason attached
    pub fn new(state: ExecutionState) -> Self {
        Self {
            state,
            reason: None,
        }
    }

    /// Status carrying a failure reason
    pub fn with_reason(state: ExecutionState, reason: impl Into<String>) -> Self {
        Self {
            state,
            reason: Some(reason.into()),
        }
    }
}

/// One row of a result page; cells may be absent for sparse rows
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultRow {
    /// Cell values in column order (`None` = no datum for that column)
    pub cells: Vec<Option<String>>,
}

impl ResultRow {
    /// Build a row from owned cell values
    pub fn new(cells: Vec<Option<String>>) -> Self {
        Self { cells }
    }

    /// Convenience constructor for fully-populated rows
    pub fn from_values<S: Into<String>>(values: Vec<S>) -> Self {
        Self {
            cells: values.into_iter().map(|v| Some(v.into())).collect(),
        }
    }
}

/// One page of results from the query service.
///
/// The first page of a result set carries the header row as its first row;
/// later pages contain only data rows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultPage {
    /// Rows in this page
    pub rows: Vec<ResultRow>,
    /// Continuation token for the next page, if more pages exist
    pub next_token: Option<String>,
}

/// A mapped result row: column name to cell value
pub type Record = HashMap<String, String>;

/// Event emitted during query execution and result processing.
///
/// Components carry an optional broadcast sender; a host application can
/// subscribe and route these to whatever diagnostics backend it uses.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Query accepted by the service
    QuerySubmitted {
        /// Execution identifier assigned on submission
        id: ExecutionId,
    },

    /// One poll observed this state
    PollState {
        /// Execution identifier
        id: ExecutionId,
        /// State string as reported by the service
        state: String,
    },

    /// Query reached SUCCEEDED
    QueryCompleted {
        /// Execution identifier
        id: ExecutionId,
    },

    /// Query reached a terminal failure state
    QueryFailed {
        /// Execution identifier
        id: ExecutionId,
        /// Failure reason
        reason: String,
    },

    /// A full or final batch was handed to the sink
    BatchFlushed {
        /// Execution identifier
        id: ExecutionId,
        /// Number of records in the batch
        records: usize,
    },

    /// The streaming pipeline finished successfully
    StreamComplete {
        /// Execution identifier
        id: ExecutionId,
        /// Batches delivered to the sink
        batches: usize,
        /// Total records across all batches
        records: usize,
    },

    /// One result page was fetched and mapped
    PageFetched {
        /// Execution identifier
        id: ExecutionId,
        /// Zero-based page index
        page: usize,
        /// Data rows mapped from this page
        rows: usize,
    },
}
