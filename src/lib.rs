//! # query-stream
//!
//! Async client library for running SQL against a managed query service and
//! consuming the results without loading them whole into memory.
//!
//! ## Design Philosophy
//!
//! query-stream is designed to be:
//! - **Transport-agnostic** - The query service and object store are traits;
//!   bring your own SDK or HTTP client
//! - **Bounded** - Results stream through fixed-size batches with
//!   backpressure, never an unbounded buffer
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers can subscribe to lifecycle events instead
//!   of polling component state
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use query_stream::{ExecutionPoller, PageMapper, QueryContext, QueryService};
//!
//! async fn run(service: Arc<dyn QueryService>) -> query_stream::Result<()> {
//!     // Submit and poll to completion
//!     let poller = ExecutionPoller::new(service.clone(), QueryContext::default());
//!     let id = poller.submit_and_wait("SELECT id, name FROM users").await?;
//!
//!     // Map the paged results into name/value records
//!     let records = PageMapper::new(service).process_results(&id).await?;
//!     println!("{} records", records.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! For large result sets, [`BatchProcessor`] streams the CSV export straight
//! from object storage and hands fixed-size batches to a [`RecordSink`], and
//! [`JsonArrayWriter`] persists batches to a JSON array file incrementally.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Streaming CSV batch pipeline
pub mod batch;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Append-only JSON array file sink
pub mod json_writer;
/// Paginated row-to-record mapping
pub mod pager;
/// Submission and status polling
pub mod poller;
/// Query-service collaborator trait
pub mod service;
/// Object-storage collaborator trait and locations
pub mod storage;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use batch::{BatchOptions, BatchProcessor, RecordSink};
pub use config::{CsvOptions, DEFAULT_POLL_INTERVAL, MAX_BATCH_SIZE, QueryContext, ResultReusePolicy};
pub use error::{Error, Result};
pub use json_writer::JsonArrayWriter;
pub use pager::PageMapper;
pub use poller::ExecutionPoller;
pub use service::QueryService;
pub use storage::{ByteStream, ObjectStore, StorageLocation};
pub use types::{
    Event, ExecutionId, ExecutionState, ExecutionStatus, Record, ResultPage, ResultRow,
};
