//! Query-service collaborator interface
//!
//! The managed query service is an external system; this trait is the exact
//! surface the library needs from it. A host application implements it over
//! its own SDK or HTTP client and injects it into the components. The service
//! guarantees idempotent status reads, so polling the same identifier from a
//! retried flow is safe.

use async_trait::async_trait;

use crate::config::QueryContext;
use crate::error::Result;
use crate::types::{ExecutionId, ExecutionStatus, ResultPage};

/// Handle to the managed query service
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Submit a query for execution.
    ///
    /// Returns the execution identifier the service assigned, or `None` if
    /// the response carried no identifier (a contract violation the poller
    /// turns into an immediate, non-retryable failure).
    async fn submit_query(
        &self,
        sql: &str,
        context: &QueryContext,
    ) -> Result<Option<ExecutionId>>;

    /// Fetch the current execution status for an identifier
    async fn get_status(&self, id: &ExecutionId) -> Result<ExecutionStatus>;

    /// Fetch one page of result rows.
    ///
    /// `next_token` of `None` requests the first page; `page_size` caps the
    /// row count per page. Returns `None` when the service reports no result
    /// set at all — distinct from a page with zero rows, which is a normal
    /// empty result.
    async fn fetch_page(
        &self,
        id: &ExecutionId,
        next_token: Option<&str>,
        page_size: usize,
    ) -> Result<Option<ResultPage>>;
}
