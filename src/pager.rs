//! Paginated row mapper — fetches result pages directly from the query
//! service and converts them into name/value records.
//!
//! The first row of the first page is the header row; every later row maps
//! positionally onto those headers. Pages are fetched strictly in sequence,
//! reusing the first page's header context.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::MAX_BATCH_SIZE;
use crate::error::{Error, Result};
use crate::service::QueryService;
use crate::types::{Event, ExecutionId, Record, ResultRow};

/// Maps paged query results into records
pub struct PageMapper {
    service: Arc<dyn QueryService>,
    page_size: usize,
    paginate: bool,
    event_tx: Option<broadcast::Sender<Event>>,
}

impl std::fmt::Debug for PageMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageMapper")
            .field("page_size", &self.page_size)
            .field("paginate", &self.paginate)
            .finish_non_exhaustive()
    }
}

impl PageMapper {
    /// Create a mapper with the default page size (999) and pagination on
    pub fn new(service: Arc<dyn QueryService>) -> Self {
        Self {
            service,
            page_size: MAX_BATCH_SIZE,
            paginate: true,
            event_tx: None,
        }
    }

    /// Cap the rows requested per page.
    ///
    /// Fails with a validation error for zero or anything above the
    /// service's limit of 999, before any page is fetched.
    pub fn with_page_size(mut self, page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(Error::Validation("page size must be at least 1".into()));
        }
        if page_size > MAX_BATCH_SIZE {
            return Err(Error::Validation(format!(
                "page size {} exceeds limit {}",
                page_size, MAX_BATCH_SIZE
            )));
        }
        self.page_size = page_size;
        Ok(self)
    }

    /// Enable or disable fetching beyond the first page (default: enabled)
    pub fn with_pagination(mut self, paginate: bool) -> Self {
        self.paginate = paginate;
        self
    }

    /// Attach an event channel for page notifications
    pub fn with_events(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.event_tx {
            tx.send(event).ok();
        }
    }

    /// Fetch and map all result rows for an execution.
    ///
    /// Fails if the service reports no result set at all or the header row
    /// is empty. A result set that exists but has zero data rows is a normal
    /// empty outcome and returns an empty vec.
    pub async fn process_results(&self, id: &ExecutionId) -> Result<Vec<Record>> {
        let first_page = self
            .service
            .fetch_page(id, None, self.page_size)
            .await?
            .ok_or_else(|| Error::ResultSet("Query results are empty or undefined".into()))?;

        if first_page.rows.is_empty() {
            info!(execution_id = %id, "Query returned an empty result set");
            return Ok(Vec::new());
        }

        let headers = extract_headers(&first_page.rows[0])?;
        debug!(execution_id = %id, columns = headers.len(), "Extracted result headers");

        let mut records: Vec<Record> = first_page.rows[1..]
            .iter()
            .map(|row| map_row(&headers, row))
            .collect();

        self.emit(Event::PageFetched {
            id: id.clone(),
            page: 0,
            rows: records.len(),
        });

        let mut next_token = first_page.next_token;
        let mut page_index = 1usize;

        while self.paginate && next_token.is_some() {
            let page = self
                .service
                .fetch_page(id, next_token.as_deref(), self.page_size)
                .await?
                .ok_or_else(|| Error::ResultSet("Query results are empty or undefined".into()))?;

            let mapped = page.rows.iter().map(|row| map_row(&headers, row));
            let before = records.len();
            records.extend(mapped);

            self.emit(Event::PageFetched {
                id: id.clone(),
                page: page_index,
                rows: records.len() - before,
            });

            next_token = page.next_token;
            page_index += 1;
        }

        info!(execution_id = %id, records = records.len(), pages = page_index, "Mapped result rows");
        Ok(records)
    }
}

/// Pull column names out of the header row; absent cells become empty names
fn extract_headers(row: &ResultRow) -> Result<Vec<String>> {
    if row.cells.is_empty() {
        return Err(Error::ResultSet("No headers found".into()));
    }
    Ok(row
        .cells
        .iter()
        .map(|cell| cell.clone().unwrap_or_default())
        .collect())
}

/// Map a data row onto the headers by position.
///
/// Missing cells map to empty strings; cells beyond the header count are
/// dropped.
fn map_row(headers: &[String], row: &ResultRow) -> Record {
    headers
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let value = row
                .cells
                .get(i)
                .and_then(|cell| cell.clone())
                .unwrap_or_default();
            (name.clone(), value)
        })
        .collect()
}
